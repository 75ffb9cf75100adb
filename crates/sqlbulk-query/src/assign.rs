//! Column assignments for bulk updates.

use crate::column::{Column, Operand};
use crate::expr::Expr;
use std::fmt;
use std::marker::PhantomData;

/// One `SET column = value` entry, keyed by Rust field name.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub field: &'static str,
    pub value: Expr,
}

/// Ordered assignment list for entity `E`.
///
/// Constants are bound as parameters; `set_expr` assigns an expression over
/// the current row (`score = score + 1`).
pub struct Assignments<E> {
    items: Vec<Assignment>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: 'static> Assignments<E> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            _entity: PhantomData,
        }
    }

    /// `SET column = value`, typed against the column.
    pub fn set<T>(mut self, column: Column<E, T>, value: impl Operand<T>) -> Self {
        self.items.push(Assignment {
            field: column.name(),
            value: value.into_expr(),
        });
        self
    }

    /// `SET column = <expression>`.
    pub fn set_expr<T>(mut self, column: Column<E, T>, value: impl Into<Expr>) -> Self {
        self.items.push(Assignment {
            field: column.name(),
            value: value.into(),
        });
        self
    }

    /// `SET column = NULL`.
    pub fn set_null<T>(self, column: Column<E, T>) -> Self {
        self.set_expr(column, Expr::null())
    }

    pub fn items(&self) -> &[Assignment] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl<E: 'static> Default for Assignments<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for Assignments<E> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for Assignments<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}
