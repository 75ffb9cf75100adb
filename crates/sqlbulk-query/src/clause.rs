//! ORDER BY and JOIN clause types.

use crate::expr::{Expr, short_type_name};
use crate::predicate::Predicate;
use std::any::TypeId;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: Expr,
    pub direction: OrderDirection,
}

impl OrderBy {
    /// Create an ascending order by clause.
    pub fn asc(expr: impl Into<Expr>) -> Self {
        Self {
            expr: expr.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order by clause.
    pub fn desc(expr: impl Into<Expr>) -> Self {
        Self {
            expr: expr.into(),
            direction: OrderDirection::Desc,
        }
    }
}

/// Types of SQL joins SQLite supports for bulk sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

impl JoinType {
    /// Get the SQL keyword for this join type.
    pub const fn as_str(self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
        }
    }
}

/// A JOIN of another mapped entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub entity: TypeId,
    pub entity_name: &'static str,
    pub on: Expr,
}

impl Join {
    /// Join entity `J` with an ON predicate.
    pub fn new<J: 'static>(join_type: JoinType, on: Predicate<J>) -> Self {
        Self {
            join_type,
            entity: TypeId::of::<J>(),
            entity_name: short_type_name::<J>(),
            on: on.into_expr(),
        }
    }
}
