//! Boolean predicates rooted at an entity type.

use crate::expr::Expr;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{BitAnd, BitOr, Not};

/// A boolean expression over entity `E` (and anything joined to it).
///
/// Combine with `&`, `|` and `!`:
///
/// ```ignore
/// let stale = User::is_active.is_true() & User::age.gt(90) | !User::verified;
/// ```
pub struct Predicate<E> {
    expr: Expr,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Predicate<E> {
    /// Wrap a boolean expression.
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            _entity: PhantomData,
        }
    }

    /// The constant-true predicate: explicit intent to touch every row.
    pub fn all() -> Self {
        Self::new(Expr::True)
    }

    pub fn is_all(&self) -> bool {
        self.expr.is_true()
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn into_expr(self) -> Expr {
        self.expr
    }

    pub fn and(self, other: Predicate<E>) -> Self {
        Self::new(self.expr.and(other.expr))
    }

    pub fn or(self, other: Predicate<E>) -> Self {
        Self::new(self.expr.or(other.expr))
    }
}

impl<E> Clone for Predicate<E> {
    fn clone(&self) -> Self {
        Self::new(self.expr.clone())
    }
}

impl<E> fmt::Debug for Predicate<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.expr).finish()
    }
}

impl<E> BitAnd for Predicate<E> {
    type Output = Predicate<E>;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.and(rhs)
    }
}

impl<E> BitOr for Predicate<E> {
    type Output = Predicate<E>;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.or(rhs)
    }
}

impl<E> Not for Predicate<E> {
    type Output = Predicate<E>;

    fn not(self) -> Self::Output {
        Self::new(self.expr.not())
    }
}

impl<E> From<Predicate<E>> for Expr {
    fn from(p: Predicate<E>) -> Self {
        p.expr
    }
}
