//! Row selection for bulk delete and update: a predicate or a full query.

use crate::predicate::Predicate;
use crate::query::Query;
use std::fmt;

/// Which rows of `E` an operation touches.
pub enum Filter<E> {
    /// `WHERE <predicate>` directly on the target table
    Predicate(Predicate<E>),
    /// Rows whose key is produced by the query
    Query(Query<E>),
}

impl<E> From<Predicate<E>> for Filter<E> {
    fn from(p: Predicate<E>) -> Self {
        Filter::Predicate(p)
    }
}

impl<E> From<Query<E>> for Filter<E> {
    fn from(q: Query<E>) -> Self {
        Filter::Query(q)
    }
}

impl<E> Clone for Filter<E> {
    fn clone(&self) -> Self {
        match self {
            Filter::Predicate(p) => Filter::Predicate(p.clone()),
            Filter::Query(q) => Filter::Query(q.clone()),
        }
    }
}

impl<E> fmt::Debug for Filter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Predicate(p) => f.debug_tuple("Predicate").field(p).finish(),
            Filter::Query(q) => f.debug_tuple("Query").field(q).finish(),
        }
    }
}
