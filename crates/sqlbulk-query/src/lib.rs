//! Typed predicates, projections and their translation to SQL.
//!
//! `sqlbulk-query` is the **translation layer**. Callers build expressions
//! from the typed `Column` constants the derive macros generate; the
//! translator turns them into parameterized SQL fragments scoped to mapped
//! tables.
//!
//! # Pieces
//!
//! - **`Column<E, T>`**: typed field handle with comparison builders.
//! - **`Expr` / `Predicate<E>`**: the expression tree; predicates combine
//!   with `&`, `|` and `!`.
//! - **`SqlFragment`**: SQL text with `@name` placeholders that merge
//!   without collisions.
//! - **`translate_predicate` / `translate_projection`**: the translator.
//! - **`Query<E>` / `SelectQuery<W>`**: source queries with joins, grouping
//!   and explicit projection bindings.
//! - **`Assignments<E>`** and **`Filter<E>`**: inputs of bulk update and
//!   delete.

pub mod assign;
pub mod clause;
pub mod column;
pub mod expr;
pub mod filter;
pub mod fragment;
pub mod predicate;
pub mod projection;
pub mod query;
pub mod translate;

pub use assign::{Assignment, Assignments};
pub use clause::{Join, JoinType, OrderBy, OrderDirection};
pub use column::{Column, Operand};
pub use expr::{AggregateFunc, BinaryOp, Expr, Member, UnaryOp};
pub use filter::Filter;
pub use fragment::SqlFragment;
pub use predicate::Predicate;
pub use projection::{ProjectionBinding, validate_bindings};
pub use query::{Query, QueryParts, SelectList, SelectQuery, alias_column};
pub use translate::{Scope, Translator, qualified_column, translate_predicate, translate_projection};
