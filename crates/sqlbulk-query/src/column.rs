//! Typed column handles.
//!
//! `#[derive(Entity)]` and `#[derive(Projection)]` generate one
//! `Column<Self, T>` constant per field, so `User::age` is a
//! `Column<User, i64>`. Comparisons only accept operands of the column's
//! value type: another column of the same type, a matching Rust value, or an
//! untyped `Expr`/`Value` escape hatch.

use crate::clause::OrderBy;
use crate::expr::{Expr, Member};
use crate::predicate::Predicate;
use sqlbulk_core::Value;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Not;

/// Field `name` of `E`, holding values of type `T`.
pub struct Column<E, T> {
    name: &'static str,
    _marker: PhantomData<fn() -> (E, T)>,
}

impl<E, T> Column<E, T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Rust field name.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<E, T> Clone for Column<E, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E, T> Copy for Column<E, T> {}

impl<E, T> fmt::Debug for Column<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Column({})", self.name)
    }
}

/// Something that can stand on the right-hand side of a comparison with a
/// `Column<_, T>`.
pub trait Operand<T> {
    fn into_expr(self) -> Expr;
}

impl<E: 'static, T> Operand<T> for Column<E, T> {
    fn into_expr(self) -> Expr {
        self.expr()
    }
}

impl<T> Operand<T> for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl<T> Operand<T> for Value {
    fn into_expr(self) -> Expr {
        Expr::Literal(self)
    }
}

macro_rules! value_operands {
    ($target:ty => $($source:ty),+) => {
        $(
            impl Operand<$target> for $source {
                fn into_expr(self) -> Expr {
                    Expr::Literal(Value::from(self))
                }
            }
        )+
    };
}

value_operands!(bool => bool);
value_operands!(i8 => i8);
value_operands!(i16 => i16, i8);
value_operands!(i32 => i32, i16, i8);
value_operands!(i64 => i64, i32, i16, i8, u32);
value_operands!(f32 => f32);
value_operands!(f64 => f64, f32);
value_operands!(String => String, &str);
value_operands!(Vec<u8> => Vec<u8>, &[u8]);
value_operands!(serde_json::Value => serde_json::Value);

impl<E: 'static, T> Column<E, T> {
    /// Member-access expression for this column.
    pub fn expr(&self) -> Expr {
        Expr::Member(Member::of::<E>(self.name))
    }

    fn compare(self, f: fn(Expr, Expr) -> Expr, other: impl Operand<T>) -> Predicate<E> {
        Predicate::new(f(self.expr(), other.into_expr()))
    }

    /// Equal to (=)
    pub fn eq(self, other: impl Operand<T>) -> Predicate<E> {
        self.compare(|a, b| a.eq(b), other)
    }

    /// Not equal to (<>)
    pub fn ne(self, other: impl Operand<T>) -> Predicate<E> {
        self.compare(|a, b| a.ne(b), other)
    }

    /// Less than (<)
    pub fn lt(self, other: impl Operand<T>) -> Predicate<E> {
        self.compare(|a, b| a.lt(b), other)
    }

    /// Less than or equal to (<=)
    pub fn le(self, other: impl Operand<T>) -> Predicate<E> {
        self.compare(|a, b| a.le(b), other)
    }

    /// Greater than (>)
    pub fn gt(self, other: impl Operand<T>) -> Predicate<E> {
        self.compare(|a, b| a.gt(b), other)
    }

    /// Greater than or equal to (>=)
    pub fn ge(self, other: impl Operand<T>) -> Predicate<E> {
        self.compare(|a, b| a.ge(b), other)
    }

    pub fn is_null(self) -> Predicate<E> {
        Predicate::new(self.expr().is_null())
    }

    pub fn is_not_null(self) -> Predicate<E> {
        Predicate::new(self.expr().is_not_null())
    }

    /// IN list. An empty list fails at translation.
    pub fn in_list<V: Operand<T>>(self, values: impl IntoIterator<Item = V>) -> Predicate<E> {
        let values: Vec<Expr> = values.into_iter().map(Operand::into_expr).collect();
        Predicate::new(self.expr().in_list(values))
    }

    pub fn not_in_list<V: Operand<T>>(self, values: impl IntoIterator<Item = V>) -> Predicate<E> {
        let values: Vec<Expr> = values.into_iter().map(Operand::into_expr).collect();
        Predicate::new(self.expr().not_in_list(values))
    }

    pub fn between(self, low: impl Operand<T>, high: impl Operand<T>) -> Predicate<E> {
        Predicate::new(self.expr().between(low.into_expr(), high.into_expr()))
    }

    pub fn upper(self) -> Expr {
        self.expr().upper()
    }

    pub fn lower(self) -> Expr {
        self.expr().lower()
    }

    pub fn length(self) -> Expr {
        self.expr().length()
    }

    pub fn count(self) -> Expr {
        self.expr().count()
    }

    pub fn sum(self) -> Expr {
        self.expr().sum()
    }

    pub fn min(self) -> Expr {
        self.expr().min()
    }

    pub fn max(self) -> Expr {
        self.expr().max()
    }

    pub fn avg(self) -> Expr {
        self.expr().avg()
    }

    pub fn asc(self) -> OrderBy {
        OrderBy::asc(self.expr())
    }

    pub fn desc(self) -> OrderBy {
        OrderBy::desc(self.expr())
    }
}

/// Escape character for the literal-match helpers below.
pub const LIKE_ESCAPE: char = '\\';

/// Escape `%`, `_` and the escape character itself so `text` matches only
/// literally inside a LIKE pattern.
pub fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Pattern helpers. SQLite's LIKE folds ASCII case, so `starts_with("a")`
/// also matches "Apple"; non-ASCII characters compare exactly.
impl<E: 'static> Column<E, String> {
    /// LIKE with a caller-supplied pattern; `%` and `_` are wildcards.
    pub fn like(self, pattern: impl Into<String>) -> Predicate<E> {
        Predicate::new(self.expr().like(Expr::lit(pattern.into())))
    }

    fn like_literal(self, pattern: String) -> Predicate<E> {
        Predicate::new(self.expr().like_escaped(Expr::lit(pattern), LIKE_ESCAPE))
    }

    /// Contains `needle` literally.
    pub fn contains(self, needle: &str) -> Predicate<E> {
        self.like_literal(format!("%{}%", escape_like(needle)))
    }

    /// Starts with `prefix` literally.
    pub fn starts_with(self, prefix: &str) -> Predicate<E> {
        self.like_literal(format!("{}%", escape_like(prefix)))
    }

    /// Ends with `suffix` literally.
    pub fn ends_with(self, suffix: &str) -> Predicate<E> {
        self.like_literal(format!("%{}", escape_like(suffix)))
    }
}

impl<E: 'static> Column<E, bool> {
    /// The column itself as a predicate.
    pub fn is_true(self) -> Predicate<E> {
        Predicate::new(self.expr())
    }
}

impl<E: 'static> Not for Column<E, bool> {
    type Output = Predicate<E>;

    fn not(self) -> Predicate<E> {
        Predicate::new(self.expr().not())
    }
}

impl<E: 'static, T> From<Column<E, T>> for Expr {
    fn from(column: Column<E, T>) -> Self {
        column.expr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{BinaryOp, UnaryOp};

    struct Account;

    #[allow(non_upper_case_globals)]
    impl Account {
        const balance: Column<Account, i64> = Column::new("balance");
        const owner: Column<Account, String> = Column::new("owner");
        const frozen: Column<Account, bool> = Column::new("frozen");
    }

    #[test]
    fn typed_comparisons() {
        let p = Account::balance.gt(100);
        match p.into_expr() {
            Expr::Binary { op, right, .. } => {
                assert_eq!(op, BinaryOp::Gt);
                assert_eq!(*right, Expr::Literal(Value::Int(100)));
            }
            other => panic!("unexpected {other:?}"),
        }

        let same = Account::balance.eq(Account::balance).into_expr();
        assert!(matches!(same, Expr::Binary { op: BinaryOp::Eq, .. }));
    }

    #[test]
    fn boolean_columns() {
        assert_eq!(
            (!Account::frozen).into_expr(),
            Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(Account::frozen.expr()),
            }
        );
        assert_eq!(Account::frozen.is_true().into_expr(), Account::frozen.expr());
    }

    #[test]
    fn string_patterns() {
        let p = Account::owner.starts_with("Ann").into_expr();
        match p {
            Expr::Like {
                pattern, escape, ..
            } => {
                assert_eq!(*pattern, Expr::Literal(Value::Text("Ann%".into())));
                assert_eq!(escape, Some('\\'));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wildcards_in_needles_are_escaped() {
        assert_eq!(escape_like("A_1"), "A\\_1");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        match Account::owner.ends_with("0%").into_expr() {
            Expr::Like { pattern, .. } => {
                assert_eq!(*pattern, Expr::Literal(Value::Text("%0\\%".into())));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn columns_are_copy() {
        let c = Account::balance;
        let d = c;
        assert_eq!(c.name(), d.name());
    }
}
