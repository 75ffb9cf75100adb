//! Typed expression tree for predicates, projections and assignments.
//!
//! `Expr` is a plain data structure: building one never touches metadata.
//! Column names, qualification and placeholders are decided later by the
//! translator, which walks the tree with a scope of mapped tables.

use crate::clause::OrderBy;
use sqlbulk_core::Value;
use std::any::TypeId;

/// Reference to a field of an entity (or projection) type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    pub entity: TypeId,
    pub entity_name: &'static str,
    pub field: &'static str,
}

impl Member {
    /// Member `field` of type `E`.
    pub fn of<E: 'static>(field: &'static str) -> Self {
        Self {
            entity: TypeId::of::<E>(),
            entity_name: short_type_name::<E>(),
            field,
        }
    }

    /// `Entity.field`, used in error messages.
    pub fn describe(&self) -> String {
        format!("{}.{}", self.entity_name, self.field)
    }
}

/// Last path segment of a type name (`app::model::User` → `User`).
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Field of an entity in scope
    Member(Member),

    /// Literal value, always bound as a parameter
    Literal(Value),

    /// Binary operation (comparison, logical, arithmetic, concatenation)
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// Unary operation (NOT, negation)
    Unary { op: UnaryOp, expr: Box<Expr> },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// IN (list)
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// BETWEEN low AND high
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },

    /// LIKE pattern, with an optional `ESCAPE` character
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
        escape: Option<char>,
    },

    /// Scalar function call; checked against the supported set on translation
    Call { name: String, args: Vec<Expr> },

    /// Aggregate; `arg: None` is `COUNT(*)`
    Aggregate {
        func: AggregateFunc,
        arg: Option<Box<Expr>>,
    },

    /// Constant true: explicit full-table intent
    True,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// String concatenation (||)
    Concat,
}

impl BinaryOp {
    /// Get the SQL representation of this operator.
    pub const fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Concat => "||",
        }
    }

    /// Get the precedence of this operator (higher = binds tighter).
    pub const fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::Ne => precedence::COMPARISON,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => precedence::RELATIONAL,
            BinaryOp::Add | BinaryOp::Sub => 6,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 7,
            BinaryOp::Concat => 8,
        }
    }

    /// `a op (b op c)` == `(a op b) op c`
    pub const fn is_associative(self) -> bool {
        matches!(
            self,
            BinaryOp::And | BinaryOp::Or | BinaryOp::Add | BinaryOp::Mul | BinaryOp::Concat
        )
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl AggregateFunc {
    pub const fn as_str(self) -> &'static str {
        match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
            AggregateFunc::Avg => "AVG",
        }
    }
}

/// Precedence levels used for parenthesization.
pub(crate) mod precedence {
    pub const NOT: u8 = 3;
    /// `=`, `<>`, IS, IN, LIKE, BETWEEN
    pub const COMPARISON: u8 = 4;
    /// `<`, `<=`, `>`, `>=` bind tighter than equality in SQLite
    pub const RELATIONAL: u8 = 5;
    pub const NEG: u8 = 9;
    pub const ATOM: u8 = 10;
}

impl Expr {
    // ==================== Constructors ====================

    /// Create a literal value expression.
    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// Create a NULL literal.
    pub fn null() -> Self {
        Expr::Literal(Value::Null)
    }

    /// Create a scalar function call.
    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.into(),
            args,
        }
    }

    /// COUNT(*) aggregate function.
    pub fn count_star() -> Self {
        Expr::Aggregate {
            func: AggregateFunc::Count,
            arg: None,
        }
    }

    /// COALESCE(a, b, ...)
    pub fn coalesce(args: Vec<impl Into<Expr>>) -> Self {
        Expr::call("coalesce", args.into_iter().map(Into::into).collect())
    }

    fn binary(self, op: BinaryOp, other: impl Into<Expr>) -> Self {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(other.into()),
        }
    }

    // ==================== Comparison Operators ====================

    /// Equal to (=)
    pub fn eq(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, other)
    }

    /// Not equal to (<>)
    pub fn ne(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ne, other)
    }

    /// Less than (<)
    pub fn lt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Lt, other)
    }

    /// Less than or equal to (<=)
    pub fn le(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Le, other)
    }

    /// Greater than (>)
    pub fn gt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gt, other)
    }

    /// Greater than or equal to (>=)
    pub fn ge(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ge, other)
    }

    // ==================== Logical Operators ====================

    /// Logical AND
    pub fn and(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::And, other)
    }

    /// Logical OR
    pub fn or(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Or, other)
    }

    /// Logical NOT
    pub fn not(self) -> Self {
        Expr::Unary {
            op: UnaryOp::Not,
            expr: Box::new(self),
        }
    }

    // ==================== Null Checks ====================

    /// IS NULL
    pub fn is_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    /// IS NOT NULL
    pub fn is_not_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    // ==================== Membership and Ranges ====================

    /// IN list of values. An empty list is rejected at translation.
    pub fn in_list(self, values: Vec<impl Into<Expr>>) -> Self {
        Expr::In {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    /// NOT IN list of values
    pub fn not_in_list(self, values: Vec<impl Into<Expr>>) -> Self {
        Expr::In {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    /// BETWEEN low AND high
    pub fn between(self, low: impl Into<Expr>, high: impl Into<Expr>) -> Self {
        Expr::Between {
            expr: Box::new(self),
            low: Box::new(low.into()),
            high: Box::new(high.into()),
            negated: false,
        }
    }

    /// LIKE pattern match
    pub fn like(self, pattern: impl Into<Expr>) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: Box::new(pattern.into()),
            negated: false,
            escape: None,
        }
    }

    /// NOT LIKE pattern match
    pub fn not_like(self, pattern: impl Into<Expr>) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: Box::new(pattern.into()),
            negated: true,
            escape: None,
        }
    }

    /// LIKE pattern match where `escape` makes the next `%`, `_` or
    /// `escape` in the pattern literal.
    pub fn like_escaped(self, pattern: impl Into<Expr>, escape: char) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: Box::new(pattern.into()),
            negated: false,
            escape: Some(escape),
        }
    }

    // ==================== Arithmetic Operators ====================

    /// Addition (+)
    pub fn add(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Add, other)
    }

    /// Subtraction (-)
    pub fn sub(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Sub, other)
    }

    /// Multiplication (*)
    pub fn mul(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Mul, other)
    }

    /// Division (/)
    pub fn div(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Div, other)
    }

    /// Modulo (%)
    pub fn modulo(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Mod, other)
    }

    /// Negation (unary -)
    pub fn neg(self) -> Self {
        Expr::Unary {
            op: UnaryOp::Neg,
            expr: Box::new(self),
        }
    }

    /// String concatenation (||)
    pub fn concat(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Concat, other)
    }

    // ==================== Functions ====================

    pub fn upper(self) -> Self {
        Expr::call("upper", vec![self])
    }

    pub fn lower(self) -> Self {
        Expr::call("lower", vec![self])
    }

    pub fn length(self) -> Self {
        Expr::call("length", vec![self])
    }

    pub fn trim(self) -> Self {
        Expr::call("trim", vec![self])
    }

    pub fn abs(self) -> Self {
        Expr::call("abs", vec![self])
    }

    pub fn round(self, digits: impl Into<Expr>) -> Self {
        Expr::call("round", vec![self, digits.into()])
    }

    /// SUBSTR(expr, start[, length])
    pub fn substr(self, start: impl Into<Expr>, length: Option<impl Into<Expr>>) -> Self {
        let mut args = vec![self, start.into()];
        if let Some(len) = length {
            args.push(len.into());
        }
        Expr::call("substr", args)
    }

    pub fn ifnull(self, fallback: impl Into<Expr>) -> Self {
        Expr::call("ifnull", vec![self, fallback.into()])
    }

    fn aggregate(self, func: AggregateFunc) -> Self {
        Expr::Aggregate {
            func,
            arg: Some(Box::new(self)),
        }
    }

    /// COUNT(expr) aggregate function.
    pub fn count(self) -> Self {
        self.aggregate(AggregateFunc::Count)
    }

    /// SUM(expr) aggregate function.
    pub fn sum(self) -> Self {
        self.aggregate(AggregateFunc::Sum)
    }

    /// MIN(expr) aggregate function.
    pub fn min(self) -> Self {
        self.aggregate(AggregateFunc::Min)
    }

    /// MAX(expr) aggregate function.
    pub fn max(self) -> Self {
        self.aggregate(AggregateFunc::Max)
    }

    /// AVG(expr) aggregate function.
    pub fn avg(self) -> Self {
        self.aggregate(AggregateFunc::Avg)
    }

    // ==================== Ordering ====================

    /// Ascending ORDER BY term.
    pub fn asc(self) -> OrderBy {
        OrderBy::asc(self)
    }

    /// Descending ORDER BY term.
    pub fn desc(self) -> OrderBy {
        OrderBy::desc(self)
    }

    // ==================== Inspection ====================

    /// Binding strength of this node as rendered.
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Unary {
                op: UnaryOp::Not, ..
            } => precedence::NOT,
            Expr::Unary {
                op: UnaryOp::Neg, ..
            } => precedence::NEG,
            Expr::IsNull { .. } | Expr::In { .. } | Expr::Between { .. } | Expr::Like { .. } => {
                precedence::COMPARISON
            }
            Expr::Member(_)
            | Expr::Literal(_)
            | Expr::Call { .. }
            | Expr::Aggregate { .. }
            | Expr::True => precedence::ATOM,
        }
    }

    /// Whether this is the constant-true node.
    pub fn is_true(&self) -> bool {
        matches!(self, Expr::True)
    }

    /// Whether any node below (or at) this one is an aggregate.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::Aggregate { .. } => true,
            Expr::Binary { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            Expr::Unary { expr, .. } | Expr::IsNull { expr, .. } => expr.contains_aggregate(),
            Expr::In { expr, values, .. } => {
                expr.contains_aggregate() || values.iter().any(Expr::contains_aggregate)
            }
            Expr::Between {
                expr, low, high, ..
            } => expr.contains_aggregate() || low.contains_aggregate() || high.contains_aggregate(),
            Expr::Like { expr, pattern, .. } => {
                expr.contains_aggregate() || pattern.contains_aggregate()
            }
            Expr::Call { args, .. } => args.iter().any(Expr::contains_aggregate),
            Expr::Member(_) | Expr::Literal(_) | Expr::True => false,
        }
    }
}

// ==================== Conversions ====================

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::Literal(Value::Text(s.to_string()))
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Literal(Value::Text(s))
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Expr::Literal(Value::Int(n))
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::Literal(Value::BigInt(n))
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Literal(Value::Bool(b))
    }
}

impl From<f64> for Expr {
    fn from(n: f64) -> Self {
        Expr::Literal(Value::Double(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Account;

    #[test]
    fn member_names_the_entity() {
        let m = Member::of::<Account>("balance");
        assert_eq!(m.entity_name, "Account");
        assert_eq!(m.describe(), "Account.balance");
        assert_eq!(m.entity, TypeId::of::<Account>());
    }

    #[test]
    fn builders_nest_left_to_right() {
        let a = Expr::Member(Member::of::<Account>("a"));
        let e = a.clone().eq(1).and(a.clone().gt(2_i64));
        match e {
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                assert_eq!(*left, a.clone().eq(1));
                assert_eq!(*right, a.gt(Expr::Literal(Value::BigInt(2))));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn precedence_ordering() {
        assert!(BinaryOp::Or.precedence() < BinaryOp::And.precedence());
        assert!(BinaryOp::And.precedence() < precedence::NOT);
        assert!(precedence::NOT < BinaryOp::Eq.precedence());
        assert!(BinaryOp::Eq.precedence() < BinaryOp::Lt.precedence());
        assert!(BinaryOp::Ge.precedence() < BinaryOp::Add.precedence());
        assert!(BinaryOp::Eq.precedence() < BinaryOp::Add.precedence());
        assert!(BinaryOp::Add.precedence() < BinaryOp::Mul.precedence());
        assert!(!BinaryOp::Sub.is_associative());
    }

    #[test]
    fn aggregate_detection() {
        let a = Expr::Member(Member::of::<Account>("a"));
        assert!(a.clone().sum().gt(10).contains_aggregate());
        assert!(Expr::count_star().contains_aggregate());
        assert!(!a.upper().eq("X").contains_aggregate());
    }
}
