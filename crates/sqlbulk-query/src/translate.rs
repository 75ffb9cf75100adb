//! Expression translator: typed `Expr` trees to parameterized SQL.
//!
//! Translation is a recursive `match` over the tree. Each node either
//! renders directly or fails with a `TranslationError` naming the node;
//! there is no fallback to client-side evaluation.
//!
//! Rules:
//! - member access renders the mapped column, qualified by table when more
//!   than one table is in scope
//! - literals become `@{prefix}N` placeholders, never inlined text
//! - calls are limited to a fixed set of SQLite scalar functions with
//!   checked arity
//! - children are parenthesized only when their precedence requires it

use crate::expr::{Expr, Member, UnaryOp, precedence};
use crate::projection::ProjectionBinding;
use sqlbulk_core::{Error, Result, quote_ident};
use sqlbulk_schema::{ColumnMapping, TableMapping};
use std::ops::RangeInclusive;

/// Supported scalar functions and their accepted argument counts.
const FUNCTIONS: &[(&str, RangeInclusive<usize>)] = &[
    ("upper", 1..=1),
    ("lower", 1..=1),
    ("length", 1..=1),
    ("trim", 1..=2),
    ("abs", 1..=1),
    ("round", 1..=2),
    ("coalesce", 2..=usize::MAX),
    ("substr", 2..=3),
    ("ifnull", 2..=2),
];

/// Tables visible to a translation.
#[derive(Debug, Clone)]
pub struct Scope<'m> {
    root: &'m TableMapping,
    joined: Vec<&'m TableMapping>,
}

impl<'m> Scope<'m> {
    /// A scope holding only `root`.
    pub fn single(root: &'m TableMapping) -> Self {
        Self {
            root,
            joined: Vec::new(),
        }
    }

    /// Add a joined table.
    pub fn join(&mut self, mapping: &'m TableMapping) -> Result<()> {
        if self.tables().any(|t| t.entity == mapping.entity) {
            return Err(Error::translation(
                mapping.entity_name,
                format!("entity '{}' is already in scope", mapping.entity_name),
            ));
        }
        self.joined.push(mapping);
        Ok(())
    }

    pub fn root(&self) -> &'m TableMapping {
        self.root
    }

    pub fn tables(&self) -> impl Iterator<Item = &'m TableMapping> + '_ {
        std::iter::once(self.root).chain(self.joined.iter().copied())
    }

    /// Column references are qualified once a second table is in scope.
    pub fn is_qualified(&self) -> bool {
        !self.joined.is_empty()
    }

    /// Resolve a member to its mapping and column.
    pub fn lookup(&self, member: &Member) -> Result<(&'m TableMapping, &'m ColumnMapping)> {
        let mapping = self
            .tables()
            .find(|t| t.entity == member.entity)
            .ok_or_else(|| {
                Error::translation(
                    member.describe(),
                    format!("entity '{}' is not in scope", member.entity_name),
                )
            })?;
        let column = mapping.column_for_field(member.field).ok_or_else(|| {
            Error::translation(
                member.describe(),
                format!(
                    "field '{}' has no mapped column in '{}'",
                    member.field, mapping.table
                ),
            )
        })?;
        Ok((mapping, column))
    }

    /// Render a column of `mapping` the way this scope qualifies names.
    pub fn column_sql(&self, mapping: &TableMapping, column: &str) -> String {
        if self.is_qualified() {
            qualified_column(mapping, column)
        } else {
            quote_ident(column)
        }
    }
}

/// `"table"."column"`, regardless of scope size.
pub fn qualified_column(mapping: &TableMapping, column: &str) -> String {
    format!("{}.{}", quote_ident(&mapping.table.name), quote_ident(column))
}

/// Translation state: output fragment plus placeholder prefix.
#[derive(Debug)]
pub struct Translator<'s, 'm> {
    scope: &'s Scope<'m>,
    fragment: crate::fragment::SqlFragment,
    prefix: &'static str,
    allow_aggregates: bool,
}

impl<'s, 'm> Translator<'s, 'm> {
    pub fn new(scope: &'s Scope<'m>) -> Self {
        Self {
            scope,
            fragment: crate::fragment::SqlFragment::new(),
            prefix: "p",
            allow_aggregates: true,
        }
    }

    /// Use `@{prefix}N` for literal placeholders.
    pub fn with_prefix(mut self, prefix: &'static str) -> Self {
        self.prefix = prefix;
        self
    }

    /// Reject aggregates (WHERE clauses, assignments).
    pub fn without_aggregates(mut self) -> Self {
        self.allow_aggregates = false;
        self
    }

    pub fn set_allow_aggregates(&mut self, allow: bool) {
        self.allow_aggregates = allow;
    }

    pub fn scope(&self) -> &'s Scope<'m> {
        self.scope
    }

    pub fn push_sql(&mut self, sql: &str) {
        self.fragment.push_sql(sql);
    }

    pub fn push_param(&mut self, value: sqlbulk_core::Value) {
        self.fragment.push_param(self.prefix, value);
    }

    pub fn finish(self) -> crate::fragment::SqlFragment {
        self.fragment
    }

    /// Translate one expression at top level.
    pub fn expr(&mut self, expr: &Expr) -> Result<()> {
        self.node(expr, 0)
    }

    // Parenthesize when the node binds looser than its context requires.
    fn node(&mut self, expr: &Expr, required: u8) -> Result<()> {
        let wrap = expr.precedence() < required;
        if wrap {
            self.push_sql("(");
        }
        self.render(expr)?;
        if wrap {
            self.push_sql(")");
        }
        Ok(())
    }

    fn render(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Member(member) => {
                let (mapping, column) = self.scope.lookup(member)?;
                let sql = self.scope.column_sql(mapping, &column.name);
                self.push_sql(&sql);
            }

            Expr::Literal(value) => self.push_param(value.clone()),

            Expr::Binary { left, op, right } => {
                let prec = op.precedence();
                self.node(left, prec)?;
                self.push_sql(" ");
                self.push_sql(op.as_str());
                self.push_sql(" ");
                // Right operand of a non-associative operator needs parens
                // at equal precedence: a - (b - c).
                let right_required = if op.is_associative()
                    && matches!(right.as_ref(), Expr::Binary { op: r, .. } if r == op)
                {
                    prec
                } else {
                    prec + 1
                };
                self.node(right, right_required)?;
            }

            Expr::Unary { op, expr } => match op {
                UnaryOp::Not => {
                    self.push_sql("NOT ");
                    self.node(expr, precedence::NOT)?;
                }
                UnaryOp::Neg => {
                    self.push_sql("-");
                    self.node(expr, precedence::ATOM)?;
                }
            },

            Expr::IsNull { expr, negated } => {
                self.node(expr, precedence::COMPARISON + 1)?;
                self.push_sql(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                if values.is_empty() {
                    return Err(Error::translation(
                        if *negated { "NOT IN" } else { "IN" },
                        "IN list is empty",
                    ));
                }
                self.node(expr, precedence::COMPARISON + 1)?;
                self.push_sql(if *negated { " NOT IN (" } else { " IN (" });
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.push_sql(", ");
                    }
                    self.node(value, 0)?;
                }
                self.push_sql(")");
            }

            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                self.node(expr, precedence::COMPARISON + 1)?;
                self.push_sql(if *negated {
                    " NOT BETWEEN "
                } else {
                    " BETWEEN "
                });
                self.node(low, precedence::COMPARISON + 1)?;
                self.push_sql(" AND ");
                self.node(high, precedence::COMPARISON + 1)?;
            }

            Expr::Like {
                expr,
                pattern,
                negated,
                escape,
            } => {
                self.node(expr, precedence::COMPARISON + 1)?;
                self.push_sql(if *negated { " NOT LIKE " } else { " LIKE " });
                self.node(pattern, precedence::COMPARISON + 1)?;
                if let Some(c) = escape {
                    let quoted = if *c == '\'' { "''".to_string() } else { c.to_string() };
                    self.push_sql(&format!(" ESCAPE '{quoted}'"));
                }
            }

            Expr::Call { name, args } => {
                let lower = name.to_ascii_lowercase();
                let arity = FUNCTIONS
                    .iter()
                    .find(|(f, _)| *f == lower)
                    .map(|(_, arity)| arity)
                    .ok_or_else(|| {
                        Error::translation(
                            format!("{name}()"),
                            format!("function '{name}' is not supported"),
                        )
                    })?;
                if !arity.contains(&args.len()) {
                    return Err(Error::translation(
                        format!("{name}()"),
                        format!(
                            "function '{name}' does not take {} argument(s)",
                            args.len()
                        ),
                    ));
                }
                self.push_sql(&lower.to_ascii_uppercase());
                self.push_sql("(");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.push_sql(", ");
                    }
                    self.node(arg, 0)?;
                }
                self.push_sql(")");
            }

            Expr::Aggregate { func, arg } => {
                if !self.allow_aggregates {
                    return Err(Error::translation(
                        format!("{}()", func.as_str()),
                        "aggregates are not allowed here",
                    ));
                }
                self.push_sql(func.as_str());
                self.push_sql("(");
                match arg {
                    Some(arg) => self.node(arg, 0)?,
                    None => self.push_sql("*"),
                }
                self.push_sql(")");
            }

            Expr::True => self.push_sql("1"),
        }
        Ok(())
    }
}

/// Translate a boolean predicate for a WHERE clause.
pub fn translate_predicate(expr: &Expr, scope: &Scope<'_>) -> Result<crate::fragment::SqlFragment> {
    let mut translator = Translator::new(scope).without_aggregates();
    translator.expr(expr)?;
    Ok(translator.finish())
}

/// Translate projection bindings into a select list:
/// `expr AS "output", ...` in the order given.
pub fn translate_projection(
    bindings: &[ProjectionBinding],
    scope: &Scope<'_>,
) -> Result<crate::fragment::SqlFragment> {
    let mut translator = Translator::new(scope);
    write_projection(&mut translator, bindings)?;
    Ok(translator.finish())
}

pub(crate) fn write_projection(
    translator: &mut Translator<'_, '_>,
    bindings: &[ProjectionBinding],
) -> Result<()> {
    for (i, binding) in bindings.iter().enumerate() {
        if i > 0 {
            translator.push_sql(", ");
        }
        translator.expr(&binding.source)?;
        translator.push_sql(" AS ");
        translator.push_sql(&quote_ident(binding.output));
    }
    Ok(())
}
