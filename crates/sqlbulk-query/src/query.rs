//! Source queries: a root entity plus joins, filter, grouping, ordering and
//! paging.
//!
//! A `Query<E>` is only a description. It renders against a set of context
//! mappings, and every clause goes through the translator with the same
//! scope, so joined members are qualified consistently and placeholder
//! names never repeat within one query.

use crate::clause::{Join, JoinType, OrderBy, OrderDirection};
use crate::column::{Column, Operand};
use crate::expr::{Expr, short_type_name};
use crate::fragment::SqlFragment;
use crate::predicate::Predicate;
use crate::projection::{ProjectionBinding, validate_bindings};
use crate::translate::{Scope, Translator, qualified_column, write_projection};
use sqlbulk_core::{Entity, Error, Projection, Result, Value, quote_ident};
use sqlbulk_schema::{ContextTableMappings, TableMapping};
use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;

/// Entity-independent query description.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParts {
    pub root: TypeId,
    pub root_name: &'static str,
    pub joins: Vec<Join>,
    pub filter: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// What a rendered query selects.
#[derive(Debug, Clone, Copy)]
pub enum SelectList<'a> {
    /// Primary-key columns of the root table, always table-qualified
    RootKey,
    /// `expr AS "output"` for each binding, in the given order
    Bindings(&'a [ProjectionBinding]),
    /// `COUNT(*)`
    Count,
}

impl QueryParts {
    fn new(root: TypeId, root_name: &'static str) -> Self {
        Self {
            root,
            root_name,
            joins: Vec::new(),
            filter: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Whether the query restricts its rows with a real filter.
    pub fn is_bounded(&self) -> bool {
        self.filter.as_ref().is_some_and(|f| !f.is_true())
    }

    fn add_filter(&mut self, expr: Expr) {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
    }

    /// Build the translation scope: root plus every joined entity.
    pub fn scope<'m>(&self, mappings: &'m ContextTableMappings) -> Result<Scope<'m>> {
        let root = mapping_in(mappings, self.root, self.root_name)?;
        let mut scope = Scope::single(root);
        for join in &self.joins {
            scope.join(mapping_in(mappings, join.entity, join.entity_name)?)?;
        }
        Ok(scope)
    }

    /// Render `SELECT <list> FROM ...` with all clauses.
    pub fn render(
        &self,
        mappings: &ContextTableMappings,
        select: SelectList<'_>,
    ) -> Result<SqlFragment> {
        let scope = self.scope(mappings)?;
        let root = scope.root();
        let mut t = Translator::new(&scope);

        t.push_sql("SELECT ");
        match select {
            SelectList::RootKey => {
                let keys: Vec<String> = root
                    .primary_key()
                    .iter()
                    .map(|c| qualified_column(root, &c.name))
                    .collect();
                if keys.is_empty() {
                    return Err(Error::config(format!(
                        "entity '{}' has no primary key",
                        root.entity_name
                    )));
                }
                t.push_sql(&keys.join(", "));
            }
            SelectList::Bindings(bindings) => write_projection(&mut t, bindings)?,
            SelectList::Count => t.push_sql("COUNT(*)"),
        }

        t.push_sql(" FROM ");
        t.push_sql(&root.table.to_sql());
        for join in &self.joins {
            let mapping = mapping_in(mappings, join.entity, join.entity_name)?;
            t.push_sql(" ");
            t.push_sql(join.join_type.as_str());
            t.push_sql(" ");
            t.push_sql(&mapping.table.to_sql());
            t.push_sql(" ON ");
            t.set_allow_aggregates(false);
            t.expr(&join.on)?;
        }

        if let Some(filter) = &self.filter {
            t.push_sql(" WHERE ");
            t.set_allow_aggregates(false);
            t.expr(filter)?;
        }

        t.set_allow_aggregates(true);
        if !self.group_by.is_empty() {
            t.push_sql(" GROUP BY ");
            for (i, expr) in self.group_by.iter().enumerate() {
                if i > 0 {
                    t.push_sql(", ");
                }
                t.expr(expr)?;
            }
        }

        if let Some(having) = &self.having {
            if self.group_by.is_empty() {
                return Err(Error::translation("HAVING", "HAVING requires GROUP BY"));
            }
            t.push_sql(" HAVING ");
            t.expr(having)?;
        }

        if !self.order_by.is_empty() {
            t.push_sql(" ORDER BY ");
            for (i, term) in self.order_by.iter().enumerate() {
                if i > 0 {
                    t.push_sql(", ");
                }
                t.expr(&term.expr)?;
                t.push_sql(match term.direction {
                    OrderDirection::Asc => " ASC",
                    OrderDirection::Desc => " DESC",
                });
            }
        }

        match (self.limit, self.offset) {
            (Some(limit), offset) => {
                t.push_sql(" LIMIT ");
                t.push_param(to_param(limit)?);
                if let Some(offset) = offset {
                    t.push_sql(" OFFSET ");
                    t.push_param(to_param(offset)?);
                }
            }
            // SQLite only accepts OFFSET after a LIMIT; -1 means no limit.
            (None, Some(offset)) => {
                t.push_sql(" LIMIT -1 OFFSET ");
                t.push_param(to_param(offset)?);
            }
            (None, None) => {}
        }

        Ok(t.finish())
    }
}

fn to_param(n: u64) -> Result<Value> {
    Value::try_from(n)
}

fn mapping_in<'m>(
    mappings: &'m ContextTableMappings,
    entity: TypeId,
    name: &str,
) -> Result<&'m TableMapping> {
    mappings.get_by_type_id(entity).ok_or_else(|| {
        Error::config(format!(
            "entity '{}' is not mapped in context '{}'",
            name,
            mappings.context()
        ))
    })
}

/// A typed query rooted at entity `E`.
pub struct Query<E> {
    parts: QueryParts,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Query<E> {
    pub fn new() -> Self {
        Self {
            parts: QueryParts::new(TypeId::of::<E>(), short_type_name::<E>()),
            _entity: PhantomData,
        }
    }

    /// Add a WHERE condition; repeated calls are ANDed.
    pub fn filter<P>(mut self, predicate: Predicate<P>) -> Self {
        self.parts.add_filter(predicate.into_expr());
        self
    }

    /// INNER JOIN entity `J`.
    pub fn inner_join<J: Entity>(mut self, on: Predicate<J>) -> Self {
        self.parts.joins.push(Join::new(JoinType::Inner, on));
        self
    }

    /// LEFT JOIN entity `J`.
    pub fn left_join<J: Entity>(mut self, on: Predicate<J>) -> Self {
        self.parts.joins.push(Join::new(JoinType::Left, on));
        self
    }

    pub fn group_by(mut self, expr: impl Into<Expr>) -> Self {
        self.parts.group_by.push(expr.into());
        self
    }

    pub fn having<P>(mut self, predicate: Predicate<P>) -> Self {
        let expr = predicate.into_expr();
        self.parts.having = Some(match self.parts.having.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.parts.order_by.push(order);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.parts.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.parts.offset = Some(n);
        self
    }

    pub fn parts(&self) -> &QueryParts {
        &self.parts
    }

    pub fn into_parts(self) -> QueryParts {
        self.parts
    }

    /// Switch to a projection: outputs of `W` are bound to source
    /// expressions with [`SelectQuery::bind`].
    pub fn select<W: Projection>(self) -> SelectQuery<W> {
        SelectQuery {
            parts: self.parts,
            bindings: Vec::new(),
            _projection: PhantomData,
        }
    }
}

impl<E: Entity> Default for Query<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for Query<E> {
    fn clone(&self) -> Self {
        Self {
            parts: self.parts.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Query").field(&self.parts).finish()
    }
}

/// A source query with explicit bindings for every output of `W`.
pub struct SelectQuery<W> {
    parts: QueryParts,
    bindings: Vec<ProjectionBinding>,
    _projection: PhantomData<fn() -> W>,
}

impl<W: Projection> SelectQuery<W> {
    /// Bind `output` to a source operand of the same value type.
    pub fn bind<T>(mut self, output: Column<W, T>, source: impl Operand<T>) -> Self {
        self.bindings.push(ProjectionBinding {
            output: output.name(),
            source: source.into_expr(),
        });
        self
    }

    /// Bind `output` to an untyped expression.
    pub fn bind_expr<T>(mut self, output: Column<W, T>, source: Expr) -> Self {
        self.bindings.push(ProjectionBinding {
            output: output.name(),
            source,
        });
        self
    }

    pub fn bindings(&self) -> &[ProjectionBinding] {
        &self.bindings
    }

    pub fn parts(&self) -> &QueryParts {
        &self.parts
    }

    /// Check the bindings against `W`'s declared outputs.
    pub fn validate(&self, table: &str) -> Result<()> {
        validate_bindings(W::NAME, table, W::outputs(), &self.bindings)
    }

    /// Render with outputs in the order of `outputs` (names of `W`'s
    /// outputs). Bindings are validated first.
    pub fn render_ordered(
        &self,
        mappings: &ContextTableMappings,
        table: &str,
        outputs: &[&str],
    ) -> Result<SqlFragment> {
        self.validate(table)?;
        let mut ordered = Vec::with_capacity(outputs.len());
        for name in outputs {
            let binding = self
                .bindings
                .iter()
                .find(|b| b.output == *name)
                .ok_or_else(|| {
                    Error::translation(
                        format!("{}.{}", W::NAME, name),
                        "output is not bound",
                    )
                })?;
            ordered.push(binding.clone());
        }
        self.parts.render(mappings, SelectList::Bindings(&ordered))
    }

    /// Render with outputs in binding order.
    pub fn render(&self, mappings: &ContextTableMappings) -> Result<SqlFragment> {
        self.validate("")?;
        self.parts.render(mappings, SelectList::Bindings(&self.bindings))
    }
}

impl<W> Clone for SelectQuery<W> {
    fn clone(&self) -> Self {
        Self {
            parts: self.parts.clone(),
            bindings: self.bindings.clone(),
            _projection: PhantomData,
        }
    }
}

impl<W> fmt::Debug for SelectQuery<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectQuery")
            .field("parts", &self.parts)
            .field("bindings", &self.bindings)
            .finish()
    }
}

/// `"alias"."column"` for a derived table.
pub fn alias_column(alias: &str, column: &str) -> String {
    format!("{}.{}", quote_ident(alias), quote_ident(column))
}
