//! Bulk statement composition.
//!
//! Each function here turns a typed request into a [`BulkOperationPlan`]:
//! the complete, ordered list of statements one logical operation runs.
//! Composition never touches the database, so every translation, shape and
//! configuration error surfaces before the first statement executes, and a
//! plan can be inspected (or logged) without running it.

use sqlbulk_core::error::{ForeignKeyError, MissingPredicateError, ProjectionShapeError};
use sqlbulk_core::{
    BulkConnection, Cx, Entity, Error, Outcome, Projection, Result, TableName, Value, quote_ident,
};
use sqlbulk_query::{
    Assignment, Assignments, Filter, Predicate, Query, QueryParts, Scope, SelectList, SelectQuery,
    SqlFragment, Translator, alias_column, qualified_column, translate_predicate,
};
use sqlbulk_schema::{ContextTableMappings, TableMapping};
use std::collections::HashSet;
use std::fmt;

/// Alias of the derived source table in select-and-update.
const SOURCE_ALIAS: &str = "src";

/// Placeholder prefix for assignment values, disjoint from predicate `@p`.
const ASSIGNMENT_PREFIX: &str = "s";

/// One executable statement with SQLite positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    /// Render a named-placeholder fragment as `?N` SQL.
    pub fn from_fragment(fragment: &SqlFragment) -> Result<Self> {
        let (sql, params) = fragment.to_positional()?;
        Ok(Self { sql, params })
    }

    fn plain(sql: String) -> Self {
        Self {
            sql,
            params: Vec::new(),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Operation a plan performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkMode {
    Delete,
    Update,
    SelectAndInsert,
    SelectAndUpdate,
    Truncate,
    TruncateWithForeignKeys,
}

impl BulkMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BulkMode::Delete => "delete",
            BulkMode::Update => "update",
            BulkMode::SelectAndInsert => "select_and_insert",
            BulkMode::SelectAndUpdate => "select_and_update",
            BulkMode::Truncate => "truncate",
            BulkMode::TruncateWithForeignKeys => "truncate_with_foreign_keys",
        }
    }
}

impl fmt::Display for BulkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a plan.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    /// Run a statement; its affected-row count adds to the plan's total
    Execute(Statement),
    /// Restart the table's generated keys
    ResetIdentity(TableName),
}

/// Ordered statements of one bulk operation against one target table.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOperationPlan {
    pub mode: BulkMode,
    pub table: TableName,
    pub steps: Vec<PlanStep>,
}

impl BulkOperationPlan {
    fn single(mode: BulkMode, mapping: &TableMapping, fragment: &SqlFragment) -> Result<Self> {
        Ok(Self {
            mode,
            table: mapping.table.clone(),
            steps: vec![PlanStep::Execute(Statement::from_fragment(fragment)?)],
        })
    }

    /// Statements the plan executes, in order.
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.steps.iter().filter_map(|step| match step {
            PlanStep::Execute(statement) => Some(statement),
            PlanStep::ResetIdentity(_) => None,
        })
    }

    /// Run every step in order on `conn`, stopping at the first failure.
    ///
    /// Returns the total affected-row count. Steps are not wrapped in a
    /// transaction; callers wanting atomicity open one first.
    #[tracing::instrument(level = "debug", skip(self, cx, conn), fields(mode = %self.mode, table = %self.table))]
    pub async fn execute<C: BulkConnection>(&self, cx: &Cx, conn: &C) -> Outcome<u64, Error> {
        let mut affected = 0;
        for step in &self.steps {
            match step {
                PlanStep::Execute(statement) => {
                    tracing::trace!(sql = %statement.sql, params = statement.params.len(), "Executing bulk statement");
                    match conn.execute(cx, &statement.sql, &statement.params).await {
                        Outcome::Ok(n) => affected += n,
                        Outcome::Err(e) => return Outcome::Err(e),
                        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                        Outcome::Panicked(p) => return Outcome::Panicked(p),
                    }
                }
                PlanStep::ResetIdentity(table) => match conn.reset_identity(cx, table).await {
                    Outcome::Ok(()) => {
                        tracing::trace!(table = %table, "Identity reset");
                    }
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                },
            }
        }
        tracing::debug!(rows = affected, "Bulk operation complete");
        Outcome::Ok(affected)
    }
}

/// `DELETE FROM <table> WHERE ...`.
///
/// A predicate must restrict rows; `Predicate::all()` is refused here and
/// full-table deletes go through [`truncate`]. A query filter deletes the
/// rows whose primary key the query selects.
pub fn delete<E: Entity>(
    mappings: &ContextTableMappings,
    filter: Filter<E>,
) -> Result<BulkOperationPlan> {
    let mapping = mappings.get::<E>()?;
    let mut fragment = SqlFragment::raw(format!("DELETE FROM {}", mapping.table.to_sql()))?;

    match filter {
        Filter::Predicate(predicate) => {
            if predicate.is_all() {
                return Err(missing_predicate(BulkMode::Delete, mapping));
            }
            fragment.push_sql(" WHERE ");
            fragment.append(translate_predicate(predicate.expr(), &Scope::single(mapping))?);
        }
        Filter::Query(query) => {
            if !query.parts().is_bounded() {
                return Err(missing_predicate(BulkMode::Delete, mapping));
            }
            fragment.push_sql(" WHERE ");
            fragment.append(key_in_subquery(mappings, mapping, query.parts())?);
        }
    }

    BulkOperationPlan::single(BulkMode::Delete, mapping, &fragment)
}

/// `UPDATE <table> SET ... WHERE ...`.
///
/// `Predicate::all()` (or a query filtered by it) states full-table intent
/// and is accepted. A query without any filter is not.
pub fn update<E: Entity>(
    mappings: &ContextTableMappings,
    filter: Filter<E>,
    assignments: &Assignments<E>,
) -> Result<BulkOperationPlan> {
    let mapping = mappings.get::<E>()?;
    let mut fragment = SqlFragment::raw(format!("UPDATE {} SET ", mapping.table.to_sql()))?;
    fragment.append(set_clause(mapping, assignments.items())?);

    match filter {
        Filter::Predicate(predicate) => {
            if !predicate.is_all() {
                fragment.push_sql(" WHERE ");
                fragment.append(translate_predicate(predicate.expr(), &Scope::single(mapping))?);
            }
        }
        Filter::Query(query) => {
            if query.parts().filter.is_none() {
                return Err(missing_predicate(BulkMode::Update, mapping));
            }
            fragment.push_sql(" WHERE ");
            fragment.append(key_in_subquery(mappings, mapping, query.parts())?);
        }
    }

    BulkOperationPlan::single(BulkMode::Update, mapping, &fragment)
}

/// `INSERT INTO <target> (<cols>) SELECT ...`.
///
/// Every assignable column of `T` must be filled by exactly one output of
/// `W`. Columns are written in `T`'s mapping order whatever order `W`
/// declares or binds its outputs in.
pub fn select_and_insert<T: Entity, W: Projection>(
    mappings: &ContextTableMappings,
    source: &SelectQuery<W>,
) -> Result<BulkOperationPlan> {
    let mapping = mappings.get::<T>()?;
    let insertable = mapping.insertable_columns();
    let outputs = W::outputs();

    if outputs.len() != insertable.len() {
        return Err(shape_error::<W>(
            mapping,
            insertable.len(),
            format!(
                "{} has {} output(s) but {} has {} assignable column(s)",
                W::NAME,
                outputs.len(),
                mapping.table,
                insertable.len()
            ),
        ));
    }

    let mut seen = HashSet::new();
    for output in outputs {
        match mapping.column(output.target) {
            None => {
                return Err(shape_error::<W>(
                    mapping,
                    insertable.len(),
                    format!("output '{}' targets unknown column '{}'", output.name, output.target),
                ));
            }
            Some(column) if !column.is_assignable() => {
                return Err(shape_error::<W>(
                    mapping,
                    insertable.len(),
                    format!(
                        "output '{}' targets identity or computed column '{}'",
                        output.name, output.target
                    ),
                ));
            }
            Some(_) => {}
        }
        if !seen.insert(output.target) {
            return Err(shape_error::<W>(
                mapping,
                insertable.len(),
                format!("column '{}' is targeted by more than one output", output.target),
            ));
        }
    }

    // Counts match and targets are distinct, so every insertable column has
    // exactly one output.
    let mut order = Vec::with_capacity(insertable.len());
    let mut columns = Vec::with_capacity(insertable.len());
    for column in &insertable {
        if let Some(output) = outputs.iter().find(|o| o.target == column.name) {
            order.push(output.name);
            columns.push(quote_ident(&column.name));
        }
    }

    let select = source.render_ordered(mappings, &mapping.table.to_string(), &order)?;
    let mut fragment = SqlFragment::raw(format!(
        "INSERT INTO {} ({}) ",
        mapping.table.to_sql(),
        columns.join(", ")
    ))?;
    fragment.append(select);

    BulkOperationPlan::single(BulkMode::SelectAndInsert, mapping, &fragment)
}

/// `UPDATE <target> SET c = "src".c ... FROM (<source>) AS "src" WHERE <key match>`.
///
/// The projection must bind every primary-key column of `T` plus at least
/// one updatable column; key outputs only join, the rest are assigned.
pub fn select_and_update<T: Entity, W: Projection>(
    mappings: &ContextTableMappings,
    source: &SelectQuery<W>,
) -> Result<BulkOperationPlan> {
    let mapping = mappings.get::<T>()?;
    if mapping.keyless {
        return Err(Error::config(format!(
            "select-and-update needs a primary key; '{}' is keyless",
            mapping.entity_name
        )));
    }

    let outputs = W::outputs();
    let key = mapping.primary_key();
    let expected = key.len() + mapping.updatable_columns().len();

    let mut seen = HashSet::new();
    let mut assigned = Vec::new();
    for output in outputs {
        let Some(column) = mapping.column(output.target) else {
            return Err(shape_error::<W>(
                mapping,
                expected,
                format!("output '{}' targets unknown column '{}'", output.name, output.target),
            ));
        };
        if !seen.insert(output.target) {
            return Err(shape_error::<W>(
                mapping,
                expected,
                format!("column '{}' is targeted by more than one output", output.target),
            ));
        }
        if column.primary_key {
            continue;
        }
        if !column.is_assignable() {
            return Err(shape_error::<W>(
                mapping,
                expected,
                format!(
                    "output '{}' targets identity or computed column '{}'",
                    output.name, output.target
                ),
            ));
        }
        assigned.push((column.name.as_str(), output.name));
    }

    let missing_key: Vec<&str> = key
        .iter()
        .filter(|c| !seen.contains(c.name.as_str()))
        .map(|c| c.name.as_str())
        .collect();
    if !missing_key.is_empty() {
        return Err(shape_error::<W>(
            mapping,
            expected,
            format!("primary key column(s) not bound: {}", missing_key.join(", ")),
        ));
    }
    if assigned.is_empty() {
        return Err(shape_error::<W>(
            mapping,
            expected,
            "no updatable column is bound".to_string(),
        ));
    }

    let order: Vec<&str> = outputs.iter().map(|o| o.name).collect();
    let select = source.render_ordered(mappings, &mapping.table.to_string(), &order)?;

    let set = assigned
        .iter()
        .map(|(column, output)| {
            format!("{} = {}", quote_ident(column), alias_column(SOURCE_ALIAS, output))
        })
        .collect::<Vec<_>>()
        .join(", ");
    let join = key
        .iter()
        .map(|c| {
            let output = outputs
                .iter()
                .find(|o| o.target == c.name)
                .map_or(c.name.as_str(), |o| o.name);
            format!(
                "{} = {}",
                qualified_column(mapping, &c.name),
                alias_column(SOURCE_ALIAS, output)
            )
        })
        .collect::<Vec<_>>()
        .join(" AND ");

    let mut fragment = SqlFragment::raw(format!(
        "UPDATE {} SET {} FROM (",
        mapping.table.to_sql(),
        set
    ))?;
    fragment.append(select);
    fragment.push_sql(&format!(") AS {} WHERE {}", quote_ident(SOURCE_ALIAS), join));

    BulkOperationPlan::single(BulkMode::SelectAndUpdate, mapping, &fragment)
}

/// Empty a table and restart its keys.
///
/// Refused with a foreign-key error when another table of the context
/// references this one.
pub fn truncate<E: Entity>(mappings: &ContextTableMappings) -> Result<BulkOperationPlan> {
    let mapping = mappings.get::<E>()?;
    let referents = mapping.external_referents();
    if !referents.is_empty() {
        return Err(Error::ForeignKeyConstraint(ForeignKeyError {
            table: mapping.table.to_string(),
            referenced_by: referents.iter().map(|r| r.describe()).collect(),
        }));
    }
    Ok(truncate_plan(BulkMode::Truncate, mapping))
}

/// Empty a table and restart its keys, referenced or not.
///
/// Referencing rows keep their (now dangling) key values; with
/// `PRAGMA foreign_keys` on, SQLite itself may still refuse the delete.
pub fn truncate_with_foreign_keys<E: Entity>(
    mappings: &ContextTableMappings,
) -> Result<BulkOperationPlan> {
    let mapping = mappings.get::<E>()?;
    for referent in mapping.external_referents() {
        tracing::debug!(
            table = %mapping.table,
            referenced_by = %referent.describe(),
            on_delete = referent.on_delete.as_sql(),
            "Truncating past a foreign key"
        );
    }
    Ok(truncate_plan(BulkMode::TruncateWithForeignKeys, mapping))
}

/// `SELECT COUNT(*) FROM <table> [WHERE ...]`.
pub fn count<E: Entity>(
    mappings: &ContextTableMappings,
    predicate: Option<Predicate<E>>,
) -> Result<Statement> {
    let mut query = Query::<E>::new();
    if let Some(predicate) = predicate {
        query = query.filter(predicate);
    }
    let fragment = query.parts().render(mappings, SelectList::Count)?;
    Statement::from_fragment(&fragment)
}

fn truncate_plan(mode: BulkMode, mapping: &TableMapping) -> BulkOperationPlan {
    BulkOperationPlan {
        mode,
        table: mapping.table.clone(),
        steps: vec![
            PlanStep::Execute(Statement::plain(format!(
                "DELETE FROM {}",
                mapping.table.to_sql()
            ))),
            PlanStep::ResetIdentity(mapping.table.clone()),
        ],
    }
}

fn set_clause(mapping: &TableMapping, assignments: &[Assignment]) -> Result<SqlFragment> {
    if assignments.is_empty() {
        return Err(Error::translation(
            mapping.entity_name,
            "update has no assignments",
        ));
    }

    let scope = Scope::single(mapping);
    let mut translator = Translator::new(&scope)
        .with_prefix(ASSIGNMENT_PREFIX)
        .without_aggregates();
    let mut seen = HashSet::new();

    for (i, assignment) in assignments.iter().enumerate() {
        let node = format!("{}.{}", mapping.entity_name, assignment.field);
        let column = mapping
            .column_for_field(assignment.field)
            .ok_or_else(|| Error::translation(&node, "field has no mapped column"))?;
        if column.primary_key {
            return Err(Error::translation(&node, "primary key columns cannot be assigned"));
        }
        if !column.is_assignable() {
            return Err(Error::translation(
                &node,
                "identity and computed columns cannot be assigned",
            ));
        }
        if !seen.insert(column.name.as_str()) {
            return Err(Error::translation(&node, "column is assigned more than once"));
        }

        if i > 0 {
            translator.push_sql(", ");
        }
        translator.push_sql(&quote_ident(&column.name));
        translator.push_sql(" = ");
        translator.expr(&assignment.value)?;
    }

    Ok(translator.finish())
}

// `<key> IN (SELECT <table>.<key> FROM ...)`; composite keys compare as a
// row value.
fn key_in_subquery(
    mappings: &ContextTableMappings,
    mapping: &TableMapping,
    parts: &QueryParts,
) -> Result<SqlFragment> {
    if mapping.keyless {
        return Err(Error::config(format!(
            "query filters select rows by primary key; '{}' is keyless",
            mapping.entity_name
        )));
    }
    let key: Vec<String> = mapping
        .primary_key()
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect();
    let lhs = match key.as_slice() {
        [single] => single.clone(),
        _ => format!("({})", key.join(", ")),
    };

    let mut fragment = SqlFragment::raw(format!("{lhs} IN ("))?;
    fragment.append(parts.render(mappings, SelectList::RootKey)?);
    fragment.push_sql(")");
    Ok(fragment)
}

fn missing_predicate(mode: BulkMode, mapping: &TableMapping) -> Error {
    Error::MissingPredicate(MissingPredicateError {
        operation: mode.as_str(),
        table: mapping.table.to_string(),
    })
}

fn shape_error<W: Projection>(mapping: &TableMapping, expected: usize, message: String) -> Error {
    Error::ProjectionShape(ProjectionShapeError {
        projection: W::NAME,
        table: mapping.table.to_string(),
        expected,
        actual: W::outputs().len(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlbulk_core::{FieldInfo, ProjectionField, ReferentialAction, Row, SqlType};
    use sqlbulk_query::{Column, Expr};
    use sqlbulk_schema::{DbContext, MetadataFactory, ModelBuilder};

    struct Author;

    impl Author {
        const ID: Column<Author, i64> = Column::new("id");
        const NAME: Column<Author, String> = Column::new("name");
        const ACTIVE: Column<Author, bool> = Column::new("active");
        const SLUG: Column<Author, String> = Column::new("slug");
    }

    impl Entity for Author {
        const TABLE_NAME: &'static str = "authors";

        fn fields() -> &'static [FieldInfo] {
            static FIELDS: &[FieldInfo] = &[
                FieldInfo::new("id", "id", SqlType::BigInt)
                    .primary_key(true)
                    .identity(true),
                FieldInfo::new("name", "name", SqlType::Text),
                FieldInfo::new("active", "active", SqlType::Boolean),
                FieldInfo::new("slug", "slug", SqlType::Text).computed(true),
            ];
            FIELDS
        }

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            Vec::new()
        }

        fn from_row(_row: &Row) -> Result<Self> {
            Ok(Author)
        }
    }

    struct Book;

    impl Book {
        const AUTHOR_ID: Column<Book, i64> = Column::new("author_id");
        const SHELF: Column<Book, i64> = Column::new("shelf");
        const TITLE: Column<Book, String> = Column::new("title");
    }

    impl Entity for Book {
        const TABLE_NAME: &'static str = "books";

        fn fields() -> &'static [FieldInfo] {
            static FIELDS: &[FieldInfo] = &[
                FieldInfo::new("author_id", "author_id", SqlType::BigInt)
                    .primary_key(true)
                    .foreign_key("authors.id")
                    .on_delete(ReferentialAction::Cascade),
                FieldInfo::new("shelf", "shelf", SqlType::BigInt).primary_key(true),
                FieldInfo::new("title", "title", SqlType::Text),
            ];
            FIELDS
        }

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            Vec::new()
        }

        fn from_row(_row: &Row) -> Result<Self> {
            Ok(Book)
        }
    }

    struct AuthorCopy;

    impl AuthorCopy {
        const ACTIVE: Column<AuthorCopy, bool> = Column::new("active");
        const LABEL: Column<AuthorCopy, String> = Column::new("label");
    }

    impl Projection for AuthorCopy {
        const NAME: &'static str = "AuthorCopy";

        fn outputs() -> &'static [ProjectionField] {
            // Declared in the opposite order of the target columns.
            static OUTPUTS: &[ProjectionField] = &[
                ProjectionField::new("active", "active"),
                ProjectionField::new("label", "name"),
            ];
            OUTPUTS
        }
    }

    struct OnlyName;

    impl OnlyName {
        const NAME_OUT: Column<OnlyName, String> = Column::new("name");
    }

    impl Projection for OnlyName {
        const NAME: &'static str = "OnlyName";

        fn outputs() -> &'static [ProjectionField] {
            static OUTPUTS: &[ProjectionField] = &[ProjectionField::new("name", "name")];
            OUTPUTS
        }
    }

    struct Rename;

    impl Rename {
        const ID: Column<Rename, i64> = Column::new("id");
        const NAME_OUT: Column<Rename, String> = Column::new("new_name");
    }

    impl Projection for Rename {
        const NAME: &'static str = "Rename";

        fn outputs() -> &'static [ProjectionField] {
            static OUTPUTS: &[ProjectionField] = &[
                ProjectionField::new("id", "id"),
                ProjectionField::new("new_name", "name"),
            ];
            OUTPUTS
        }
    }

    struct Library;

    impl DbContext for Library {
        const NAME: &'static str = "library";

        fn configure(model: &mut ModelBuilder) {
            model.entity::<Author>().entity::<Book>();
        }
    }

    fn mappings() -> ContextTableMappings {
        MetadataFactory::build_mappings::<Library>().unwrap()
    }

    fn only_sql(plan: &BulkOperationPlan) -> &Statement {
        let statements: Vec<_> = plan.statements().collect();
        assert_eq!(statements.len(), 1);
        statements[0]
    }

    #[test]
    fn delete_with_predicate() {
        let plan = delete::<Author>(&mappings(), Author::ACTIVE.eq(false).into()).unwrap();
        let stmt = only_sql(&plan);
        assert_eq!(stmt.sql, "DELETE FROM \"authors\" WHERE \"active\" = ?1");
        assert_eq!(stmt.params, vec![Value::Bool(false)]);
        assert_eq!(plan.mode, BulkMode::Delete);
    }

    #[test]
    fn delete_refuses_unbounded_filters() {
        let err = delete::<Author>(&mappings(), Predicate::<Author>::all().into()).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingPredicate(ref e) if e.operation == "delete" && e.table == "authors"
        ));

        let err = delete::<Author>(&mappings(), Query::<Author>::new().into()).unwrap_err();
        assert!(matches!(err, Error::MissingPredicate(_)));
    }

    #[test]
    fn delete_with_query_selects_keys() {
        let query = Query::<Author>::new().filter(Author::NAME.starts_with("A"));
        let plan = delete::<Author>(&mappings(), query.into()).unwrap();
        assert_eq!(
            only_sql(&plan).sql,
            "DELETE FROM \"authors\" WHERE \"id\" IN (SELECT \"authors\".\"id\" FROM \"authors\" WHERE \"name\" LIKE ?1 ESCAPE '\\')"
        );
    }

    #[test]
    fn composite_key_delete_uses_row_value() {
        let query = Query::<Book>::new().filter(Book::TITLE.eq("x"));
        let plan = delete::<Book>(&mappings(), query.into()).unwrap();
        assert!(
            only_sql(&plan)
                .sql
                .starts_with("DELETE FROM \"books\" WHERE (\"author_id\", \"shelf\") IN (SELECT \"books\".\"author_id\", \"books\".\"shelf\"")
        );
    }

    #[test]
    fn update_orders_assignment_parameters_first() {
        let assignments = Assignments::new()
            .set(Author::NAME, "anon")
            .set_expr(Author::ACTIVE, Expr::lit(true));
        let plan = update::<Author>(&mappings(), Author::ID.gt(10).into(), &assignments).unwrap();
        let stmt = only_sql(&plan);
        assert_eq!(
            stmt.sql,
            "UPDATE \"authors\" SET \"name\" = ?1, \"active\" = ?2 WHERE \"id\" > ?3"
        );
        assert_eq!(
            stmt.params,
            vec![Value::Text("anon".into()), Value::Bool(true), Value::Int(10)]
        );
    }

    #[test]
    fn update_accepts_explicit_all() {
        let assignments = Assignments::new().set(Author::ACTIVE, true);
        let plan = update::<Author>(&mappings(), Predicate::<Author>::all().into(), &assignments).unwrap();
        assert_eq!(only_sql(&plan).sql, "UPDATE \"authors\" SET \"active\" = ?1");

        let err = update::<Author>(&mappings(), Query::<Author>::new().into(), &assignments)
            .unwrap_err();
        assert!(matches!(err, Error::MissingPredicate(ref e) if e.operation == "update"));
    }

    #[test]
    fn update_rejects_bad_assignments() {
        let m = mappings();
        let empty = Assignments::<Author>::new();
        assert!(matches!(
            update::<Author>(&m, Predicate::<Author>::all().into(), &empty),
            Err(Error::Translation(_))
        ));

        let key = Assignments::new().set(Author::ID, 5);
        assert!(matches!(
            update::<Author>(&m, Predicate::<Author>::all().into(), &key),
            Err(Error::Translation(_))
        ));

        let computed = Assignments::new().set(Author::SLUG, "x");
        assert!(matches!(
            update::<Author>(&m, Predicate::<Author>::all().into(), &computed),
            Err(Error::Translation(_))
        ));

        let foreign = Assignments::new().set_expr(Author::NAME, Book::TITLE.expr());
        match update::<Author>(&m, Predicate::<Author>::all().into(), &foreign) {
            Err(Error::Translation(e)) => assert!(e.message.contains("not in scope")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn select_and_insert_follows_target_order() {
        let source = Query::<Author>::new()
            .filter(Author::ACTIVE.is_true())
            .select::<AuthorCopy>()
            .bind(AuthorCopy::ACTIVE, Author::ACTIVE)
            .bind(AuthorCopy::LABEL, Author::NAME.upper());
        let plan = select_and_insert::<Author, AuthorCopy>(&mappings(), &source).unwrap();
        assert_eq!(
            only_sql(&plan).sql,
            "INSERT INTO \"authors\" (\"name\", \"active\") SELECT UPPER(\"name\") AS \"label\", \"active\" AS \"active\" FROM \"authors\" WHERE \"active\""
        );
    }

    #[test]
    fn select_and_insert_shape_mismatch() {
        let source = Query::<Author>::new()
            .select::<OnlyName>()
            .bind(OnlyName::NAME_OUT, Author::NAME);
        match select_and_insert::<Author, OnlyName>(&mappings(), &source) {
            Err(Error::ProjectionShape(e)) => {
                assert_eq!(e.expected, 2);
                assert_eq!(e.actual, 1);
                assert_eq!(e.projection, "OnlyName");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn select_and_insert_rejects_identity_target() {
        // Rename targets `id`, an identity column.
        let source = Query::<Author>::new()
            .select::<Rename>()
            .bind(Rename::ID, Author::ID)
            .bind(Rename::NAME_OUT, Author::NAME);
        match select_and_insert::<Author, Rename>(&mappings(), &source) {
            Err(Error::ProjectionShape(e)) => assert!(e.message.contains("identity")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn select_and_update_joins_on_key() {
        let source = Query::<Author>::new()
            .filter(Author::ACTIVE.is_true())
            .select::<Rename>()
            .bind(Rename::ID, Author::ID)
            .bind(Rename::NAME_OUT, Author::NAME.lower());
        let plan = select_and_update::<Author, Rename>(&mappings(), &source).unwrap();
        assert_eq!(
            only_sql(&plan).sql,
            "UPDATE \"authors\" SET \"name\" = \"src\".\"new_name\" FROM (SELECT \"id\" AS \"id\", LOWER(\"name\") AS \"new_name\" FROM \"authors\" WHERE \"active\") AS \"src\" WHERE \"authors\".\"id\" = \"src\".\"id\""
        );
    }

    #[test]
    fn select_and_update_needs_key_and_value() {
        let source = Query::<Author>::new()
            .select::<OnlyName>()
            .bind(OnlyName::NAME_OUT, Author::NAME);
        match select_and_update::<Author, OnlyName>(&mappings(), &source) {
            Err(Error::ProjectionShape(e)) => assert!(e.message.contains("primary key")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn truncate_checks_references() {
        let m = mappings();
        match truncate::<Author>(&m) {
            Err(Error::ForeignKeyConstraint(e)) => {
                assert_eq!(e.table, "authors");
                assert_eq!(e.referenced_by, vec!["books.author_id".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }

        let plan = truncate::<Book>(&m).unwrap();
        assert_eq!(
            plan.steps,
            vec![
                PlanStep::Execute(Statement::plain("DELETE FROM \"books\"".to_string())),
                PlanStep::ResetIdentity(TableName::new("books")),
            ]
        );

        let forced = truncate_with_foreign_keys::<Author>(&m).unwrap();
        assert_eq!(forced.mode, BulkMode::TruncateWithForeignKeys);
        assert_eq!(forced.steps.len(), 2);
    }

    #[test]
    fn count_statement() {
        let stmt = count::<Author>(&mappings(), Some(Author::ACTIVE.is_true())).unwrap();
        assert_eq!(stmt.sql, "SELECT COUNT(*) FROM \"authors\" WHERE \"active\"");
        let all = count::<Author>(&mappings(), None).unwrap();
        assert_eq!(all.sql, "SELECT COUNT(*) FROM \"authors\"");
    }

}
