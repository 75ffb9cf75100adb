//! Check built mappings against the live database catalog.

use crate::mapping::{ContextTableMappings, TableMapping};
use asupersync::{Cx, Outcome};
use sqlbulk_core::types::Affinity;
use sqlbulk_core::{Connection, Error, quote_ident};

/// One column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    pub name: String,
    pub declared_type: String,
    pub primary_key: bool,
}

/// Read the columns of `mapping`'s table from the catalog.
pub async fn catalog_columns<C: Connection>(
    cx: &Cx,
    conn: &C,
    mapping: &TableMapping,
) -> Outcome<Vec<CatalogColumn>, Error> {
    let sql = format!(
        "PRAGMA {}.table_info({})",
        quote_ident(mapping.table.schema_or_main()),
        quote_ident(&mapping.table.name)
    );
    let rows = match conn.query(cx, &sql, &[]).await {
        Outcome::Ok(rows) => rows,
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };

    let columns = rows
        .iter()
        .filter_map(|row| {
            let name = row.get_named::<String>("name").ok()?;
            let declared_type = row.get_named::<String>("type").ok().unwrap_or_default();
            let pk = row.get_named::<i64>("pk").ok().unwrap_or(0);
            Some(CatalogColumn {
                name,
                declared_type,
                primary_key: pk > 0,
            })
        })
        .collect();

    Outcome::Ok(columns)
}

/// Compare one mapping with its catalog columns, returning every mismatch.
pub fn diff_table(mapping: &TableMapping, catalog: &[CatalogColumn]) -> Vec<String> {
    if catalog.is_empty() {
        return vec![format!("table '{}' does not exist", mapping.table)];
    }

    let mut problems = Vec::new();
    for column in &mapping.columns {
        let Some(actual) = catalog.iter().find(|c| c.name.eq_ignore_ascii_case(&column.name))
        else {
            problems.push(format!(
                "column '{}.{}' does not exist",
                mapping.table, column.name
            ));
            continue;
        };
        if actual.primary_key != column.primary_key {
            problems.push(format!(
                "column '{}.{}' primary key flag differs (mapped {}, database {})",
                mapping.table, column.name, column.primary_key, actual.primary_key
            ));
        }
        let expected = column.sql_type.affinity();
        let found = Affinity::of_declared(&actual.declared_type);
        if !affinity_compatible(expected, found) {
            problems.push(format!(
                "column '{}.{}' declared as {} but mapped as {}",
                mapping.table,
                column.name,
                actual.declared_type,
                column.sql_type.sql_name()
            ));
        }
    }
    problems
}

// NUMERIC columns accept integers and reals without loss, so those pairings
// are fine in either direction.
fn affinity_compatible(expected: Affinity, found: Affinity) -> bool {
    expected == found
        || matches!(
            (expected, found),
            (Affinity::Numeric, Affinity::Integer | Affinity::Real)
                | (Affinity::Integer | Affinity::Real, Affinity::Numeric)
                | (_, Affinity::Blob)
        )
}

/// Verify every table of a context against the database.
///
/// All mismatches are collected into one configuration error.
#[tracing::instrument(level = "debug", skip(cx, conn, mappings), fields(context = mappings.context()))]
pub async fn verify_mappings<C: Connection>(
    cx: &Cx,
    conn: &C,
    mappings: &ContextTableMappings,
) -> Outcome<(), Error> {
    let mut problems = Vec::new();

    for mapping in mappings.iter() {
        let catalog = match catalog_columns(cx, conn, mapping).await {
            Outcome::Ok(columns) => columns,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        problems.extend(diff_table(mapping, &catalog));
    }

    if problems.is_empty() {
        tracing::debug!(tables = mappings.len(), "Mappings match the database");
        Outcome::Ok(())
    } else {
        Outcome::Err(Error::config(format!(
            "context '{}' does not match the database: {}",
            mappings.context(),
            problems.join("; ")
        )))
    }
}
