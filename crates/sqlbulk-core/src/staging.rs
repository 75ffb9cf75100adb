//! Columnar holding area for bulk loads.

use crate::error::{BulkTransferError, Error};
use crate::types::SqlType;
use crate::value::Value;

/// One staged column.
#[derive(Debug, Clone)]
pub struct StagedColumn {
    pub name: String,
    pub sql_type: SqlType,
    pub values: Vec<Value>,
}

/// Rows laid out column by column, in the order of the target mapping's
/// insertable columns.
///
/// Every row carries a value (possibly `Null`) for every column; a row of
/// the wrong width is rejected before anything reaches the database.
#[derive(Debug, Clone)]
pub struct StagingBuffer {
    table: String,
    columns: Vec<StagedColumn>,
    rows: usize,
}

impl StagingBuffer {
    /// Create an empty buffer for `table` with the given `(name, type)` columns.
    pub fn new(table: impl Into<String>, columns: Vec<(String, SqlType)>) -> Self {
        Self {
            table: table.into(),
            columns: columns
                .into_iter()
                .map(|(name, sql_type)| StagedColumn {
                    name,
                    sql_type,
                    values: Vec::new(),
                })
                .collect(),
            rows: 0,
        }
    }

    /// Reserve room for `additional` more rows in every column.
    pub fn reserve(&mut self, additional: usize) {
        for column in &mut self.columns {
            column.values.reserve(additional);
        }
    }

    /// Append one row; values must be in column order.
    #[allow(clippy::result_large_err)]
    pub fn push_row(&mut self, values: Vec<Value>) -> Result<(), Error> {
        if values.len() != self.columns.len() {
            return Err(Error::BulkTransfer(BulkTransferError {
                table: self.table.clone(),
                staging_table: None,
                message: format!(
                    "row {} has {} values, staging expects {}",
                    self.rows,
                    values.len(),
                    self.columns.len()
                ),
                source: None,
            }));
        }
        for (column, value) in self.columns.iter_mut().zip(values) {
            column.values.push(value);
        }
        self.rows += 1;
        Ok(())
    }

    /// Target table this buffer was built for.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Number of staged rows.
    pub const fn row_count(&self) -> usize {
        self.rows
    }

    /// True when no rows are staged.
    pub const fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Staged columns in load order.
    pub fn columns(&self) -> &[StagedColumn] {
        &self.columns
    }

    /// Column names in load order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Values of row `index` in column order, or `None` past the end.
    pub fn row(&self, index: usize) -> Option<Vec<&Value>> {
        if index >= self.rows {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[index]).collect())
    }
}
