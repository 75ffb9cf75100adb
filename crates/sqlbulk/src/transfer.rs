//! Staged bulk insert.
//!
//! Rows never become SQL text. They are laid out in a `StagingBuffer`,
//! loaded into a transient `TEMP` table through the driver's bulk path, and
//! merged into the target with one `INSERT ... SELECT`. The staging table is
//! dropped on every path out, success or failure.

use sqlbulk_core::error::BulkTransferError;
use sqlbulk_core::{
    BulkConnection, Cx, Entity, Error, Outcome, Result, StagingBuffer, TableName, Value, quote_ident,
};
use sqlbulk_schema::TableMapping;
use sqlbulk_session::OperationGuard;

/// Lay `entities` out column by column, in `mapping`'s insertable order.
///
/// Identity and computed columns are left out. An entity whose row lacks a
/// staged column fails the whole buffer.
pub fn build_buffer<E: Entity>(mapping: &TableMapping, entities: &[E]) -> Result<StagingBuffer> {
    let columns = mapping.insertable_columns();
    if columns.is_empty() {
        return Err(transfer_error(
            mapping,
            None,
            "table has no insertable columns",
            None,
        ));
    }

    let mut buffer = StagingBuffer::new(
        mapping.table.to_string(),
        columns
            .iter()
            .map(|c| (c.name.clone(), c.sql_type))
            .collect(),
    );
    buffer.reserve(entities.len());

    for (index, entity) in entities.iter().enumerate() {
        let mut row = entity.to_row();
        let mut values: Vec<Value> = Vec::with_capacity(columns.len());
        for column in &columns {
            let position = row
                .iter()
                .position(|(name, _)| *name == column.name)
                .ok_or_else(|| {
                    transfer_error(
                        mapping,
                        None,
                        format!("row {index} has no value for column '{}'", column.name),
                        None,
                    )
                })?;
            values.push(row.swap_remove(position).1);
        }
        buffer.push_row(values)?;
    }

    Ok(buffer)
}

/// Insert `entities` into `mapping`'s table through a staging table.
///
/// Identities are assigned in input order. Returns the number of rows
/// merged; an empty slice returns 0 without touching the database.
#[tracing::instrument(level = "debug", skip(cx, guard, mapping, entities), fields(table = %mapping.table, rows = entities.len()))]
pub async fn bulk_insert<C: BulkConnection, E: Entity>(
    cx: &Cx,
    guard: &OperationGuard<'_, C>,
    mapping: &TableMapping,
    entities: &[E],
) -> Outcome<u64, Error> {
    if entities.is_empty() {
        return Outcome::Ok(0);
    }

    let buffer = match build_buffer(mapping, entities) {
        Ok(buffer) => buffer,
        Err(e) => return Outcome::Err(e),
    };
    let conn = guard.connection();
    let columns: Vec<&str> = buffer.column_names().collect();

    let name = guard.session().next_staging_name(&mapping.table.name);
    let staging = match conn
        .create_staging_table(cx, &name, &mapping.table, &columns)
        .await
    {
        Outcome::Ok(table) => table,
        Outcome::Err(e) => {
            return Outcome::Err(wrap_failure(
                mapping,
                &TableName::qualified("temp", &name),
                "could not create staging table",
                e,
            ));
        }
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };
    tracing::debug!(staging = %staging, "Staging table created");

    match conn.copy_in(cx, &staging, &buffer).await {
        Outcome::Ok(loaded) => {
            tracing::trace!(staging = %staging, rows = loaded, "Staging table loaded");
        }
        Outcome::Err(e) => {
            discard(cx, conn, &staging).await;
            return Outcome::Err(wrap_failure(
                mapping,
                &staging,
                "bulk load into staging table failed",
                e,
            ));
        }
        Outcome::Cancelled(r) => {
            discard(cx, conn, &staging).await;
            return Outcome::Cancelled(r);
        }
        Outcome::Panicked(p) => {
            discard(cx, conn, &staging).await;
            return Outcome::Panicked(p);
        }
    }

    let merge = merge_sql(&mapping.table, &staging, &columns);
    tracing::trace!(sql = %merge, "Merging staging table");
    let merged = match conn.execute(cx, &merge, &[]).await {
        Outcome::Ok(n) => n,
        Outcome::Err(e) => {
            discard(cx, conn, &staging).await;
            return Outcome::Err(wrap_failure(
                mapping,
                &staging,
                "merge from staging table failed",
                e,
            ));
        }
        Outcome::Cancelled(r) => {
            discard(cx, conn, &staging).await;
            return Outcome::Cancelled(r);
        }
        Outcome::Panicked(p) => {
            discard(cx, conn, &staging).await;
            return Outcome::Panicked(p);
        }
    };

    match conn.drop_table(cx, &staging).await {
        Outcome::Ok(()) => {}
        Outcome::Err(e) => {
            return Outcome::Err(wrap_failure(
                mapping,
                &staging,
                "could not drop staging table",
                e,
            ));
        }
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    }

    tracing::debug!(rows = merged, "Bulk insert complete");
    Outcome::Ok(merged)
}

/// `INSERT INTO <target> (<cols>) SELECT <cols> FROM <staging> ORDER BY rowid`.
pub fn merge_sql(target: &TableName, staging: &TableName, columns: &[&str]) -> String {
    let cols = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({cols}) SELECT {cols} FROM {} ORDER BY rowid",
        target.to_sql(),
        staging.to_sql()
    )
}

// Best effort: the original failure is what the caller needs to see. The
// drop runs without a deadline so an expired operation still cleans up.
async fn discard<C: BulkConnection>(cx: &Cx, conn: &C, staging: &TableName) {
    conn.set_statement_timeout(None);
    if let Outcome::Err(e) = conn.drop_table(cx, staging).await {
        tracing::warn!(staging = %staging, error = %e, "Failed to drop staging table");
    }
}

// Timeouts stay `Error::Timeout` so callers can tell them apart.
fn wrap_failure(mapping: &TableMapping, staging: &TableName, message: &str, source: Error) -> Error {
    if source.is_timeout() {
        source
    } else {
        transfer_error(mapping, Some(staging), message, Some(source))
    }
}

fn transfer_error(
    mapping: &TableMapping,
    staging: Option<&TableName>,
    message: impl Into<String>,
    source: Option<Error>,
) -> Error {
    Error::BulkTransfer(BulkTransferError {
        table: mapping.table.to_string(),
        staging_table: staging.map(ToString::to_string),
        message: message.into(),
        source: source.map(Box::new),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlbulk_core::{FieldInfo, Row, SqlType};
    use sqlbulk_schema::{DbContext, MetadataFactory, ModelBuilder};

    struct Note {
        text: String,
        pinned: bool,
    }

    impl Entity for Note {
        const TABLE_NAME: &'static str = "notes";

        fn fields() -> &'static [FieldInfo] {
            static FIELDS: &[FieldInfo] = &[
                FieldInfo::new("id", "id", SqlType::BigInt)
                    .primary_key(true)
                    .identity(true),
                FieldInfo::new("text", "body", SqlType::Text),
                FieldInfo::new("pinned", "pinned", SqlType::Boolean),
            ];
            FIELDS
        }

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            // Out of mapping order on purpose.
            vec![
                ("pinned", Value::Bool(self.pinned)),
                ("id", Value::Null),
                ("body", Value::Text(self.text.clone())),
            ]
        }

        fn from_row(row: &Row) -> Result<Self> {
            Ok(Self {
                text: row.get_named("body")?,
                pinned: row.get_named("pinned")?,
            })
        }
    }

    struct Broken;

    impl Entity for Broken {
        const TABLE_NAME: &'static str = "broken";

        fn fields() -> &'static [FieldInfo] {
            static FIELDS: &[FieldInfo] = &[
                FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true),
                FieldInfo::new("label", "label", SqlType::Text),
            ];
            FIELDS
        }

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            vec![("id", Value::BigInt(1))]
        }

        fn from_row(_row: &Row) -> Result<Self> {
            Ok(Broken)
        }
    }

    struct Board;

    impl DbContext for Board {
        const NAME: &'static str = "board";

        fn configure(model: &mut ModelBuilder) {
            model.entity::<Note>().entity::<Broken>();
        }
    }

    #[test]
    fn buffer_skips_identity_and_follows_mapping_order() {
        let mappings = MetadataFactory::build_mappings::<Board>().unwrap();
        let mapping = mappings.get::<Note>().unwrap();
        let notes = [
            Note {
                text: "a".into(),
                pinned: true,
            },
            Note {
                text: "b".into(),
                pinned: false,
            },
        ];

        let buffer = build_buffer(mapping, &notes).unwrap();
        assert_eq!(buffer.column_names().collect::<Vec<_>>(), ["body", "pinned"]);
        assert_eq!(buffer.row_count(), 2);
        assert_eq!(
            buffer.row(1),
            Some(vec![&Value::Text("b".into()), &Value::Bool(false)])
        );
    }

    #[test]
    fn missing_column_fails_before_loading() {
        let mappings = MetadataFactory::build_mappings::<Board>().unwrap();
        let mapping = mappings.get::<Broken>().unwrap();
        match build_buffer(mapping, &[Broken]) {
            Err(Error::BulkTransfer(e)) => {
                assert_eq!(e.table, "broken");
                assert!(e.staging_table.is_none());
                assert!(e.message.contains("'label'"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn merge_preserves_input_order() {
        let sql = merge_sql(
            &TableName::new("notes"),
            &TableName::qualified("temp", "bulk_stage_notes_0"),
            &["body", "pinned"],
        );
        assert_eq!(
            sql,
            "INSERT INTO \"notes\" (\"body\", \"pinned\") SELECT \"body\", \"pinned\" FROM \"temp\".\"bulk_stage_notes_0\" ORDER BY rowid"
        );
    }

    #[test]
    fn failures_name_the_staging_table_but_keep_timeouts() {
        let mappings = MetadataFactory::build_mappings::<Board>().unwrap();
        let mapping = mappings.get::<Note>().unwrap();
        let staging = TableName::qualified("temp", "bulk_stage_notes_3");

        match wrap_failure(mapping, &staging, "could not drop staging table", Error::config("locked")) {
            Error::BulkTransfer(e) => {
                assert_eq!(e.staging_table.as_deref(), Some("temp.bulk_stage_notes_3"));
                assert_eq!(e.message, "could not drop staging table");
                assert!(e.source.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }

        let timeout = Error::Timeout(sqlbulk_core::error::TimeoutError {
            timeout: Some(std::time::Duration::from_millis(5)),
            sql: None,
        });
        assert!(wrap_failure(mapping, &staging, "merge from staging table failed", timeout).is_timeout());
    }
}
