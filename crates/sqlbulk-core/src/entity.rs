//! Entity and projection traits for struct-to-table mapping.
//!
//! The `Entity` trait defines the contract for structs that map to a database
//! table. It is typically derived using `#[derive(Entity)]` from
//! `sqlbulk-macros`, which also generates one typed `Column` constant per
//! field.
//!
//! `Projection` describes the output shape of a select-and-insert or
//! select-and-update source query. Each output names the target column it
//! fills, so the order fields are declared in never matters.

use crate::Result;
use crate::field::FieldInfo;
use crate::row::Row;
use crate::value::Value;

/// Trait for types that map to a database table.
///
/// # Example
///
/// ```ignore
/// use sqlbulk_macros::Entity;
///
/// #[derive(Entity)]
/// #[bulk(table = "users")]
/// struct User {
///     #[bulk(primary_key, identity)]
///     id: Option<i64>,
///     name: String,
///     is_active: bool,
/// }
/// ```
pub trait Entity: Sized + Send + Sync + 'static {
    /// The name of the database table.
    const TABLE_NAME: &'static str;

    /// The schema the table lives in, if not the connection default.
    const SCHEMA: Option<&'static str> = None;

    /// Entities without a primary key must opt in explicitly.
    const KEYLESS: bool = false;

    /// Get field metadata for all columns, in declaration order.
    fn fields() -> &'static [FieldInfo];

    /// Convert this instance to `(column name, value)` pairs.
    fn to_row(&self) -> Vec<(&'static str, Value)>;

    /// Construct an instance from a database row.
    fn from_row(row: &Row) -> Result<Self>;

    /// Look up a field by its Rust name.
    fn field(name: &str) -> Option<&'static FieldInfo> {
        Self::fields().iter().find(|f| f.name == name)
    }
}

/// One output of a projection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionField {
    /// Rust field name on the projection type
    pub name: &'static str,
    /// Target column this output fills
    pub target: &'static str,
}

impl ProjectionField {
    /// Create an output whose target column differs from its name.
    pub const fn new(name: &'static str, target: &'static str) -> Self {
        Self { name, target }
    }
}

/// Output shape of a source query feeding a bulk insert or update.
pub trait Projection: Send + Sync + 'static {
    /// Type name, used in error messages.
    const NAME: &'static str;

    /// Declared outputs, in declaration order.
    fn outputs() -> &'static [ProjectionField];

    /// Look up an output by name.
    fn output(name: &str) -> Option<&'static ProjectionField> {
        Self::outputs().iter().find(|o| o.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SqlType;

    struct Tag {
        id: i64,
        label: String,
    }

    impl Entity for Tag {
        const TABLE_NAME: &'static str = "tags";

        fn fields() -> &'static [FieldInfo] {
            static FIELDS: &[FieldInfo] = &[
                FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true),
                FieldInfo::new("label", "tag_label", SqlType::Text),
            ];
            FIELDS
        }

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            vec![
                ("id", Value::BigInt(self.id)),
                ("tag_label", Value::Text(self.label.clone())),
            ]
        }

        fn from_row(row: &Row) -> Result<Self> {
            Ok(Self {
                id: row.get_named("id")?,
                label: row.get_named("tag_label")?,
            })
        }
    }

    struct TagCopy;

    impl Projection for TagCopy {
        const NAME: &'static str = "TagCopy";

        fn outputs() -> &'static [ProjectionField] {
            static OUTPUTS: &[ProjectionField] = &[
                ProjectionField::new("label", "tag_label"),
                ProjectionField::new("id", "id"),
            ];
            OUTPUTS
        }
    }

    #[test]
    fn defaults_and_lookup() {
        assert_eq!(Tag::SCHEMA, None);
        assert!(!Tag::KEYLESS);
        assert_eq!(Tag::field("label").map(|f| f.column_name), Some("tag_label"));
        assert!(Tag::field("missing").is_none());
    }

    #[test]
    fn row_round_trip() {
        let tag = Tag {
            id: 4,
            label: "red".to_string(),
        };
        let pairs = tag.to_row();
        let row = Row::new(
            pairs.iter().map(|(c, _)| (*c).to_string()).collect(),
            pairs.into_iter().map(|(_, v)| v).collect(),
        );
        let back = Tag::from_row(&row).unwrap();
        assert_eq!(back.id, 4);
        assert_eq!(back.label, "red");
    }

    #[test]
    fn projection_output_lookup() {
        assert_eq!(TagCopy::output("label").map(|o| o.target), Some("tag_label"));
        assert_eq!(TagCopy::outputs().len(), 2);
    }
}
