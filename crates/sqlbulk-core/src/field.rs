//! Field and column definitions.

use crate::types::SqlType;

/// Referential action for foreign key constraints (ON DELETE).
///
/// Recorded on the referencing field so the bulk engine can tell whether a
/// full-table delete of the referenced table will cascade or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferentialAction {
    /// Raise an error if any references exist.
    #[default]
    NoAction,
    /// Same as NO ACTION, checked immediately.
    Restrict,
    /// Delete referencing rows.
    Cascade,
    /// Set referencing columns to NULL.
    SetNull,
    /// Set referencing columns to their default values.
    SetDefault,
}

impl ReferentialAction {
    /// Get the SQL representation of this action.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }

    /// Parse a referential action from a string (case-insensitive).
    ///
    /// Returns `None` if the string is not a recognized action.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NO ACTION" | "NOACTION" | "NO_ACTION" => Some(ReferentialAction::NoAction),
            "RESTRICT" => Some(ReferentialAction::Restrict),
            "CASCADE" => Some(ReferentialAction::Cascade),
            "SET NULL" | "SETNULL" | "SET_NULL" => Some(ReferentialAction::SetNull),
            "SET DEFAULT" | "SETDEFAULT" | "SET_DEFAULT" => Some(ReferentialAction::SetDefault),
            _ => None,
        }
    }

    /// Whether deleting a referenced row removes or rewrites its referents
    /// instead of failing.
    #[must_use]
    pub const fn propagates(&self) -> bool {
        matches!(
            self,
            ReferentialAction::Cascade | ReferentialAction::SetNull | ReferentialAction::SetDefault
        )
    }
}

/// Metadata about an entity field and the column it maps to.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Rust field name
    pub name: &'static str,
    /// Database column name (may differ from field name)
    pub column_name: &'static str,
    /// SQL type for this field
    pub sql_type: SqlType,
    /// Whether this field is nullable
    pub nullable: bool,
    /// Whether this is part of the primary key
    pub primary_key: bool,
    /// Value is generated by the database on insert (auto-increment)
    pub identity: bool,
    /// Value is computed by the database and never written
    pub computed: bool,
    /// Explicit column position; defaults to declaration order
    pub ordinal: Option<u16>,
    /// Foreign key reference (`table.column`)
    pub foreign_key: Option<&'static str>,
    /// Referential action for ON DELETE (only valid with foreign_key)
    pub on_delete: Option<ReferentialAction>,
}

impl FieldInfo {
    /// Create a new field info with minimal required data.
    pub const fn new(name: &'static str, column_name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            column_name,
            sql_type,
            nullable: false,
            primary_key: false,
            identity: false,
            computed: false,
            ordinal: None,
            foreign_key: None,
            on_delete: None,
        }
    }

    /// Set the database column name.
    pub const fn column(mut self, name: &'static str) -> Self {
        self.column_name = name;
        self
    }

    /// Set nullable flag.
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set primary key flag.
    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    /// Set identity (auto-increment) flag.
    pub const fn identity(mut self, value: bool) -> Self {
        self.identity = value;
        self
    }

    /// Set computed flag.
    pub const fn computed(mut self, value: bool) -> Self {
        self.computed = value;
        self
    }

    /// Set an explicit column ordinal.
    pub const fn ordinal(mut self, position: u16) -> Self {
        self.ordinal = Some(position);
        self
    }

    /// Set an optional column ordinal.
    pub const fn ordinal_opt(mut self, position: Option<u16>) -> Self {
        self.ordinal = position;
        self
    }

    /// Set foreign key reference.
    pub const fn foreign_key(mut self, reference: &'static str) -> Self {
        self.foreign_key = Some(reference);
        self
    }

    /// Set an optional foreign key reference.
    pub const fn foreign_key_opt(mut self, reference: Option<&'static str>) -> Self {
        self.foreign_key = reference;
        self
    }

    /// Set the ON DELETE action.
    pub const fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    /// Set an optional ON DELETE action.
    pub const fn on_delete_opt(mut self, action: Option<ReferentialAction>) -> Self {
        self.on_delete = action;
        self
    }

    /// A column the engine may write to in INSERT or UPDATE statements.
    #[must_use]
    pub const fn is_assignable(&self) -> bool {
        !self.identity && !self.computed
    }

    /// Split the foreign key reference into `(table, column)`.
    ///
    /// Returns `None` when there is no reference or it is not of the form
    /// `table.column`.
    #[must_use]
    pub fn foreign_key_parts(&self) -> Option<(&'static str, &'static str)> {
        let reference = self.foreign_key?;
        let (table, column) = reference.rsplit_once('.')?;
        if table.is_empty() || column.is_empty() {
            return None;
        }
        Some((table, column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_flags() {
        let field = FieldInfo::new("id", "id", SqlType::BigInt)
            .primary_key(true)
            .identity(true)
            .ordinal(0);
        assert!(field.primary_key);
        assert!(!field.is_assignable());
        assert_eq!(field.ordinal, Some(0));

        let name = FieldInfo::new("name", "full_name", SqlType::Text).nullable(true);
        assert!(name.is_assignable());
        assert_eq!(name.column_name, "full_name");
    }

    #[test]
    fn foreign_key_parts_split_on_last_dot() {
        let field =
            FieldInfo::new("customer_id", "customer_id", SqlType::BigInt).foreign_key("customers.id");
        assert_eq!(field.foreign_key_parts(), Some(("customers", "id")));

        let bad = FieldInfo::new("x", "x", SqlType::BigInt).foreign_key("customers");
        assert_eq!(bad.foreign_key_parts(), None);

        let dangling = FieldInfo::new("x", "x", SqlType::BigInt).foreign_key("customers.");
        assert_eq!(dangling.foreign_key_parts(), None);
    }

    #[test]
    fn referential_action_parse() {
        assert_eq!(
            ReferentialAction::parse("set null"),
            Some(ReferentialAction::SetNull)
        );
        assert_eq!(ReferentialAction::parse("bogus"), None);
        assert!(ReferentialAction::Cascade.propagates());
        assert!(!ReferentialAction::Restrict.propagates());
    }
}
