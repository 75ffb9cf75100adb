//! SQL identifier quoting and validation.
//!
//! Every table and column name the engine emits goes through `quote_ident`.
//! Names that come from entity metadata are additionally checked with
//! `is_valid_identifier` when mappings are built, so a bad name is a
//! configuration error instead of a surprise at execution time.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok());

/// Quote a SQL identifier using ANSI double-quoting.
///
/// Embedded double-quotes are escaped by doubling them (`"` → `""`).
/// This function is safe against SQL injection for any input string.
///
/// # Examples
///
/// ```
/// use sqlbulk_core::quote_ident;
///
/// assert_eq!(quote_ident("users"), "\"users\"");
/// assert_eq!(quote_ident("user\"name"), "\"user\"\"name\"");
/// ```
#[inline]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Check that a name is a plain identifier: ASCII letters, digits and
/// underscores, not starting with a digit.
pub fn is_valid_identifier(name: &str) -> bool {
    match IDENTIFIER.as_ref() {
        Some(re) => re.is_match(name),
        None => false,
    }
}

/// A table name with an optional schema qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    /// An unqualified table name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// A schema-qualified table name.
    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Render as a quoted SQL reference, e.g. `"main"."users"`.
    pub fn to_sql(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&self.name)),
            None => quote_ident(&self.name),
        }
    }

    /// Schema to use for catalog lookups (`main` when unqualified).
    pub fn schema_or_main(&self) -> &str {
        self.schema.as_deref().unwrap_or("main")
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_simple() {
        assert_eq!(quote_ident("users"), "\"users\"");
    }

    #[test]
    fn test_quote_ident_embedded_double_quote() {
        assert_eq!(quote_ident("a\"b\"c"), "\"a\"\"b\"\"c\"");
    }

    #[test]
    fn test_quote_ident_sql_injection_attempt() {
        let quoted = quote_ident("users\"; DROP TABLE secrets; --");
        assert_eq!(quoted, "\"users\"\"; DROP TABLE secrets; --\"");
    }

    #[test]
    fn test_valid_identifiers() {
        assert!(is_valid_identifier("users"));
        assert!(is_valid_identifier("_private"));
        assert!(is_valid_identifier("order_items2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("2fast"));
        assert!(!is_valid_identifier("first name"));
        assert!(!is_valid_identifier("users;--"));
        assert!(!is_valid_identifier("naïve"));
    }

    #[test]
    fn test_table_name_rendering() {
        assert_eq!(TableName::new("users").to_sql(), "\"users\"");
        assert_eq!(
            TableName::qualified("main", "users").to_sql(),
            "\"main\".\"users\""
        );
        assert_eq!(TableName::qualified("aux", "t").to_string(), "aux.t");
        assert_eq!(TableName::new("t").schema_or_main(), "main");
    }
}
