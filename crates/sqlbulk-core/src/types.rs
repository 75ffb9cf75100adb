//! SQL type definitions and mapping.

use serde::{Deserialize, Serialize};

/// Declared SQL types of mapped columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlType {
    // Integer types
    TinyInt,
    SmallInt,
    Integer,
    BigInt,

    // Floating point
    Real,
    Double,

    // Fixed precision
    Numeric { precision: u8, scale: u8 },

    // Boolean
    Boolean,

    // String types
    VarChar(u32),
    Text,

    // Binary types
    Blob,

    // Date/time types stored as ISO-8601 text
    Date,
    DateTime,
    Timestamp,

    // JSON stored as text
    Json,
}

/// SQLite column affinity, as derived from a declared type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Real,
    Numeric,
    Text,
    Blob,
}

impl SqlType {
    /// Get the SQL type name for this type.
    pub fn sql_name(&self) -> String {
        match self {
            SqlType::TinyInt => "TINYINT".to_string(),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Real => "REAL".to_string(),
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Numeric { precision, scale } => format!("NUMERIC({}, {})", precision, scale),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::VarChar(len) => format!("VARCHAR({})", len),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::DateTime => "DATETIME".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::Json => "JSON".to_string(),
        }
    }

    /// The SQLite affinity this declared type resolves to.
    pub fn affinity(&self) -> Affinity {
        Affinity::of_declared(&self.sql_name())
    }
}

impl Affinity {
    /// Apply SQLite's affinity rules (section 3.1 of the datatype docs) to a
    /// declared type name.
    pub fn of_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            Affinity::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Affinity::Text
        } else if upper.contains("BLOB") || upper.trim().is_empty() {
            Affinity::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Affinity::Real
        } else {
            Affinity::Numeric
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affinity_rules() {
        assert_eq!(SqlType::BigInt.affinity(), Affinity::Integer);
        assert_eq!(SqlType::VarChar(20).affinity(), Affinity::Text);
        assert_eq!(SqlType::Double.affinity(), Affinity::Real);
        assert_eq!(SqlType::Boolean.affinity(), Affinity::Numeric);
        assert_eq!(SqlType::Blob.affinity(), Affinity::Blob);
        assert_eq!(Affinity::of_declared(""), Affinity::Blob);
        assert_eq!(Affinity::of_declared("json"), Affinity::Numeric);
    }
}
