//! Field and column definitions.

use crate::types::SqlType;

/// Metadata about a model field/column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Rust field name
    pub name: &'static str,
    /// Stored column name (may differ from field name)
    pub column_name: &'static str,
    pub sql_type: SqlType,
    pub nullable: bool,
    /// Whether this column holds the row identifier
    pub primary_key: bool,
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
        }
    }

    /// Set the stored column name.
    pub const fn column(mut self, name: &'static str) -> Self {
        self.column_name = name;
        self
    }

    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }
}
