//! Connection and bulk copy configuration.

use serde::{Deserialize, Serialize};
use tempcopy_core::TableKind;

/// Default number of rows staged per batch during a bulk copy.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

/// Configuration for a [`MemoryConnection`](crate::MemoryConnection).
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Name shown in log events
    pub name: Option<String>,
    /// Whether temp tables may only be created inside an open transaction.
    pub require_transaction: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            name: None,
            require_transaction: true,
        }
    }
}

impl ConnectionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set whether temp-table creation requires an open transaction.
    #[must_use]
    pub fn require_transaction(mut self, value: bool) -> Self {
        self.require_transaction = value;
        self
    }
}

/// Options for a bulk copy into a new table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkCopyOptions {
    /// Store supplied identifiers verbatim instead of generating new ones.
    pub keep_identity: bool,
    /// Rows staged per batch. Zero is treated as one.
    pub max_batch_size: usize,
    /// Where the new table is registered.
    pub table_kind: TableKind,
}

impl Default for BulkCopyOptions {
    fn default() -> Self {
        Self {
            keep_identity: false,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            table_kind: TableKind::Temporary,
        }
    }
}

impl BulkCopyOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that keep supplied identifiers.
    #[must_use]
    pub fn keeping_identity() -> Self {
        Self::default().keep_identity(true)
    }

    #[must_use]
    pub fn keep_identity(mut self, value: bool) -> Self {
        self.keep_identity = value;
        self
    }

    #[must_use]
    pub fn max_batch_size(mut self, rows: usize) -> Self {
        self.max_batch_size = rows;
        self
    }

    #[must_use]
    pub fn table_kind(mut self, kind: TableKind) -> Self {
        self.table_kind = kind;
        self
    }

    pub(crate) fn batch_size(&self) -> usize {
        self.max_batch_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_defaults_and_builder() {
        let config = ConnectionConfig::default();
        assert!(config.require_transaction);
        assert!(config.name.is_none());

        let config = ConnectionConfig::new()
            .name("worker")
            .require_transaction(false);
        assert_eq!(config.name.as_deref(), Some("worker"));
        assert!(!config.require_transaction);
    }

    #[test]
    fn test_bulk_copy_options_defaults() {
        let options = BulkCopyOptions::default();
        assert!(!options.keep_identity);
        assert_eq!(options.max_batch_size, DEFAULT_MAX_BATCH_SIZE);
        assert_eq!(options.table_kind, TableKind::Temporary);

        assert!(BulkCopyOptions::keeping_identity().keep_identity);
        assert_eq!(BulkCopyOptions::new().max_batch_size(0).batch_size(), 1);
    }

    #[test]
    fn test_bulk_copy_options_deserialize_with_defaults() {
        let options: BulkCopyOptions =
            serde_json::from_str(r#"{"keep_identity": true}"#).unwrap();
        assert!(options.keep_identity);
        assert_eq!(options.max_batch_size, DEFAULT_MAX_BATCH_SIZE);

        let json =
            serde_json::to_string(&options.clone().table_kind(TableKind::Permanent)).unwrap();
        let back: BulkCopyOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back.table_kind, TableKind::Permanent);
    }
}
