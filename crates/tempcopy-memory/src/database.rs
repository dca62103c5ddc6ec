//! The shared in-memory database.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::ConnectionConfig;
use crate::connection::MemoryConnection;
use crate::store::Catalog;

#[derive(Debug, Default)]
struct DatabaseInner {
    catalog: Mutex<Catalog>,
    next_connection: AtomicU64,
}

/// An in-memory database holding the permanent tables.
///
/// Cloning is cheap: clones share the same tables. Every
/// [`connect`](Self::connect) opens an independent session with its own
/// temp-table namespace.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<DatabaseInner>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session with default configuration.
    pub fn connect(&self) -> MemoryConnection {
        self.connect_with(ConnectionConfig::default())
    }

    /// Open a session with the given configuration.
    pub fn connect_with(&self, config: ConnectionConfig) -> MemoryConnection {
        let id = self.inner.next_connection.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(connection = id, name = ?config.name, "Opening connection");
        MemoryConnection::new(self.clone(), id, config)
    }

    /// Names of all permanent tables, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.with_catalog(|catalog| catalog.keys().cloned().collect());
        names.sort();
        names
    }

    /// Whether a permanent table with this name exists.
    pub fn has_table(&self, name: &str) -> bool {
        self.with_catalog(|catalog| catalog.contains_key(name))
    }

    /// Run `f` with the catalog locked.
    pub(crate) fn with_catalog<R>(&self, f: impl FnOnce(&mut Catalog) -> R) -> R {
        let mut catalog = self
            .inner
            .catalog
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut catalog)
    }
}
