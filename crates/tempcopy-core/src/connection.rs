//! Storage connection traits.
//!
//! - [`Connection`]: row-level access to tables and transaction control
//! - [`TransactionOps`]: an open transaction scope
//!
//! Drivers implement both; the session layer is generic over them.

use crate::Result;
use crate::identifier::Identifier;
use crate::row::Row;
use crate::schema::TableSchema;

/// A connection to a row store.
///
/// All operations run to completion on the calling thread. Transactions must
/// be explicitly committed or rolled back.
///
/// # Example
///
/// ```rust,ignore
/// let id = conn.insert("Person", row)?;
///
/// let tx = conn.begin()?;
/// let loaded = tx.create_temp_table("PersonUpdate", people, BulkCopyOptions::default())?;
/// tx.commit()?;
/// ```
pub trait Connection: Send + Sync {
    /// The transaction type returned by this connection.
    type Tx<'conn>: TransactionOps
    where
        Self: 'conn;

    /// Ensure a table with this schema exists. Existing tables are kept as-is.
    fn create_table(&self, schema: &TableSchema) -> Result<()>;

    /// Insert a row, assigning an identifier if the key column is NULL.
    ///
    /// Returns the identifier the row was stored under.
    fn insert(&self, table: &str, row: Row) -> Result<Identifier>;

    /// Replace the row with the same identifier. Returns rows affected.
    fn update(&self, table: &str, row: Row) -> Result<u64>;

    /// Delete the row with this identifier. Returns rows affected.
    fn delete(&self, table: &str, id: &Identifier) -> Result<u64>;

    /// Look up one row by identifier.
    fn find(&self, table: &str, id: &Identifier) -> Result<Option<Row>>;

    /// All rows of a table in insertion order.
    fn scan(&self, table: &str) -> Result<Vec<Row>>;

    /// Begin a transaction.
    fn begin(&self) -> Result<Self::Tx<'_>>;

    /// Whether a transaction is currently open.
    fn in_transaction(&self) -> bool;

    /// Close the connection, discarding its session-scoped state.
    fn close(self) -> Result<()>;
}

/// Operations on an open transaction.
///
/// Dropping a transaction without calling either method rolls it back.
pub trait TransactionOps: Send {
    /// Commit the transaction.
    fn commit(self) -> Result<()>;

    /// Roll back the transaction.
    fn rollback(self) -> Result<()>;

    /// Whether the transaction is still open.
    fn is_active(&self) -> bool;
}
