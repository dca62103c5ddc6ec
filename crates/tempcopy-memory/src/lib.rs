//! In-memory storage driver for tempcopy.
//!
//! `tempcopy-memory` implements the `Connection` trait over an in-process
//! row store and adds bulk copy into new tables:
//!
//! - [`MemoryDatabase`] holds the permanent tables shared by all sessions
//! - [`MemoryConnection`] is one session with its own temp-table namespace
//! - [`Transaction`] groups writes and undoes them on rollback
//! - [`TempTable`] is a typed handle to a table created by a bulk copy
//!
//! # Example
//!
//! ```ignore
//! use tempcopy_core::{Connection, TransactionOps};
//! use tempcopy_memory::{BulkCopyOptions, MemoryDatabase};
//!
//! let db = MemoryDatabase::new();
//! let conn = db.connect();
//! let tx = conn.begin()?;
//! let people = tx.create_temp_table("People", rows, BulkCopyOptions::keeping_identity())?;
//! assert_eq!(people.count(), rows_len);
//! tx.commit()?;
//! ```

mod bulk;
pub mod config;
pub mod connection;
pub mod database;
mod store;
pub mod temp_table;
pub mod transaction;

pub use config::{BulkCopyOptions, ConnectionConfig, DEFAULT_MAX_BATCH_SIZE};
pub use connection::MemoryConnection;
pub use database::MemoryDatabase;
pub use temp_table::TempTable;
pub use transaction::Transaction;
