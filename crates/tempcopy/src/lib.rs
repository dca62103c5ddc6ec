//! tempcopy - bulk copy into temp tables with collision-safe identifiers.
//!
//! tempcopy loads model values into a new table in one step and reads them
//! back exactly as supplied. The loader never consults a session's tracked
//! entities, so a row whose identifier is also held by a tracked entity or
//! stored in a permanent table keeps every one of its own field values.
//!
//! - [`MemoryDatabase`] and [`MemoryConnection`] provide storage
//! - [`Transaction::create_temp_table`] performs the bulk copy
//! - [`TempTable`] reads the copied rows back as models
//! - [`Session`] tracks entities with an identity map and change tracker
//!
//! # Quick Start
//!
//! ```ignore
//! use tempcopy::prelude::*;
//!
//! #[derive(Model, Debug, Clone)]
//! #[tempcopy(table = "Person", identity = "int")]
//! struct Person {
//!     #[tempcopy(primary_key, column = "Id")]
//!     id: Option<i64>,
//!     #[tempcopy(column = "Name")]
//!     name: String,
//! }
//!
//! let session = Session::new(MemoryDatabase::new().connect());
//! session.add(Person { id: None, name: "John Doe".into() });
//! session.save_changes()?;
//!
//! let tx = session.connection().begin()?;
//! let temp = tx.create_temp_table(
//!     "People",
//!     [Person { id: Some(1), name: "Jane Doe".into() }],
//!     BulkCopyOptions::keeping_identity(),
//! )?;
//! assert_eq!(temp.first()?.map(|p| p.name), Some("Jane Doe".into()));
//! tx.commit()?;
//! ```
//!
//! Code using `#[derive(Model)]` must also depend on `tempcopy-core`, which
//! the generated implementation refers to.

pub use tempcopy_core::{
    ColumnDef, ColumnInfo, Connection, DuplicateKeyError, Error, FieldInfo, FromValue,
    Identifier, IdentityKind, KeyField, Model, Result, Row, SchemaError, SchemaErrorKind, SqlType,
    TableKind, TableSchema, TransactionError, TransactionErrorKind, TransactionOps, TypeInfo,
    Value,
};
pub use tempcopy_macros::Model;
pub use tempcopy_memory::{
    BulkCopyOptions, ConnectionConfig, DEFAULT_MAX_BATCH_SIZE, MemoryConnection, MemoryDatabase,
    TempTable, Transaction,
};
pub use tempcopy_session::{EntityState, ModelRef, Session, SessionConfig};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tempcopy::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        BulkCopyOptions, Connection, ConnectionConfig, EntityState, Error, Identifier,
        MemoryConnection, MemoryDatabase, Model, ModelRef, Result, Row, Session, SessionConfig,
        TableKind, TempTable, Transaction, TransactionOps, Value,
    };
}
