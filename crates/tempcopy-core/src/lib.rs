//! Core types and traits for tempcopy.
//!
//! This crate provides the foundational abstractions shared by the store,
//! the bulk loader and the session layer:
//!
//! - `Value` and `Row` for dynamically typed row data
//! - `Identifier` for row keys that are comparable across tables
//! - `Model` trait for struct-to-row mapping
//! - `TableSchema` describing a table's columns and key
//! - `Connection` trait implemented by storage drivers

pub mod connection;
pub mod error;
pub mod field;
pub mod identifier;
pub mod model;
pub mod naming;
pub mod row;
pub mod schema;
pub mod types;
pub mod value;

pub use connection::{Connection, TransactionOps};
pub use error::{
    ConfigError, DuplicateKeyError, Error, Result, SchemaError, SchemaErrorKind, TransactionError,
    TransactionErrorKind, TypeError,
};
pub use field::FieldInfo;
pub use identifier::{Identifier, KeyField};
pub use model::Model;
pub use naming::{is_valid_table_name, validate_table_name};
pub use row::{ColumnInfo, FromValue, Row};
pub use schema::{ColumnDef, IdentityKind, TableKind, TableSchema};
pub use types::{SqlType, TypeInfo};
pub use value::Value;
