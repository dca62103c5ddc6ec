//! Error types for tempcopy operations.

use crate::identifier::Identifier;
use std::fmt;

/// The primary error type for all tempcopy operations.
#[derive(Debug)]
pub enum Error {
    /// Type conversion errors and row shape mismatches
    Type(TypeError),
    /// Transaction state errors
    Transaction(TransactionError),
    /// Table definition errors
    Schema(SchemaError),
    /// Configuration errors
    Config(ConfigError),
    /// Two rows share an identifier within one table
    DuplicateKey(DuplicateKeyError),
    /// A query expected a row and found none
    NotFound(String),
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
    pub rust_type: Option<&'static str>,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// An operation needs an open transaction and there is none
    NotActive,
    /// A transaction is already open on this connection
    AlreadyActive,
}

#[derive(Debug)]
pub struct SchemaError {
    pub kind: SchemaErrorKind,
    pub table: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// Table already exists
    TableExists,
    /// Table not found
    TableNotFound,
    /// The model's key column is not one of its fields
    KeyMissing,
    /// A row has no identifier and the table cannot generate one
    IdentifierRequired,
    /// The table's identifier counter has no values left
    IdentifierExhausted,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// Two rows of the same table carry the same identifier.
#[derive(Debug, Clone)]
pub struct DuplicateKeyError {
    /// Table the rows were written to
    pub table: String,
    /// The colliding identifier
    pub identifier: Identifier,
}

impl Error {
    /// Is this a duplicate-key error?
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Error::DuplicateKey(_))
    }

    /// Is this a transaction-state error?
    pub fn is_transaction_state(&self) -> bool {
        matches!(self, Error::Transaction(_))
    }

    /// Is this a not-found error?
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Kind of the schema error, if this is one.
    pub fn schema_kind(&self) -> Option<SchemaErrorKind> {
        match self {
            Error::Schema(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Kind of the transaction error, if this is one.
    pub fn transaction_kind(&self) -> Option<TransactionErrorKind> {
        match self {
            Error::Transaction(e) => Some(e.kind),
            _ => None,
        }
    }

    pub(crate) fn transaction(kind: TransactionErrorKind, message: impl Into<String>) -> Self {
        Error::Transaction(TransactionError {
            kind,
            message: message.into(),
        })
    }

    pub(crate) fn schema(
        kind: SchemaErrorKind,
        table: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Schema(SchemaError {
            kind,
            table: table.into(),
            message: message.into(),
        })
    }
}

impl TransactionError {
    /// No transaction is open on the connection.
    pub fn not_active(operation: &str) -> Error {
        Error::transaction(
            TransactionErrorKind::NotActive,
            format!("{operation} requires an open transaction"),
        )
    }

    /// A transaction is already open on the connection.
    pub fn already_active() -> Error {
        Error::transaction(
            TransactionErrorKind::AlreadyActive,
            "Already in a transaction",
        )
    }
}

impl SchemaError {
    /// The named table already exists.
    pub fn table_exists(table: &str) -> Error {
        Error::schema(
            SchemaErrorKind::TableExists,
            table,
            format!("table '{table}' already exists"),
        )
    }

    /// The named table does not exist.
    pub fn table_not_found(table: &str) -> Error {
        Error::schema(
            SchemaErrorKind::TableNotFound,
            table,
            format!("table '{table}' not found"),
        )
    }

    /// The key column is missing from the model's fields.
    pub fn key_missing(table: &str, key: &str) -> Error {
        Error::schema(
            SchemaErrorKind::KeyMissing,
            table,
            format!("key column '{key}' is not a field of table '{table}'"),
        )
    }

    /// A row without identifier was written to a table that cannot generate one.
    pub fn identifier_required(table: &str) -> Error {
        Error::schema(
            SchemaErrorKind::IdentifierRequired,
            table,
            format!("rows of table '{table}' must carry an identifier"),
        )
    }

    /// Every identifier the table could generate is already taken.
    pub fn identifier_exhausted(table: &str) -> Error {
        Error::schema(
            SchemaErrorKind::IdentifierExhausted,
            table,
            format!("table '{table}' has no identifiers left to generate"),
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Type(e) => {
                if let Some(col) = &e.column {
                    write!(
                        f,
                        "Type error in column '{}': expected {}, found {}",
                        col, e.expected, e.actual
                    )
                } else {
                    write!(f, "Type error: expected {}, found {}", e.expected, e.actual)
                }
            }
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Schema(e) => write!(f, "Schema error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::DuplicateKey(e) => write!(f, "Duplicate key: {}", e),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for DuplicateKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "identifier {} appears more than once in table '{}'",
            self.identifier, self.table
        )
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<DuplicateKeyError> for Error {
    fn from(err: DuplicateKeyError) -> Self {
        Error::DuplicateKey(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for tempcopy operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_key_display_names_table_and_identifier() {
        let err = Error::DuplicateKey(DuplicateKeyError {
            table: "PersonUpdate".to_string(),
            identifier: Identifier::Int(7),
        });

        assert!(err.is_duplicate_key());
        assert_eq!(
            err.to_string(),
            "Duplicate key: identifier 7 appears more than once in table 'PersonUpdate'"
        );
    }

    #[test]
    fn kind_accessors() {
        let not_active = TransactionError::not_active("create_temp_table");
        assert!(not_active.is_transaction_state());
        assert_eq!(
            not_active.transaction_kind(),
            Some(TransactionErrorKind::NotActive)
        );
        assert_eq!(not_active.schema_kind(), None);

        let exists = SchemaError::table_exists("people");
        assert_eq!(exists.schema_kind(), Some(SchemaErrorKind::TableExists));
        assert!(!exists.is_not_found());
        assert_eq!(
            exists.to_string(),
            "Schema error: table 'people' already exists"
        );
    }

    #[test]
    fn config_error_exposes_source() {
        use std::error::Error as _;

        let err = Error::Config(ConfigError {
            message: "bad".to_string(),
            source: Some(Box::new(std::fmt::Error)),
        });
        assert!(err.source().is_some());
        assert!(Error::Custom("x".to_string()).source().is_none());
    }
}
