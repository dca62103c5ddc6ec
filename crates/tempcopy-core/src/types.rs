//! Column type definitions and Rust type mapping.

use crate::identifier::Identifier;
use crate::value::Value;

/// Column types supported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    BigInt,
    Double,
    Boolean,
    Text,
    Blob,
    Uuid,
    Json,
    /// Opaque type; any non-NULL value is accepted
    Custom(&'static str),
}

impl SqlType {
    /// The type's name as shown in error messages.
    pub const fn sql_name(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Double => "DOUBLE PRECISION",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Text => "TEXT",
            SqlType::Blob => "BLOB",
            SqlType::Uuid => "UUID",
            SqlType::Json => "JSON",
            SqlType::Custom(name) => name,
        }
    }

    pub const fn is_numeric(&self) -> bool {
        matches!(self, SqlType::Integer | SqlType::BigInt | SqlType::Double)
    }

    /// Whether a non-NULL value may be stored in a column of this type.
    ///
    /// NULL is decided by the column's nullability, not by its type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (SqlType::Integer | SqlType::BigInt, Value::Int(_) | Value::BigInt(_)) => true,
            (SqlType::Double, Value::Double(_) | Value::Int(_) | Value::BigInt(_)) => true,
            (SqlType::Boolean, Value::Bool(_)) => true,
            (SqlType::Text, Value::Text(_)) => true,
            (SqlType::Blob, Value::Bytes(_)) => true,
            (SqlType::Uuid, Value::Uuid(_)) => true,
            (SqlType::Uuid, Value::Bytes(b)) => b.len() == 16,
            (SqlType::Json, Value::Json(_) | Value::Text(_)) => true,
            (SqlType::Custom(_), _) => true,
            _ => false,
        }
    }
}

/// Rust types with a corresponding column type.
///
/// The derive macro reads `SQL_TYPE` and `NULLABLE` from the field's type.
pub trait TypeInfo {
    const SQL_TYPE: SqlType;

    const NULLABLE: bool = false;
}

impl TypeInfo for i32 {
    const SQL_TYPE: SqlType = SqlType::Integer;
}

impl TypeInfo for i64 {
    const SQL_TYPE: SqlType = SqlType::BigInt;
}

impl TypeInfo for f64 {
    const SQL_TYPE: SqlType = SqlType::Double;
}

impl TypeInfo for bool {
    const SQL_TYPE: SqlType = SqlType::Boolean;
}

impl TypeInfo for String {
    const SQL_TYPE: SqlType = SqlType::Text;
}

impl TypeInfo for Vec<u8> {
    const SQL_TYPE: SqlType = SqlType::Blob;
}

impl TypeInfo for [u8; 16] {
    const SQL_TYPE: SqlType = SqlType::Uuid;
}

impl TypeInfo for serde_json::Value {
    const SQL_TYPE: SqlType = SqlType::Json;
}

impl TypeInfo for Identifier {
    const SQL_TYPE: SqlType = SqlType::Custom("IDENTIFIER");
}

impl<T: TypeInfo> TypeInfo for Option<T> {
    const SQL_TYPE: SqlType = T::SQL_TYPE;
    const NULLABLE: bool = true;
}
