//! Row identifiers.
//!
//! An [`Identifier`] is the opaque, comparable key of a row. Uniqueness is
//! enforced per table instance only: the same identifier may appear in a
//! permanent table and in any number of temporary tables at once.

use crate::error::{Error, TypeError};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of a row within one table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Identifier {
    /// Integer key (auto-increment tables)
    Int(i64),
    /// 128-bit key
    Uuid([u8; 16]),
    /// Free-form text key
    Text(String),
}

impl Identifier {
    /// Generate a random (version 4) UUID identifier.
    #[must_use]
    pub fn new_uuid() -> Self {
        let mut bytes: [u8; 16] = rand::random();
        bytes[6] = (bytes[6] & 0x0f) | 0x40;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;
        Identifier::Uuid(bytes)
    }

    /// Parse a hyphenated or plain 32-digit hex UUID.
    pub fn parse_uuid(text: &str) -> crate::Result<Self> {
        let hex: String = text.chars().filter(|c| *c != '-').collect();
        let invalid = || {
            Error::Type(TypeError {
                expected: "UUID string",
                actual: format!("'{text}'"),
                column: None,
                rust_type: Some("Identifier"),
            })
        };
        if hex.len() != 32 || !hex.is_ascii() {
            return Err(invalid());
        }
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Identifier::Uuid(bytes))
    }

    /// Read an identifier from a column value. NULL yields `None`.
    pub fn from_value(value: &Value) -> crate::Result<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::Int(v) => Ok(Some(Identifier::Int(i64::from(*v)))),
            Value::BigInt(v) => Ok(Some(Identifier::Int(*v))),
            Value::Uuid(v) => Ok(Some(Identifier::Uuid(*v))),
            Value::Bytes(b) if b.len() == 16 => {
                let mut arr = [0u8; 16];
                arr.copy_from_slice(b);
                Ok(Some(Identifier::Uuid(arr)))
            }
            Value::Text(s) => Ok(Some(Identifier::Text(s.clone()))),
            other => Err(Error::Type(TypeError {
                expected: "identifier (integer, UUID or text)",
                actual: other.type_name().to_string(),
                column: None,
                rust_type: Some("Identifier"),
            })),
        }
    }

    /// Column value for this identifier.
    pub fn to_value(&self) -> Value {
        match self {
            Identifier::Int(v) => Value::BigInt(*v),
            Identifier::Uuid(v) => Value::Uuid(*v),
            Identifier::Text(s) => Value::Text(s.clone()),
        }
    }

    /// Integer form, if this is an integer key.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Identifier::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// UUID bytes, if this is a UUID key.
    pub fn as_uuid(&self) -> Option<[u8; 16]> {
        match self {
            Identifier::Uuid(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Int(v) => write!(f, "{v}"),
            Identifier::Text(s) => write!(f, "'{s}'"),
            Identifier::Uuid(b) => {
                for (i, byte) in b.iter().enumerate() {
                    if matches!(i, 4 | 6 | 8 | 10) {
                        f.write_str("-")?;
                    }
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<i64> for Identifier {
    fn from(v: i64) -> Self {
        Identifier::Int(v)
    }
}

impl From<[u8; 16]> for Identifier {
    fn from(v: [u8; 16]) -> Self {
        Identifier::Uuid(v)
    }
}

impl From<String> for Identifier {
    fn from(v: String) -> Self {
        Identifier::Text(v)
    }
}

impl From<&str> for Identifier {
    fn from(v: &str) -> Self {
        Identifier::Text(v.to_string())
    }
}

impl From<Identifier> for Value {
    fn from(v: Identifier) -> Self {
        v.to_value()
    }
}

/// A struct field that can hold a row's identifier.
///
/// Implemented for the key types a model may declare (`Identifier`, `i64`,
/// `[u8; 16]`, `String`) and for `Option` of each, where `None` means the
/// row has not been assigned an identifier yet.
pub trait KeyField: Sized {
    /// The identifier this field currently holds.
    fn to_identifier(&self) -> Option<Identifier>;

    /// Build the field from an assigned identifier.
    fn from_identifier(id: Identifier) -> crate::Result<Self>;
}

fn key_mismatch(expected: &'static str, id: &Identifier) -> Error {
    Error::Type(TypeError {
        expected,
        actual: format!("identifier {id}"),
        column: None,
        rust_type: Some(expected),
    })
}

impl KeyField for Identifier {
    fn to_identifier(&self) -> Option<Identifier> {
        Some(self.clone())
    }

    fn from_identifier(id: Identifier) -> crate::Result<Self> {
        Ok(id)
    }
}

impl KeyField for i64 {
    fn to_identifier(&self) -> Option<Identifier> {
        Some(Identifier::Int(*self))
    }

    fn from_identifier(id: Identifier) -> crate::Result<Self> {
        id.as_i64().ok_or_else(|| key_mismatch("i64", &id))
    }
}

impl KeyField for [u8; 16] {
    fn to_identifier(&self) -> Option<Identifier> {
        Some(Identifier::Uuid(*self))
    }

    fn from_identifier(id: Identifier) -> crate::Result<Self> {
        id.as_uuid().ok_or_else(|| key_mismatch("[u8; 16]", &id))
    }
}

impl KeyField for String {
    fn to_identifier(&self) -> Option<Identifier> {
        Some(Identifier::Text(self.clone()))
    }

    fn from_identifier(id: Identifier) -> crate::Result<Self> {
        match id {
            Identifier::Text(s) => Ok(s),
            other => Err(key_mismatch("String", &other)),
        }
    }
}

impl<T: KeyField> KeyField for Option<T> {
    fn to_identifier(&self) -> Option<Identifier> {
        self.as_ref().and_then(KeyField::to_identifier)
    }

    fn from_identifier(id: Identifier) -> crate::Result<Self> {
        T::from_identifier(id).map(Some)
    }
}
