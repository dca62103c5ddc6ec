//! Stored row representation.

use crate::Result;
use crate::error::{Error, TypeError};
use crate::identifier::Identifier;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Column layout shared by every row of one table.
///
/// Tables hand out a single `Arc<ColumnInfo>` so rows only carry their values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    names: Vec<String>,
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    /// Create column info from ordered column names.
    pub fn new(names: Vec<String>) -> Self {
        let name_to_index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            names,
            name_to_index,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of a column by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// One row of a table: ordered values plus the table's column layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// Create a row with its own column layout.
    ///
    /// Rows belonging to a table should use [`Row::with_columns`] instead.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        let columns = Arc::new(ColumnInfo::new(column_names));
        Self { values, columns }
    }

    /// Create a row sharing an existing column layout.
    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// Build a row from `(column, value)` pairs, as produced by
    /// [`Model::to_row`](crate::Model::to_row).
    pub fn from_pairs(pairs: Vec<(&'static str, Value)>) -> Self {
        let (names, values): (Vec<_>, Vec<_>) = pairs
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .unzip();
        Self::new(names, values)
    }

    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.columns)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    /// Overwrite the value at `index`, returning the previous one.
    ///
    /// Returns `None` and leaves the row untouched when `index` is out of
    /// bounds.
    pub fn replace(&mut self, index: usize, value: Value) -> Option<Value> {
        self.values
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, value))
    }

    /// Typed value by column index.
    pub fn get_as<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self.get(index).ok_or_else(|| {
            Error::Type(TypeError {
                expected: std::any::type_name::<T>(),
                actual: format!(
                    "index {} out of bounds (row has {} columns)",
                    index,
                    self.len()
                ),
                column: None,
                rust_type: None,
            })
        })?;
        T::from_value(value)
    }

    /// Typed value by column name. Conversion errors carry the column name.
    pub fn get_named<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.get_by_name(name).ok_or_else(|| {
            Error::Type(TypeError {
                expected: std::any::type_name::<T>(),
                actual: format!("column '{}' not found", name),
                column: Some(name.to_string()),
                rust_type: None,
            })
        })?;
        T::from_value(value).map_err(|e| match e {
            Error::Type(mut te) => {
                te.column = Some(name.to_string());
                Error::Type(te)
            }
            e => e,
        })
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names().iter().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// Consume the row, keeping only its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Iterate over `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Conversion from a stored [`Value`] into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch(expected: &'static str, value: &Value) -> Error {
    Error::Type(TypeError {
        expected,
        actual: value.type_name().to_string(),
        column: None,
        rust_type: None,
    })
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_bool().ok_or_else(|| mismatch("bool", value))
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(v) => Ok(*v),
            Value::Bool(v) => Ok(if *v { 1 } else { 0 }),
            Value::BigInt(v) => i32::try_from(*v).map_err(|_| {
                Error::Type(TypeError {
                    expected: "i32",
                    actual: format!("value {} out of range", v),
                    column: None,
                    rust_type: None,
                })
            }),
            _ => Err(mismatch("i32", value)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_i64().ok_or_else(|| mismatch("i64", value))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| mismatch("f64", value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch("String", value))
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            _ => Err(mismatch("Vec<u8>", value)),
        }
    }
}

impl FromValue for [u8; 16] {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_uuid()
            .ok_or_else(|| mismatch("UUID (16 bytes)", value))
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Json(v) => Ok(v.clone()),
            Value::Text(s) => serde_json::from_str(s).map_err(|e| {
                Error::Type(TypeError {
                    expected: "valid JSON",
                    actual: format!("invalid JSON: {}", e),
                    column: None,
                    rust_type: None,
                })
            }),
            _ => Err(mismatch("JSON", value)),
        }
    }
}

impl FromValue for Identifier {
    fn from_value(value: &Value) -> Result<Self> {
        Identifier::from_value(value)?.ok_or_else(|| mismatch("identifier", value))
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_row(id: i64, version: &[u8], name: &str) -> Row {
        Row::new(
            vec!["Id".to_string(), "Version".to_string(), "Name".to_string()],
            vec![
                Value::BigInt(id),
                Value::Bytes(version.to_vec()),
                Value::Text(name.to_string()),
            ],
        )
    }

    #[test]
    fn test_row_access_by_index_and_name() {
        let row = person_row(1, &[1, 0, 0, 0], "Jane Doe");

        assert_eq!(row.len(), 3);
        assert_eq!(row.get(0), Some(&Value::BigInt(1)));
        assert_eq!(row.get(3), None);
        assert_eq!(
            row.get_by_name("Name"),
            Some(&Value::Text("Jane Doe".to_string()))
        );
        assert_eq!(row.get_named::<i64>("Id").unwrap(), 1);
        assert_eq!(
            row.get_named::<Vec<u8>>("Version").unwrap(),
            vec![1, 0, 0, 0]
        );
        assert_eq!(row.get_as::<String>(2).unwrap(), "Jane Doe");
    }

    #[test]
    fn test_type_errors_carry_column_name() {
        let row = person_row(1, &[], "x");

        match row.get_named::<i64>("Name") {
            Err(Error::Type(te)) => assert_eq!(te.column.as_deref(), Some("Name")),
            other => panic!("expected type error, got {other:?}"),
        }
        assert!(row.get_named::<i64>("missing").is_err());
        assert!(row.get_as::<i64>(99).is_err());
    }

    #[test]
    fn test_null_maps_to_none() {
        let row = Row::new(vec!["Version".to_string()], vec![Value::Null]);
        assert_eq!(row.get_named::<Option<Vec<u8>>>("Version").unwrap(), None);
        assert!(row.get_named::<Vec<u8>>("Version").is_err());
    }

    #[test]
    fn test_replace_overwrites_single_slot() {
        let mut row = person_row(1, &[], "Jane Doe");
        let old = row.replace(0, Value::BigInt(9));
        assert_eq!(old, Some(Value::BigInt(1)));
        assert_eq!(row.get_named::<i64>("Id").unwrap(), 9);
        assert_eq!(row.replace(7, Value::Null), None);
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn test_from_pairs_keeps_order() {
        let row = Row::from_pairs(vec![("b", Value::Int(2)), ("a", Value::Int(1))]);
        let names: Vec<_> = row.column_names().collect();
        assert_eq!(names, vec!["b", "a"]);
        let pairs: Vec<_> = row.iter().collect();
        assert_eq!(pairs, vec![("b", &Value::Int(2)), ("a", &Value::Int(1))]);
        assert_eq!(row.into_values(), vec![Value::Int(2), Value::Int(1)]);
    }

    #[test]
    fn test_shared_columns() {
        let columns = Arc::new(ColumnInfo::new(vec!["Id".to_string()]));
        let a = Row::with_columns(Arc::clone(&columns), vec![Value::BigInt(1)]);
        let b = Row::with_columns(Arc::clone(&columns), vec![Value::BigInt(2)]);
        assert!(Arc::ptr_eq(&a.column_info(), &b.column_info()));
        assert_eq!(columns.index_of("Id"), Some(0));
        assert_eq!(columns.name_at(1), None);
    }

    #[test]
    fn test_identifier_and_uuid_conversions() {
        let raw = [3u8; 16];
        assert_eq!(<[u8; 16]>::from_value(&Value::Uuid(raw)).unwrap(), raw);
        assert_eq!(
            Identifier::from_value(&Value::BigInt(4)).unwrap(),
            Some(Identifier::Int(4))
        );
        assert_eq!(
            <Identifier as FromValue>::from_value(&Value::Uuid(raw)).unwrap(),
            Identifier::Uuid(raw)
        );
        assert!(<Identifier as FromValue>::from_value(&Value::Null).is_err());
        assert!(i32::from_value(&Value::BigInt(i64::MAX)).is_err());
    }
}
