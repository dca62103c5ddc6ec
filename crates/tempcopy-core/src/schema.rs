//! Table schemas derived from models.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::{Error, SchemaError, TypeError};
use crate::identifier::Identifier;
use crate::model::Model;
use crate::naming::validate_table_name;
use crate::row::{ColumnInfo, Row};
use crate::types::SqlType;
use crate::value::Value;

/// Where a table lives and how long it lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TableKind {
    /// Shared by every connection of a database and kept until deleted.
    Permanent,
    /// Private to one connection and discarded with it.
    #[default]
    Temporary,
}

/// How a table produces identifiers for rows that arrive without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IdentityKind {
    /// Per-table counter starting at 1
    Int,
    /// Random version 4 UUID
    Uuid,
    /// Never generated; rows must carry their identifier
    #[default]
    Supplied,
}

/// A column of a table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
}

/// Column layout, key column and identity strategy of one table.
#[derive(Debug, Clone)]
pub struct TableSchema {
    name: String,
    columns: Vec<ColumnDef>,
    column_info: Arc<ColumnInfo>,
    key_index: usize,
    identity: IdentityKind,
}

impl TableSchema {
    /// Build the schema of `M`'s default table.
    pub fn of<M: Model>() -> Result<Self> {
        validate_table_name(M::TABLE_NAME)?;

        let columns: Vec<ColumnDef> = M::fields()
            .iter()
            .map(|field| ColumnDef {
                name: field.column_name.to_string(),
                sql_type: field.sql_type,
                nullable: field.nullable,
            })
            .collect();

        let key_index = columns
            .iter()
            .position(|c| c.name == M::PRIMARY_KEY)
            .ok_or_else(|| SchemaError::key_missing(M::TABLE_NAME, M::PRIMARY_KEY))?;

        let column_info = Arc::new(ColumnInfo::new(
            columns.iter().map(|c| c.name.clone()).collect(),
        ));

        Ok(Self {
            name: M::TABLE_NAME.to_string(),
            columns,
            column_info,
            key_index,
            identity: M::IDENTITY,
        })
    }

    /// The same layout under another table name.
    pub fn renamed(&self, name: &str) -> Result<Self> {
        validate_table_name(name)?;
        Ok(Self {
            name: name.to_string(),
            ..self.clone()
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Shared column metadata for rows of this table.
    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.column_info)
    }

    pub fn key_index(&self) -> usize {
        self.key_index
    }

    pub fn key_column(&self) -> &str {
        &self.columns[self.key_index].name
    }

    pub fn identity(&self) -> IdentityKind {
        self.identity
    }

    /// Lay out `(column, value)` pairs in schema column order and check them.
    pub fn row_from_pairs(&self, pairs: Vec<(&'static str, Value)>) -> Result<Row> {
        if pairs.len() != self.columns.len() {
            return Err(self.shape_error(format!("{} columns", pairs.len())));
        }

        let mut slots: Vec<Option<Value>> = vec![None; self.columns.len()];
        for (name, value) in pairs {
            let index = self
                .column_info
                .index_of(name)
                .ok_or_else(|| self.shape_error(format!("unknown column '{name}'")))?;
            slots[index] = Some(value);
        }

        let values = slots
            .into_iter()
            .zip(&self.columns)
            .map(|(slot, column)| {
                slot.ok_or_else(|| self.shape_error(format!("missing column '{}'", column.name)))
            })
            .collect::<Result<Vec<_>>>()?;

        let row = Row::with_columns(self.column_info(), values);
        self.check_row(&row)?;
        Ok(row)
    }

    /// Check a row's width, nullability and value types against the schema.
    ///
    /// The key column may be NULL: such rows have not been assigned an
    /// identifier yet.
    pub fn check_row(&self, row: &Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(self.shape_error(format!("{} columns", row.len())));
        }

        for (index, (column, value)) in self.columns.iter().zip(row.values()).enumerate() {
            if value.is_null() {
                if column.nullable || index == self.key_index {
                    continue;
                }
                return Err(Error::Type(TypeError {
                    expected: "non-NULL value",
                    actual: "NULL".to_string(),
                    column: Some(column.name.clone()),
                    rust_type: None,
                }));
            }
            if !column.sql_type.accepts(value) {
                return Err(Error::Type(TypeError {
                    expected: column.sql_type.sql_name(),
                    actual: value.type_name().to_string(),
                    column: Some(column.name.clone()),
                    rust_type: None,
                }));
            }
        }
        Ok(())
    }

    /// The identifier stored in a row's key column.
    pub fn key_of(&self, row: &Row) -> Result<Option<Identifier>> {
        match row.get(self.key_index) {
            Some(value) => Identifier::from_value(value),
            None => Err(self.shape_error(format!("{} columns", row.len()))),
        }
    }

    /// Write `id` into a row's key column.
    pub fn set_key(&self, row: &mut Row, id: &Identifier) {
        row.replace(self.key_index, id.to_value());
    }

    fn shape_error(&self, actual: String) -> Error {
        Error::Type(TypeError {
            expected: "row matching table layout",
            actual: format!("{actual} for table '{}'", self.name),
            column: None,
            rust_type: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldInfo;
    use crate::identifier::KeyField;
    use crate::row::FromValue;

    struct Person {
        id: Option<i64>,
        version: Vec<u8>,
        name: String,
    }

    impl Model for Person {
        const TABLE_NAME: &'static str = "Person";
        const PRIMARY_KEY: &'static str = "Id";
        const IDENTITY: IdentityKind = IdentityKind::Int;

        fn fields() -> &'static [FieldInfo] {
            static FIELDS: &[FieldInfo] = &[
                FieldInfo::new("id", "Id", SqlType::BigInt)
                    .nullable(true)
                    .primary_key(true),
                FieldInfo::new("version", "Version", SqlType::Blob),
                FieldInfo::new("name", "Name", SqlType::Text),
            ];
            FIELDS
        }

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            vec![
                ("Name", Value::from(self.name.clone())),
                ("Id", Value::from(self.id)),
                ("Version", Value::from(self.version.clone())),
            ]
        }

        fn from_row(row: &Row) -> Result<Self> {
            Ok(Self {
                id: row.get_named("Id")?,
                version: row.get_named("Version")?,
                name: row.get_named("Name")?,
            })
        }

        fn identifier(&self) -> Option<Identifier> {
            self.id.to_identifier()
        }

        fn set_identifier(&mut self, id: Identifier) -> Result<()> {
            self.id = KeyField::from_identifier(id)?;
            Ok(())
        }
    }

    fn jane() -> Person {
        Person {
            id: Some(1),
            version: vec![1, 0, 0, 0],
            name: "Jane Doe".into(),
        }
    }

    #[test]
    fn test_schema_of_model() {
        let schema = TableSchema::of::<Person>().unwrap();
        assert_eq!(schema.name(), "Person");
        assert_eq!(schema.key_index(), 0);
        assert_eq!(schema.key_column(), "Id");
        assert_eq!(schema.identity(), IdentityKind::Int);
        assert_eq!(schema.column_info().names(), ["Id", "Version", "Name"]);
    }

    #[test]
    fn test_row_from_pairs_reorders_into_column_order() {
        let schema = TableSchema::of::<Person>().unwrap();
        let row = schema.row_from_pairs(jane().to_row()).unwrap();
        assert_eq!(row.get(0), Some(&Value::BigInt(1)));
        assert_eq!(row.get(2), Some(&Value::Text("Jane Doe".into())));
        assert_eq!(schema.key_of(&row).unwrap(), Some(Identifier::Int(1)));
        assert!(Arc::ptr_eq(&row.column_info(), &schema.column_info()));

        let back = Person::from_row(&row).unwrap();
        assert_eq!(back.version, vec![1, 0, 0, 0]);
    }

    #[test]
    fn test_null_key_is_allowed_until_assigned() {
        let schema = TableSchema::of::<Person>().unwrap();
        let mut person = jane();
        person.id = None;

        let mut row = schema.row_from_pairs(person.to_row()).unwrap();
        assert_eq!(schema.key_of(&row).unwrap(), None);

        schema.set_key(&mut row, &Identifier::Int(5));
        assert_eq!(i64::from_value(row.get(0).unwrap()).unwrap(), 5);
    }

    #[test]
    fn test_check_row_rejects_bad_values() {
        let schema = TableSchema::of::<Person>().unwrap();
        let wrong_type = Row::new(
            vec!["Id".into(), "Version".into(), "Name".into()],
            vec![Value::BigInt(1), Value::Text("v".into()), Value::Text("n".into())],
        );
        assert!(matches!(schema.check_row(&wrong_type), Err(Error::Type(_))));

        let null_name = Row::new(
            vec!["Id".into(), "Version".into(), "Name".into()],
            vec![Value::BigInt(1), Value::Bytes(vec![]), Value::Null],
        );
        assert!(schema.check_row(&null_name).is_err());

        let narrow = Row::new(vec!["Id".into()], vec![Value::BigInt(1)]);
        assert!(schema.check_row(&narrow).is_err());
    }

    #[test]
    fn test_renamed_validates_name() {
        let schema = TableSchema::of::<Person>().unwrap();
        let renamed = schema.renamed("PersonUpdate").unwrap();
        assert_eq!(renamed.name(), "PersonUpdate");
        assert_eq!(renamed.key_index(), schema.key_index());
        assert!(matches!(schema.renamed("bad name"), Err(Error::Config(_))));
    }
}
