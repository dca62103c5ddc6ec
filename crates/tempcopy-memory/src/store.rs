//! Table storage.
//!
//! A [`Table`] keeps rows in insertion order with an identifier index.
//! Identifier uniqueness is enforced per table only.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use tempcopy_core::{
    DuplicateKeyError, Error, Identifier, IdentityKind, Result, Row, SchemaError, TableSchema,
};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Every table instance gets a distinct generation, so a handle to a dropped
/// table never reads a later table created under the same name.
fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Tables by name.
pub(crate) type Catalog = HashMap<String, Table>;

#[derive(Debug)]
pub(crate) struct Table {
    schema: TableSchema,
    generation: u64,
    rows: Vec<Row>,
    index: HashMap<Identifier, usize>,
    /// Next integer to try; `None` once `i64::MAX` has been used.
    next_int: Option<i64>,
}

impl Table {
    pub(crate) fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            generation: next_generation(),
            rows: Vec::new(),
            index: HashMap::new(),
            next_int: Some(1),
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn name(&self) -> &str {
        self.schema.name()
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub(crate) fn get(&self, id: &Identifier) -> Option<&Row> {
        self.index.get(id).map(|&i| &self.rows[i])
    }

    /// Produce an identifier not used by this table nor listed in `reserved`.
    ///
    /// Fails for [`IdentityKind::Supplied`], and for [`IdentityKind::Int`]
    /// once the counter has passed `i64::MAX`.
    pub(crate) fn generate_id(
        &mut self,
        kind: IdentityKind,
        reserved: &HashSet<Identifier>,
    ) -> Result<Identifier> {
        match kind {
            IdentityKind::Int => loop {
                let Some(n) = self.next_int else {
                    return Err(SchemaError::identifier_exhausted(self.name()));
                };
                self.next_int = n.checked_add(1);
                let candidate = Identifier::Int(n);
                if !self.index.contains_key(&candidate) && !reserved.contains(&candidate) {
                    return Ok(candidate);
                }
            },
            IdentityKind::Uuid => loop {
                let candidate = Identifier::new_uuid();
                if !self.index.contains_key(&candidate) && !reserved.contains(&candidate) {
                    return Ok(candidate);
                }
            },
            IdentityKind::Supplied => Err(SchemaError::identifier_required(self.name())),
        }
    }

    /// Insert a row, generating its identifier from the schema's identity
    /// kind when the key column is NULL.
    pub(crate) fn insert(&mut self, mut row: Row) -> Result<Identifier> {
        self.schema.check_row(&row)?;
        let id = match self.schema.key_of(&row)? {
            Some(id) => id,
            None => {
                let id = self.generate_id(self.schema.identity(), &HashSet::new())?;
                self.schema.set_key(&mut row, &id);
                id
            }
        };
        self.push(id.clone(), row)?;
        Ok(id)
    }

    /// Append a row already carrying `id` in its key column.
    pub(crate) fn push(&mut self, id: Identifier, row: Row) -> Result<()> {
        if self.index.contains_key(&id) {
            return Err(Error::DuplicateKey(DuplicateKeyError {
                table: self.name().to_string(),
                identifier: id,
            }));
        }
        if let Identifier::Int(n) = id {
            if self.next_int.is_some_and(|next| n >= next) {
                self.next_int = n.checked_add(1);
            }
        }
        self.index.insert(id, self.rows.len());
        self.rows.push(row);
        Ok(())
    }

    /// Replace the row sharing `row`'s identifier, returning the old row.
    pub(crate) fn update(&mut self, row: Row) -> Result<Option<Row>> {
        self.schema.check_row(&row)?;
        let Some(id) = self.schema.key_of(&row)? else {
            return Err(SchemaError::identifier_required(self.schema.name()));
        };
        Ok(self
            .index
            .get(&id)
            .copied()
            .map(|i| std::mem::replace(&mut self.rows[i], row)))
    }

    /// Remove a row, returning its position and contents.
    pub(crate) fn remove(&mut self, id: &Identifier) -> Option<(usize, Row)> {
        let position = self.index.remove(id)?;
        let row = self.rows.remove(position);
        self.reindex_from(position);
        Some((position, row))
    }

    /// Put a removed row back at its former position.
    pub(crate) fn restore(&mut self, position: usize, id: Identifier, row: Row) {
        let position = position.min(self.rows.len());
        self.rows.insert(position, row);
        self.index.insert(id, position);
        self.reindex_from(position + 1);
    }

    fn reindex_from(&mut self, start: usize) {
        for (i, row) in self.rows.iter().enumerate().skip(start) {
            if let Ok(Some(id)) = self.schema.key_of(row) {
                self.index.insert(id, i);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempcopy_core::{FieldInfo, Model, SqlType, Value};
    use tempcopy_macros::Model;

    #[derive(Debug, Clone, Model)]
    #[tempcopy(table = "Person", identity = "int")]
    struct Person {
        #[tempcopy(primary_key, column = "Id")]
        id: Option<i64>,
        #[tempcopy(column = "Name")]
        name: String,
    }

    #[derive(Debug, Clone, Model)]
    #[tempcopy(table = "Tag")]
    struct Tag {
        id: String,
    }

    fn person_table() -> Table {
        Table::new(TableSchema::of::<Person>().unwrap())
    }

    fn row(schema: &TableSchema, id: Option<i64>, name: &str) -> Row {
        schema
            .row_from_pairs(
                Person {
                    id,
                    name: name.into(),
                }
                .to_row(),
            )
            .unwrap()
    }

    #[test]
    fn test_insert_assigns_int_identifiers() {
        let mut table = person_table();
        let schema = table.schema.clone();

        let a = table.insert(row(&schema, None, "John Doe")).unwrap();
        let b = table.insert(row(&schema, Some(10), "Jane Doe")).unwrap();
        let c = table.insert(row(&schema, None, "Max")).unwrap();

        assert_eq!(a, Identifier::Int(1));
        assert_eq!(b, Identifier::Int(10));
        assert_eq!(c, Identifier::Int(11));
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.get(&a).unwrap().get_named::<i64>("Id").unwrap(),
            1,
            "generated identifier is written into the key column"
        );
    }

    #[test]
    fn test_duplicate_identifier_is_rejected() {
        let mut table = person_table();
        let schema = table.schema.clone();
        table.insert(row(&schema, Some(1), "a")).unwrap();

        let err = table.insert(row(&schema, Some(1), "b")).unwrap_err();
        assert!(err.is_duplicate_key());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_supplied_identity_requires_identifier() {
        let mut table = Table::new(TableSchema::of::<Tag>().unwrap());
        let schema = table.schema.clone();
        let null_key = Row::with_columns(schema.column_info(), vec![Value::Null]);

        let err = table.insert(null_key).unwrap_err();
        assert_eq!(
            err.schema_kind(),
            Some(tempcopy_core::SchemaErrorKind::IdentifierRequired)
        );
        let err = table
            .generate_id(IdentityKind::Supplied, &HashSet::new())
            .unwrap_err();
        assert_eq!(
            err.schema_kind(),
            Some(tempcopy_core::SchemaErrorKind::IdentifierRequired)
        );
        assert_eq!(Tag::fields()[0], FieldInfo::new("id", "id", SqlType::Text).primary_key(true));
    }

    #[test]
    fn test_generate_id_skips_reserved() {
        let mut table = person_table();
        let reserved: HashSet<_> = [Identifier::Int(1), Identifier::Int(2)].into();
        assert_eq!(
            table.generate_id(IdentityKind::Int, &reserved).unwrap(),
            Identifier::Int(3)
        );
        let uuid = table.generate_id(IdentityKind::Uuid, &reserved).unwrap();
        assert!(uuid.as_uuid().is_some());
    }

    #[test]
    fn test_int_identifiers_run_out_after_max() {
        let mut table = person_table();
        let schema = table.schema.clone();
        table.insert(row(&schema, Some(i64::MAX), "a")).unwrap();

        let err = table.insert(row(&schema, None, "b")).unwrap_err();
        assert_eq!(
            err.schema_kind(),
            Some(tempcopy_core::SchemaErrorKind::IdentifierExhausted)
        );
        assert_eq!(table.len(), 1);

        // A lower supplied identifier does not revive the counter.
        table.insert(row(&schema, Some(5), "c")).unwrap();
        assert!(table.generate_id(IdentityKind::Int, &HashSet::new()).is_err());
    }

    #[test]
    fn test_generate_id_uses_max_when_free() {
        let mut table = person_table();
        table.next_int = Some(i64::MAX);
        assert_eq!(
            table.generate_id(IdentityKind::Int, &HashSet::new()).unwrap(),
            Identifier::Int(i64::MAX)
        );
        assert!(table.generate_id(IdentityKind::Int, &HashSet::new()).is_err());
    }

    #[test]
    fn test_update_remove_restore_keep_index_consistent() {
        let mut table = person_table();
        let schema = table.schema.clone();
        for name in ["a", "b", "c"] {
            table.insert(row(&schema, None, name)).unwrap();
        }

        let previous = table.update(row(&schema, Some(2), "B")).unwrap().unwrap();
        assert_eq!(previous.get_named::<String>("Name").unwrap(), "b");
        assert!(table.update(row(&schema, Some(9), "x")).unwrap().is_none());

        let (position, removed) = table.remove(&Identifier::Int(1)).unwrap();
        assert_eq!(position, 0);
        assert_eq!(
            table.get(&Identifier::Int(3)).unwrap().get_named::<String>("Name").unwrap(),
            "c"
        );

        table.restore(position, Identifier::Int(1), removed);
        let names: Vec<String> = table
            .rows()
            .iter()
            .map(|r| r.get_named("Name").unwrap())
            .collect();
        assert_eq!(names, ["a", "B", "c"]);
        assert!(table.get(&Identifier::Int(3)).is_some());
    }

    #[test]
    fn test_generations_are_distinct() {
        assert_ne!(person_table().generation(), person_table().generation());
    }
}
