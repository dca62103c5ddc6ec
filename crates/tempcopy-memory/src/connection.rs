//! Per-session connection to a [`MemoryDatabase`].
//!
//! A connection owns the session state: its private temp-table namespace,
//! the transaction flag and the undo log of the open transaction. Permanent
//! tables live in the shared database.

use std::sync::{Mutex, PoisonError};

use tempcopy_core::{
    Connection, Identifier, Model, Result, Row, SchemaError, TableKind, TableSchema,
    TransactionError,
};

use crate::bulk;
use crate::config::{BulkCopyOptions, ConnectionConfig};
use crate::database::MemoryDatabase;
use crate::store::{Catalog, Table};
use crate::temp_table::TempTable;
use crate::transaction::Transaction;

/// Work done inside the open transaction, replayed backwards on rollback.
#[derive(Debug)]
enum Undo {
    Inserted {
        table: String,
        id: Identifier,
    },
    Updated {
        table: String,
        previous: Row,
    },
    Deleted {
        table: String,
        position: usize,
        id: Identifier,
        row: Row,
    },
    CreatedTable {
        table: String,
        generation: u64,
        kind: TableKind,
    },
}

#[derive(Debug, Default)]
struct SessionState {
    in_transaction: bool,
    temp: Catalog,
    undo: Vec<Undo>,
}

/// A session on a [`MemoryDatabase`].
///
/// Temp tables created through a connection are visible only to it, even
/// when another connection uses the same table name or identifiers. They
/// are dropped when the connection is closed or dropped.
#[derive(Debug)]
pub struct MemoryConnection {
    db: MemoryDatabase,
    id: u64,
    config: ConnectionConfig,
    state: Mutex<SessionState>,
}

impl MemoryConnection {
    pub(crate) fn new(db: MemoryDatabase, id: u64, config: ConnectionConfig) -> Self {
        Self {
            db,
            id,
            config,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Connection number, unique within its database.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// The database this connection belongs to.
    pub fn database(&self) -> &MemoryDatabase {
        &self.db
    }

    /// Names of this connection's live temp tables, sorted.
    pub fn temp_table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.with_temp(|temp| temp.keys().cloned().collect());
        names.sort();
        names
    }

    pub fn has_temp_table(&self, name: &str) -> bool {
        self.with_temp(|temp| temp.contains_key(name))
    }

    /// Bulk copy `rows` into a new table outside an explicit transaction.
    ///
    /// Fails with a `NotActive` transaction error unless a transaction is
    /// open or [`ConnectionConfig::require_transaction`] is off. See
    /// [`Transaction::create_temp_table`] for the copy semantics.
    pub fn create_temp_table<M, I>(
        &self,
        name: &str,
        rows: I,
        options: BulkCopyOptions,
    ) -> Result<TempTable<'_, M>>
    where
        M: Model,
        I: IntoIterator<Item = M>,
    {
        if self.config.require_transaction && !self.in_transaction() {
            return Err(TransactionError::not_active("create_temp_table"));
        }
        bulk::copy_into_new_table(self, name, rows, &options)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn with_temp<R>(&self, f: impl FnOnce(&mut Catalog) -> R) -> R {
        f(&mut self.lock_state().temp)
    }

    fn record(&self, undo: Undo) {
        let mut state = self.lock_state();
        if state.in_transaction {
            state.undo.push(undo);
        }
    }

    /// Register a fully staged table, failing if the name is taken.
    pub(crate) fn register_table(&self, table: Table, kind: TableKind) -> Result<()> {
        let name = table.name().to_string();
        let generation = table.generation();

        match kind {
            TableKind::Temporary => self.with_temp(|temp| {
                if temp.contains_key(&name) {
                    return Err(SchemaError::table_exists(&name));
                }
                temp.insert(name.clone(), table);
                Ok(())
            })?,
            TableKind::Permanent => self.db.with_catalog(|catalog| {
                if catalog.contains_key(&name) {
                    return Err(SchemaError::table_exists(&name));
                }
                catalog.insert(name.clone(), table);
                Ok(())
            })?,
        }

        self.record(Undo::CreatedTable {
            table: name,
            generation,
            kind,
        });
        Ok(())
    }

    /// Drop a table if it is still the instance identified by `generation`.
    pub(crate) fn drop_table(&self, name: &str, generation: u64, kind: TableKind) -> bool {
        let remove = |catalog: &mut Catalog| {
            if catalog.get(name).is_some_and(|t| t.generation() == generation) {
                catalog.remove(name).is_some()
            } else {
                false
            }
        };
        match kind {
            TableKind::Temporary => self.with_temp(remove),
            TableKind::Permanent => self.db.with_catalog(remove),
        }
    }

    fn with_permanent<R>(&self, table: &str, f: impl FnOnce(&mut Table) -> Result<R>) -> Result<R> {
        self.db.with_catalog(|catalog| match catalog.get_mut(table) {
            Some(t) => f(t),
            None => Err(SchemaError::table_not_found(table)),
        })
    }

    pub(crate) fn begin_sync(&self) -> Result<()> {
        let mut state = self.lock_state();
        if state.in_transaction {
            return Err(TransactionError::already_active());
        }
        state.in_transaction = true;
        state.undo.clear();
        tracing::debug!(connection = self.id, "BEGIN");
        Ok(())
    }

    pub(crate) fn commit_sync(&self) -> Result<()> {
        let mut state = self.lock_state();
        if !state.in_transaction {
            return Err(TransactionError::not_active("commit"));
        }
        state.in_transaction = false;
        let changes = state.undo.len();
        state.undo.clear();
        tracing::debug!(connection = self.id, changes, "COMMIT");
        Ok(())
    }

    pub(crate) fn rollback_sync(&self) -> Result<()> {
        let undo = {
            let mut state = self.lock_state();
            if !state.in_transaction {
                return Err(TransactionError::not_active("rollback"));
            }
            state.in_transaction = false;
            std::mem::take(&mut state.undo)
        };

        tracing::debug!(connection = self.id, changes = undo.len(), "ROLLBACK");
        for entry in undo.into_iter().rev() {
            self.revert(entry);
        }
        Ok(())
    }

    fn revert(&self, entry: Undo) {
        let outcome = match entry {
            Undo::Inserted { table, id } => {
                self.with_permanent(&table, |t| Ok(t.remove(&id).map(|_| ())))
            }
            Undo::Updated { table, previous } => {
                self.with_permanent(&table, |t| t.update(previous).map(|_| Some(())))
            }
            Undo::Deleted {
                table,
                position,
                id,
                row,
            } => self.with_permanent(&table, |t| {
                t.restore(position, id, row);
                Ok(Some(()))
            }),
            Undo::CreatedTable {
                table,
                generation,
                kind,
            } => {
                tracing::debug!(table = %table, ?kind, "Dropping table created in rolled back transaction");
                Ok(self.drop_table(&table, generation, kind).then_some(()))
            }
        };

        if let Err(e) = outcome {
            tracing::warn!(connection = self.id, error = %e, "Failed to revert change during rollback");
        }
    }

    /// Roll back an open transaction and drop every temp table.
    fn shutdown(&self) {
        if self.in_transaction() {
            if let Err(e) = self.rollback_sync() {
                tracing::warn!(connection = self.id, error = %e, "Rollback on close failed");
            }
        }
        let dropped = self.with_temp(|temp| {
            let n = temp.len();
            temp.clear();
            n
        });
        if dropped > 0 {
            tracing::debug!(connection = self.id, dropped, "Dropped temp tables");
        }
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Connection for MemoryConnection {
    type Tx<'conn>
        = Transaction<'conn>
    where
        Self: 'conn;

    #[tracing::instrument(level = "debug", skip(self, schema), fields(table = schema.name()))]
    fn create_table(&self, schema: &TableSchema) -> Result<()> {
        let created = self.db.with_catalog(|catalog| {
            if catalog.contains_key(schema.name()) {
                return None;
            }
            let table = Table::new(schema.clone());
            let generation = table.generation();
            catalog.insert(schema.name().to_string(), table);
            Some(generation)
        });

        if let Some(generation) = created {
            tracing::debug!("Created permanent table");
            self.record(Undo::CreatedTable {
                table: schema.name().to_string(),
                generation,
                kind: TableKind::Permanent,
            });
        }
        Ok(())
    }

    fn insert(&self, table: &str, row: Row) -> Result<Identifier> {
        let id = self.with_permanent(table, |t| t.insert(row))?;
        tracing::trace!(table, id = %id, "Inserted row");
        self.record(Undo::Inserted {
            table: table.to_string(),
            id: id.clone(),
        });
        Ok(id)
    }

    fn update(&self, table: &str, row: Row) -> Result<u64> {
        match self.with_permanent(table, |t| t.update(row))? {
            Some(previous) => {
                tracing::trace!(table, "Updated row");
                self.record(Undo::Updated {
                    table: table.to_string(),
                    previous,
                });
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn delete(&self, table: &str, id: &Identifier) -> Result<u64> {
        match self.with_permanent(table, |t| Ok(t.remove(id)))? {
            Some((position, row)) => {
                tracing::trace!(table, id = %id, "Deleted row");
                self.record(Undo::Deleted {
                    table: table.to_string(),
                    position,
                    id: id.clone(),
                    row,
                });
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn find(&self, table: &str, id: &Identifier) -> Result<Option<Row>> {
        self.with_permanent(table, |t| Ok(t.get(id).cloned()))
    }

    fn scan(&self, table: &str) -> Result<Vec<Row>> {
        self.with_permanent(table, |t| Ok(t.rows().to_vec()))
    }

    fn begin(&self) -> Result<Self::Tx<'_>> {
        self.begin_sync()?;
        Ok(Transaction::new(self))
    }

    fn in_transaction(&self) -> bool {
        self.lock_state().in_transaction
    }

    fn close(self) -> Result<()> {
        tracing::info!(connection = self.id, name = ?self.config.name, "Closing connection");
        self.shutdown();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempcopy_core::{TransactionErrorKind, TransactionOps};
    use tempcopy_macros::Model;

    #[derive(Debug, Clone, PartialEq, Model)]
    #[tempcopy(table = "Person", identity = "int")]
    struct Person {
        #[tempcopy(primary_key, column = "Id")]
        id: Option<i64>,
        #[tempcopy(column = "Name")]
        name: String,
    }

    fn person(id: Option<i64>, name: &str) -> Person {
        Person {
            id,
            name: name.to_string(),
        }
    }

    fn setup() -> (MemoryConnection, TableSchema) {
        let conn = MemoryDatabase::new().connect();
        let schema = TableSchema::of::<Person>().unwrap();
        conn.create_table(&schema).unwrap();
        (conn, schema)
    }

    fn row(schema: &TableSchema, p: &Person) -> Row {
        schema.row_from_pairs(p.to_row()).unwrap()
    }

    #[test]
    fn test_insert_find_scan() {
        let (conn, schema) = setup();
        let id = conn.insert("Person", row(&schema, &person(None, "John Doe"))).unwrap();
        assert_eq!(id, Identifier::Int(1));

        let found = conn.find("Person", &id).unwrap().unwrap();
        assert_eq!(
            Person::from_row(&found).unwrap(),
            person(Some(1), "John Doe")
        );
        assert_eq!(conn.scan("Person").unwrap().len(), 1);
        assert!(conn.find("Person", &Identifier::Int(2)).unwrap().is_none());
    }

    #[test]
    fn test_missing_table_errors() {
        let conn = MemoryDatabase::new().connect();
        let err = conn.scan("Nope").unwrap_err();
        assert_eq!(
            err.schema_kind(),
            Some(tempcopy_core::SchemaErrorKind::TableNotFound)
        );
    }

    #[test]
    fn test_create_table_is_idempotent() {
        let (conn, schema) = setup();
        conn.insert("Person", row(&schema, &person(None, "a"))).unwrap();
        conn.create_table(&schema).unwrap();
        assert_eq!(conn.scan("Person").unwrap().len(), 1);
    }

    #[test]
    fn test_transaction_state_errors() {
        let (conn, _) = setup();
        assert_eq!(
            conn.commit_sync().unwrap_err().transaction_kind(),
            Some(TransactionErrorKind::NotActive)
        );

        let tx = conn.begin().unwrap();
        assert!(conn.in_transaction());
        let err = conn.begin().err().unwrap();
        assert_eq!(err.transaction_kind(), Some(TransactionErrorKind::AlreadyActive));
        tx.commit().unwrap();
        assert!(!conn.in_transaction());
    }

    #[test]
    fn test_rollback_reverts_permanent_writes() {
        let (conn, schema) = setup();
        conn.insert("Person", row(&schema, &person(None, "John Doe"))).unwrap();
        conn.insert("Person", row(&schema, &person(None, "Max"))).unwrap();

        let tx = conn.begin().unwrap();
        conn.insert("Person", row(&schema, &person(None, "Extra"))).unwrap();
        conn.update("Person", row(&schema, &person(Some(1), "Changed"))).unwrap();
        conn.delete("Person", &Identifier::Int(2)).unwrap();
        tx.rollback().unwrap();

        let names: Vec<String> = conn
            .scan("Person")
            .unwrap()
            .iter()
            .map(|r| r.get_named("Name").unwrap())
            .collect();
        assert_eq!(names, ["John Doe", "Max"]);
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let (conn, schema) = setup();
        {
            let _tx = conn.begin().unwrap();
            conn.insert("Person", row(&schema, &person(None, "Ghost"))).unwrap();
        }
        assert!(!conn.in_transaction());
        assert!(conn.scan("Person").unwrap().is_empty());
    }

    #[test]
    fn test_update_and_delete_report_rows_affected() {
        let (conn, schema) = setup();
        assert_eq!(conn.update("Person", row(&schema, &person(Some(5), "x"))).unwrap(), 0);
        conn.insert("Person", row(&schema, &person(Some(5), "x"))).unwrap();
        assert_eq!(conn.update("Person", row(&schema, &person(Some(5), "y"))).unwrap(), 1);
        assert_eq!(conn.delete("Person", &Identifier::Int(5)).unwrap(), 1);
        assert_eq!(conn.delete("Person", &Identifier::Int(5)).unwrap(), 0);
    }

    #[test]
    fn test_close_keeps_permanent_tables() {
        let db = MemoryDatabase::new();
        let conn = db.connect();
        let schema = TableSchema::of::<Person>().unwrap();
        conn.create_table(&schema).unwrap();
        conn.insert("Person", row(&schema, &person(None, "a"))).unwrap();
        conn.close().unwrap();

        let other = db.connect();
        assert_eq!(other.scan("Person").unwrap().len(), 1);
    }
}
