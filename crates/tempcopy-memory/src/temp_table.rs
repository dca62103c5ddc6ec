//! Handles to tables created by a bulk copy.

use std::fmt;
use std::marker::PhantomData;

use tempcopy_core::{Error, Identifier, Model, Result, Row, TableKind};

use crate::connection::MemoryConnection;
use crate::store::Table;

/// A table created by a bulk copy, queried as values of `M`.
///
/// Reads go to the stored rows only. Values held elsewhere under the same
/// identifiers, such as entities tracked by a session, are never consulted.
/// The table is dropped when the handle is disposed or dropped. Once the
/// table is gone, for example because the creating transaction rolled
/// back, reads return no rows.
pub struct TempTable<'conn, M: Model> {
    conn: &'conn MemoryConnection,
    name: String,
    generation: u64,
    kind: TableKind,
    rows_copied: usize,
    disposed: bool,
    _model: PhantomData<fn() -> M>,
}

impl<'conn, M: Model> TempTable<'conn, M> {
    pub(crate) fn new(
        conn: &'conn MemoryConnection,
        name: &str,
        generation: u64,
        kind: TableKind,
        rows_copied: usize,
    ) -> Self {
        Self {
            conn,
            name: name.to_string(),
            generation,
            kind,
            rows_copied,
            disposed: false,
            _model: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    /// Number of rows written by the bulk copy.
    pub fn rows_copied(&self) -> usize {
        self.rows_copied
    }

    /// Whether the table still exists.
    pub fn exists(&self) -> bool {
        self.with_table(|_| ()).is_some()
    }

    /// Current number of rows.
    pub fn count(&self) -> usize {
        self.with_table(Table::len).unwrap_or(0)
    }

    /// Stored rows in insertion order.
    pub fn rows(&self) -> Vec<Row> {
        self.with_table(|t| t.rows().to_vec()).unwrap_or_default()
    }

    /// Every row materialized as `M`, in insertion order.
    pub fn to_vec(&self) -> Result<Vec<M>> {
        self.rows().iter().map(M::from_row).collect()
    }

    /// The first row, if any.
    pub fn first(&self) -> Result<Option<M>> {
        self.with_table(|t| t.rows().first().cloned())
            .flatten()
            .map(|row| M::from_row(&row))
            .transpose()
    }

    /// The only row.
    ///
    /// # Errors
    ///
    /// `NotFound` if the table is empty or gone, and an error naming the
    /// count if it holds more than one row.
    pub fn one(&self) -> Result<M> {
        let rows = self.rows();
        match rows.as_slice() {
            [] => Err(Error::NotFound(format!("no rows in table '{}'", self.name))),
            [row] => M::from_row(row),
            _ => Err(Error::Custom(format!(
                "Expected one row in table '{}', found {}",
                self.name,
                rows.len()
            ))),
        }
    }

    /// The row stored under `id`.
    pub fn find(&self, id: &Identifier) -> Result<Option<M>> {
        self.with_table(|t| t.get(id).cloned())
            .flatten()
            .map(|row| M::from_row(&row))
            .transpose()
    }

    /// Drop the table now. Returns whether a table was removed.
    pub fn dispose(mut self) -> bool {
        self.release()
    }

    fn release(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        let dropped = self.conn.drop_table(&self.name, self.generation, self.kind);
        if dropped {
            tracing::debug!(table = %self.name, kind = ?self.kind, "Dropped table");
        }
        dropped
    }

    fn with_table<R>(&self, f: impl FnOnce(&Table) -> R) -> Option<R> {
        if self.disposed {
            return None;
        }
        let pick = |catalog: &mut crate::store::Catalog| {
            catalog
                .get(&self.name)
                .filter(|t| t.generation() == self.generation)
                .map(f)
        };
        match self.kind {
            TableKind::Temporary => self.conn.with_temp(pick),
            TableKind::Permanent => self.conn.database().with_catalog(pick),
        }
    }
}

impl<M: Model> Drop for TempTable<'_, M> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<M: Model> fmt::Debug for TempTable<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TempTable")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("rows_copied", &self.rows_copied)
            .field("disposed", &self.disposed)
            .finish()
    }
}
