//! Transaction guard for [`MemoryConnection`].

use tempcopy_core::{Connection, Model, Result, TransactionOps};

use crate::bulk;
use crate::config::BulkCopyOptions;
use crate::connection::MemoryConnection;
use crate::temp_table::TempTable;

/// An open transaction on a [`MemoryConnection`].
///
/// Dropping the guard without calling [`commit`](TransactionOps::commit)
/// rolls the transaction back.
pub struct Transaction<'conn> {
    conn: &'conn MemoryConnection,
    finished: bool,
}

impl<'conn> Transaction<'conn> {
    pub(crate) fn new(conn: &'conn MemoryConnection) -> Self {
        Self {
            conn,
            finished: false,
        }
    }

    /// The connection this transaction runs on.
    pub fn connection(&self) -> &'conn MemoryConnection {
        self.conn
    }

    /// Create a table named `name` and bulk copy `rows` into it.
    ///
    /// With `options.keep_identity` set, every supplied identifier is stored
    /// verbatim and rows without one get a fresh identifier that collides
    /// with none of the supplied ones. Otherwise every row gets a fresh
    /// identifier. Nothing is read from or written to any other table, so
    /// identifiers that are also in use elsewhere, whether stored or held by
    /// a session, never change the copied values.
    ///
    /// The table is registered only after every row has been staged. Any
    /// failure leaves no table behind. A temporary table created here is
    /// dropped again if this transaction rolls back.
    pub fn create_temp_table<M, I>(
        &self,
        name: &str,
        rows: I,
        options: BulkCopyOptions,
    ) -> Result<TempTable<'conn, M>>
    where
        M: Model,
        I: IntoIterator<Item = M>,
    {
        bulk::copy_into_new_table(self.conn, name, rows, &options)
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("connection", &self.conn.id())
            .field("finished", &self.finished)
            .finish()
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.rollback_sync() {
                tracing::warn!(connection = self.conn.id(), error = %e, "Auto-rollback failed");
            }
        }
    }
}

impl TransactionOps for Transaction<'_> {
    fn commit(mut self) -> Result<()> {
        self.finished = true;
        self.conn.commit_sync()
    }

    fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.conn.rollback_sync()
    }

    fn is_active(&self) -> bool {
        !self.finished && self.conn.in_transaction()
    }
}
