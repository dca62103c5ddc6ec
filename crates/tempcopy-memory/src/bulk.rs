//! Bulk copy of model values into a new table.
//!
//! Copying runs in two passes over a private staging [`Table`]:
//!
//! 1. Every value is converted to a row in table column order, batch by
//!    batch, and supplied identifiers are checked for repeats.
//! 2. Identifiers are assigned and rows are appended to the staging table.
//!
//! Only a fully staged table is registered, so a failing copy never leaves
//! a partial table behind. The copy consults no other table and no session
//! state: what ends up in the table is exactly what the caller supplied,
//! plus generated identifiers where requested.

use std::collections::HashSet;

use tempcopy_core::{
    DuplicateKeyError, Error, Identifier, IdentityKind, Model, Result, Row, SchemaError,
    SqlType, TableKind, TableSchema,
};

use crate::config::BulkCopyOptions;
use crate::connection::MemoryConnection;
use crate::store::Table;
use crate::temp_table::TempTable;

#[tracing::instrument(
    level = "debug",
    skip(conn, rows, options),
    fields(
        connection = conn.id(),
        keep_identity = options.keep_identity,
        kind = ?options.table_kind,
    )
)]
pub(crate) fn copy_into_new_table<'conn, M, I>(
    conn: &'conn MemoryConnection,
    name: &str,
    rows: I,
    options: &BulkCopyOptions,
) -> Result<TempTable<'conn, M>>
where
    M: Model,
    I: IntoIterator<Item = M>,
{
    let schema = TableSchema::of::<M>()?.renamed(name)?;
    let kind = options.table_kind;

    let taken = match kind {
        TableKind::Temporary => conn.has_temp_table(name),
        TableKind::Permanent => conn.database().has_table(name),
    };
    if taken {
        return Err(SchemaError::table_exists(name));
    }

    let table = stage(&schema, rows, options)?;
    let generation = table.generation();
    let copied = table.len();
    conn.register_table(table, kind)?;

    tracing::debug!(rows = copied, "Bulk copy complete");
    Ok(TempTable::new(conn, name, generation, kind, copied))
}

/// Build the staging table for `rows`.
pub(crate) fn stage<M, I>(schema: &TableSchema, rows: I, options: &BulkCopyOptions) -> Result<Table>
where
    M: Model,
    I: IntoIterator<Item = M>,
{
    let models: Vec<M> = rows.into_iter().collect();
    let mut staged: Vec<(Option<Identifier>, Row)> = Vec::with_capacity(models.len());
    let mut supplied: HashSet<Identifier> = HashSet::new();

    for (batch, chunk) in models.chunks(options.batch_size()).enumerate() {
        for model in chunk {
            let row = schema.row_from_pairs(model.to_row())?;
            let id = schema.key_of(&row)?;
            if let Some(id) = &id {
                if !supplied.insert(id.clone()) {
                    return Err(duplicate(schema, id.clone()));
                }
            }
            staged.push((id, row));
        }
        tracing::debug!(table = schema.name(), batch, rows = chunk.len(), "Staged batch");
    }

    let generator = generator_kind(schema);
    let reserved = if options.keep_identity {
        supplied
    } else {
        HashSet::new()
    };

    let mut table = Table::new(schema.clone());
    for (supplied_id, mut row) in staged {
        let id = match supplied_id.filter(|_| options.keep_identity) {
            Some(id) => id,
            None => {
                let id = table.generate_id(generator, &reserved)?;
                schema.set_key(&mut row, &id);
                id
            }
        };
        table.push(id, row)?;
    }
    Ok(table)
}

/// How fresh identifiers are produced for a bulk copy.
///
/// A model with supplied identity still gets generated identifiers when its
/// key column is an integer or UUID column.
fn generator_kind(schema: &TableSchema) -> IdentityKind {
    match schema.identity() {
        IdentityKind::Supplied => match schema.columns()[schema.key_index()].sql_type {
            SqlType::Integer | SqlType::BigInt => IdentityKind::Int,
            SqlType::Uuid => IdentityKind::Uuid,
            _ => IdentityKind::Supplied,
        },
        kind => kind,
    }
}

fn duplicate(schema: &TableSchema, identifier: Identifier) -> Error {
    Error::DuplicateKey(DuplicateKeyError {
        table: schema.name().to_string(),
        identifier,
    })
}
