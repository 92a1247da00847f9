//! Idempotent table and index creation.
//!
//! Each repository declares its own `TableSchema` and applies it once at
//! construction. Every statement uses `IF NOT EXISTS`, so applying the same
//! schema twice is a no-op.

use super::{Client, DbError, Deadline, SCHEMA_SETUP_TIMEOUT};
use log::{error, info};
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct IndexSpec {
    pub name: &'static str,
    pub sql: &'static str,
}

/// Table DDL owned by exactly one repository.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub table: &'static str,
    /// One or more `CREATE TABLE IF NOT EXISTS` statements.
    pub create: &'static str,
    pub indexes: &'static [IndexSpec],
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("create `{table}` table: {source}")]
    Table {
        table: &'static str,
        #[source]
        source: DbError,
    },
    #[error("create index `{index}` on `{table}`: {source}")]
    Index {
        table: &'static str,
        index: &'static str,
        #[source]
        source: DbError,
    },
}

/// Applies `schema` within the fixed setup timeout.
///
/// Failure here is fatal for the owning repository.
pub fn ensure(client: &Client, schema: &TableSchema) -> Result<(), SchemaError> {
    let started_at = Instant::now();
    let deadline = Deadline::after(SCHEMA_SETUP_TIMEOUT);
    let table = schema.table;

    let result = client
        .execute_batch(&deadline, schema.create)
        .map_err(|source| SchemaError::Table { table, source })
        .and_then(|()| {
            schema.indexes.iter().try_for_each(|index| {
                client
                    .execute_batch(&deadline, index.sql)
                    .map_err(|source| SchemaError::Index {
                        table,
                        index: index.name,
                        source,
                    })
            })
        });

    match &result {
        Ok(()) => info!(
            "event=schema_setup module=db status=ok table={table} indexes={} duration_ms={}",
            schema.indexes.len(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=schema_setup module=db status=error table={table} duration_ms={} error={err}",
            started_at.elapsed().as_millis()
        ),
    }
    result
}
