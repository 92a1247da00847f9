//! SQLite connection client and schema bootstrap.
//!
//! # Responsibility
//! - Own the connection pool shared by every repository.
//! - Carry deadlines from callers down to each statement.
//! - Create tables and indexes idempotently at repository construction.
//!
//! # Invariants
//! - No statement runs on a stopped handle or after its deadline expired.
//! - Schema setup is bounded by `SCHEMA_SETUP_TIMEOUT`.

mod client;
mod deadline;
pub mod schema;

pub use client::{Client, ConnectionPool, PooledSqlite};
pub use deadline::Deadline;

use std::time::Duration;

/// Fixed bound for connection bootstrap and table/index creation.
pub const SCHEMA_SETUP_TIMEOUT: Duration = Duration::from_secs(3);

pub type DbResult<T> = Result<T, DbError>;

/// Failures reported by the connection client.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("connection client has been stopped")]
    Stopped,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("connection pool: {0}")]
    Pool(#[from] r2d2::Error),
}
