//! Domain error taxonomy and storage error translation.
//!
//! `translate` is the only place SQLite result codes are interpreted. Every
//! repository reaches it through the `From<DbError>` conversion, so `?` on a
//! client call always yields a domain error.

use crate::db::DbError;
use crate::model::{CategoryPath, ValidationError};
use log::warn;
use rusqlite::ffi;

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors surfaced by repositories.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Entity or query rejected before or by the storage engine.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    /// Uniqueness violation, carrying the engine detail for diagnostics.
    #[error("duplicate entity: {detail}")]
    Duplicate { detail: String },
    /// Company references category paths that do not exist.
    #[error("unresolved category references: {}", join_paths(.missing))]
    Reference { missing: Vec<CategoryPath> },
    /// Any other persistence failure. Details are logged, never returned.
    #[error("storage failure")]
    Storage,
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        translate(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        translate(DbError::Sqlite(value))
    }
}

/// Maps client failures onto the domain taxonomy.
///
/// - unique / primary key constraint → `Duplicate`
/// - check / not-null constraint, malformed statement text, range and type
///   mismatches, bad parameters → `Validation`
/// - everything else → `Storage`, including generic `SQLITE_ERROR` results
///   such as a missing table or column
pub fn translate(err: DbError) -> RepoError {
    let translated = match &err {
        DbError::Sqlite(rusqlite::Error::SqliteFailure(failure, message)) => {
            match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    RepoError::Duplicate {
                        detail: message.clone().unwrap_or_else(|| failure.to_string()),
                    }
                }
                ffi::SQLITE_CONSTRAINT_CHECK
                | ffi::SQLITE_CONSTRAINT_NOTNULL
                | ffi::SQLITE_RANGE
                | ffi::SQLITE_MISMATCH => RepoError::Validation(ValidationError::Rejected),
                ffi::SQLITE_ERROR if is_malformed_statement(message.as_deref()) => {
                    RepoError::Validation(ValidationError::Rejected)
                }
                _ => RepoError::Storage,
            }
        }
        DbError::Sqlite(rusqlite::Error::SqlInputError { msg, .. })
            if is_malformed_statement(Some(msg.as_str())) =>
        {
            RepoError::Validation(ValidationError::Rejected)
        }
        DbError::Sqlite(
            rusqlite::Error::InvalidParameterCount(..)
            | rusqlite::Error::InvalidParameterName(_)
            | rusqlite::Error::ToSqlConversionFailure(_),
        ) => RepoError::Validation(ValidationError::Rejected),
        _ => RepoError::Storage,
    };

    match &translated {
        RepoError::Storage => warn!("event=storage_error module=repo status=error error={err}"),
        RepoError::Validation(_) => {
            warn!("event=statement_rejected module=repo status=error error={err}");
        }
        _ => {}
    }
    translated
}

/// `SQLITE_ERROR` is the engine's catch-all code; only parser failures count
/// as a rejected statement.
fn is_malformed_statement(message: Option<&str>) -> bool {
    const PARSER_MARKERS: [&str; 3] = ["syntax error", "unrecognized token", "incomplete input"];
    message.is_some_and(|message| PARSER_MARKERS.iter().any(|marker| message.contains(marker)))
}

fn join_paths(paths: &[CategoryPath]) -> String {
    paths
        .iter()
        .map(CategoryPath::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
