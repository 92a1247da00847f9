//! Capped, push-based result streaming shared by all repositories.
//!
//! # Invariants
//! - At most `Limit::get()` rows reach the visitor per query.
//! - Rows reach the visitor in engine order; nothing is buffered or reordered.
//! - A visitor error stops iteration and is returned as `StreamError::Aborted`
//!   without wrapping.

use crate::db::{DbError, Deadline};
use crate::error::RepoError;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::fmt::{Display, Formatter};

/// Default page size and hard ceiling for every query.
pub const MAX_LIMIT: u32 = 100;

/// Page size already clamped into `1..=MAX_LIMIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Limit(u32);

impl Limit {
    /// Absent or non-positive requests fall back to `MAX_LIMIT`; larger
    /// requests are clamped to it.
    pub fn normalize(requested: Option<i64>) -> Self {
        match requested {
            Some(value) if value > 0 => Self(value.min(i64::from(MAX_LIMIT)) as u32),
            _ => Self(MAX_LIMIT),
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for Limit {
    fn default() -> Self {
        Self(MAX_LIMIT)
    }
}

/// Inclusive creation-time window in unix seconds. Missing bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub from: Option<i64>,
    pub to: Option<i64>,
}

impl TimeRange {
    pub fn new(from: Option<i64>, to: Option<i64>) -> Self {
        Self { from, to }
    }

    pub(crate) fn push_sql(&self, column: &str, sql: &mut String, binds: &mut Vec<Value>) {
        if let Some(from) = self.from {
            sql.push_str(&format!(" AND {column} >= ?"));
            binds.push(Value::Integer(from));
        }
        if let Some(to) = self.to {
            sql.push_str(&format!(" AND {column} <= ?"));
            binds.push(Value::Integer(to));
        }
    }
}

/// Summary of one streamed query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOutcome {
    /// Rows handed to the visitor.
    pub delivered: usize,
    /// More rows matched than the limit allowed.
    pub has_more: bool,
}

/// Failure of a streamed query.
///
/// `Failed` carries storage or manager failures; `Aborted` is the visitor's
/// own error, returned exactly as produced.
#[derive(Debug)]
pub enum StreamError<F, E> {
    Failed(F),
    Aborted(E),
}

impl<F, E> StreamError<F, E> {
    pub fn map_failed<G>(self, f: impl FnOnce(F) -> G) -> StreamError<G, E> {
        match self {
            Self::Failed(err) => StreamError::Failed(f(err)),
            Self::Aborted(err) => StreamError::Aborted(err),
        }
    }

    pub fn failed(&self) -> Option<&F> {
        match self {
            Self::Failed(err) => Some(err),
            Self::Aborted(_) => None,
        }
    }

    pub fn aborted(&self) -> Option<&E> {
        match self {
            Self::Failed(_) => None,
            Self::Aborted(err) => Some(err),
        }
    }
}

impl<F: Display, E: Display> Display for StreamError<F, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed(err) => write!(f, "{err}"),
            Self::Aborted(err) => write!(f, "visitor aborted: {err}"),
        }
    }
}

impl<F, E> std::error::Error for StreamError<F, E>
where
    F: std::error::Error + 'static,
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Failed(err) => Some(err),
            Self::Aborted(err) => Some(err),
        }
    }
}

impl<E> From<RepoError> for StreamError<RepoError, E> {
    fn from(value: RepoError) -> Self {
        Self::Failed(value)
    }
}

impl<E> From<DbError> for StreamError<RepoError, E> {
    fn from(value: DbError) -> Self {
        Self::Failed(value.into())
    }
}

impl<E> From<rusqlite::Error> for StreamError<RepoError, E> {
    fn from(value: rusqlite::Error) -> Self {
        Self::Failed(value.into())
    }
}

/// Runs `sql` (which must end without a `LIMIT` clause) and pushes up to
/// `limit` parsed rows to `visit`.
///
/// One extra row is fetched to detect `has_more`; it is never parsed.
pub(crate) fn stream_rows<T, E>(
    conn: &Connection,
    deadline: &Deadline,
    sql: &str,
    mut binds: Vec<Value>,
    limit: Limit,
    mut parse: impl FnMut(&Connection, &Row<'_>) -> Result<T, RepoError>,
    mut visit: impl FnMut(T) -> Result<(), E>,
) -> Result<QueryOutcome, StreamError<RepoError, E>> {
    let cap = limit.get() as usize;
    binds.push(Value::Integer(i64::from(limit.get()) + 1));

    let mut stmt = conn.prepare(&format!("{sql} LIMIT ?;"))?;
    let mut rows = stmt.query(params_from_iter(binds))?;
    let mut outcome = QueryOutcome::default();

    while let Some(row) = rows.next()? {
        if outcome.delivered == cap {
            outcome.has_more = true;
            break;
        }
        deadline.check()?;
        let item = parse(conn, row)?;
        if let Err(err) = visit(item) {
            return Err(StreamError::Aborted(err));
        }
        outcome.delivered += 1;
    }

    Ok(outcome)
}
