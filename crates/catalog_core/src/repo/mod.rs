//! Repository layer contracts and SQLite implementations.
//!
//! # Responsibility
//! - Own one table (plus its indexes) per repository.
//! - Validate entities before any write and stream capped query results.
//! - Route every storage failure through `error::translate`.
//!
//! # Invariants
//! - Repositories never retry; failures surface immediately.
//! - Schema setup failure aborts repository construction.

pub mod building_repo;
pub mod category_repo;
pub mod company_repo;

pub use building_repo::{BuildingFilter, BuildingRepository, SqliteBuildingRepository};
pub use category_repo::{
    CategoryFilter, CategoryLookup, CategoryRepository, SqliteCategoryRepository,
};
pub use company_repo::{CompanyFilter, CompanyRepository, SqliteCompanyRepository};

use crate::error::RepoError;
use crate::model::CategoryPath;
use log::warn;
use rusqlite::types::Value;
use rusqlite::Row;
use uuid::Uuid;

pub(crate) fn uuid_column(row: &Row<'_>, table: &str, column: &str) -> Result<Uuid, RepoError> {
    let text: String = row.get(column)?;
    Uuid::parse_str(&text).map_err(|_| invalid_row(table, column, &text))
}

pub(crate) fn path_column(
    row: &Row<'_>,
    table: &str,
    column: &str,
) -> Result<CategoryPath, RepoError> {
    let text: String = row.get(column)?;
    CategoryPath::parse(&text).map_err(|_| invalid_row(table, column, &text))
}

/// Persisted state that no longer satisfies the model is a storage fault.
pub(crate) fn invalid_row(table: &str, column: &str, value: &str) -> RepoError {
    warn!("event=invalid_row module=repo status=error table={table} column={column} value={value}");
    RepoError::Storage
}

/// Builds `column = path OR column within the descendant range of path`.
pub(crate) fn subtree_condition(
    column: &str,
    path: &CategoryPath,
    binds: &mut Vec<Value>,
) -> String {
    let (lower, upper) = path.descendant_bounds();
    binds.push(Value::Text(path.to_string()));
    binds.push(Value::Text(lower));
    binds.push(Value::Text(upper));
    format!("({column} = ? OR ({column} >= ? AND {column} < ?))")
}
