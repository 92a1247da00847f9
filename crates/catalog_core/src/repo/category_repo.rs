//! Category repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Own the `categories` table, its timestamp index and its path index.
//! - Insert validated categories and stream filtered lookups.
//! - Resolve exact paths for collaborators (`CategoryLookup`).
//!
//! # Invariants
//! - Category paths are unique; a second insert of a path is `Duplicate`.
//! - Subtree filters are inclusive of the anchor path itself.

use super::{path_column, subtree_condition, uuid_column};
use crate::db::schema::{self, IndexSpec, SchemaError, TableSchema};
use crate::db::{Client, DbResult, Deadline};
use crate::error::{RepoError, RepoResult};
use crate::model::category::CategoryId;
use crate::model::{Category, CategoryPath};
use crate::stream::{stream_rows, Limit, QueryOutcome, StreamError, TimeRange};
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};
use std::sync::Arc;

const TABLE: &str = "categories";

const CATEGORY_SCHEMA: TableSchema = TableSchema {
    table: TABLE,
    create: "CREATE TABLE IF NOT EXISTS categories (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL CHECK (name != ''),
        created_at INTEGER NOT NULL CHECK (created_at > 0)
    );",
    indexes: &[
        IndexSpec {
            name: "categories_created_at_idx",
            sql: "CREATE INDEX IF NOT EXISTS categories_created_at_idx
                  ON categories (created_at);",
        },
        IndexSpec {
            name: "categories_name_idx",
            sql: "CREATE UNIQUE INDEX IF NOT EXISTS categories_name_idx
                  ON categories (name);",
        },
    ],
};

const CATEGORY_SELECT_SQL: &str = "SELECT id, name, created_at FROM categories";

/// Filters for category lookups.
///
/// A present `id` short-circuits every other filter.
#[derive(Debug, Clone, Default)]
pub struct CategoryFilter {
    pub id: Option<CategoryId>,
    /// Exact path match.
    pub name: Option<CategoryPath>,
    /// Anchor path; matches the anchor and all of its descendants.
    pub under: Option<CategoryPath>,
    pub created: TimeRange,
    pub limit: Limit,
}

/// Repository interface for category operations.
pub trait CategoryRepository {
    fn insert(&self, deadline: &Deadline, category: &Category) -> RepoResult<()>;
    fn query<E>(
        &self,
        deadline: &Deadline,
        filter: &CategoryFilter,
        visit: impl FnMut(Category) -> Result<(), E>,
    ) -> Result<QueryOutcome, StreamError<RepoError, E>>;
    /// Reports whether no category has been stored yet.
    fn is_empty(&self, deadline: &Deadline) -> RepoResult<bool>;
}

/// Read-only capability handed to repositories that reference categories.
pub trait CategoryLookup: Send + Sync {
    /// Returns the paths from `paths` that match no stored category, in input order.
    fn missing_paths(
        &self,
        deadline: &Deadline,
        paths: &[CategoryPath],
    ) -> RepoResult<Vec<CategoryPath>>;
}

/// SQLite-backed category repository.
pub struct SqliteCategoryRepository {
    client: Client,
}

impl SqliteCategoryRepository {
    /// Creates the repository and ensures its table and indexes exist.
    pub fn try_new(client: Client) -> Result<Self, SchemaError> {
        schema::ensure(&client, &CATEGORY_SCHEMA)?;
        Ok(Self { client })
    }

    /// Releases this repository's client handle.
    pub fn stop(&self, deadline: &Deadline) -> DbResult<()> {
        self.client.stop(deadline)
    }
}

impl CategoryRepository for SqliteCategoryRepository {
    fn insert(&self, deadline: &Deadline, category: &Category) -> RepoResult<()> {
        category.validate()?;

        self.client.execute(
            deadline,
            "INSERT INTO categories (id, name, created_at) VALUES (?1, ?2, ?3);",
            params![
                category.id.to_string(),
                category.name.as_str(),
                category.created_at,
            ],
        )?;
        Ok(())
    }

    fn query<E>(
        &self,
        deadline: &Deadline,
        filter: &CategoryFilter,
        visit: impl FnMut(Category) -> Result<(), E>,
    ) -> Result<QueryOutcome, StreamError<RepoError, E>> {
        let mut sql = format!("{CATEGORY_SELECT_SQL} WHERE 1 = 1");
        let mut binds: Vec<Value> = Vec::new();

        if let Some(id) = filter.id {
            sql.push_str(" AND id = ?");
            binds.push(Value::Text(id.to_string()));
        } else {
            if let Some(name) = &filter.name {
                sql.push_str(" AND name = ?");
                binds.push(Value::Text(name.to_string()));
            }
            if let Some(under) = &filter.under {
                sql.push_str(" AND ");
                sql.push_str(&subtree_condition("name", under, &mut binds));
            }
            filter.created.push_sql("created_at", &mut sql, &mut binds);
        }
        sql.push_str(" ORDER BY created_at ASC, id ASC");

        self.client.with_connection(deadline, |conn| {
            stream_rows(
                conn,
                deadline,
                &sql,
                binds,
                filter.limit,
                parse_category_row,
                visit,
            )
        })
    }

    fn is_empty(&self, deadline: &Deadline) -> RepoResult<bool> {
        Ok(self.client.is_table_empty(deadline, TABLE)?)
    }
}

impl CategoryLookup for SqliteCategoryRepository {
    fn missing_paths(
        &self,
        deadline: &Deadline,
        paths: &[CategoryPath],
    ) -> RepoResult<Vec<CategoryPath>> {
        self.client.with_connection(deadline, |conn| {
            let mut stmt =
                conn.prepare("SELECT EXISTS(SELECT 1 FROM categories WHERE name = ?1);")?;
            let mut missing = Vec::new();
            for path in paths {
                deadline.check()?;
                let exists: i64 = stmt.query_row([path.as_str()], |row| row.get(0))?;
                if exists == 0 {
                    missing.push(path.clone());
                }
            }
            Ok(missing)
        })
    }
}

impl<R: CategoryRepository> CategoryRepository for Arc<R> {
    fn insert(&self, deadline: &Deadline, category: &Category) -> RepoResult<()> {
        (**self).insert(deadline, category)
    }

    fn query<E>(
        &self,
        deadline: &Deadline,
        filter: &CategoryFilter,
        visit: impl FnMut(Category) -> Result<(), E>,
    ) -> Result<QueryOutcome, StreamError<RepoError, E>> {
        (**self).query(deadline, filter, visit)
    }

    fn is_empty(&self, deadline: &Deadline) -> RepoResult<bool> {
        (**self).is_empty(deadline)
    }
}

fn parse_category_row(_conn: &Connection, row: &Row<'_>) -> RepoResult<Category> {
    Ok(Category {
        id: uuid_column(row, TABLE, "id")?,
        name: path_column(row, TABLE, "name")?,
        created_at: row.get("created_at")?,
    })
}
