//! Company repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Own the `companies` table and the `company_categories` reference table.
//! - Resolve category references through `CategoryLookup` before any write.
//! - Stream companies filtered by category subtree.
//!
//! # Invariants
//! - Unresolved references fail with `Reference` and write nothing.
//! - A company row and its reference rows are written in one transaction.

use super::category_repo::CategoryLookup;
use super::{invalid_row, path_column, subtree_condition, uuid_column};
use crate::db::schema::{self, IndexSpec, SchemaError, TableSchema};
use crate::db::{Client, DbResult, Deadline};
use crate::error::{RepoError, RepoResult};
use crate::model::company::CompanyId;
use crate::model::{CategoryPath, Company};
use crate::stream::{stream_rows, Limit, QueryOutcome, StreamError, TimeRange};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};
use std::sync::Arc;

const TABLE: &str = "companies";

const COMPANY_SCHEMA: TableSchema = TableSchema {
    table: TABLE,
    create: "CREATE TABLE IF NOT EXISTS companies (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL CHECK (name != ''),
        phone_numbers TEXT NOT NULL DEFAULT '[]',
        created_at INTEGER NOT NULL CHECK (created_at > 0)
    );
    CREATE TABLE IF NOT EXISTS company_categories (
        company_id TEXT NOT NULL REFERENCES companies (id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        category_name TEXT NOT NULL CHECK (category_name != ''),
        PRIMARY KEY (company_id, category_name)
    );",
    indexes: &[
        IndexSpec {
            name: "companies_created_at_idx",
            sql: "CREATE INDEX IF NOT EXISTS companies_created_at_idx
                  ON companies (created_at);",
        },
        IndexSpec {
            name: "company_categories_name_idx",
            sql: "CREATE INDEX IF NOT EXISTS company_categories_name_idx
                  ON company_categories (category_name);",
        },
    ],
};

/// Filters for company lookups.
#[derive(Debug, Clone, Default)]
pub struct CompanyFilter {
    pub id: Option<CompanyId>,
    /// Matches companies referencing this path or any descendant of it.
    pub category: Option<CategoryPath>,
    pub created: TimeRange,
    pub limit: Limit,
}

/// Repository interface for company operations.
pub trait CompanyRepository {
    fn insert(&self, deadline: &Deadline, company: &Company) -> RepoResult<()>;
    fn query<E>(
        &self,
        deadline: &Deadline,
        filter: &CompanyFilter,
        visit: impl FnMut(Company) -> Result<(), E>,
    ) -> Result<QueryOutcome, StreamError<RepoError, E>>;
}

/// SQLite-backed company repository.
///
/// Holds a read-only reference to the category lookup for its whole lifetime;
/// stopping this repository never stops the lookup.
pub struct SqliteCompanyRepository {
    client: Client,
    categories: Arc<dyn CategoryLookup>,
}

impl SqliteCompanyRepository {
    /// Creates the repository and ensures its tables and indexes exist.
    pub fn try_new(
        client: Client,
        categories: Arc<dyn CategoryLookup>,
    ) -> Result<Self, SchemaError> {
        schema::ensure(&client, &COMPANY_SCHEMA)?;
        Ok(Self { client, categories })
    }

    pub fn stop(&self, deadline: &Deadline) -> DbResult<()> {
        self.client.stop(deadline)
    }
}

impl CompanyRepository for SqliteCompanyRepository {
    fn insert(&self, deadline: &Deadline, company: &Company) -> RepoResult<()> {
        company.validate()?;

        let missing = self.categories.missing_paths(deadline, &company.categories)?;
        if !missing.is_empty() {
            debug!(
                "event=company_insert module=repo status=rejected company_id={} missing={}",
                company.id,
                missing.len()
            );
            return Err(RepoError::Reference { missing });
        }

        let phone_numbers = serde_json::to_string(&company.phone_numbers)
            .map_err(|_| invalid_row(TABLE, "phone_numbers", "<unserializable>"))?;

        self.client.with_transaction(deadline, |tx| -> RepoResult<()> {
            tx.execute(
                "INSERT INTO companies (id, name, phone_numbers, created_at)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    company.id.to_string(),
                    company.name.as_str(),
                    phone_numbers,
                    company.created_at,
                ],
            )?;

            let mut stmt = tx.prepare(
                "INSERT INTO company_categories (company_id, position, category_name)
                 VALUES (?1, ?2, ?3);",
            )?;
            for (position, category) in company.categories.iter().enumerate() {
                stmt.execute(params![
                    company.id.to_string(),
                    position as i64,
                    category.as_str(),
                ])?;
            }
            Ok(())
        })
    }

    fn query<E>(
        &self,
        deadline: &Deadline,
        filter: &CompanyFilter,
        visit: impl FnMut(Company) -> Result<(), E>,
    ) -> Result<QueryOutcome, StreamError<RepoError, E>> {
        let mut sql = "SELECT
                c.id AS id,
                c.name AS name,
                c.phone_numbers AS phone_numbers,
                c.created_at AS created_at
             FROM companies c
             WHERE 1 = 1"
            .to_string();
        let mut binds: Vec<Value> = Vec::new();

        if let Some(id) = filter.id {
            sql.push_str(" AND c.id = ?");
            binds.push(Value::Text(id.to_string()));
        } else {
            if let Some(category) = &filter.category {
                let condition = subtree_condition("cc.category_name", category, &mut binds);
                sql.push_str(&format!(
                    " AND EXISTS (SELECT 1 FROM company_categories cc
                       WHERE cc.company_id = c.id AND {condition})"
                ));
            }
            filter.created.push_sql("c.created_at", &mut sql, &mut binds);
        }
        sql.push_str(" ORDER BY c.created_at ASC, c.id ASC");

        self.client.with_connection(deadline, |conn| {
            stream_rows(
                conn,
                deadline,
                &sql,
                binds,
                filter.limit,
                parse_company_row,
                visit,
            )
        })
    }
}

impl<R: CompanyRepository> CompanyRepository for Arc<R> {
    fn insert(&self, deadline: &Deadline, company: &Company) -> RepoResult<()> {
        (**self).insert(deadline, company)
    }

    fn query<E>(
        &self,
        deadline: &Deadline,
        filter: &CompanyFilter,
        visit: impl FnMut(Company) -> Result<(), E>,
    ) -> Result<QueryOutcome, StreamError<RepoError, E>> {
        (**self).query(deadline, filter, visit)
    }
}

fn parse_company_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Company> {
    let id = uuid_column(row, TABLE, "id")?;

    let phone_text: String = row.get("phone_numbers")?;
    let phone_numbers: Vec<String> = serde_json::from_str(&phone_text)
        .map_err(|_| invalid_row(TABLE, "phone_numbers", &phone_text))?;

    let mut stmt = conn.prepare_cached(
        "SELECT category_name FROM company_categories
         WHERE company_id = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    let mut categories = Vec::new();
    while let Some(category_row) = rows.next()? {
        categories.push(path_column(category_row, "company_categories", "category_name")?);
    }

    Ok(Company {
        id,
        name: row.get("name")?,
        phone_numbers,
        categories,
        created_at: row.get("created_at")?,
    })
}
