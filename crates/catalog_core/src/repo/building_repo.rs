//! Building repository contracts and SQLite implementation.
//!
//! # Invariants
//! - An identifier filter short-circuits address and time filters.
//! - Address filtering is a case-sensitive substring match.

use super::uuid_column;
use crate::db::schema::{self, IndexSpec, SchemaError, TableSchema};
use crate::db::{Client, DbResult, Deadline};
use crate::error::{RepoError, RepoResult};
use crate::model::building::BuildingId;
use crate::model::Building;
use crate::stream::{stream_rows, Limit, QueryOutcome, StreamError, TimeRange};
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};
use std::sync::Arc;

const TABLE: &str = "buildings";

const BUILDING_SCHEMA: TableSchema = TableSchema {
    table: TABLE,
    create: "CREATE TABLE IF NOT EXISTS buildings (
        id TEXT PRIMARY KEY NOT NULL,
        address TEXT NOT NULL CHECK (address != ''),
        created_at INTEGER NOT NULL CHECK (created_at > 0)
    );",
    indexes: &[
        IndexSpec {
            name: "buildings_created_at_idx",
            sql: "CREATE INDEX IF NOT EXISTS buildings_created_at_idx
                  ON buildings (created_at);",
        },
        IndexSpec {
            name: "buildings_address_idx",
            sql: "CREATE INDEX IF NOT EXISTS buildings_address_idx
                  ON buildings (address);",
        },
    ],
};

/// Filters for building lookups.
#[derive(Debug, Clone, Default)]
pub struct BuildingFilter {
    pub id: Option<BuildingId>,
    /// Substring the address must contain.
    pub address: Option<String>,
    pub created: TimeRange,
    pub limit: Limit,
}

/// Repository interface for building operations.
pub trait BuildingRepository {
    fn insert(&self, deadline: &Deadline, building: &Building) -> RepoResult<()>;
    fn query<E>(
        &self,
        deadline: &Deadline,
        filter: &BuildingFilter,
        visit: impl FnMut(Building) -> Result<(), E>,
    ) -> Result<QueryOutcome, StreamError<RepoError, E>>;
}

/// SQLite-backed building repository.
pub struct SqliteBuildingRepository {
    client: Client,
}

impl SqliteBuildingRepository {
    /// Creates the repository and ensures its table and indexes exist.
    pub fn try_new(client: Client) -> Result<Self, SchemaError> {
        schema::ensure(&client, &BUILDING_SCHEMA)?;
        Ok(Self { client })
    }

    pub fn stop(&self, deadline: &Deadline) -> DbResult<()> {
        self.client.stop(deadline)
    }
}

impl BuildingRepository for SqliteBuildingRepository {
    fn insert(&self, deadline: &Deadline, building: &Building) -> RepoResult<()> {
        building.validate()?;

        self.client.execute(
            deadline,
            "INSERT INTO buildings (id, address, created_at) VALUES (?1, ?2, ?3);",
            params![
                building.id.to_string(),
                building.address.as_str(),
                building.created_at,
            ],
        )?;
        Ok(())
    }

    fn query<E>(
        &self,
        deadline: &Deadline,
        filter: &BuildingFilter,
        visit: impl FnMut(Building) -> Result<(), E>,
    ) -> Result<QueryOutcome, StreamError<RepoError, E>> {
        let mut sql = "SELECT id, address, created_at FROM buildings WHERE 1 = 1".to_string();
        let mut binds: Vec<Value> = Vec::new();

        if let Some(id) = filter.id {
            sql.push_str(" AND id = ?");
            binds.push(Value::Text(id.to_string()));
        } else {
            if let Some(address) = filter.address.as_deref().filter(|value| !value.is_empty()) {
                sql.push_str(" AND instr(address, ?) > 0");
                binds.push(Value::Text(address.to_string()));
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
                parse_building_row,
                visit,
            )
        })
    }
}

impl<R: BuildingRepository> BuildingRepository for Arc<R> {
    fn insert(&self, deadline: &Deadline, building: &Building) -> RepoResult<()> {
        (**self).insert(deadline, building)
    }

    fn query<E>(
        &self,
        deadline: &Deadline,
        filter: &BuildingFilter,
        visit: impl FnMut(Building) -> Result<(), E>,
    ) -> Result<QueryOutcome, StreamError<RepoError, E>> {
        (**self).query(deadline, filter, visit)
    }
}

fn parse_building_row(_conn: &Connection, row: &Row<'_>) -> RepoResult<Building> {
    Ok(Building {
        id: uuid_column(row, TABLE, "id")?,
        address: row.get("address")?,
        created_at: row.get("created_at")?,
    })
}
