//! Building use-case manager.

use super::{finish_call, finish_get, parse_payload, ManagerError, TraceId};
use crate::db::Deadline;
use crate::model::building::BuildingId;
use crate::model::Building;
use crate::repo::{BuildingFilter, BuildingRepository};
use crate::stream::{Limit, QueryOutcome, StreamError, TimeRange};
use serde::Deserialize;
use std::time::Instant;

/// Creation payload for one building.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewBuilding {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddBuildingQuery {
    pub trace_id: TraceId,
    pub payload: NewBuilding,
}

impl AddBuildingQuery {
    /// Decodes a raw JSON creation payload.
    pub fn from_json(trace_id: TraceId, body: &[u8]) -> Result<Self, ManagerError> {
        let payload = parse_payload(&trace_id, body)?;
        Ok(Self { trace_id, payload })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetBuildingsQuery {
    pub trace_id: TraceId,
    pub id: Option<BuildingId>,
    pub address: Option<String>,
    pub from_date: Option<i64>,
    pub to_date: Option<i64>,
    /// Requested page size; normalized by `Limit::normalize`.
    pub limit: Option<i64>,
}

impl GetBuildingsQuery {
    pub fn new(trace_id: TraceId) -> Self {
        Self {
            trace_id,
            id: None,
            address: None,
            from_date: None,
            to_date: None,
            limit: None,
        }
    }

    fn to_filter(&self) -> BuildingFilter {
        BuildingFilter {
            id: self.id,
            address: self.address.clone(),
            created: TimeRange::new(self.from_date, self.to_date),
            limit: Limit::normalize(self.limit),
        }
    }
}

/// Use-case service wrapper for building operations.
pub struct BuildingManager<R: BuildingRepository> {
    repo: R,
}

impl<R: BuildingRepository> BuildingManager<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates and persists a building with a fresh id and timestamp.
    pub fn add(
        &self,
        deadline: &Deadline,
        query: AddBuildingQuery,
    ) -> Result<Building, ManagerError> {
        let started_at = Instant::now();
        let building = Building::new(query.payload.address.trim());
        let result = self.repo.insert(deadline, &building).map(|()| building);
        finish_call("building_add", &query.trace_id, started_at, result)
    }

    /// Streams matching buildings to `visit`, at most one page of them.
    pub fn get<E>(
        &self,
        deadline: &Deadline,
        query: &GetBuildingsQuery,
        visit: impl FnMut(Building) -> Result<(), E>,
    ) -> Result<QueryOutcome, StreamError<ManagerError, E>> {
        let started_at = Instant::now();
        let result = self.repo.query(deadline, &query.to_filter(), visit);
        finish_get("building_get", &query.trace_id, started_at, result)
    }
}
