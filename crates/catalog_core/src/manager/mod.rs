//! Use-case managers above the repositories.
//!
//! # Responsibility
//! - Turn application queries into repository filters.
//! - Normalize page limits and validate arguments before delegating.
//! - Attach the caller's trace id to logs and to every surfaced error.
//!
//! # Invariants
//! - Managers add no error kinds; `ManagerError::kind` is the repository error.
//! - Visitor errors pass through as `StreamError::Aborted` untouched.

pub mod building_manager;
pub mod category_manager;
pub mod company_manager;

pub use building_manager::{AddBuildingQuery, BuildingManager, GetBuildingsQuery, NewBuilding};
pub use category_manager::{
    AddCategoryQuery, CategoryManager, GetCategoriesQuery, NewCategory,
};
pub use company_manager::{AddCompanyQuery, CompanyManager, GetCompaniesQuery, NewCompany};

use crate::error::RepoError;
use crate::model::ValidationError;
use crate::stream::{QueryOutcome, StreamError};
use log::{error, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

/// Request-scoped token for log correlation. Has no effect on results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(String);

impl TraceId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TraceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Repository error tagged with the trace id of the failing request.
#[derive(Debug, thiserror::Error)]
#[error("{source} (trace_id={trace_id})")]
pub struct ManagerError {
    trace_id: TraceId,
    #[source]
    source: RepoError,
}

impl ManagerError {
    pub fn new(trace_id: TraceId, source: RepoError) -> Self {
        Self { trace_id, source }
    }

    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    pub fn kind(&self) -> &RepoError {
        &self.source
    }

    pub fn into_kind(self) -> RepoError {
        self.source
    }
}

pub(crate) fn parse_payload<T: DeserializeOwned>(
    trace_id: &TraceId,
    body: &[u8],
) -> Result<T, ManagerError> {
    if body.is_empty() {
        return Err(ManagerError::new(
            trace_id.clone(),
            ValidationError::Payload("body is empty".to_string()).into(),
        ));
    }
    serde_json::from_slice(body).map_err(|err| {
        ManagerError::new(
            trace_id.clone(),
            ValidationError::Payload(err.to_string()).into(),
        )
    })
}

/// Logs the outcome of a single-result call and attaches the trace id.
pub(crate) fn finish_call<T>(
    event: &str,
    trace_id: &TraceId,
    started_at: Instant,
    result: Result<T, RepoError>,
) -> Result<T, ManagerError> {
    match result {
        Ok(value) => {
            info!(
                "event={event} module=manager status=ok trace_id={trace_id} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(value)
        }
        Err(err) => {
            let err = ManagerError::new(trace_id.clone(), err);
            log_failure(event, trace_id, started_at, &err);
            Err(err)
        }
    }
}

pub(crate) fn finish_get<E>(
    event: &str,
    trace_id: &TraceId,
    started_at: Instant,
    result: Result<QueryOutcome, StreamError<RepoError, E>>,
) -> Result<QueryOutcome, StreamError<ManagerError, E>> {
    let result =
        result.map_err(|err| err.map_failed(|source| ManagerError::new(trace_id.clone(), source)));
    match &result {
        Ok(outcome) => info!(
            "event={event} module=manager status=ok trace_id={trace_id} delivered={} has_more={} duration_ms={}",
            outcome.delivered,
            outcome.has_more,
            started_at.elapsed().as_millis()
        ),
        Err(StreamError::Failed(err)) => log_failure(event, trace_id, started_at, err),
        Err(StreamError::Aborted(_)) => info!(
            "event={event} module=manager status=aborted trace_id={trace_id} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
    }
    result
}

/// Rejects a query before it reaches the repository.
pub(crate) fn reject_get<E>(
    event: &str,
    trace_id: &TraceId,
    err: ValidationError,
) -> Result<QueryOutcome, StreamError<ManagerError, E>> {
    finish_get(
        event,
        trace_id,
        Instant::now(),
        Err(StreamError::Failed(err.into())),
    )
}

fn log_failure(event: &str, trace_id: &TraceId, started_at: Instant, err: &ManagerError) {
    let elapsed = started_at.elapsed().as_millis();
    match err.kind() {
        RepoError::Storage => error!(
            "event={event} module=manager status=error trace_id={trace_id} duration_ms={elapsed} error={}",
            err.kind()
        ),
        other => warn!(
            "event={event} module=manager status=rejected trace_id={trace_id} duration_ms={elapsed} error={other}"
        ),
    }
}
