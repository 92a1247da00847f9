//! Company use-case manager.

use super::{finish_call, finish_get, parse_payload, reject_get, ManagerError, TraceId};
use crate::db::Deadline;
use crate::error::RepoError;
use crate::model::company::CompanyId;
use crate::model::{CategoryPath, Company, ValidationError};
use crate::repo::{CompanyFilter, CompanyRepository};
use crate::stream::{Limit, QueryOutcome, StreamError, TimeRange};
use serde::Deserialize;
use std::time::Instant;

/// Creation payload for one company.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewCompany {
    pub name: String,
    #[serde(default)]
    pub phone_numbers: Vec<String>,
    /// Category paths the company belongs to.
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddCompanyQuery {
    pub trace_id: TraceId,
    pub payload: NewCompany,
}

impl AddCompanyQuery {
    pub fn from_json(trace_id: TraceId, body: &[u8]) -> Result<Self, ManagerError> {
        let payload = parse_payload(&trace_id, body)?;
        Ok(Self { trace_id, payload })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetCompaniesQuery {
    pub trace_id: TraceId,
    pub id: Option<CompanyId>,
    /// Category subtree anchor, inclusive.
    pub category: Option<String>,
    pub from_date: Option<i64>,
    pub to_date: Option<i64>,
    pub limit: Option<i64>,
}

impl GetCompaniesQuery {
    pub fn new(trace_id: TraceId) -> Self {
        Self {
            trace_id,
            id: None,
            category: None,
            from_date: None,
            to_date: None,
            limit: None,
        }
    }

    fn to_filter(&self) -> Result<CompanyFilter, ValidationError> {
        Ok(CompanyFilter {
            id: self.id,
            category: self
                .category
                .as_deref()
                .map(CategoryPath::parse)
                .transpose()?,
            created: TimeRange::new(self.from_date, self.to_date),
            limit: Limit::normalize(self.limit),
        })
    }
}

/// Use-case service wrapper for company operations.
pub struct CompanyManager<R: CompanyRepository> {
    repo: R,
}

impl<R: CompanyRepository> CompanyManager<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Builds the company from its payload and persists it.
    ///
    /// Category resolution happens inside the repository insert; unresolved
    /// paths surface as `RepoError::Reference`.
    pub fn add(
        &self,
        deadline: &Deadline,
        query: AddCompanyQuery,
    ) -> Result<Company, ManagerError> {
        let started_at = Instant::now();
        let result = build_company(query.payload).and_then(|company| {
            self.repo.insert(deadline, &company).map(|()| company)
        });
        finish_call("company_add", &query.trace_id, started_at, result)
    }

    pub fn get<E>(
        &self,
        deadline: &Deadline,
        query: &GetCompaniesQuery,
        visit: impl FnMut(Company) -> Result<(), E>,
    ) -> Result<QueryOutcome, StreamError<ManagerError, E>> {
        let filter = match query.to_filter() {
            Ok(filter) => filter,
            Err(err) => return reject_get("company_get", &query.trace_id, err),
        };
        let started_at = Instant::now();
        let result = self.repo.query(deadline, &filter, visit);
        finish_get("company_get", &query.trace_id, started_at, result)
    }
}

fn build_company(payload: NewCompany) -> Result<Company, RepoError> {
    let categories = payload
        .categories
        .iter()
        .map(|name| CategoryPath::parse(name))
        .collect::<Result<Vec<_>, _>>()?;
    let phone_numbers = payload
        .phone_numbers
        .into_iter()
        .map(|phone| phone.trim().to_string())
        .collect();
    Ok(Company::new(payload.name.trim(), categories).with_phone_numbers(phone_numbers))
}
