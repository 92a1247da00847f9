//! Category use-case manager.

use super::{finish_call, finish_get, parse_payload, reject_get, ManagerError, TraceId};
use crate::db::Deadline;
use crate::model::category::CategoryId;
use crate::model::{Category, CategoryPath, ValidationError};
use crate::repo::{CategoryFilter, CategoryRepository};
use crate::stream::{Limit, QueryOutcome, StreamError, TimeRange};
use serde::Deserialize;
use std::time::Instant;

/// Creation payload for one category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewCategory {
    /// Dot-separated path, e.g. `food.cafe`.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddCategoryQuery {
    pub trace_id: TraceId,
    pub payload: NewCategory,
}

impl AddCategoryQuery {
    pub fn from_json(trace_id: TraceId, body: &[u8]) -> Result<Self, ManagerError> {
        let payload = parse_payload(&trace_id, body)?;
        Ok(Self { trace_id, payload })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetCategoriesQuery {
    pub trace_id: TraceId,
    pub id: Option<CategoryId>,
    /// Exact path.
    pub name: Option<String>,
    /// Subtree anchor, inclusive.
    pub under: Option<String>,
    pub from_date: Option<i64>,
    pub to_date: Option<i64>,
    pub limit: Option<i64>,
}

impl GetCategoriesQuery {
    pub fn new(trace_id: TraceId) -> Self {
        Self {
            trace_id,
            id: None,
            name: None,
            under: None,
            from_date: None,
            to_date: None,
            limit: None,
        }
    }

    fn to_filter(&self) -> Result<CategoryFilter, ValidationError> {
        Ok(CategoryFilter {
            id: self.id,
            name: self.name.as_deref().map(CategoryPath::parse).transpose()?,
            under: self.under.as_deref().map(CategoryPath::parse).transpose()?,
            created: TimeRange::new(self.from_date, self.to_date),
            limit: Limit::normalize(self.limit),
        })
    }
}

/// Use-case service wrapper for category operations.
pub struct CategoryManager<R: CategoryRepository> {
    repo: R,
}

impl<R: CategoryRepository> CategoryManager<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Validates the path, then persists a category with a fresh id.
    ///
    /// Path errors are reported before any storage call.
    pub fn add(
        &self,
        deadline: &Deadline,
        query: AddCategoryQuery,
    ) -> Result<Category, ManagerError> {
        let started_at = Instant::now();
        let result = CategoryPath::parse(&query.payload.name)
            .map_err(Into::into)
            .and_then(|name| {
                let category = Category::new(name);
                self.repo.insert(deadline, &category).map(|()| category)
            });
        finish_call("category_add", &query.trace_id, started_at, result)
    }

    pub fn get<E>(
        &self,
        deadline: &Deadline,
        query: &GetCategoriesQuery,
        visit: impl FnMut(Category) -> Result<(), E>,
    ) -> Result<QueryOutcome, StreamError<ManagerError, E>> {
        let filter = match query.to_filter() {
            Ok(filter) => filter,
            Err(err) => return reject_get("category_get", &query.trace_id, err),
        };
        let started_at = Instant::now();
        let result = self.repo.query(deadline, &filter, visit);
        finish_get("category_get", &query.trace_id, started_at, result)
    }

    /// Reports whether no category exists yet.
    pub fn is_empty(&self, deadline: &Deadline, trace_id: &TraceId) -> Result<bool, ManagerError> {
        let started_at = Instant::now();
        let result = self.repo.is_empty(deadline);
        finish_call("category_is_empty", trace_id, started_at, result)
    }
}
