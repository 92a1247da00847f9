//! Category model and hierarchical path type.
//!
//! # Responsibility
//! - Represent category names as dot-separated label paths (`root.child`).
//! - Derive the index range that holds a path's descendants.
//!
//! # Invariants
//! - A `CategoryPath` is never empty and never has empty labels.
//! - Labels contain only ASCII letters, digits, `_` and `-`.

use super::{ensure_created_at, unix_now, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type CategoryId = Uuid;

const MAX_LABEL_CHARS: usize = 256;

static LABEL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("label pattern is valid"));

/// Materialized category path, e.g. `food.cafe.coffee`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CategoryPath(String);

impl CategoryPath {
    pub const SEPARATOR: char = '.';

    /// Parses and validates a path. Surrounding whitespace is trimmed.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty("name"));
        }
        for label in trimmed.split(Self::SEPARATOR) {
            let reason = if label.is_empty() {
                Some("empty label")
            } else if label.chars().count() > MAX_LABEL_CHARS {
                Some("label longer than 256 characters")
            } else if !LABEL_PATTERN.is_match(label) {
                Some("labels may only contain letters, digits, `_` and `-`")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(ValidationError::InvalidPath {
                    path: trimmed.to_string(),
                    reason,
                });
            }
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Half-open byte range `[self., self/)` holding every strict descendant.
    ///
    /// `/` directly follows `.` in byte order, so the range is exactly the set
    /// of strings prefixed by `self.` and can be served by a B-tree index.
    pub(crate) fn descendant_bounds(&self) -> (String, String) {
        (format!("{}.", self.0), format!("{}/", self.0))
    }
}

impl Display for CategoryPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CategoryPath {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CategoryPath> for String {
    fn from(value: CategoryPath) -> Self {
        value.0
    }
}

/// Persisted category record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: CategoryPath,
    /// Unix seconds.
    pub created_at: i64,
}

impl Category {
    /// Creates a category with a fresh id and the current timestamp.
    pub fn new(name: CategoryPath) -> Self {
        Self::with_id(Uuid::new_v4(), name, unix_now())
    }

    pub fn with_id(id: CategoryId, name: CategoryPath, created_at: i64) -> Self {
        Self {
            id,
            name,
            created_at,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() {
            return Err(ValidationError::Empty("id"));
        }
        ensure_created_at(self.created_at)
    }
}
