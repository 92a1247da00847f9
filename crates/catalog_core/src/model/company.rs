//! Company model.
//!
//! # Invariants
//! - A company references at least one category path, each at most once.
//! - References are resolved against existing categories at insert time.

use super::{ensure_created_at, unix_now, CategoryPath, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

pub type CompanyId = Uuid;

/// Persisted company record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    #[serde(default)]
    pub phone_numbers: Vec<String>,
    /// Category references in caller order.
    pub categories: Vec<CategoryPath>,
    /// Unix seconds.
    pub created_at: i64,
}

impl Company {
    /// Creates a company with a fresh id and the current timestamp.
    pub fn new(name: impl Into<String>, categories: Vec<CategoryPath>) -> Self {
        Self::with_id(Uuid::new_v4(), name, categories, unix_now())
    }

    pub fn with_id(
        id: CompanyId,
        name: impl Into<String>,
        categories: Vec<CategoryPath>,
        created_at: i64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            phone_numbers: Vec::new(),
            categories,
            created_at,
        }
    }

    pub fn with_phone_numbers(mut self, phone_numbers: Vec<String>) -> Self {
        self.phone_numbers = phone_numbers;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() {
            return Err(ValidationError::Empty("id"));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::Empty("name"));
        }
        if self.categories.is_empty() {
            return Err(ValidationError::Empty("categories"));
        }
        let mut seen = HashSet::new();
        for category in &self.categories {
            if !seen.insert(category) {
                return Err(ValidationError::Repeated {
                    field: "categories",
                    value: category.to_string(),
                });
            }
        }
        if self.phone_numbers.iter().any(|phone| phone.trim().is_empty()) {
            return Err(ValidationError::Empty("phone_numbers"));
        }
        ensure_created_at(self.created_at)
    }
}
