//! Building model.

use super::{ensure_created_at, unix_now, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type BuildingId = Uuid;

/// Persisted building record. Buildings reference no other entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub address: String,
    /// Unix seconds.
    pub created_at: i64,
}

impl Building {
    /// Creates a building with a fresh id and the current timestamp.
    pub fn new(address: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), address, unix_now())
    }

    pub fn with_id(id: BuildingId, address: impl Into<String>, created_at: i64) -> Self {
        Self {
            id,
            address: address.into(),
            created_at,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() {
            return Err(ValidationError::Empty("id"));
        }
        if self.address.trim().is_empty() {
            return Err(ValidationError::Empty("address"));
        }
        ensure_created_at(self.created_at)
    }
}
