//! Domain model for buildings, categories and companies.
//!
//! # Responsibility
//! - Define the records persisted by the repositories.
//! - Validate records before any storage call.
//!
//! # Invariants
//! - Every persisted record has a non-nil id and `created_at > 0`.
//! - Records are immutable after insert; no update path exists.

pub mod building;
pub mod category;
pub mod company;
mod validation;

pub use building::Building;
pub use category::{Category, CategoryPath};
pub use company::Company;
pub use validation::ValidationError;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in seconds. Returns 0 when the clock predates the epoch,
/// which validation then rejects.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}

pub(crate) fn ensure_created_at(created_at: i64) -> Result<(), ValidationError> {
    if created_at <= 0 {
        return Err(ValidationError::NotPositive {
            field: "created_at",
            value: created_at,
        });
    }
    Ok(())
}
