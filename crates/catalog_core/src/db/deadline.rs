use super::{DbError, DbResult};
use std::time::{Duration, Instant};

/// Cancellation token passed unchanged from managers down to the client.
///
/// `Deadline::none()` never expires. The client checks the deadline before
/// each statement and streaming reads check it before each row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn none() -> Self {
        Self { at: None }
    }

    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(timeout),
        }
    }

    pub fn at(instant: Instant) -> Self {
        Self { at: Some(instant) }
    }

    /// Time left before expiry. `None` means unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    pub fn check(&self) -> DbResult<()> {
        if self.is_expired() {
            return Err(DbError::DeadlineExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Deadline;
    use crate::db::DbError;
    use std::time::{Duration, Instant};

    #[test]
    fn none_never_expires() {
        let deadline = Deadline::none();
        assert!(!deadline.is_expired());
        assert!(deadline.remaining().is_none());
        assert!(deadline.check().is_ok());
    }

    #[test]
    fn past_instant_is_expired() {
        let deadline = Deadline::at(Instant::now() - Duration::from_millis(5));
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Some(Duration::ZERO));
        assert!(matches!(deadline.check(), Err(DbError::DeadlineExceeded)));
    }

    #[test]
    fn generous_timeout_is_live() {
        let deadline = Deadline::after(Duration::from_secs(60));
        assert!(!deadline.is_expired());
        assert!(deadline.remaining().unwrap() > Duration::from_secs(30));
    }
}
