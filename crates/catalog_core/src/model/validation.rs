/// Reasons an entity or query is rejected before or by storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("`{0}` is empty")]
    Empty(&'static str),
    #[error("`{field}` must be positive, got {value}")]
    NotPositive { field: &'static str, value: i64 },
    #[error("invalid category path `{path}`: {reason}")]
    InvalidPath { path: String, reason: &'static str },
    #[error("`{field}` repeats `{value}`")]
    Repeated { field: &'static str, value: String },
    #[error("invalid payload: {0}")]
    Payload(String),
    #[error("statement rejected by storage engine")]
    Rejected,
}
