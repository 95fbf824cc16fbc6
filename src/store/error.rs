use thiserror::Error;

/// Failures surfaced by the study store. `NotFound` and `Unauthorized`
/// are kept separate internally but receive identical treatment at the
/// HTTP boundary so callers cannot probe for rows they do not own.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("store failure: {0}")]
    Store(#[from] sqlx::Error),
}

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }
}
