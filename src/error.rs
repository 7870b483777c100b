use thiserror::Error;

/// Failures of the search infrastructure.
///
/// Callers on the serving path should treat these as best-effort: log the
/// error and degrade to an empty result set rather than failing the request.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("document {0} has an invalid identifier")]
    InvalidDocumentId(i32),

    #[error("search index unavailable: {0}")]
    IndexUnavailable(String),
}

impl From<tantivy::TantivyError> for SearchError {
    fn from(err: tantivy::TantivyError) -> Self {
        SearchError::IndexUnavailable(err.to_string())
    }
}

/// Persistence failures surfaced by a [`CommunityStore`](crate::storage::CommunityStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Failures of the report-resolution workflow.
///
/// Validation errors are rejected before any mutation. Store errors abort the
/// remaining steps and carry the underlying message to the caller.
#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("{0}")]
    Validation(String),

    #[error("no owning user found for the reported content")]
    TargetNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}
