//! Errors surfaced by the form store and the publish/submit pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormStoreError {
    #[error("Form not found: {0}")]
    FormNotFound(String),

    #[error("Form Version not found: {0}")]
    VersionNotFound(String),

    #[error("Form of the same slug exists: {0}")]
    SlugTaken(String),

    #[error("Invalid slug: {0}")]
    InvalidSlug(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// A publish could not acquire the per-form version lease in time.
    /// Retryable by the caller.
    #[error("Timed out waiting for version lease on form {0}")]
    LeaseTimeout(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
