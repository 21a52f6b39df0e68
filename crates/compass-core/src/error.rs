//! Error types for Cause Compass.

use thiserror::Error;

/// Result type alias using Cause Compass's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Cause Compass operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Input or stored data fails declared shape/enum constraints.
    /// Writes carrying invalid data are rejected whole; never partially applied.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found. Only used where the entity is required;
    /// absent preferences/likes are modeled as empty defaults, not errors.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Organization not found in the catalog
    #[error("Organization not found: {0}")]
    OrganizationNotFound(uuid::Uuid),

    /// Uniqueness conflict (e.g., catalog insert with an existing EIN)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Validation(e.to_string())
    }
}

impl Error {
    /// Whether the error represents a transient store failure the caller can retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Database(
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            )
        )
    }
}
