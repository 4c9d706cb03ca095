//! Error types for the registry-store crate.
//!
//! All storage operations return [`StoreError`] via [`StoreResult`].
//! Field-contract failures from the registry are carried separately as
//! [`ValidationError`] so callers can tell a rejected record from a
//! database fault.

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The requested record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An invalid argument was provided to a store operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A user record did not satisfy its entity type's field contract.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The database handle was used after [`Database::close`](crate::Database::close).
    #[error("database connection is closed")]
    Closed,

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    TaskJoin(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}

/// Why a user record was rejected by [`Registry::add_user`](crate::Registry::add_user).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required or type-specific field was not supplied.
    #[error("missing field: {0}")]
    MissingField(String),

    /// A field was supplied that the entity type does not allow.
    #[error("field not allowed for this entity type: {0}")]
    DisallowedField(String),

    /// The `type` field did not hold a whole number.
    #[error("type must be an integer, got {0}")]
    InvalidType(String),
}
