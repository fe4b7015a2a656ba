//! Error types for subledger

use std::time::Duration;
use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Operation name used before an error is attributed to a store operation.
pub(crate) const UNSCOPED: &str = "query";

/// Error taxonomy surfaced by every store operation.
///
/// Driver and pool errors are translated into these variants at the client boundary,
/// so no `tokio_postgres` type ever reaches the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed or missing arguments (caller's fault, not retryable)
    #[error("{op}: invalid {field}: {message}")]
    BadInput {
        op: &'static str,
        field: &'static str,
        message: String,
    },

    /// The operation targeted zero existing rows
    #[error("{op}: not found: {message}")]
    NotFound { op: &'static str, message: String },

    /// Upsert produced no effective row, or a uniqueness violation outside the upsert path
    #[error("{op}: conflict: {message}")]
    Conflict { op: &'static str, message: String },

    /// Connectivity, pool, driver, decode or unexpected constraint errors
    #[error("{op}: storage failure: {message}")]
    StorageFailure { op: &'static str, message: String },

    /// The caller cancelled the call, or the server cancelled the statement
    #[error("{op}: cancelled")]
    Cancelled { op: &'static str },

    /// The call exceeded its deadline
    #[error("{op}: timeout after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Unreadable or invalid configuration
    #[error("Config error: {0}")]
    Config(String),
}

impl StoreError {
    /// Create a bad input error for a specific field
    pub fn bad_input(op: &'static str, field: &'static str, message: impl Into<String>) -> Self {
        Self::BadInput {
            op,
            field,
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(op: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            op,
            message: message.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(op: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            op,
            message: message.into(),
        }
    }

    /// Create a storage failure
    pub fn storage(op: &'static str, message: impl Into<String>) -> Self {
        Self::StorageFailure {
            op,
            message: message.into(),
        }
    }

    /// Attribute this error to a store operation.
    ///
    /// Errors produced by the client layer carry a generic operation name; the store
    /// re-tags them so the message names the operation the caller invoked.
    pub fn in_op(self, op: &'static str) -> Self {
        match self {
            Self::BadInput { field, message, .. } => Self::BadInput { op, field, message },
            Self::NotFound { message, .. } => Self::NotFound { op, message },
            Self::Conflict { message, .. } => Self::Conflict { op, message },
            Self::StorageFailure { message, .. } => Self::StorageFailure { op, message },
            Self::Cancelled { .. } => Self::Cancelled { op },
            Self::Timeout { after, .. } => Self::Timeout { op, after },
            other @ (Self::Migration(_) | Self::Config(_)) => other,
        }
    }

    /// The operation this error is attributed to, if any.
    pub fn op(&self) -> Option<&'static str> {
        match self {
            Self::BadInput { op, .. }
            | Self::NotFound { op, .. }
            | Self::Conflict { op, .. }
            | Self::StorageFailure { op, .. }
            | Self::Cancelled { op }
            | Self::Timeout { op, .. } => Some(op),
            Self::Migration(_) | Self::Config(_) => None,
        }
    }

    /// Check if this is a bad input error
    pub fn is_bad_input(&self) -> bool {
        matches!(self, Self::BadInput { .. })
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a conflict error
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Whether a caller-side retry policy may reasonably retry this error.
    ///
    /// The store itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageFailure { .. } | Self::Timeout { .. })
    }

    /// Translate a tokio_postgres error into the store taxonomy
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            return match db_err.code().code() {
                "23505" => Self::conflict(UNSCOPED, format!("{constraint}: {message}")),
                "57014" => Self::Cancelled { op: UNSCOPED },
                code if code.starts_with("23") => {
                    Self::storage(UNSCOPED, format!("constraint {constraint} ({code}): {message}"))
                }
                code => Self::storage(UNSCOPED, format!("{code}: {message}")),
            };
        }
        Self::storage(UNSCOPED, err.to_string())
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        match err {
            deadpool_postgres::PoolError::Backend(e) => Self::from_db_error(e),
            other => Self::storage(UNSCOPED, format!("pool: {other}")),
        }
    }
}

#[cfg(feature = "migrate")]
impl From<refinery::Error> for StoreError {
    fn from(err: refinery::Error) -> Self {
        Self::Migration(err.to_string())
    }
}
