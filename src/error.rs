//! Error types for perfx
//!
//! One error type flows through the store, the coordinator and the router,
//! so a single mapping turns any failure into an HTTP status.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// perfx error types
#[derive(Error, Debug)]
pub enum Error {
    /// No run with this id exists (never issued, or the store was cleared)
    #[error("Run not found: {0}")]
    NotFound(String),

    /// Caller contract violation, e.g. results without `generatedTime`
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The audit engine rejected the run
    #[error("Audit failed: {0}")]
    AuditFailed(String),

    /// Unexpected failure inside the host (task panics, poisoned state)
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a `NotFound` for a run id.
    #[must_use]
    pub fn run_not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("no run with id '{id}'"))
    }

    /// Whether the error describes a missing or unusable run reference
    /// rather than a failure of the host itself.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidInput(_))
    }
}
