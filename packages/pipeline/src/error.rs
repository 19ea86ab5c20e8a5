//! Pipeline error taxonomy.
//!
//! The worker never exits on a job failure; it needs to know whether to
//! retry. `is_retryable` is the single source of that decision: database
//! connection trouble and transient analysis errors retry, everything else
//! (validation, integrity violations, malformed jobs) is permanent.

use thiserror::Error;

use analysis::AnalysisError;

/// Errors surfaced by the core pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or invalid configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Incoming data violates an invariant. Never reaches the database.
    #[error("validation error: {0}")]
    Validation(String),

    /// Database failure; retryability depends on the underlying kind.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Document analysis failure; retryability delegated to the source.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// A job referenced a meeting that no longer exists.
    #[error("meeting not found: {0}")]
    MissingMeeting(String),

    /// A queue row could not be decoded. Failed without retry.
    #[error("malformed job {id}: {reason}")]
    MalformedJob { id: i64, reason: String },
}

impl PipelineError {
    /// Whether the failing operation is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Config(_) => false,
            PipelineError::Validation(_) => false,
            PipelineError::Database(e) => database_error_is_retryable(e),
            PipelineError::Analysis(e) => e.is_retryable(),
            PipelineError::MissingMeeting(_) => false,
            PipelineError::MalformedJob { .. } => false,
        }
    }
}

/// Connection-level failures are transient; anything the server itself
/// rejected (constraint violations, bad SQL) indicates a caller bug.
fn database_error_is_retryable(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Protocol(_)
            | sqlx::Error::WorkerCrashed
    )
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
