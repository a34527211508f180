use gifavatar_common::{SubmissionStatus, UrlError};
use uuid::Uuid;

/// Result type alias for verifier operations.
pub type Result<T> = std::result::Result<T, VerifyError>;

/// Persistence failures. Returned by every `SubmissionRepository` implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique index on the post key refused the insert: the post is claimed, or
    /// this user already has a record for it. Carries the post key.
    #[error("Post already submitted: {0}")]
    PostClaimed(String),

    #[error("Submission {0} was modified since it was read")]
    StaleWrite(Uuid),

    #[error("Submission not found: {0}")]
    NotFound(Uuid),

    #[error("Corrupt submission row: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Errors surfaced to callers of the orchestrator.
///
/// Fetch and keyword outcomes are never errors; they are recorded on the submission.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error(transparent)]
    InvalidUrlFormat(#[from] UrlError),

    #[error("Submission not found: {0}")]
    NotFound(Uuid),

    #[error("Cannot {operation} submission {id} while it is {status}")]
    InvalidTransition {
        id: Uuid,
        status: SubmissionStatus,
        operation: &'static str,
    },

    #[error("Submission {id} is {status} and cannot be rescanned")]
    NotRetryable { id: Uuid, status: SubmissionStatus },

    #[error("Submission {id} reached the rescan limit ({limit})")]
    RescanLimitReached { id: Uuid, limit: i32 },

    #[error("Another verification of submission {0} finished first")]
    ConcurrentAttempt(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}
