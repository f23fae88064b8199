use thiserror::Error;

/// Failures a refresh cycle can run into.
///
/// Abort-class: `SourceUnavailable`, `MalformedIdentity`, `EmptyBatch` stop the cycle before
/// anything leaves the process. Downstream-class: the publish / notify variants are recorded
/// per target and never abort siblings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("identity source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("malformed identity '{id}': {reason}")]
    MalformedIdentity { id: String, reason: String },

    #[error("identity batch is empty, no tokens generated")]
    EmptyBatch,

    #[error("publish conflict: revision {revision:?} is stale")]
    PublishConflict { revision: Option<String> },

    #[error("content store unreachable: {0}")]
    PublishUnreachable(String),

    #[error("content store rejected credentials (status {0})")]
    Unauthorized(u16),

    #[error("notification channel unreachable: {0}")]
    NotifyUnreachable(String),

    #[error("token cache io: {0}")]
    CacheIo(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),
}

impl RelayError {
    /// Errors that end a cycle before publish / notify.
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            RelayError::SourceUnavailable(_)
                | RelayError::MalformedIdentity { .. }
                | RelayError::EmptyBatch
        )
    }
}

pub type RelayResult<T> = std::result::Result<T, RelayError>;
