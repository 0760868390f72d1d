// Error taxonomy for the vote core
// Callers branch on the variant, never on the message text.

use thiserror::Error;

/// Failures raised by a [`KeyValueStore`](crate::store::KeyValueStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("write contention on {key} after {attempts} attempts")]
    Contention { key: String, attempts: usize },
}

/// Everything a vote operation can fail with.
#[derive(Debug, Error)]
pub enum VoteError {
    /// Bad input shape: username format, missing fields, unknown entry.
    #[error("{0}")]
    Validation(String),

    #[error("{username} has already voted")]
    DuplicateVote { username: String },

    #[error("vote {vote_id} not found")]
    NotFound { vote_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl VoteError {
    pub fn validation(message: impl Into<String>) -> Self {
        VoteError::Validation(message.into())
    }

    /// Short machine-readable kind, used in logs and API payloads
    pub fn kind(&self) -> &'static str {
        match self {
            VoteError::Validation(_) => "ValidationError",
            VoteError::DuplicateVote { .. } => "DuplicateVoteError",
            VoteError::NotFound { .. } => "NotFoundError",
            VoteError::Store(_) => "StoreError",
        }
    }
}

pub type Result<T, E = VoteError> = std::result::Result<T, E>;
