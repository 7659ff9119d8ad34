use thiserror::Error;

use crate::history::TrimError;

/// Errors that can occur while serving a conversation turn.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Malformed history: {0}")]
    MalformedHistory(String),

    #[error("Trimming infeasible: {0}")]
    TrimmingInfeasible(#[from] TrimError),

    #[error("Remote model unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Snapshot unavailable for thread {0}")]
    SnapshotUnavailable(String),
}

impl ConversationError {
    pub(crate) fn malformed(err: impl std::fmt::Display) -> Self {
        Self::MalformedHistory(err.to_string())
    }

    pub(crate) fn remote(err: &anyhow::Error) -> Self {
        Self::RemoteUnavailable(format!("{err:#}"))
    }
}
