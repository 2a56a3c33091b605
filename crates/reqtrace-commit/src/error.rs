//! Commit errors

use crate::notify::NotifyError;
use reqtrace_model::VersionId;
use reqtrace_store::StoreError;

/// Errors that stop a commit
///
/// Per-entity validation problems are not errors; they are collected in the
/// [`CommitResult`](crate::CommitResult).
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Destination is not the project's current version
    #[error("version {destination} is not the current version (current: {current:?})")]
    NotCurrent {
        destination: VersionId,
        current: Option<VersionId>,
    },

    /// Notification collaborator rejected the payload
    #[error("notification failed: {0}")]
    Notification(#[from] NotifyError),
}

impl CommitError {
    /// Check if the commit may succeed when retried
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(err) => err.is_retryable(),
            Self::NotCurrent { .. } | Self::Notification(_) => false,
        }
    }
}
