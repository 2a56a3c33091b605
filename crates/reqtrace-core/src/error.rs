//! Engine errors

use reqtrace_commit::CommitError;
use reqtrace_store::StoreError;
use std::path::PathBuf;

/// Errors raised by [`TraceEngine`](crate::TraceEngine)
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Commit pipeline failure
    #[error(transparent)]
    Commit(#[from] CommitError),

    /// Another writer holds the project
    #[error("project {project} is busy: {holder} in progress")]
    Conflict {
        project: String,
        holder: &'static str,
    },

    /// No project with this name
    #[error("unknown project '{0}'")]
    UnknownProject(String),

    /// Configuration could not be parsed or is out of range
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// Check if the operation may succeed when retried
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Conflict { .. } => true,
            Self::Store(err) => err.is_retryable(),
            Self::Commit(err) => err.is_retryable(),
            Self::UnknownProject(_) | Self::Config(_) | Self::Io { .. } => false,
        }
    }

    /// Check if a project or version was missing
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::UnknownProject(_) => true,
            Self::Store(err) | Self::Commit(CommitError::Store(err)) => err.is_not_found(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqtrace_model::{ProjectId, VersionId};

    #[test]
    fn guard_conflict_is_retryable() {
        let err = EngineError::Conflict {
            project: "p".into(),
            holder: "commit",
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("busy"));
    }

    #[test]
    fn store_conflict_stays_retryable_through_commit() {
        let err = EngineError::from(CommitError::Store(StoreError::Conflict {
            project: ProjectId::new(),
            expected: Some(VersionId::new(1, 0, 0)),
            actual: Some(VersionId::new(1, 0, 1)),
        }));
        assert!(err.is_retryable());
    }

    #[test]
    fn not_found_sees_through_wrappers() {
        assert!(EngineError::UnknownProject("x".into()).is_not_found());
        assert!(
            EngineError::from(CommitError::Store(StoreError::VersionNotFound("1.0.0".into())))
                .is_not_found()
        );
        assert!(!EngineError::Config("bad".into()).is_not_found());
    }
}
