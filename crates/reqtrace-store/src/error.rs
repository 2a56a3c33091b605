//! Storage errors

use reqtrace_model::{Bump, EntityKindTag, ProjectId, ValidationIssue, VersionId};

/// Errors raised by the storage collaborator and the components over it
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Project does not exist
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    /// Project name already taken
    #[error("project '{0}' already exists")]
    ProjectExists(String),

    /// Version does not exist
    #[error("version not found: {0}")]
    VersionNotFound(String),

    /// Concurrent version allocation lost the compare-and-swap
    #[error("version conflict in {project}: expected current {expected:?}, found {actual:?}")]
    Conflict {
        project: ProjectId,
        expected: Option<VersionId>,
        actual: Option<VersionId>,
    },

    /// The bumped version component is already at its maximum
    #[error("cannot bump {bump:?} past {current} in project {project}")]
    VersionExhausted {
        project: ProjectId,
        current: VersionId,
        bump: Bump,
    },

    /// A revision for this entity or key already exists in the version
    #[error("duplicate {kind} revision '{key}' in version {version}")]
    DuplicateRevision {
        kind: EntityKindTag,
        key: String,
        version: VersionId,
    },

    /// Attributes cannot be recorded
    #[error("invalid attributes: {0}")]
    Invalid(#[from] ValidationIssue),

    /// Two versions from different projects were combined
    #[error("versions {0} and {1} belong to different projects")]
    ProjectMismatch(VersionId, VersionId),

    /// Snapshot could not be encoded or decoded
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl StoreError {
    /// Check if the operation may succeed when retried
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Check if a project or version was missing
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ProjectNotFound(_) | Self::VersionNotFound(_))
    }
}
