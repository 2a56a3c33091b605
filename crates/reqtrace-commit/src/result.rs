//! Commit results

use crate::notify::{CommitNotification, EntityAction, EntityChange};
use reqtrace_model::{EntityId, EntityKindTag, ValidationIssue, VersionId, VersionUid};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-entity validation error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityError {
    pub kind: EntityKindTag,
    /// Business key as submitted
    pub key: String,
    pub issue: ValidationIssue,
}

impl fmt::Display for EntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}': {}", self.kind, self.key, self.issue)
    }
}

/// Entity written by the commit, with its assigned identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedEntity {
    pub entity_id: EntityId,
    pub key: String,
}

/// Applied changes of one kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedChanges {
    pub added: Vec<AppliedEntity>,
    pub modified: Vec<AppliedEntity>,
    pub removed: Vec<AppliedEntity>,
    /// Entities copied forward unchanged
    pub carried: usize,
}

impl AppliedChanges {
    /// Number of added, modified and removed entities
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn changes(&self, kind: EntityKindTag) -> impl Iterator<Item = EntityChange> + '_ {
        [
            (EntityAction::Add, &self.added),
            (EntityAction::Update, &self.modified),
            (EntityAction::Delete, &self.removed),
        ]
        .into_iter()
        .filter(|(_, entities)| !entities.is_empty())
        .map(move |(action, entities)| EntityChange {
            kind,
            action,
            keys: entities.iter().map(|e| e.key.clone()).collect(),
        })
    }
}

/// How the commit ended
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommitOutcome {
    /// Every step completed
    #[default]
    Committed,
    /// Revisions persisted, but a best-effort step failed
    Degraded { reason: String },
    /// `fail_on_error` halted the pipeline; nothing persisted
    Aborted,
}

/// Output of one commit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResult {
    pub version_uid: VersionUid,
    pub version_id: VersionId,
    pub artifacts: AppliedChanges,
    pub traces: AppliedChanges,
    pub artifact_errors: Vec<EntityError>,
    pub trace_errors: Vec<EntityError>,
    /// Trace links written as non-visible
    pub suppressed: Vec<String>,
    pub fail_on_error: bool,
    pub outcome: CommitOutcome,
    pub notification: Option<CommitNotification>,
}

impl CommitResult {
    #[must_use]
    pub fn new(version_uid: VersionUid, version_id: VersionId, fail_on_error: bool) -> Self {
        Self {
            version_uid,
            version_id,
            artifacts: AppliedChanges::default(),
            traces: AppliedChanges::default(),
            artifact_errors: Vec::new(),
            trace_errors: Vec::new(),
            suppressed: Vec::new(),
            fail_on_error,
            outcome: CommitOutcome::Committed,
            notification: None,
        }
    }

    /// Record a validation error
    pub fn record_error(
        &mut self,
        kind: EntityKindTag,
        key: impl Into<String>,
        issue: ValidationIssue,
    ) {
        let error = EntityError {
            kind,
            key: key.into(),
            issue,
        };
        tracing::debug!("Rejected {}", error);
        match kind {
            EntityKindTag::Artifact => self.artifact_errors.push(error),
            EntityKindTag::Trace => self.trace_errors.push(error),
        }
    }

    /// Artifact and trace errors, artifacts first
    pub fn errors(&self) -> impl Iterator<Item = &EntityError> {
        self.artifact_errors.iter().chain(&self.trace_errors)
    }

    #[inline]
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.artifact_errors.len() + self.trace_errors.len()
    }

    #[inline]
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Number of added, modified and removed entities of both kinds
    #[inline]
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.artifacts.len() + self.traces.len()
    }

    #[inline]
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.outcome == CommitOutcome::Aborted
    }

    /// Note a best-effort failure; reasons accumulate
    pub fn degrade(&mut self, step: &str, reason: impl fmt::Display) {
        let reason = format!("{step}: {reason}");
        self.outcome = match std::mem::take(&mut self.outcome) {
            CommitOutcome::Degraded { reason: earlier } => CommitOutcome::Degraded {
                reason: format!("{earlier}; {reason}"),
            },
            _ => CommitOutcome::Degraded { reason },
        };
    }

    /// Drop applied changes and mark the commit aborted; errors are kept
    pub fn abort(&mut self) {
        self.artifacts = AppliedChanges::default();
        self.traces = AppliedChanges::default();
        self.suppressed.clear();
        self.outcome = CommitOutcome::Aborted;
    }

    /// Notification payload summarizing applied changes
    #[must_use]
    pub fn to_notification(&self) -> CommitNotification {
        let changes = self
            .artifacts
            .changes(EntityKindTag::Artifact)
            .chain(self.traces.changes(EntityKindTag::Trace))
            .collect();
        CommitNotification {
            version_uid: self.version_uid,
            version_id: self.version_id,
            changes,
        }
    }
}
