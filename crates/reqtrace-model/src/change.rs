//! Change sets
//!
//! A [`ChangeSet`] is the caller-supplied input of one commit: which artifacts
//! and trace links to add, update or remove. It says nothing about entities
//! it does not mention; those are carried forward by the pipeline.

use crate::entity::{ArtifactKind, ArtifactRecord, EntityKind, TraceKind, TraceLink};
use crate::key::{ArtifactKey, TraceKey};
use serde::{Deserialize, Serialize};

/// Changes for one entity kind
#[derive(Serialize, Deserialize)]
#[serde(bound = "", default)]
pub struct EntityChanges<K: EntityKind> {
    pub added: Vec<K::Attributes>,
    pub modified: Vec<K::Attributes>,
    pub removed: Vec<K::Key>,
}

impl<K: EntityKind> EntityChanges<K> {
    /// Check whether nothing is requested
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// Total number of requested changes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }
}

impl<K: EntityKind> Default for EntityChanges<K> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            modified: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<K: EntityKind> Clone for EntityChanges<K> {
    fn clone(&self) -> Self {
        Self {
            added: self.added.clone(),
            modified: self.modified.clone(),
            removed: self.removed.clone(),
        }
    }
}

impl<K: EntityKind> std::fmt::Debug for EntityChanges<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityChanges")
            .field("added", &self.added)
            .field("modified", &self.modified)
            .field("removed", &self.removed)
            .finish()
    }
}

/// Commit definition
///
/// # Example
/// ```rust
/// use reqtrace_model::{ArtifactRecord, ChangeSet, TraceLink};
///
/// let changes = ChangeSet::new("alice")
///     .add_artifact(ArtifactRecord::new("REQ-1", "requirement", "The system shall..."))
///     .add_trace(TraceLink::manual("REQ-1", "DES-1"))
///     .fail_on_error(true);
/// assert_eq!(changes.len(), 2);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeSet {
    pub actor: String,
    pub artifacts: EntityChanges<ArtifactKind>,
    pub traces: EntityChanges<TraceKind>,
    pub fail_on_error: bool,
}

impl ChangeSet {
    #[must_use]
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn add_artifact(mut self, artifact: ArtifactRecord) -> Self {
        self.artifacts.added.push(artifact);
        self
    }

    #[must_use]
    pub fn update_artifact(mut self, artifact: ArtifactRecord) -> Self {
        self.artifacts.modified.push(artifact);
        self
    }

    #[must_use]
    pub fn remove_artifact(mut self, key: ArtifactKey) -> Self {
        self.artifacts.removed.push(key);
        self
    }

    #[must_use]
    pub fn add_trace(mut self, trace: TraceLink) -> Self {
        self.traces.added.push(trace);
        self
    }

    /// Add a `(source, target, score)` triple from the scoring collaborator
    #[must_use]
    pub fn add_generated_trace(
        self,
        source: impl Into<String>,
        target: impl Into<String>,
        score: f64,
    ) -> Self {
        self.add_trace(TraceLink::generated(source, target, score))
    }

    #[must_use]
    pub fn update_trace(mut self, trace: TraceLink) -> Self {
        self.traces.modified.push(trace);
        self
    }

    #[must_use]
    pub fn remove_trace(mut self, key: TraceKey) -> Self {
        self.traces.removed.push(key);
        self
    }

    #[must_use]
    pub fn fail_on_error(mut self, fail: bool) -> Self {
        self.fail_on_error = fail;
        self
    }

    /// Check whether nothing is requested
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty() && self.traces.is_empty()
    }

    /// Total number of requested changes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len() + self.traces.len()
    }
}
