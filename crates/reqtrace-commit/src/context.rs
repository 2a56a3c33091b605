//! Commit context
//!
//! Request-scoped state threaded through every [`CommitStep`]: the prior
//! snapshot, the working set of entities bound for the destination, lookup
//! caches and the running [`CommitResult`].
//!
//! [`CommitStep`]: crate::CommitStep

use crate::error::CommitError;
use crate::notify::NotificationSink;
use crate::pipeline::PipelineConfig;
use crate::result::CommitResult;
use reqtrace_model::{
    ApprovalStatus, ArtifactKey, ArtifactKind, ChangeSet, EntityId, EntityKind, Project,
    Snapshot, TraceKey, TraceKind, TraceLink, Version,
};
use reqtrace_store::{EntityVersioningStore, Storage, VersionLineage};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Why an entity is in the working set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Added,
    Modified,
    Carried,
}

/// Entity bound for the destination version
pub struct Pending<K: EntityKind> {
    /// `None` until an added entity is assigned an identity
    pub entity_id: Option<EntityId>,
    pub attributes: K::Attributes,
    pub origin: Origin,
}

impl<K: EntityKind> Pending<K> {
    #[must_use]
    pub fn new(entity_id: Option<EntityId>, attributes: K::Attributes, origin: Origin) -> Self {
        Self {
            entity_id,
            attributes,
            origin,
        }
    }

    /// Check whether the caller submitted this entity
    #[inline]
    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.origin != Origin::Carried
    }
}

impl<K: EntityKind> Clone for Pending<K> {
    fn clone(&self) -> Self {
        Self {
            entity_id: self.entity_id,
            attributes: self.attributes.clone(),
            origin: self.origin,
        }
    }
}

impl<K: EntityKind> fmt::Debug for Pending<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("entity_id", &self.entity_id)
            .field("origin", &self.origin)
            .field("attributes", &self.attributes)
            .finish()
    }
}

/// Request-scoped commit state
pub struct CommitContext<'a> {
    storage: &'a dyn Storage,
    sink: &'a dyn NotificationSink,
    pub config: &'a PipelineConfig,
    pub project: Project,
    /// Greatest version below the destination, if any
    pub prior: Option<Version>,
    pub destination: Version,
    pub changes: ChangeSet,

    pub(crate) prior_artifacts: Snapshot<ArtifactKind>,
    pub(crate) prior_traces: Snapshot<TraceKind>,

    pub(crate) artifacts: BTreeMap<ArtifactKey, Pending<ArtifactKind>>,
    pub(crate) traces: BTreeMap<TraceKey, Pending<TraceKind>>,
    pub(crate) removed_artifacts: BTreeSet<ArtifactKey>,
    pub(crate) removed_traces: BTreeSet<TraceKey>,

    /// Identities held by an earlier run against the same destination
    pub(crate) reusable_artifacts: HashMap<ArtifactKey, EntityId>,
    pub(crate) reusable_traces: HashMap<TraceKey, EntityId>,

    /// Artifact key -> entity id of everything live in the destination
    pub(crate) artifact_ids: HashMap<ArtifactKey, EntityId>,

    pub result: CommitResult,
}

impl<'a> CommitContext<'a> {
    /// Load the prior snapshot and clear the destination
    ///
    /// Revisions already under the destination are purged and the identities
    /// they carried kept for reuse, so re-running a change set is idempotent.
    ///
    /// # Errors
    /// - `NotCurrent` if the destination is not the project's current version
    /// - `Store` if the project or destination cannot be read
    pub fn prepare(
        storage: &'a dyn Storage,
        sink: &'a dyn NotificationSink,
        config: &'a PipelineConfig,
        destination: &Version,
        changes: ChangeSet,
    ) -> Result<Self, CommitError> {
        let destination = storage.version(destination.uid)?;
        let project = storage.project(destination.project)?;

        let current = storage.current_version(project.id);
        if current.as_ref().map(|v| v.uid) != Some(destination.uid) {
            return Err(CommitError::NotCurrent {
                destination: destination.id,
                current: current.map(|v| v.id),
            });
        }

        let revisions = EntityVersioningStore::new(storage);
        let reusable_artifacts = revisions
            .snapshot::<ArtifactKind>(destination.uid)
            .into_iter()
            .map(|(key, rev)| (key, rev.entity_id))
            .collect();
        let reusable_traces = revisions
            .snapshot::<TraceKind>(destination.uid)
            .into_iter()
            .map(|(key, rev)| (key, rev.entity_id))
            .collect();
        let purged = purge_destination(storage, &destination);
        if purged > 0 {
            tracing::info!(
                "Re-running commit on {}: purged {} earlier revisions",
                destination.id,
                purged
            );
        }

        let prior = VersionLineage::new(storage).predecessor(&destination);
        let (prior_artifacts, prior_traces) = match &prior {
            Some(prior) => (
                revisions.snapshot::<ArtifactKind>(prior.uid),
                revisions.snapshot::<TraceKind>(prior.uid),
            ),
            None => (BTreeMap::new(), BTreeMap::new()),
        };

        let fail_on_error = changes.fail_on_error;
        Ok(Self {
            storage,
            sink,
            config,
            project,
            prior,
            result: CommitResult::new(destination.uid, destination.id, fail_on_error),
            destination,
            changes,
            prior_artifacts,
            prior_traces,
            artifacts: BTreeMap::new(),
            traces: BTreeMap::new(),
            removed_artifacts: BTreeSet::new(),
            removed_traces: BTreeSet::new(),
            reusable_artifacts,
            reusable_traces,
            artifact_ids: HashMap::new(),
        })
    }

    /// Storage collaborator
    #[inline]
    #[must_use]
    pub fn storage(&self) -> &'a dyn Storage {
        self.storage
    }

    /// Notification collaborator
    #[inline]
    #[must_use]
    pub fn sink(&self) -> &'a dyn NotificationSink {
        self.sink
    }

    /// Versioning view over the storage
    #[inline]
    #[must_use]
    pub fn revisions(&self) -> EntityVersioningStore<'a, dyn Storage + 'a> {
        EntityVersioningStore::new(self.storage)
    }

    /// Check whether `fail_on_error` requires the pipeline to stop
    #[inline]
    #[must_use]
    pub fn should_halt(&self) -> bool {
        self.result.fail_on_error && self.result.has_errors()
    }

    /// Check whether an artifact is live in the destination working set
    #[inline]
    #[must_use]
    pub fn is_live(&self, artifact: &ArtifactKey) -> bool {
        self.artifacts.contains_key(artifact)
    }

    /// First endpoint of a link that is not live in the destination
    #[must_use]
    pub fn unresolved_endpoint(&self, key: &TraceKey) -> Option<ArtifactKey> {
        let (low, high) = key.endpoints();
        [low, high]
            .into_iter()
            .find(|endpoint| !self.is_live(endpoint))
            .cloned()
    }

    /// Check whether a link must be written as non-visible
    #[must_use]
    pub fn is_stale(&self, key: &TraceKey, link: &TraceLink) -> bool {
        self.unresolved_endpoint(key).is_some()
            || link.approval == ApprovalStatus::Declined
            || (link.is_generated() && self.config.ranking.is_below_floor(link.score))
    }

    /// Entity id of an artifact persisted in the destination
    #[inline]
    #[must_use]
    pub fn artifact_id(&self, artifact: &ArtifactKey) -> Option<EntityId> {
        self.artifact_ids.get(artifact).copied()
    }

    /// Hide every working-set link that is stale, returning how many changed
    pub(crate) fn suppress_stale_links(&mut self) -> usize {
        let stale: Vec<TraceKey> = self
            .traces
            .iter()
            .filter(|(key, pending)| {
                pending.attributes.visible && self.is_stale(key, &pending.attributes)
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            if let Some(pending) = self.traces.get_mut(key) {
                pending.attributes.visible = false;
            }
        }
        stale.len()
    }

    /// Identity for a newly added artifact
    pub(crate) fn artifact_identity(&mut self, key: &ArtifactKey) -> EntityId {
        self.reusable_artifacts
            .remove(key)
            .unwrap_or_else(EntityId::new)
    }

    /// Identity for a newly added trace link
    pub(crate) fn trace_identity(&mut self, key: &TraceKey) -> EntityId {
        self.reusable_traces.remove(key).unwrap_or_else(EntityId::new)
    }

    /// Drop everything written under the destination by this run
    pub(crate) fn purge(&self) -> usize {
        purge_destination(self.storage, &self.destination)
    }
}

impl fmt::Debug for CommitContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitContext")
            .field("project", &self.project.name)
            .field("prior", &self.prior.as_ref().map(|v| v.id))
            .field("destination", &self.destination.id)
            .field("artifacts", &self.artifacts.len())
            .field("traces", &self.traces.len())
            .field("errors", &self.result.error_count())
            .finish_non_exhaustive()
    }
}

fn purge_destination(storage: &dyn Storage, destination: &Version) -> usize {
    storage.artifacts().purge_version(destination.uid)
        + storage.traces().purge_version(destination.uid)
}
