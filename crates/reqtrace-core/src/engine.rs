//! Traceability engine
//!
//! [`TraceEngine`] ties the storage collaborator, the commit pipeline and
//! the notification sink together behind one synchronous API. Writers take
//! a per-project [`WriteLease`](crate::WriteLease); reads go straight to
//! storage.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::guard::ProjectGuard;
use reqtrace_commit::{CommitPipeline, CommitResult, NotificationSink, NullSink};
use reqtrace_model::{
    ArtifactKey, ArtifactKind, Bump, ChangeSet, EntityId, Project, ProjectDelta, ProjectId,
    Revision, TraceKey, TraceKind, Version, VersionId,
};
use reqtrace_store::{
    DeltaEngine, EntityVersioningStore, MemoryStore, Storage, StoredKind, VersionLineage,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Full contents of one version
#[derive(Debug, Clone, Serialize)]
pub struct VersionView {
    pub version: Version,
    pub artifacts: Vec<Revision<ArtifactKind>>,
    pub traces: Vec<Revision<TraceKind>>,
}

/// Versioned commit and delta engine
pub struct TraceEngine {
    storage: Arc<dyn Storage>,
    sink: Arc<dyn NotificationSink>,
    config: EngineConfig,
    pipeline: CommitPipeline,
    guard: ProjectGuard,
}

impl TraceEngine {
    /// Create an engine over a storage collaborator
    ///
    /// # Errors
    /// `Config` if a ranking threshold lies outside `[0, 1]`
    pub fn new(storage: Arc<dyn Storage>, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            storage,
            sink: Arc::new(NullSink),
            pipeline: CommitPipeline::standard(config.pipeline()),
            config,
            guard: ProjectGuard::new(),
        })
    }

    /// Create an engine over a fresh [`MemoryStore`]
    ///
    /// # Errors
    /// See [`TraceEngine::new`]
    pub fn in_memory(config: EngineConfig) -> Result<Self, EngineError> {
        Self::new(Arc::new(MemoryStore::new()), config)
    }

    /// Deliver commit notifications to `sink`
    #[inline]
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    #[inline]
    #[must_use]
    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn guard(&self) -> &ProjectGuard {
        &self.guard
    }

    fn lineage(&self) -> VersionLineage<'_, dyn Storage> {
        VersionLineage::new(self.storage.as_ref())
    }

    fn revisions(&self) -> EntityVersioningStore<'_, dyn Storage> {
        EntityVersioningStore::new(self.storage.as_ref())
    }

    /// Register a project
    ///
    /// # Errors
    /// `Store(ProjectExists)` if the name is taken
    pub fn create_project(&self, project: Project) -> Result<Project, EngineError> {
        self.storage.insert_project(project.clone())?;
        tracing::info!("Created project {} ({})", project.name, project.id);
        Ok(project)
    }

    /// Look a project up by name
    ///
    /// # Errors
    /// `UnknownProject`
    pub fn project(&self, name: &str) -> Result<Project, EngineError> {
        self.storage
            .find_project(name)
            .ok_or_else(|| EngineError::UnknownProject(name.to_string()))
    }

    #[must_use]
    pub fn projects(&self) -> Vec<Project> {
        self.storage.projects()
    }

    /// Allocate the next version of a project
    ///
    /// # Errors
    /// - `Conflict` if another writer holds the project
    /// - `Store` if the project is missing or the allocation lost the race
    pub fn allocate_version(&self, project: ProjectId, bump: Bump) -> Result<Version, EngineError> {
        let _lease = self.guard.try_acquire(project, "allocate")?;
        Ok(self.lineage().allocate(project, bump)?)
    }

    /// Versions of a project, ascending
    ///
    /// # Errors
    /// `Store(ProjectNotFound)`
    pub fn versions(&self, project: ProjectId) -> Result<Vec<Version>, EngineError> {
        Ok(self.lineage().versions(project)?)
    }

    #[must_use]
    pub fn current_version(&self, project: ProjectId) -> Option<Version> {
        self.storage.current_version(project)
    }

    /// Version of a project by identifier
    ///
    /// # Errors
    /// `Store(ProjectNotFound | VersionNotFound)`
    pub fn find_version(&self, project: ProjectId, id: VersionId) -> Result<Version, EngineError> {
        Ok(self.lineage().find(project, id)?)
    }

    /// Allocate a version and commit a change set into it
    ///
    /// The new version is discarded again when the commit aborts or fails,
    /// leaving the project's lineage as it was.
    ///
    /// # Errors
    /// - `Conflict` if another writer holds the project
    /// - `Store` / `Commit` on collaborator failure
    pub fn commit(
        &self,
        project: ProjectId,
        bump: Bump,
        mut changes: ChangeSet,
    ) -> Result<CommitResult, EngineError> {
        let _lease = self.guard.try_acquire(project, "commit")?;
        changes.fail_on_error |= self.config.commit.default_fail_on_error;

        let destination = self.lineage().allocate(project, bump)?;
        match self.run(&destination, changes) {
            Ok(result) if result.is_aborted() => {
                self.discard(&destination);
                Ok(result)
            }
            Ok(result) => Ok(result),
            Err(err) => {
                self.discard(&destination);
                Err(err)
            }
        }
    }

    /// Commit a change set into an already allocated version
    ///
    /// `destination` must be the project's current version. Re-running the
    /// same change set against it yields the same state.
    ///
    /// # Errors
    /// - `Conflict` if another writer holds the project
    /// - `Commit(NotCurrent)` if a later version exists
    pub fn commit_to(
        &self,
        destination: &Version,
        mut changes: ChangeSet,
    ) -> Result<CommitResult, EngineError> {
        let _lease = self.guard.try_acquire(destination.project, "commit")?;
        changes.fail_on_error |= self.config.commit.default_fail_on_error;
        self.run(destination, changes)
    }

    fn run(&self, destination: &Version, changes: ChangeSet) -> Result<CommitResult, EngineError> {
        Ok(self.pipeline.run(
            self.storage.as_ref(),
            destination,
            changes,
            self.sink.as_ref(),
        )?)
    }

    fn discard(&self, version: &Version) {
        match self.storage.delete_version(version.uid) {
            Ok(()) => tracing::info!("Discarded version {} after failed commit", version.id),
            Err(err) => tracing::warn!("Could not discard version {}: {}", version.id, err),
        }
    }

    /// Compare two versions of a project
    ///
    /// # Errors
    /// `Store(ProjectNotFound | VersionNotFound)`
    pub fn diff(
        &self,
        project: ProjectId,
        baseline: VersionId,
        target: VersionId,
    ) -> Result<ProjectDelta, EngineError> {
        Ok(DeltaEngine::new(self.storage.as_ref()).diff_ids(project, baseline, target)?)
    }

    /// State of an artifact as of a version
    ///
    /// # Errors
    /// `Store(ProjectNotFound | VersionNotFound)`
    pub fn resolve_artifact(
        &self,
        project: ProjectId,
        key: &ArtifactKey,
        at: VersionId,
    ) -> Result<Option<Revision<ArtifactKind>>, EngineError> {
        let version = self.find_version(project, at)?;
        Ok(self.revisions().resolve_key::<ArtifactKind>(key, version.uid))
    }

    /// State of a trace link as of a version
    ///
    /// # Errors
    /// `Store(ProjectNotFound | VersionNotFound)`
    pub fn resolve_trace(
        &self,
        project: ProjectId,
        key: &TraceKey,
        at: VersionId,
    ) -> Result<Option<Revision<TraceKind>>, EngineError> {
        let version = self.find_version(project, at)?;
        Ok(self.revisions().resolve_key::<TraceKind>(key, version.uid))
    }

    /// Every recorded revision of an entity
    #[must_use]
    pub fn history<K: StoredKind>(&self, entity: EntityId) -> Vec<Revision<K>> {
        self.revisions().all_revisions::<K>(entity)
    }

    /// Everything live in a version
    ///
    /// # Errors
    /// `Store(ProjectNotFound | VersionNotFound)`
    pub fn show(&self, project: ProjectId, at: VersionId) -> Result<VersionView, EngineError> {
        let version = self.find_version(project, at)?;
        let revisions = self.revisions();
        Ok(VersionView {
            artifacts: revisions
                .snapshot::<ArtifactKind>(version.uid)
                .into_values()
                .collect(),
            traces: revisions
                .snapshot::<TraceKind>(version.uid)
                .into_values()
                .collect(),
            version,
        })
    }
}

impl fmt::Debug for TraceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceEngine")
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}
