//! Storage collaborator boundary
//!
//! [`Storage`] is the key-indexed persistence layer the engine runs over. It
//! must enforce one revision per (entity, version) and index revisions by
//! version and versions by project. [`MemoryStore`](crate::MemoryStore) is the
//! reference implementation.

use crate::error::StoreError;
use reqtrace_model::{
    ArtifactKind, EntityId, EntityKind, Project, ProjectId, Revision, Snapshot, TraceKind,
    Version, VersionId, VersionStamp, VersionUid,
};

/// Revisions of one entity kind
pub trait RevisionTable<K: EntityKind>: Send + Sync {
    /// Record a revision
    ///
    /// # Errors
    /// `DuplicateRevision` if the entity or its key already has a revision in
    /// that version
    fn insert(&self, revision: Revision<K>) -> Result<(), StoreError>;

    /// Exact (entity, version) lookup
    fn get(&self, entity: EntityId, version: VersionUid) -> Option<Revision<K>>;

    /// Exact (business key, version) lookup
    fn get_by_key(&self, key: &K::Key, version: VersionUid) -> Option<Revision<K>>;

    /// Every revision recorded under a version
    fn at_version(&self, version: VersionUid) -> Snapshot<K>;

    /// Every revision of an entity, ascending by version identifier
    fn of_entity(&self, entity: EntityId) -> Vec<Revision<K>>;

    /// Drop every revision under a version, returning how many were removed
    fn purge_version(&self, version: VersionUid) -> usize;
}

/// Projects, versions and revision tables
pub trait Storage: Send + Sync {
    /// Create a project
    ///
    /// # Errors
    /// `ProjectExists` if the name is taken
    fn insert_project(&self, project: Project) -> Result<(), StoreError>;

    /// Read a project
    ///
    /// # Errors
    /// `ProjectNotFound`
    fn project(&self, id: ProjectId) -> Result<Project, StoreError>;

    /// Find a project by name
    fn find_project(&self, name: &str) -> Option<Project>;

    /// All projects
    fn projects(&self) -> Vec<Project>;

    /// Insert a version if the project's current identifier is still
    /// `expected_current`
    ///
    /// # Errors
    /// - `ProjectNotFound` if the project does not exist
    /// - `Conflict` if another version was allocated in between
    fn insert_version(
        &self,
        version: Version,
        expected_current: Option<VersionId>,
    ) -> Result<(), StoreError>;

    /// Read a version
    ///
    /// # Errors
    /// `VersionNotFound`
    fn version(&self, uid: VersionUid) -> Result<Version, StoreError>;

    /// Versions of a project, ascending
    fn versions(&self, project: ProjectId) -> Vec<Version>;

    /// Version with the greatest identifier
    fn current_version(&self, project: ProjectId) -> Option<Version>;

    /// Set last-updated metadata
    ///
    /// # Errors
    /// `VersionNotFound`
    fn stamp_version(&self, uid: VersionUid, stamp: VersionStamp) -> Result<(), StoreError>;

    /// Delete a version and every revision under it
    ///
    /// # Errors
    /// `VersionNotFound`
    fn delete_version(&self, uid: VersionUid) -> Result<(), StoreError>;

    /// Artifact revisions
    fn artifacts(&self) -> &dyn RevisionTable<ArtifactKind>;

    /// Trace-link revisions
    fn traces(&self) -> &dyn RevisionTable<TraceKind>;
}

/// Entity kinds with a revision table in [`Storage`]
pub trait StoredKind: EntityKind + Sized {
    /// Table holding this kind
    fn table<S: Storage + ?Sized>(storage: &S) -> &dyn RevisionTable<Self>;
}

impl StoredKind for ArtifactKind {
    fn table<S: Storage + ?Sized>(storage: &S) -> &dyn RevisionTable<Self> {
        storage.artifacts()
    }
}

impl StoredKind for TraceKind {
    fn table<S: Storage + ?Sized>(storage: &S) -> &dyn RevisionTable<Self> {
        storage.traces()
    }
}
