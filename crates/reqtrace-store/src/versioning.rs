//! Entity versioning store
//!
//! Maps a logical entity to its revisions. Every version is a full snapshot,
//! so resolution is an exact `(entity, version)` lookup with no fallback to
//! earlier versions.

use crate::error::StoreError;
use crate::storage::{Storage, StoredKind};
use reqtrace_model::{EntityId, ProjectId, Revision, Snapshot, Version, VersionUid};

/// Revision access for every [`StoredKind`]
pub struct EntityVersioningStore<'a, S: Storage + ?Sized> {
    storage: &'a S,
}

impl<'a, S: Storage + ?Sized> EntityVersioningStore<'a, S> {
    #[inline]
    #[must_use]
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// State of an entity as of a version
    #[must_use]
    pub fn resolve<K: StoredKind>(
        &self,
        entity: EntityId,
        version: VersionUid,
    ) -> Option<Revision<K>> {
        K::table(self.storage).get(entity, version)
    }

    /// State of the entity with a business key as of a version
    #[must_use]
    pub fn resolve_key<K: StoredKind>(
        &self,
        key: &K::Key,
        version: VersionUid,
    ) -> Option<Revision<K>> {
        K::table(self.storage).get_by_key(key, version)
    }

    /// State of an entity in the project's current version
    #[must_use]
    pub fn current_revision<K: StoredKind>(
        &self,
        entity: EntityId,
        project: ProjectId,
    ) -> Option<Revision<K>> {
        let current = self.storage.current_version(project)?;
        self.resolve(entity, current.uid)
    }

    /// Every revision of an entity, ascending by version
    #[must_use]
    pub fn all_revisions<K: StoredKind>(&self, entity: EntityId) -> Vec<Revision<K>> {
        K::table(self.storage).of_entity(entity)
    }

    /// Record a new revision
    ///
    /// # Errors
    /// - `Invalid` if no business key can be derived
    /// - `DuplicateRevision` if the entity or key already exists in `version`
    pub fn record_revision<K: StoredKind>(
        &self,
        entity: EntityId,
        version: &Version,
        attributes: K::Attributes,
    ) -> Result<Revision<K>, StoreError> {
        let key = K::key(&attributes)?;
        let revision = Revision::new(entity, key, version.uid, version.id, attributes);
        K::table(self.storage).insert(revision.clone())?;
        Ok(revision)
    }

    /// Copy a revision unchanged into another version
    ///
    /// # Errors
    /// `DuplicateRevision` if the entity or key already exists in `version`
    pub fn carry_forward<K: StoredKind>(
        &self,
        revision: &Revision<K>,
        version: &Version,
    ) -> Result<Revision<K>, StoreError> {
        let carried = revision.carried_to(version.uid, version.id);
        K::table(self.storage).insert(carried.clone())?;
        Ok(carried)
    }

    /// All live entities of a kind in a version, keyed by business key
    #[must_use]
    pub fn snapshot<K: StoredKind>(&self, version: VersionUid) -> Snapshot<K> {
        K::table(self.storage).at_version(version)
    }
}
