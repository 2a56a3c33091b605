//! In-memory storage
//!
//! [`MemoryStore`] keeps projects and versions behind `parking_lot` locks and
//! shards revisions by version in `DashMap`s. The whole store can be dumped to
//! and rebuilt from a [`StoreSnapshot`].
//!
//! Lock order: a lineage shard may be held while taking the version lock,
//! never the reverse.

use crate::error::StoreError;
use crate::storage::{RevisionTable, Storage};
use dashmap::DashMap;
use parking_lot::RwLock;
use reqtrace_model::{
    ArtifactKind, EntityId, EntityKind, Project, ProjectId, Revision, Snapshot, TraceKind,
    Version, VersionId, VersionStamp, VersionUid,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Revisions recorded under one version
struct VersionSlice<K: EntityKind> {
    by_key: BTreeMap<K::Key, Revision<K>>,
    keys: HashMap<EntityId, K::Key>,
}

impl<K: EntityKind> Default for VersionSlice<K> {
    fn default() -> Self {
        Self {
            by_key: BTreeMap::new(),
            keys: HashMap::new(),
        }
    }
}

/// In-memory [`RevisionTable`]
pub struct MemoryTable<K: EntityKind> {
    by_version: DashMap<VersionUid, VersionSlice<K>>,
    /// entity -> versions it has a revision in
    by_entity: DashMap<EntityId, BTreeMap<VersionId, VersionUid>>,
}

impl<K: EntityKind> MemoryTable<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_version: DashMap::new(),
            by_entity: DashMap::new(),
        }
    }

    /// Total number of revisions
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_version.iter().map(|slice| slice.by_key.len()).sum()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every revision, ordered by version identifier then key
    #[must_use]
    pub fn all(&self) -> Vec<Revision<K>> {
        let mut revisions: Vec<Revision<K>> = self
            .by_version
            .iter()
            .flat_map(|slice| slice.by_key.values().cloned().collect::<Vec<_>>())
            .collect();
        revisions.sort_by(|a, b| {
            a.version_id
                .cmp(&b.version_id)
                .then_with(|| a.key.cmp(&b.key))
        });
        revisions
    }
}

impl<K: EntityKind> Default for MemoryTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityKind> fmt::Debug for MemoryTable<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTable")
            .field("kind", &K::TAG)
            .field("versions", &self.by_version.len())
            .field("entities", &self.by_entity.len())
            .finish()
    }
}

impl<K: EntityKind> RevisionTable<K> for MemoryTable<K> {
    fn insert(&self, revision: Revision<K>) -> Result<(), StoreError> {
        let entity = revision.entity_id;
        let version = revision.version;
        let version_id = revision.version_id;

        {
            let mut slice = self.by_version.entry(version).or_default();
            if slice.keys.contains_key(&entity) || slice.by_key.contains_key(&revision.key) {
                return Err(StoreError::DuplicateRevision {
                    kind: K::TAG,
                    key: revision.key.to_string(),
                    version: version_id,
                });
            }
            slice.keys.insert(entity, revision.key.clone());
            slice.by_key.insert(revision.key.clone(), revision);
        }

        self.by_entity
            .entry(entity)
            .or_default()
            .insert(version_id, version);
        Ok(())
    }

    fn get(&self, entity: EntityId, version: VersionUid) -> Option<Revision<K>> {
        let slice = self.by_version.get(&version)?;
        let key = slice.keys.get(&entity)?;
        slice.by_key.get(key).cloned()
    }

    fn get_by_key(&self, key: &K::Key, version: VersionUid) -> Option<Revision<K>> {
        self.by_version.get(&version)?.by_key.get(key).cloned()
    }

    fn at_version(&self, version: VersionUid) -> Snapshot<K> {
        self.by_version
            .get(&version)
            .map(|slice| slice.by_key.clone())
            .unwrap_or_default()
    }

    fn of_entity(&self, entity: EntityId) -> Vec<Revision<K>> {
        // clone the index out so no shard is held across the nested reads
        let versions: Vec<VersionUid> = match self.by_entity.get(&entity) {
            Some(index) => index.values().copied().collect(),
            None => return Vec::new(),
        };
        versions
            .into_iter()
            .filter_map(|version| self.get(entity, version))
            .collect()
    }

    fn purge_version(&self, version: VersionUid) -> usize {
        let Some((_, slice)) = self.by_version.remove(&version) else {
            return 0;
        };

        for revision in slice.by_key.values() {
            if let Some(mut index) = self.by_entity.get_mut(&revision.entity_id) {
                index.remove(&revision.version_id);
            }
            self.by_entity
                .remove_if(&revision.entity_id, |_, index| index.is_empty());
        }
        slice.by_key.len()
    }
}

/// Thread-safe in-memory [`Storage`]
pub struct MemoryStore {
    projects: RwLock<BTreeMap<ProjectId, Project>>,
    versions: RwLock<BTreeMap<VersionUid, Version>>,
    /// project -> version identifiers, the CAS point for allocation
    lineages: DashMap<ProjectId, BTreeMap<VersionId, VersionUid>>,
    artifacts: MemoryTable<ArtifactKind>,
    traces: MemoryTable<TraceKind>,
}

impl MemoryStore {
    /// Create empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(BTreeMap::new()),
            versions: RwLock::new(BTreeMap::new()),
            lineages: DashMap::new(),
            artifacts: MemoryTable::new(),
            traces: MemoryTable::new(),
        }
    }

    /// Dump the full contents
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        let mut versions: Vec<Version> = self.versions.read().values().cloned().collect();
        versions.sort_by(|a, b| a.project.cmp(&b.project).then(a.id.cmp(&b.id)));

        StoreSnapshot {
            projects: self.projects.read().values().cloned().collect(),
            versions,
            artifacts: self.artifacts.all(),
            traces: self.traces.all(),
        }
    }

    /// Rebuild a store from a dump
    ///
    /// # Errors
    /// Returns error if the dump violates a storage invariant (duplicate
    /// project names, out-of-order versions, duplicate revisions)
    pub fn restore(snapshot: StoreSnapshot) -> Result<Self, StoreError> {
        let store = Self::new();
        for project in snapshot.projects {
            store.insert_project(project)?;
        }

        let mut versions = snapshot.versions;
        versions.sort_by(|a, b| a.project.cmp(&b.project).then(a.id.cmp(&b.id)));
        for version in versions {
            let expected = store.current_version(version.project).map(|v| v.id);
            store.insert_version(version, expected)?;
        }

        for revision in snapshot.artifacts {
            store.artifacts.insert(revision)?;
        }
        for revision in snapshot.traces {
            store.traces.insert(revision)?;
        }

        tracing::debug!(
            "Restored store: {} projects, {} artifact and {} trace revisions",
            store.projects.read().len(),
            store.artifacts.len(),
            store.traces.len()
        );
        Ok(store)
    }

    /// Serialize the full contents as JSON
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    /// Rebuild a store from JSON produced by [`MemoryStore::to_json`]
    ///
    /// # Errors
    /// Returns error if the JSON is malformed or inconsistent
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        Self::restore(serde_json::from_str(json)?)
    }

    fn version_uids(&self, project: ProjectId) -> Vec<VersionUid> {
        self.lineages
            .get(&project)
            .map(|lineage| lineage.values().copied().collect())
            .unwrap_or_default()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("projects", &self.projects.read().len())
            .field("versions", &self.versions.read().len())
            .field("artifacts", &self.artifacts)
            .field("traces", &self.traces)
            .finish()
    }
}

impl Storage for MemoryStore {
    fn insert_project(&self, project: Project) -> Result<(), StoreError> {
        let mut projects = self.projects.write();
        if projects
            .values()
            .any(|existing| existing.name == project.name || existing.id == project.id)
        {
            return Err(StoreError::ProjectExists(project.name));
        }
        self.lineages.insert(project.id, BTreeMap::new());
        projects.insert(project.id, project);
        Ok(())
    }

    fn project(&self, id: ProjectId) -> Result<Project, StoreError> {
        self.projects
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::ProjectNotFound(id.to_string()))
    }

    fn find_project(&self, name: &str) -> Option<Project> {
        self.projects
            .read()
            .values()
            .find(|project| project.name == name)
            .cloned()
    }

    fn projects(&self) -> Vec<Project> {
        let mut projects: Vec<Project> = self.projects.read().values().cloned().collect();
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        projects
    }

    fn insert_version(
        &self,
        version: Version,
        expected_current: Option<VersionId>,
    ) -> Result<(), StoreError> {
        let mut lineage = self
            .lineages
            .get_mut(&version.project)
            .ok_or_else(|| StoreError::ProjectNotFound(version.project.to_string()))?;

        let actual = lineage.keys().next_back().copied();
        if actual != expected_current || actual.is_some_and(|current| version.id <= current) {
            return Err(StoreError::Conflict {
                project: version.project,
                expected: expected_current,
                actual,
            });
        }

        lineage.insert(version.id, version.uid);
        self.versions.write().insert(version.uid, version);
        Ok(())
    }

    fn version(&self, uid: VersionUid) -> Result<Version, StoreError> {
        self.versions
            .read()
            .get(&uid)
            .cloned()
            .ok_or_else(|| StoreError::VersionNotFound(uid.to_string()))
    }

    fn versions(&self, project: ProjectId) -> Vec<Version> {
        let uids = self.version_uids(project);
        let versions = self.versions.read();
        uids.iter()
            .filter_map(|uid| versions.get(uid).cloned())
            .collect()
    }

    fn current_version(&self, project: ProjectId) -> Option<Version> {
        let uid = self
            .lineages
            .get(&project)
            .and_then(|lineage| lineage.values().next_back().copied())?;
        self.versions.read().get(&uid).cloned()
    }

    fn stamp_version(&self, uid: VersionUid, stamp: VersionStamp) -> Result<(), StoreError> {
        let mut versions = self.versions.write();
        let version = versions
            .get_mut(&uid)
            .ok_or_else(|| StoreError::VersionNotFound(uid.to_string()))?;
        version.stamp = Some(stamp);
        Ok(())
    }

    fn delete_version(&self, uid: VersionUid) -> Result<(), StoreError> {
        let version = self
            .versions
            .write()
            .remove(&uid)
            .ok_or_else(|| StoreError::VersionNotFound(uid.to_string()))?;

        if let Some(mut lineage) = self.lineages.get_mut(&version.project) {
            lineage.remove(&version.id);
        }

        let artifacts = self.artifacts.purge_version(uid);
        let traces = self.traces.purge_version(uid);
        tracing::debug!(
            "Deleted version {}: {} artifact and {} trace revisions",
            version.id,
            artifacts,
            traces
        );
        Ok(())
    }

    fn artifacts(&self) -> &dyn RevisionTable<ArtifactKind> {
        &self.artifacts
    }

    fn traces(&self) -> &dyn RevisionTable<TraceKind> {
        &self.traces
    }
}

/// Serializable dump of a [`MemoryStore`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSnapshot {
    pub projects: Vec<Project>,
    pub versions: Vec<Version>,
    pub artifacts: Vec<Revision<ArtifactKind>>,
    pub traces: Vec<Revision<TraceKind>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqtrace_model::{ArtifactKey, ArtifactRecord, TraceKey, TraceLink};

    fn store_with_project() -> (MemoryStore, Project) {
        let store = MemoryStore::new();
        let project = Project::new("demo", "");
        store.insert_project(project.clone()).unwrap();
        (store, project)
    }

    fn artifact(version: &Version, entity: EntityId, name: &str) -> Revision<ArtifactKind> {
        Revision::new(
            entity,
            ArtifactKey::new(name).unwrap(),
            version.uid,
            version.id,
            ArtifactRecord::new(name, "req", "body"),
        )
    }

    #[test]
    fn project_names_are_unique() {
        let (store, _) = store_with_project();
        let err = store.insert_project(Project::new("demo", "again")).unwrap_err();
        assert!(matches!(err, StoreError::ProjectExists(_)));
        assert!(store.find_project("demo").is_some());
        assert!(store.find_project("other").is_none());
    }

    #[test]
    fn version_insert_is_compare_and_swap() {
        let (store, project) = store_with_project();
        let first = Version::new(project.id, VersionId::new(1, 0, 0));
        store.insert_version(first, None).unwrap();

        // stale observation: caller still believes the project is empty
        let stale = Version::new(project.id, VersionId::new(0, 1, 0));
        let err = store.insert_version(stale, None).unwrap_err();
        assert!(err.is_retryable());

        let next = Version::new(project.id, VersionId::new(1, 0, 1));
        store
            .insert_version(next, Some(VersionId::new(1, 0, 0)))
            .unwrap();
        assert_eq!(
            store.current_version(project.id).unwrap().id,
            VersionId::new(1, 0, 1)
        );
    }

    #[test]
    fn version_insert_rejects_non_increasing_id() {
        let (store, project) = store_with_project();
        store
            .insert_version(Version::new(project.id, VersionId::new(1, 0, 0)), None)
            .unwrap();
        let err = store
            .insert_version(
                Version::new(project.id, VersionId::new(1, 0, 0)),
                Some(VersionId::new(1, 0, 0)),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[test]
    fn version_insert_requires_project() {
        let store = MemoryStore::new();
        let err = store
            .insert_version(Version::new(ProjectId::new(), VersionId::new(1, 0, 0)), None)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn versions_listed_ascending() {
        let (store, project) = store_with_project();
        let mut expected = None;
        for id in [
            VersionId::new(0, 0, 1),
            VersionId::new(0, 1, 0),
            VersionId::new(1, 0, 0),
        ] {
            store
                .insert_version(Version::new(project.id, id), expected)
                .unwrap();
            expected = Some(id);
        }
        let ids: Vec<_> = store.versions(project.id).iter().map(|v| v.id).collect();
        assert_eq!(
            ids,
            vec![
                VersionId::new(0, 0, 1),
                VersionId::new(0, 1, 0),
                VersionId::new(1, 0, 0)
            ]
        );
    }

    #[test]
    fn one_revision_per_entity_and_key_per_version() {
        let (store, project) = store_with_project();
        let version = Version::new(project.id, VersionId::new(1, 0, 0));
        store.insert_version(version.clone(), None).unwrap();

        let entity = EntityId::new();
        store.artifacts().insert(artifact(&version, entity, "A")).unwrap();

        let same_entity = store.artifacts().insert(artifact(&version, entity, "B"));
        assert!(matches!(
            same_entity,
            Err(StoreError::DuplicateRevision { .. })
        ));

        let same_key = store
            .artifacts()
            .insert(artifact(&version, EntityId::new(), "A"));
        assert!(matches!(same_key, Err(StoreError::DuplicateRevision { .. })));
    }

    #[test]
    fn lookups_are_exact() {
        let (store, project) = store_with_project();
        let v1 = Version::new(project.id, VersionId::new(1, 0, 0));
        let v2 = Version::new(project.id, VersionId::new(1, 0, 1));
        store.insert_version(v1.clone(), None).unwrap();
        store.insert_version(v2.clone(), Some(v1.id)).unwrap();

        let entity = EntityId::new();
        store.artifacts().insert(artifact(&v1, entity, "A")).unwrap();

        assert!(store.artifacts().get(entity, v1.uid).is_some());
        // no fallback to earlier versions
        assert!(store.artifacts().get(entity, v2.uid).is_none());
        assert!(store
            .artifacts()
            .get_by_key(&ArtifactKey::new("A").unwrap(), v2.uid)
            .is_none());
    }

    #[test]
    fn delete_version_cascades_to_revisions() {
        let (store, project) = store_with_project();
        let v1 = Version::new(project.id, VersionId::new(1, 0, 0));
        let v2 = Version::new(project.id, VersionId::new(1, 0, 1));
        store.insert_version(v1.clone(), None).unwrap();
        store.insert_version(v2.clone(), Some(v1.id)).unwrap();

        let entity = EntityId::new();
        store.artifacts().insert(artifact(&v1, entity, "A")).unwrap();
        store
            .artifacts()
            .insert(artifact(&v1, entity, "A").carried_to(v2.uid, v2.id))
            .unwrap();
        store
            .traces()
            .insert(Revision::new(
                EntityId::new(),
                TraceKey::parse("A", "B").unwrap(),
                v2.uid,
                v2.id,
                TraceLink::manual("A", "B"),
            ))
            .unwrap();

        store.delete_version(v2.uid).unwrap();

        assert_eq!(store.current_version(project.id).unwrap().uid, v1.uid);
        assert!(store.traces().at_version(v2.uid).is_empty());
        assert_eq!(store.artifacts().of_entity(entity).len(), 1);
        assert!(store.version(v2.uid).unwrap_err().is_not_found());
    }

    #[test]
    fn stamp_sets_metadata() {
        let (store, project) = store_with_project();
        let version = Version::new(project.id, VersionId::new(1, 0, 0));
        store.insert_version(version.clone(), None).unwrap();
        store
            .stamp_version(
                version.uid,
                VersionStamp {
                    at: chrono::Utc::now(),
                    actor: "alice".into(),
                },
            )
            .unwrap();
        assert_eq!(
            store.version(version.uid).unwrap().stamp.unwrap().actor,
            "alice"
        );
    }

    #[test]
    fn json_round_trip_preserves_contents() {
        let (store, project) = store_with_project();
        let version = Version::new(project.id, VersionId::new(1, 0, 0));
        store.insert_version(version.clone(), None).unwrap();
        let entity = EntityId::new();
        store.artifacts().insert(artifact(&version, entity, "A")).unwrap();

        let restored = MemoryStore::from_json(&store.to_json().unwrap()).unwrap();

        assert_eq!(restored.projects(), store.projects());
        assert_eq!(restored.versions(project.id), store.versions(project.id));
        assert_eq!(
            restored.artifacts().get(entity, version.uid),
            store.artifacts().get(entity, version.uid)
        );
    }
}
