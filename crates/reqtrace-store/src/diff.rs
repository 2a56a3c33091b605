//! Delta engine
//!
//! Compares the artifact and trace snapshots of two persisted versions of the
//! same project.

use crate::error::StoreError;
use crate::lineage::VersionLineage;
use crate::storage::Storage;
use crate::versioning::EntityVersioningStore;
use reqtrace_model::{
    ArtifactKind, EntityDelta, ProjectDelta, ProjectId, TraceKind, Version, VersionId, VersionUid,
};

/// On-demand diff between two versions
pub struct DeltaEngine<'a, S: Storage + ?Sized> {
    storage: &'a S,
}

impl<'a, S: Storage + ?Sized> DeltaEngine<'a, S> {
    #[inline]
    #[must_use]
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Diff two versions by storage identity
    ///
    /// # Errors
    /// - `VersionNotFound` if either version is missing
    /// - `ProjectMismatch` if they belong to different projects
    pub fn diff(
        &self,
        baseline: VersionUid,
        target: VersionUid,
    ) -> Result<ProjectDelta, StoreError> {
        let baseline = self.storage.version(baseline)?;
        let target = self.storage.version(target)?;
        self.diff_versions(&baseline, &target)
    }

    /// Diff two versions of a project by identifier
    ///
    /// # Errors
    /// `ProjectNotFound` or `VersionNotFound`
    pub fn diff_ids(
        &self,
        project: ProjectId,
        baseline: VersionId,
        target: VersionId,
    ) -> Result<ProjectDelta, StoreError> {
        let lineage = VersionLineage::new(self.storage);
        let baseline = lineage.find(project, baseline)?;
        let target = lineage.find(project, target)?;
        self.diff_versions(&baseline, &target)
    }

    /// Diff two loaded versions
    ///
    /// # Errors
    /// `ProjectMismatch` if they belong to different projects
    pub fn diff_versions(
        &self,
        baseline: &Version,
        target: &Version,
    ) -> Result<ProjectDelta, StoreError> {
        if baseline.project != target.project {
            return Err(StoreError::ProjectMismatch(baseline.id, target.id));
        }

        let revisions = EntityVersioningStore::new(self.storage);
        let artifacts = EntityDelta::between(
            &revisions.snapshot::<ArtifactKind>(baseline.uid),
            &revisions.snapshot::<ArtifactKind>(target.uid),
        );
        let traces = EntityDelta::between(
            &revisions.snapshot::<TraceKind>(baseline.uid),
            &revisions.snapshot::<TraceKind>(target.uid),
        );

        let delta = ProjectDelta {
            baseline: baseline.id,
            target: target.id,
            artifacts,
            traces,
        };
        tracing::info!("Computed diff {}", delta);
        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use reqtrace_model::{
        ArtifactKey, ArtifactRecord, Bump, EntityId, Project, Revision, TraceLink,
    };

    struct Fixture {
        store: MemoryStore,
        project: ProjectId,
    }

    impl Fixture {
        fn new() -> Self {
            let store = MemoryStore::new();
            let project = Project::new("p", "");
            let id = project.id;
            store.insert_project(project).unwrap();
            Self { store, project: id }
        }

        fn version(&self, bump: Bump) -> Version {
            VersionLineage::new(&self.store)
                .allocate(self.project, bump)
                .unwrap()
        }

        fn artifact(&self, entity: EntityId, version: &Version, name: &str, body: &str) {
            EntityVersioningStore::new(&self.store)
                .record_revision::<ArtifactKind>(
                    entity,
                    version,
                    ArtifactRecord::new(name, "req", body),
                )
                .unwrap();
        }
    }

    #[test]
    fn diff_of_version_with_itself_is_empty() {
        let fx = Fixture::new();
        let v1 = fx.version(Bump::Major);
        fx.artifact(EntityId::new(), &v1, "A", "1");

        let delta = DeltaEngine::new(&fx.store).diff(v1.uid, v1.uid).unwrap();
        assert!(delta.is_empty());
    }

    #[test]
    fn diff_classifies_each_kind() {
        let fx = Fixture::new();
        let (a, b) = (EntityId::new(), EntityId::new());
        let v1 = fx.version(Bump::Major);
        fx.artifact(a, &v1, "A", "1");
        fx.artifact(b, &v1, "B", "2");

        let v2 = fx.version(Bump::Revision);
        fx.artifact(a, &v2, "A", "1-changed");
        fx.artifact(EntityId::new(), &v2, "C", "3");
        EntityVersioningStore::new(&fx.store)
            .record_revision::<TraceKind>(EntityId::new(), &v2, TraceLink::manual("A", "C"))
            .unwrap();

        let delta = DeltaEngine::new(&fx.store)
            .diff_ids(fx.project, v1.id, v2.id)
            .unwrap();

        let key = |s: &str| ArtifactKey::new(s).unwrap();
        assert!(delta.artifacts.modified.contains_key(&key("A")));
        assert!(delta.artifacts.added.contains_key(&key("C")));
        assert!(delta.artifacts.removed.contains_key(&key("B")));
        assert_eq!(delta.traces.added.len(), 1);
        assert!(delta.traces.removed.is_empty());
        assert_eq!(delta.to_string(), "1.0.0 -> 1.0.1: artifacts +1 ~1 -1, traces +1 ~0 -0");
    }

    #[test]
    fn diff_rejects_cross_project_versions() {
        let fx = Fixture::new();
        let v1 = fx.version(Bump::Major);

        let other = Project::new("other", "");
        let other_id = other.id;
        fx.store.insert_project(other).unwrap();
        let foreign = VersionLineage::new(&fx.store)
            .allocate(other_id, Bump::Major)
            .unwrap();

        let err = DeltaEngine::new(&fx.store)
            .diff(v1.uid, foreign.uid)
            .unwrap_err();
        assert!(matches!(err, StoreError::ProjectMismatch(_, _)));
    }

    #[test]
    fn diff_of_missing_version_is_not_found() {
        let fx = Fixture::new();
        let v1 = fx.version(Bump::Major);
        let err = DeltaEngine::new(&fx.store)
            .diff(v1.uid, VersionUid::new())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn carried_revisions_are_unchanged() {
        let fx = Fixture::new();
        let v1 = fx.version(Bump::Major);
        let entity = EntityId::new();
        fx.artifact(entity, &v1, "A", "1");
        let v2 = fx.version(Bump::Revision);
        let revisions = EntityVersioningStore::new(&fx.store);
        let rev: Revision<ArtifactKind> = revisions.resolve(entity, v1.uid).unwrap();
        revisions.carry_forward(&rev, &v2).unwrap();

        assert!(DeltaEngine::new(&fx.store)
            .diff(v1.uid, v2.uid)
            .unwrap()
            .is_empty());
    }
}
