//! Version lineage
//!
//! Orders the versions of a project and allocates the next identifier. An
//! empty project has a virtual `0.0.0` baseline.

use crate::error::StoreError;
use crate::storage::Storage;
use reqtrace_model::{Bump, ProjectId, Version, VersionId};

/// Version ordering and allocation over a [`Storage`]
pub struct VersionLineage<'a, S: Storage + ?Sized> {
    storage: &'a S,
}

impl<'a, S: Storage + ?Sized> VersionLineage<'a, S> {
    #[inline]
    #[must_use]
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Version with the greatest identifier
    ///
    /// # Errors
    /// - `ProjectNotFound` if the project does not exist
    /// - `VersionNotFound` if it has no versions yet
    pub fn current_version(&self, project: ProjectId) -> Result<Version, StoreError> {
        self.storage.project(project)?;
        self.storage.current_version(project).ok_or_else(|| {
            StoreError::VersionNotFound(format!("project {project} has no versions"))
        })
    }

    /// Allocate `major+1.0.0`
    ///
    /// # Errors
    /// See [`VersionLineage::allocate`]
    pub fn next_major(&self, project: ProjectId) -> Result<Version, StoreError> {
        self.allocate(project, Bump::Major)
    }

    /// Allocate `major.minor+1.0`
    ///
    /// # Errors
    /// See [`VersionLineage::allocate`]
    pub fn next_minor(&self, project: ProjectId) -> Result<Version, StoreError> {
        self.allocate(project, Bump::Minor)
    }

    /// Allocate `major.minor.revision+1`
    ///
    /// # Errors
    /// See [`VersionLineage::allocate`]
    pub fn next_revision(&self, project: ProjectId) -> Result<Version, StoreError> {
        self.allocate(project, Bump::Revision)
    }

    /// Persist the version following the current one
    ///
    /// # Errors
    /// - `ProjectNotFound` if the project does not exist
    /// - `Conflict` if another allocation won the race
    /// - `VersionExhausted` if the bumped component cannot grow
    pub fn allocate(&self, project: ProjectId, bump: Bump) -> Result<Version, StoreError> {
        self.storage.project(project)?;

        let current = self.storage.current_version(project).map(|v| v.id);
        let base = current.unwrap_or(VersionId::ZERO);
        let next = base.next(bump).ok_or(StoreError::VersionExhausted {
            project,
            current: base,
            bump,
        })?;
        let version = Version::new(project, next);

        self.storage.insert_version(version.clone(), current)?;
        tracing::info!("Allocated version {} for project {}", next, project);
        Ok(version)
    }

    /// Versions of a project, ascending
    ///
    /// # Errors
    /// `ProjectNotFound`
    pub fn versions(&self, project: ProjectId) -> Result<Vec<Version>, StoreError> {
        self.storage.project(project)?;
        Ok(self.storage.versions(project))
    }

    /// Greatest version of the same project strictly below `version`
    #[must_use]
    pub fn predecessor(&self, version: &Version) -> Option<Version> {
        self.storage
            .versions(version.project)
            .into_iter()
            .take_while(|candidate| candidate.id < version.id)
            .last()
    }

    /// Look up a version by identifier
    ///
    /// # Errors
    /// `ProjectNotFound` or `VersionNotFound`
    pub fn find(&self, project: ProjectId, id: VersionId) -> Result<Version, StoreError> {
        self.versions(project)?
            .into_iter()
            .find(|version| version.id == id)
            .ok_or_else(|| StoreError::VersionNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use proptest::prelude::*;
    use reqtrace_model::Project;

    fn setup() -> (MemoryStore, ProjectId) {
        let store = MemoryStore::new();
        let project = Project::new("p", "");
        let id = project.id;
        store.insert_project(project).unwrap();
        (store, id)
    }

    #[test]
    fn first_allocation_starts_from_zero() {
        for (bump, expected) in [
            (Bump::Major, VersionId::new(1, 0, 0)),
            (Bump::Minor, VersionId::new(0, 1, 0)),
            (Bump::Revision, VersionId::new(0, 0, 1)),
        ] {
            let (store, project) = setup();
            let version = VersionLineage::new(&store).allocate(project, bump).unwrap();
            assert_eq!(version.id, expected);
        }
    }

    #[test]
    fn current_version_of_empty_project_is_not_found() {
        let (store, project) = setup();
        let err = VersionLineage::new(&store)
            .current_version(project)
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionNotFound(_)));
    }

    #[test]
    fn unknown_project_is_not_found() {
        let store = MemoryStore::new();
        let err = VersionLineage::new(&store)
            .next_major(ProjectId::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::ProjectNotFound(_)));
    }

    #[test]
    fn exhausted_component_fails_without_conflict() {
        let (store, project) = setup();
        let top = VersionId::new(1, u32::MAX, 0);
        store.insert_version(Version::new(project, top), None).unwrap();
        let lineage = VersionLineage::new(&store);

        let err = lineage.next_minor(project).unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionExhausted { current, bump: Bump::Minor, .. } if current == top
        ));
        assert!(!err.is_retryable());
        assert_eq!(lineage.versions(project).unwrap().len(), 1);

        let next = lineage.next_revision(project).unwrap();
        assert_eq!(next.id, VersionId::new(1, u32::MAX, 1));
    }

    #[test]
    fn predecessor_and_find() {
        let (store, project) = setup();
        let lineage = VersionLineage::new(&store);
        let v1 = lineage.next_major(project).unwrap();
        let v2 = lineage.next_revision(project).unwrap();
        let v3 = lineage.next_minor(project).unwrap();

        assert_eq!(v2.id, VersionId::new(1, 0, 1));
        assert_eq!(v3.id, VersionId::new(1, 1, 0));
        assert_eq!(lineage.predecessor(&v3).unwrap().uid, v2.uid);
        assert_eq!(lineage.predecessor(&v2).unwrap().uid, v1.uid);
        assert!(lineage.predecessor(&v1).is_none());
        assert_eq!(
            lineage.find(project, VersionId::new(1, 0, 1)).unwrap().uid,
            v2.uid
        );
        assert!(lineage.find(project, VersionId::new(9, 0, 0)).is_err());
    }

    fn arb_bump() -> impl Strategy<Value = Bump> {
        prop_oneof![Just(Bump::Major), Just(Bump::Minor), Just(Bump::Revision)]
    }

    proptest! {
        #[test]
        fn allocations_strictly_increase(bumps in proptest::collection::vec(arb_bump(), 1..20)) {
            let (store, project) = setup();
            let lineage = VersionLineage::new(&store);
            let mut previous = VersionId::ZERO;
            for bump in bumps {
                let version = lineage.allocate(project, bump).unwrap();
                prop_assert!(version.id > previous);
                prop_assert_eq!(Some(version.id), previous.next(bump));
                previous = version.id;
            }
            let listed: Vec<_> = lineage.versions(project).unwrap().iter().map(|v| v.id).collect();
            let mut sorted = listed.clone();
            sorted.sort();
            prop_assert_eq!(listed, sorted);
        }
    }
}
