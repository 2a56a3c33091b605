use reqtrace_core::{EngineConfig, EngineError, TraceEngine};
use reqtrace_model::{Bump, ChangeSet, ProjectId, Version, VersionId};
use reqtrace_store::StoreError;
use reqtrace_test_utils::{baseline_changes, requirement, test_project};
use std::sync::Barrier;
use std::thread;

fn engine() -> (TraceEngine, ProjectId) {
    let engine = TraceEngine::in_memory(EngineConfig::default()).unwrap();
    let project = engine.create_project(test_project("shared")).unwrap();
    (engine, project.id)
}

#[test]
fn test_held_project_rejects_commit() {
    let (engine, project) = engine();
    let _lease = engine.guard().try_acquire(project, "allocate").unwrap();

    let err = engine
        .commit(project, Bump::Major, baseline_changes())
        .unwrap_err();

    assert!(matches!(err, EngineError::Conflict { holder: "allocate", .. }));
    assert!(err.is_retryable());
    assert!(engine.versions(project).unwrap().is_empty());
}

#[test]
fn test_stale_allocation_loses_compare_and_swap() {
    let (engine, project) = engine();
    engine.allocate_version(project, Bump::Major).unwrap();

    let stale = Version::new(project, VersionId::new(1, 0, 1));
    let err = engine.storage().insert_version(stale, None).unwrap_err();

    assert!(matches!(err, StoreError::Conflict { .. }));
    assert!(err.is_retryable());
}

#[test]
fn test_concurrent_allocations_never_share_an_identifier() {
    let (engine, project) = engine();
    let barrier = Barrier::new(8);

    let outcomes: Vec<Result<Version, EngineError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    engine.allocate_version(project, Bump::Revision)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut won: Vec<VersionId> = outcomes
        .iter()
        .filter_map(|outcome| outcome.as_ref().ok())
        .map(|version| version.id)
        .collect();
    assert!(!won.is_empty());
    assert!(outcomes
        .iter()
        .filter_map(|outcome| outcome.as_ref().err())
        .all(EngineError::is_retryable));

    let total = won.len();
    won.sort();
    won.dedup();
    assert_eq!(won.len(), total);
    assert_eq!(engine.versions(project).unwrap().len(), total);
}

#[test]
fn test_commits_to_different_projects_do_not_contend() {
    let engine = TraceEngine::in_memory(EngineConfig::default()).unwrap();
    let projects: Vec<ProjectId> = (0..4)
        .map(|i| {
            engine
                .create_project(test_project(&format!("p{i}")))
                .unwrap()
                .id
        })
        .collect();

    thread::scope(|scope| {
        for &project in &projects {
            let engine = &engine;
            scope.spawn(move || {
                let changes = ChangeSet::new("worker").add_artifact(requirement("A", "a"));
                let result = engine.commit(project, Bump::Major, changes).unwrap();
                assert_eq!(result.artifacts.added.len(), 1);
            });
        }
    });

    for project in projects {
        assert_eq!(
            engine.current_version(project).unwrap().id,
            VersionId::new(1, 0, 0)
        );
    }
}
