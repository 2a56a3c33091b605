use proptest::prelude::*;
use reqtrace_core::{EngineConfig, TraceEngine};
use reqtrace_model::{ArtifactKind, Bump, ChangeSet, Project, ProjectId, TraceLink};
use reqtrace_store::EntityVersioningStore;
use reqtrace_test_utils::{baseline_changes, key, requirement, test_project};
use std::collections::{BTreeMap, BTreeSet};

fn engine() -> (TraceEngine, ProjectId) {
    let engine = TraceEngine::in_memory(EngineConfig::default()).unwrap();
    let project = engine.create_project(test_project("delta")).unwrap();
    (engine, project.id)
}

/// Change set turning artifact state `from` into `to`
fn transition(from: &BTreeMap<String, String>, to: &BTreeMap<String, String>) -> ChangeSet {
    let mut changes = ChangeSet::new("prop");
    for (name, body) in to {
        match from.get(name) {
            None => changes = changes.add_artifact(requirement(name, body)),
            Some(old) if old != body => changes = changes.update_artifact(requirement(name, body)),
            Some(_) => {}
        }
    }
    for name in from.keys().filter(|name| !to.contains_key(*name)) {
        changes = changes.remove_artifact(key(name));
    }
    changes
}

fn state() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[A-F]", "[ab]{1,2}", 0..6)
}

#[test]
fn test_diff_with_itself_is_empty() {
    let (engine, project) = engine();
    let v1 = engine
        .commit(project, Bump::Major, baseline_changes())
        .unwrap();

    let delta = engine.diff(project, v1.version_id, v1.version_id).unwrap();
    assert!(delta.is_empty());
    assert_eq!(delta.to_string(), "1.0.0 -> 1.0.0: artifacts +0 ~0 -0, traces +0 ~0 -0");
}

#[test]
fn test_diff_resolves_versions_within_project() {
    let engine = TraceEngine::in_memory(EngineConfig::default()).unwrap();
    let a = engine.create_project(Project::new("a", "")).unwrap();
    let b = engine.create_project(Project::new("b", "")).unwrap();
    engine.allocate_version(a.id, Bump::Major).unwrap();

    let err = engine
        .diff(b.id, "1.0.0".parse().unwrap(), "1.0.0".parse().unwrap())
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_empty_commit_carries_everything() {
    let (engine, project) = engine();
    let v1 = engine
        .commit(project, Bump::Major, baseline_changes())
        .unwrap();
    let v2 = engine
        .commit(project, Bump::Minor, ChangeSet::new("noop"))
        .unwrap();

    assert_eq!(v2.applied_count(), 0);
    assert_eq!(v2.artifacts.carried, 2);
    assert_eq!(v2.traces.carried, 1);
    assert!(engine
        .diff(project, v1.version_id, v2.version_id)
        .unwrap()
        .is_empty());
}

#[test]
fn test_modified_link_reports_before_and_after() {
    let (engine, project) = engine();
    let v1 = engine
        .commit(project, Bump::Major, baseline_changes())
        .unwrap();
    let v2 = engine
        .commit(
            project,
            Bump::Revision,
            ChangeSet::new("alice")
                .update_trace(TraceLink::manual("B", "A").with_explanation("reviewed")),
        )
        .unwrap();

    let delta = engine.diff(project, v1.version_id, v2.version_id).unwrap();
    let change = delta.traces.modified.values().next().unwrap();
    assert_eq!(change.before.attributes.explanation, "");
    assert_eq!(change.after.attributes.explanation, "reviewed");
    assert_eq!(change.before.entity_id, change.after.entity_id);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_delta_is_symmetric(from in state(), to in state()) {
        let (engine, project) = engine();
        let v1 = engine
            .commit(project, Bump::Major, transition(&BTreeMap::new(), &from))
            .unwrap();
        let v2 = engine
            .commit(project, Bump::Revision, transition(&from, &to))
            .unwrap();
        prop_assert_eq!(v2.error_count(), 0);

        let forward = engine.diff(project, v1.version_id, v2.version_id).unwrap();
        let backward = engine.diff(project, v2.version_id, v1.version_id).unwrap();

        let added: BTreeSet<_> = forward.artifacts.added.keys().collect();
        let removed: BTreeSet<_> = backward.artifacts.removed.keys().collect();
        prop_assert_eq!(added, removed);
        let removed: BTreeSet<_> = forward.artifacts.removed.keys().collect();
        let added: BTreeSet<_> = backward.artifacts.added.keys().collect();
        prop_assert_eq!(removed, added);
        let modified: BTreeSet<_> = forward.artifacts.modified.keys().collect();
        let back: BTreeSet<_> = backward.artifacts.modified.keys().collect();
        prop_assert_eq!(modified, back);
    }

    #[test]
    fn prop_untouched_entities_are_carried(from in state(), to in state()) {
        let (engine, project) = engine();
        let v1 = engine
            .commit(project, Bump::Major, transition(&BTreeMap::new(), &from))
            .unwrap();
        let v2 = engine
            .commit(project, Bump::Revision, transition(&from, &to))
            .unwrap();

        let revisions = EntityVersioningStore::new(engine.storage());
        let before = revisions.snapshot::<ArtifactKind>(v1.version_uid);
        let after = revisions.snapshot::<ArtifactKind>(v2.version_uid);

        let names: Vec<_> = after.keys().map(ToString::to_string).collect();
        let expected: Vec<_> = to.keys().cloned().collect();
        prop_assert_eq!(names, expected);
        for (key, revision) in &after {
            prop_assert_eq!(&revision.attributes.body, &to[key.as_str()]);
            if let Some(prior) = before.get(key) {
                prop_assert_eq!(prior.entity_id, revision.entity_id);
            }
        }
    }
}
