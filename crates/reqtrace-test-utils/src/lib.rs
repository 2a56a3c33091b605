//! Testing utilities for the reqtrace workspace
//!
//! Shared fixtures, sinks and assertions.

#![allow(missing_docs)]

use reqtrace_commit::{CommitNotification, NotificationSink, NotifyError};
use reqtrace_model::{
    ArtifactKey, ArtifactKind, ArtifactRecord, ChangeSet, EntityKind, Project, Snapshot, TraceKey,
    TraceLink,
};

pub const REQUIREMENT: &str = "requirement";
pub const SOURCE: &str = "source";

/// Project accepting requirement and source artifacts
pub fn test_project(name: &str) -> Project {
    Project::new(name, "fixture project")
        .with_artifact_type(REQUIREMENT)
        .with_artifact_type(SOURCE)
}

pub fn requirement(name: &str, body: &str) -> ArtifactRecord {
    ArtifactRecord::new(name, REQUIREMENT, body)
}

pub fn source(name: &str, body: &str) -> ArtifactRecord {
    ArtifactRecord::new(name, SOURCE, body)
}

pub fn key(name: &str) -> ArtifactKey {
    ArtifactKey::new(name).unwrap()
}

pub fn trace_key(a: &str, b: &str) -> TraceKey {
    TraceKey::parse(a, b).unwrap()
}

/// A:"body1", B:"body2" and a manual trace A -> B
pub fn baseline_changes() -> ChangeSet {
    ChangeSet::new("fixture")
        .add_artifact(requirement("A", "body1"))
        .add_artifact(requirement("B", "body2"))
        .add_trace(TraceLink::manual("A", "B"))
}

/// One source artifact per score, each with a generated link to `target`
pub fn generated_links(target: &str, scores: &[f64]) -> ChangeSet {
    scores.iter().enumerate().fold(
        ChangeSet::new("scorer").add_artifact(requirement(target, "target")),
        |changes, (i, &score)| {
            let name = format!("S{i}");
            changes
                .add_artifact(source(&name, "code"))
                .add_generated_trace(name, target, score)
        },
    )
}

/// Sorted business keys of a snapshot
pub fn keys<K: EntityKind>(snapshot: &Snapshot<K>) -> Vec<String> {
    snapshot.keys().map(ToString::to_string).collect()
}

/// Sink that rejects every payload
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSink;

impl NotificationSink for FailingSink {
    fn publish(&self, _: &CommitNotification) -> Result<(), NotifyError> {
        Err(NotifyError("sink unavailable".to_string()))
    }
}

/// Assert an artifact's body in a snapshot
pub fn assert_body(snapshot: &Snapshot<ArtifactKind>, name: &str, body: &str) {
    let revision = snapshot
        .get(&key(name))
        .unwrap_or_else(|| panic!("{name} missing from snapshot"));
    assert_eq!(revision.attributes.body, body, "body of {name}");
}
