//! Subcommand handlers
//!
//! Each handler runs against a [`Session`] and returns the text to print.

use crate::store_file;
use anyhow::{bail, Context, Result};
use reqtrace_commit::{CommitNotification, CommitResult, RecordingSink};
use reqtrace_core::{EngineConfig, TraceEngine};
use reqtrace_model::{Bump, ChangeSet, EntityKind, Modification, Project, VersionId};
use reqtrace_store::MemoryStore;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Engine over the store file, plus the sink collecting this run's payloads
pub(crate) struct Session {
    store: Arc<MemoryStore>,
    sink: Arc<RecordingSink>,
    engine: TraceEngine,
    path: PathBuf,
}

impl Session {
    pub(crate) fn open(path: &Path, config: EngineConfig) -> Result<Self> {
        let store = Arc::new(store_file::open(path)?);
        let sink = Arc::new(RecordingSink::new());
        let engine = TraceEngine::new(store.clone(), config)?.with_sink(sink.clone());
        Ok(Self {
            store,
            sink,
            engine,
            path: path.to_path_buf(),
        })
    }

    pub(crate) fn save(&self) -> Result<()> {
        store_file::save(&self.store, &self.path)
    }

    fn project(&self, name: &str) -> Result<Project> {
        Ok(self.engine.project(name)?)
    }
}

/// Result of a command
#[derive(Debug)]
pub(crate) struct Report {
    pub(crate) text: String,
    pub(crate) success: bool,
}

impl Report {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
        }
    }
}

pub(crate) fn project_create(
    session: &Session,
    name: &str,
    description: &str,
    types: &[String],
) -> Result<Report> {
    let project = types
        .iter()
        .fold(Project::new(name, description), |project, t| {
            project.with_artifact_type(t)
        });
    let project = session.engine.create_project(project)?;
    session.save()?;
    Ok(Report::ok(format!("created project {} ({})", project.name, project.id)))
}

pub(crate) fn project_list(session: &Session) -> Result<Report> {
    let mut text = String::new();
    for project in session.engine.projects() {
        let current = session
            .engine
            .current_version(project.id)
            .map_or_else(|| "-".to_string(), |v| v.id.to_string());
        writeln!(text, "{}\t{}\t{}", project.name, current, project.description)?;
    }
    Ok(Report::ok(text.trim_end()))
}

pub(crate) fn version_new(session: &Session, project: &str, bump: Bump) -> Result<Report> {
    let project = session.project(project)?;
    let version = session.engine.allocate_version(project.id, bump)?;
    session.save()?;
    Ok(Report::ok(format!("{} {}", project.name, version.id)))
}

pub(crate) fn version_list(session: &Session, project: &str) -> Result<Report> {
    let project = session.project(project)?;
    let mut text = String::new();
    for version in session.engine.versions(project.id)? {
        match &version.stamp {
            Some(stamp) => writeln!(
                text,
                "{}\t{}\tupdated {} by {}",
                version.id,
                version.created_at.to_rfc3339(),
                stamp.at.to_rfc3339(),
                stamp.actor
            )?,
            None => writeln!(text, "{}\t{}", version.id, version.created_at.to_rfc3339())?,
        }
    }
    Ok(Report::ok(text.trim_end()))
}

#[derive(Serialize)]
struct CommitReport<'a> {
    result: &'a CommitResult,
    notifications: Vec<CommitNotification>,
}

pub(crate) fn commit(
    session: &Session,
    project: &str,
    changes: &Path,
    bump: Bump,
    fail_on_error: bool,
) -> Result<Report> {
    let project = session.project(project)?;
    let text = fs::read_to_string(changes)
        .with_context(|| format!("reading change set {}", changes.display()))?;
    let mut changes: ChangeSet = serde_json::from_str(&text)
        .with_context(|| format!("decoding change set {}", changes.display()))?;
    changes.fail_on_error |= fail_on_error;

    let result = session.engine.commit(project.id, bump, changes)?;
    session.save()?;

    let report = CommitReport {
        result: &result,
        notifications: session.sink.take(),
    };
    Ok(Report {
        text: serde_json::to_string_pretty(&report)?,
        success: !result.is_aborted(),
    })
}

pub(crate) fn diff(
    session: &Session,
    project: &str,
    from: VersionId,
    to: VersionId,
    json: bool,
) -> Result<Report> {
    let project = session.project(project)?;
    let delta = session.engine.diff(project.id, from, to)?;
    if json {
        return Ok(Report::ok(serde_json::to_string_pretty(&delta)?));
    }

    let mut text = format!("{delta}\n");
    let artifacts = &delta.artifacts;
    let traces = &delta.traces;
    for key in artifacts.added.keys() {
        writeln!(text, "+ artifact {key}")?;
    }
    for (key, change) in &artifacts.modified {
        writeln!(text, "~ artifact {key} {}", fingerprints(change))?;
    }
    for key in artifacts.removed.keys() {
        writeln!(text, "- artifact {key}")?;
    }
    for key in traces.added.keys() {
        writeln!(text, "+ trace {key}")?;
    }
    for (key, change) in &traces.modified {
        writeln!(text, "~ trace {key} {}", fingerprints(change))?;
    }
    for key in traces.removed.keys() {
        writeln!(text, "- trace {key}")?;
    }
    Ok(Report::ok(text.trim_end()))
}

fn fingerprints<K: EntityKind>(change: &Modification<K>) -> String {
    format!(
        "{} -> {}",
        change.before.fingerprint().short(),
        change.after.fingerprint().short()
    )
}

pub(crate) fn show(session: &Session, project: &str, version: VersionId) -> Result<Report> {
    let project = session.project(project)?;
    let view = session.engine.show(project.id, version)?;
    Ok(Report::ok(serde_json::to_string_pretty(&view)?))
}

/// Parse `major|minor|revision`
pub(crate) fn parse_bump(s: &str) -> Result<Bump, String> {
    s.parse()
}

/// Parse `x.y.z`
pub(crate) fn parse_version(s: &str) -> Result<VersionId> {
    match s.parse() {
        Ok(id) => Ok(id),
        Err(err) => bail!("invalid version '{s}': {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reqtrace_model::{ArtifactKind, ArtifactRecord, ProjectDelta, TraceLink};
    use reqtrace_test_utils::{baseline_changes, requirement, trace_key, REQUIREMENT};

    fn session(dir: &Path) -> Session {
        Session::open(&dir.join("store.json"), EngineConfig::default()).unwrap()
    }

    fn write_changes(dir: &Path, name: &str, changes: &ChangeSet) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, serde_json::to_string(changes).unwrap()).unwrap();
        path
    }

    #[test]
    fn commit_and_diff_across_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let first = session(dir.path());
        project_create(&first, "demo", "", &[REQUIREMENT.to_string()]).unwrap();
        let changes = write_changes(dir.path(), "v1.json", &baseline_changes());
        let report = commit(&first, "demo", &changes, Bump::Major, false).unwrap();
        assert!(report.success);
        drop(first);

        let second = session(dir.path());
        let update = ChangeSet::new("alice").update_artifact(requirement("A", "body1-v2"));
        let changes = write_changes(dir.path(), "v2.json", &update);
        commit(&second, "demo", &changes, Bump::Revision, false).unwrap();

        let report = diff(
            &second,
            "demo",
            VersionId::new(1, 0, 0),
            VersionId::new(1, 0, 1),
            false,
        )
        .unwrap();
        let before = ArtifactKind::fingerprint(&requirement("A", "body1")).short();
        let after = ArtifactKind::fingerprint(&requirement("A", "body1-v2")).short();
        assert_eq!(
            report.text,
            format!(
                "1.0.0 -> 1.0.1: artifacts +0 ~1 -0, traces +0 ~0 -0\n\
                 ~ artifact A {before} -> {after}"
            )
        );

        let listing = version_list(&second, "demo").unwrap().text;
        assert_eq!(listing.lines().count(), 2);
        assert!(listing.contains("by alice"));
    }

    #[test]
    fn diff_as_json_includes_trace_changes() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());
        project_create(&session, "demo", "", &[]).unwrap();
        let changes = write_changes(dir.path(), "v1.json", &baseline_changes());
        commit(&session, "demo", &changes, Bump::Major, false).unwrap();

        let update = ChangeSet::new("alice")
            .add_artifact(requirement("C", "body3"))
            .add_trace(TraceLink::manual("B", "C"));
        let changes = write_changes(dir.path(), "v2.json", &update);
        commit(&session, "demo", &changes, Bump::Revision, false).unwrap();

        let (v1, v2) = (VersionId::new(1, 0, 0), VersionId::new(1, 0, 1));
        let report = diff(&session, "demo", v1, v2, true).unwrap();
        let delta: ProjectDelta = serde_json::from_str(&report.text).unwrap();

        assert_eq!(delta.target, v2);
        assert_eq!(delta.traces.summary().to_string(), "+1 ~0 -0");
        assert!(delta.traces.added.contains_key(&trace_key("B", "C")));
        let project = session.project("demo").unwrap();
        assert_eq!(delta, session.engine.diff(project.id, v1, v2).unwrap());

        let text = diff(&session, "demo", v1, v2, false).unwrap().text;
        assert!(text.ends_with("+ artifact C\n+ trace B <-> C"));
    }

    #[test]
    fn aborted_commit_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());
        project_create(&session, "demo", "", &[]).unwrap();
        let changes = write_changes(
            dir.path(),
            "bad.json",
            &ChangeSet::new("alice").add_artifact(ArtifactRecord::new("A", "", "")),
        );

        let report = commit(&session, "demo", &changes, Bump::Major, true).unwrap();

        assert!(!report.success);
        assert!(report.text.contains("\"status\": \"aborted\""));
        assert!(project_list(&session).unwrap().text.starts_with("demo\t-"));
    }

    #[test]
    fn unknown_project_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = version_new(&session(dir.path()), "nope", Bump::Major).unwrap_err();
        assert!(err.to_string().contains("unknown project 'nope'"));
    }

    #[test]
    fn show_lists_live_entities() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());
        project_create(&session, "demo", "", &[]).unwrap();
        let changes = write_changes(dir.path(), "v1.json", &baseline_changes());
        commit(&session, "demo", &changes, Bump::Major, false).unwrap();

        let report = show(&session, "demo", VersionId::new(1, 0, 0)).unwrap();
        let view: serde_json::Value = serde_json::from_str(&report.text).unwrap();
        assert_eq!(view["artifacts"].as_array().unwrap().len(), 2);
        assert_eq!(view["traces"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn version_arguments_parse() {
        assert_eq!(parse_version("1.2.3").unwrap(), VersionId::new(1, 2, 3));
        assert!(parse_version("1.2").is_err());
        assert_eq!(parse_bump("minor"), Ok(Bump::Minor));
        assert!(parse_bump("patch").is_err());
    }
}
