//! reqtrace commit pipeline
//!
//! Applies a [`ChangeSet`](reqtrace_model::ChangeSet) to a freshly allocated
//! version through a fixed chain of [`CommitStep`]s:
//!
//! 1. carry-forward: build the destination working set from the prior version
//! 2. suppress-stale-links: hide links to removed or declined targets
//! 3. persist-artifacts: validate and write artifact revisions
//! 4. persist-traces: validate, rank and write trace-link revisions
//! 5. stamp-version: record last-updated metadata (best effort)
//! 6. emit-notifications: publish the change summary (best effort)
//!
//! # Example
//!
//! ```rust
//! use reqtrace_commit::{CommitPipeline, NullSink, PipelineConfig};
//! use reqtrace_model::{ArtifactRecord, Bump, ChangeSet, Project};
//! use reqtrace_store::{MemoryStore, Storage, VersionLineage};
//!
//! let store = MemoryStore::new();
//! let project = Project::new("demo", "");
//! let id = project.id;
//! store.insert_project(project).unwrap();
//! let v1 = VersionLineage::new(&store).allocate(id, Bump::Major).unwrap();
//!
//! let mut changes = ChangeSet::new("alice");
//! changes.artifacts.added.push(ArtifactRecord::new("REQ-1", "requirement", "text"));
//!
//! let pipeline = CommitPipeline::standard(PipelineConfig::default());
//! let result = pipeline.run(&store, &v1, changes, &NullSink).unwrap();
//! assert_eq!(result.artifacts.added.len(), 1);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod context;
mod error;
mod notify;
mod pipeline;
mod ranking;
mod result;
pub mod steps;

pub use context::{CommitContext, Origin, Pending};
pub use error::CommitError;
pub use notify::{
    CommitNotification, EntityAction, EntityChange, NotificationSink, NotifyError, NullSink,
    RecordingSink,
};
pub use pipeline::{CommitPipeline, CommitStep, PipelineConfig, StepPhase};
pub use ranking::{rank_and_mark_visibility, RankingPolicy};
pub use result::{AppliedChanges, AppliedEntity, CommitOutcome, CommitResult, EntityError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
