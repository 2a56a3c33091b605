//! reqtrace engine
//!
//! Versioned commit and delta engine for requirements traceability. Every
//! commit produces a full snapshot of a project's artifacts and trace links
//! under a new version; any two versions can be diffed on demand.
//!
//! # Example
//!
//! ```rust
//! use reqtrace_core::{EngineConfig, TraceEngine};
//! use reqtrace_model::{ArtifactRecord, Bump, ChangeSet, Project};
//!
//! let engine = TraceEngine::in_memory(EngineConfig::default()).unwrap();
//! let project = engine.create_project(Project::new("demo", "")).unwrap();
//!
//! let changes = ChangeSet::new("alice")
//!     .add_artifact(ArtifactRecord::new("REQ-1", "requirement", "shall log in"))
//!     .add_artifact(ArtifactRecord::new("SRC-1", "source", "fn login()"))
//!     .add_generated_trace("SRC-1", "REQ-1", 0.87);
//! let first = engine.commit(project.id, Bump::Major, changes).unwrap();
//!
//! let changes = ChangeSet::new("alice")
//!     .update_artifact(ArtifactRecord::new("REQ-1", "requirement", "shall log in twice"));
//! let second = engine.commit(project.id, Bump::Revision, changes).unwrap();
//!
//! let delta = engine
//!     .diff(project.id, first.version_id, second.version_id)
//!     .unwrap();
//! assert_eq!(delta.artifacts.modified.len(), 1);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod guard;

pub use config::{CommitPolicy, EngineConfig};
pub use engine::{TraceEngine, VersionView};
pub use error::EngineError;
pub use guard::{ProjectGuard, WriteLease};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the engine
    pub use crate::{EngineConfig, EngineError, TraceEngine};
    pub use reqtrace_commit::{CommitOutcome, CommitResult, RankingPolicy};
    pub use reqtrace_model::{
        ArtifactKey, ArtifactRecord, Bump, ChangeSet, Project, ProjectDelta, TraceKey, TraceLink,
        VersionId,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
