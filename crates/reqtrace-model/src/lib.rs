//! reqtrace entity model
//!
//! Versioned artifacts and trace links for requirements traceability.
//!
//! # Core Concepts
//!
//! - [`VersionId`]: Ordered `(major, minor, revision)` identifier
//! - [`EntityKind`]: Sealed trait tying a business key to attributes and a
//!   structural fingerprint ([`ArtifactKind`], [`TraceKind`])
//! - [`Revision<K>`]: State of one entity in one version
//! - [`ChangeSet`]: Caller input of one commit
//! - [`EntityDelta<K>`]: Added / modified / removed partition of two snapshots
//!
//! # Example
//!
//! ```rust
//! use reqtrace_model::{ArtifactKind, ArtifactRecord, EntityKind};
//!
//! let before = ArtifactRecord::new("REQ-1", "requirement", "v1");
//! let after = ArtifactRecord::new("REQ-1", "requirement", "v2");
//! assert_ne!(ArtifactKind::fingerprint(&before), ArtifactKind::fingerprint(&after));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod change;
mod delta;
mod entity;
mod hash;
mod key;
mod version;

pub use change::{ChangeSet, EntityChanges};
pub use delta::{DeltaSummary, EntityDelta, Modification, ProjectDelta, Snapshot};
pub use entity::{
    ApprovalStatus, ArtifactKind, ArtifactRecord, EntityKind, EntityKindTag, Revision, TraceKind,
    TraceLink, TraceType, ValidationIssue,
};
pub use hash::{ContentHash, FingerprintBuilder};
pub use key::{ArtifactKey, KeyError, TraceKey, MAX_KEY_LEN};
pub use version::{
    Bump, EntityId, Project, ProjectId, Version, VersionId, VersionParseError, VersionStamp,
    VersionUid,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
