//! reqtrace storage layer
//!
//! Snapshot-per-version persistence for the traceability model.
//!
//! # Components
//!
//! - [`Storage`] / [`RevisionTable`]: the storage collaborator boundary
//! - [`MemoryStore`]: thread-safe in-memory implementation with JSON dumps
//! - [`VersionLineage`]: ordering and compare-and-swap allocation of versions
//! - [`EntityVersioningStore`]: exact `(entity, version)` resolution and
//!   append-only revision recording
//! - [`DeltaEngine`]: added / modified / removed diff of two versions
//!
//! # Example
//!
//! ```rust
//! use reqtrace_model::{Bump, Project};
//! use reqtrace_store::{DeltaEngine, MemoryStore, Storage, VersionLineage};
//!
//! let store = MemoryStore::new();
//! let project = Project::new("demo", "");
//! let id = project.id;
//! store.insert_project(project).unwrap();
//!
//! let v1 = VersionLineage::new(&store).allocate(id, Bump::Major).unwrap();
//! assert!(DeltaEngine::new(&store).diff(v1.uid, v1.uid).unwrap().is_empty());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod diff;
mod error;
mod lineage;
mod memory;
mod storage;
mod versioning;

pub use diff::DeltaEngine;
pub use error::StoreError;
pub use lineage::VersionLineage;
pub use memory::{MemoryStore, MemoryTable, StoreSnapshot};
pub use storage::{RevisionTable, Storage, StoredKind};
pub use versioning::EntityVersioningStore;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
