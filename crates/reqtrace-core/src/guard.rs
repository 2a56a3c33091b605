//! Project-scoped single-writer guard
//!
//! Version allocation and commits take a [`WriteLease`] on their project. A
//! second writer fails immediately with a retryable `Conflict`; it never
//! blocks. Reads take no lease.

use crate::error::EngineError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use reqtrace_model::ProjectId;

/// Active writers keyed by project
#[derive(Debug, Default)]
pub struct ProjectGuard {
    held: DashMap<ProjectId, &'static str>,
}

impl ProjectGuard {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the project for `operation`
    ///
    /// # Errors
    /// `Conflict` naming the current holder
    pub fn try_acquire(
        &self,
        project: ProjectId,
        operation: &'static str,
    ) -> Result<WriteLease<'_>, EngineError> {
        match self.held.entry(project) {
            Entry::Occupied(entry) => {
                let holder = *entry.get();
                tracing::warn!("Rejected {} on {}: {} in progress", operation, project, holder);
                Err(EngineError::Conflict {
                    project: project.to_string(),
                    holder,
                })
            }
            Entry::Vacant(entry) => {
                entry.insert(operation);
                Ok(WriteLease {
                    guard: self,
                    project,
                })
            }
        }
    }

    /// Check whether a writer holds the project
    #[inline]
    #[must_use]
    pub fn is_held(&self, project: ProjectId) -> bool {
        self.held.contains_key(&project)
    }
}

/// Exclusive write access to one project; released on drop
#[derive(Debug)]
pub struct WriteLease<'a> {
    guard: &'a ProjectGuard,
    project: ProjectId,
}

impl WriteLease<'_> {
    #[inline]
    #[must_use]
    pub fn project(&self) -> ProjectId {
        self.project
    }
}

impl Drop for WriteLease<'_> {
    fn drop(&mut self) {
        self.guard.held.remove(&self.project);
    }
}
