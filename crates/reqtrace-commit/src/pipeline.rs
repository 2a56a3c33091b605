//! Commit pipeline
//!
//! A [`CommitPipeline`] is a statically ordered list of [`CommitStep`]s run
//! over one [`CommitContext`]. Transactional steps accumulate per-entity
//! errors; when `fail_on_error` is set the pipeline halts after the first
//! such step that reported any, and everything written under the destination
//! is purged. Best-effort steps never roll back revisions; their failures
//! degrade the outcome.

use crate::context::CommitContext;
use crate::error::CommitError;
use crate::notify::{CommitNotification, NotificationSink};
use crate::ranking::RankingPolicy;
use crate::result::CommitResult;
use crate::steps;
use reqtrace_model::{ChangeSet, Version};
use reqtrace_store::Storage;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Pipeline settings
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub ranking: RankingPolicy,
    /// Emit an empty payload when a commit is aborted
    pub notify_on_abort: bool,
}

impl PipelineConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_ranking(mut self, ranking: RankingPolicy) -> Self {
        self.ranking = ranking;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_notify_on_abort(mut self, notify: bool) -> Self {
        self.notify_on_abort = notify;
        self
    }
}

/// Failure handling of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    /// Errors halt under `fail_on_error`; failures purge the destination
    Transactional,
    /// Failures are logged and degrade the outcome
    BestEffort,
}

/// One named stage of the pipeline
pub trait CommitStep: Send + Sync + Debug {
    /// Step name (for logs and degraded reasons)
    fn name(&self) -> &'static str;

    /// Failure handling
    fn phase(&self) -> StepPhase {
        StepPhase::Transactional
    }

    /// Apply the step
    ///
    /// # Errors
    /// Returns error on collaborator failure; per-entity problems are
    /// recorded in the context instead
    fn apply(&self, ctx: &mut CommitContext<'_>) -> Result<(), CommitError>;
}

/// Ordered chain of commit steps
#[derive(Debug)]
pub struct CommitPipeline {
    steps: Vec<Box<dyn CommitStep>>,
    config: PipelineConfig,
}

impl CommitPipeline {
    /// The six standard steps in their fixed order
    #[must_use]
    pub fn standard(config: PipelineConfig) -> Self {
        Self {
            steps: vec![
                Box::new(steps::CarryForward),
                Box::new(steps::SuppressStaleLinks),
                Box::new(steps::PersistArtifacts),
                Box::new(steps::PersistTraces),
                Box::new(steps::StampVersion),
                Box::new(steps::EmitNotifications),
            ],
            config,
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Step names in execution order
    #[must_use]
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Commit a change set into `destination`
    ///
    /// # Errors
    /// - `NotCurrent` if `destination` is not the project's current version
    /// - `Store` on storage failure during steps 1-4; the destination is left
    ///   without revisions
    pub fn run(
        &self,
        storage: &dyn Storage,
        destination: &Version,
        changes: ChangeSet,
        sink: &dyn NotificationSink,
    ) -> Result<CommitResult, CommitError> {
        let mut ctx = CommitContext::prepare(storage, sink, &self.config, destination, changes)?;
        tracing::info!(
            "Committing {} changes from '{}' to {} {}",
            ctx.changes.len(),
            ctx.changes.actor,
            ctx.project.name,
            ctx.destination.id
        );

        for step in &self.steps {
            match step.phase() {
                StepPhase::Transactional => {
                    if let Err(err) = step.apply(&mut ctx) {
                        let purged = ctx.purge();
                        tracing::warn!(
                            "Step {} failed on {}: {} (purged {} revisions)",
                            step.name(),
                            ctx.destination.id,
                            err,
                            purged
                        );
                        return Err(err);
                    }
                    if ctx.should_halt() {
                        self.abort(&mut ctx, step.name());
                        return Ok(ctx.result);
                    }
                }
                StepPhase::BestEffort => {
                    if let Err(err) = step.apply(&mut ctx) {
                        tracing::warn!("Step {} degraded: {}", step.name(), err);
                        ctx.result.degrade(step.name(), err);
                    }
                }
            }
            tracing::debug!("Step {} complete", step.name());
        }

        tracing::info!(
            "Committed {}: artifacts +{} ~{} -{}, traces +{} ~{} -{}, {} errors",
            ctx.destination.id,
            ctx.result.artifacts.added.len(),
            ctx.result.artifacts.modified.len(),
            ctx.result.artifacts.removed.len(),
            ctx.result.traces.added.len(),
            ctx.result.traces.modified.len(),
            ctx.result.traces.removed.len(),
            ctx.result.error_count()
        );
        Ok(ctx.result)
    }

    fn abort(&self, ctx: &mut CommitContext<'_>, step: &str) {
        let purged = ctx.purge();
        ctx.result.abort();
        tracing::warn!(
            "Aborted commit to {} after {}: {} errors, purged {} revisions",
            ctx.destination.id,
            step,
            ctx.result.error_count(),
            purged
        );

        if self.config.notify_on_abort {
            let payload = CommitNotification::empty(ctx.destination.uid, ctx.destination.id);
            match ctx.sink().publish(&payload) {
                Ok(()) => ctx.result.notification = Some(payload),
                Err(err) => tracing::warn!("Abort notification failed: {}", err),
            }
        }
    }
}
