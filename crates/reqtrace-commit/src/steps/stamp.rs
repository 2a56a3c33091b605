//! Step 5: record last-updated metadata on the destination

use crate::context::CommitContext;
use crate::error::CommitError;
use crate::pipeline::{CommitStep, StepPhase};
use chrono::Utc;
use reqtrace_model::VersionStamp;

/// Step 5
#[derive(Debug, Clone, Copy, Default)]
pub struct StampVersion;

impl CommitStep for StampVersion {
    fn name(&self) -> &'static str {
        "stamp-version"
    }

    fn phase(&self) -> StepPhase {
        StepPhase::BestEffort
    }

    fn apply(&self, ctx: &mut CommitContext<'_>) -> Result<(), CommitError> {
        let stamp = VersionStamp {
            at: Utc::now(),
            actor: ctx.changes.actor.clone(),
        };
        ctx.storage()
            .stamp_version(ctx.destination.uid, stamp.clone())?;
        ctx.destination.stamp = Some(stamp);
        Ok(())
    }
}
