//! Step 6: hand the change summary to the notification collaborator

use crate::context::CommitContext;
use crate::error::CommitError;
use crate::pipeline::{CommitStep, StepPhase};

/// Step 6
#[derive(Debug, Clone, Copy, Default)]
pub struct EmitNotifications;

impl CommitStep for EmitNotifications {
    fn name(&self) -> &'static str {
        "emit-notifications"
    }

    fn phase(&self) -> StepPhase {
        StepPhase::BestEffort
    }

    fn apply(&self, ctx: &mut CommitContext<'_>) -> Result<(), CommitError> {
        let payload = ctx.result.to_notification();
        ctx.sink().publish(&payload)?;
        tracing::debug!(
            "Published {} change groups for {}",
            payload.changes.len(),
            ctx.destination.id
        );
        ctx.result.notification = Some(payload);
        Ok(())
    }
}
