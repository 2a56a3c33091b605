//! Step 2: hide stale links
//!
//! A link is stale when an endpoint is not live in the destination, it was
//! declined, or its generated score is below the ranking floor. Stale links
//! are written as non-visible, never deleted.

use crate::context::CommitContext;
use crate::error::CommitError;
use crate::pipeline::CommitStep;

/// Step 2
#[derive(Debug, Clone, Copy, Default)]
pub struct SuppressStaleLinks;

impl CommitStep for SuppressStaleLinks {
    fn name(&self) -> &'static str {
        "suppress-stale-links"
    }

    fn apply(&self, ctx: &mut CommitContext<'_>) -> Result<(), CommitError> {
        let hidden = ctx.suppress_stale_links();
        if hidden > 0 {
            tracing::debug!("Suppressed {} stale links in {}", hidden, ctx.destination.id);
        }
        Ok(())
    }
}
