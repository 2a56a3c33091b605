//! Step 4: validate, rank and write trace-link revisions
//!
//! Runs after artifacts are persisted so endpoints resolve against the
//! destination. Generated links are re-ranked for every target the commit
//! touched, then stale-link suppression is applied again before writing.

use crate::context::{CommitContext, Origin, Pending};
use crate::error::CommitError;
use crate::pipeline::CommitStep;
use crate::ranking::rank_and_mark_visibility;
use crate::result::AppliedEntity;
use reqtrace_model::{
    ArtifactKey, EntityKind, EntityKindTag, TraceKey, TraceKind, TraceLink, ValidationIssue,
};
use std::collections::BTreeSet;
use std::mem;

/// Step 4
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistTraces;

impl CommitStep for PersistTraces {
    fn name(&self) -> &'static str {
        "persist-traces"
    }

    fn apply(&self, ctx: &mut CommitContext<'_>) -> Result<(), CommitError> {
        reject_invalid(ctx);
        if ctx.should_halt() {
            return Ok(());
        }

        rank_touched_targets(ctx);
        ctx.suppress_stale_links();

        let revisions = ctx.revisions();
        let mut working = mem::take(&mut ctx.traces);
        for (key, pending) in &mut working {
            let entity_id = match pending.entity_id {
                Some(id) => id,
                None => ctx.trace_identity(key),
            };
            pending.entity_id = Some(entity_id);

            match pending.origin {
                Origin::Carried => {
                    match ctx.prior_traces.get(key) {
                        Some(prior) if prior.attributes == pending.attributes => {
                            revisions.carry_forward(prior, &ctx.destination)?
                        }
                        // re-ranked or re-suppressed: same entity, new derived state
                        _ => revisions.record_revision::<TraceKind>(
                            entity_id,
                            &ctx.destination,
                            pending.attributes.clone(),
                        )?,
                    };
                    ctx.result.traces.carried += 1;
                }
                Origin::Added | Origin::Modified => {
                    revisions.record_revision::<TraceKind>(
                        entity_id,
                        &ctx.destination,
                        pending.attributes.clone(),
                    )?;
                    let applied = AppliedEntity {
                        entity_id,
                        key: key.to_string(),
                    };
                    if pending.origin == Origin::Added {
                        ctx.result.traces.added.push(applied);
                    } else {
                        ctx.result.traces.modified.push(applied);
                    }
                }
            }

            if !pending.attributes.visible {
                ctx.result.suppressed.push(key.to_string());
            }
        }
        ctx.traces = working;

        tracing::debug!(
            "Wrote {} trace revisions to {} ({} hidden)",
            ctx.traces.len(),
            ctx.destination.id,
            ctx.result.suppressed.len()
        );
        Ok(())
    }
}

fn check(
    ctx: &CommitContext<'_>,
    key: &TraceKey,
    link: &TraceLink,
) -> Result<(), ValidationIssue> {
    TraceKind::validate(link)?;
    let (low, high) = key.endpoints();
    for endpoint in [low, high] {
        if ctx.artifact_id(endpoint).is_none() {
            return Err(ValidationIssue::UnresolvedEndpoint(endpoint.clone()));
        }
    }
    Ok(())
}

/// Record errors for invalid submitted links; invalid updates keep the prior
/// state, invalid adds are dropped
fn reject_invalid(ctx: &mut CommitContext<'_>) {
    let rejected: Vec<_> = ctx
        .traces
        .iter()
        .filter(|(_, pending)| pending.is_submitted())
        .filter_map(|(key, pending)| {
            check(ctx, key, &pending.attributes)
                .err()
                .map(|issue| (key.clone(), pending.origin, issue))
        })
        .collect();

    for (key, origin, issue) in rejected {
        ctx.result
            .record_error(EntityKindTag::Trace, key.to_string(), issue);
        ctx.traces.remove(&key);
        if origin == Origin::Modified {
            if let Some(prior) = ctx.prior_traces.get(&key) {
                ctx.traces.insert(
                    key,
                    Pending::new(
                        Some(prior.entity_id),
                        prior.attributes.clone(),
                        Origin::Carried,
                    ),
                );
            }
        }
    }
}

/// Targets of submitted links and of links removed by this commit
fn touched_targets(ctx: &CommitContext<'_>) -> BTreeSet<ArtifactKey> {
    let submitted = ctx
        .traces
        .values()
        .filter(|pending| pending.is_submitted())
        .map(|pending| &pending.attributes);
    let removed = ctx
        .removed_traces
        .iter()
        .filter_map(|key| ctx.prior_traces.get(key))
        .map(|revision| &revision.attributes);

    submitted
        .chain(removed)
        .filter_map(|link| link.target_key().ok())
        .collect()
}

fn rank_touched_targets(ctx: &mut CommitContext<'_>) {
    let touched = touched_targets(ctx);
    if touched.is_empty() {
        return;
    }

    let (keys, mut links): (Vec<TraceKey>, Vec<TraceLink>) = ctx
        .traces
        .iter()
        .filter(|(_, pending)| pending.attributes.is_generated())
        .filter(|(_, pending)| {
            pending
                .attributes
                .target_key()
                .is_ok_and(|target| touched.contains(&target))
        })
        .map(|(key, pending)| (key.clone(), pending.attributes.clone()))
        .unzip();

    rank_and_mark_visibility(&mut links, &ctx.config.ranking);

    for (key, link) in keys.into_iter().zip(links) {
        if let Some(pending) = ctx.traces.get_mut(&key) {
            pending.attributes = link;
        }
    }
    tracing::debug!("Re-ranked links to {} targets", touched.len());
}
