//! Step 1: build the destination working set
//!
//! Submitted adds and updates enter the working set; every live entity of the
//! prior version that is neither removed nor updated is carried forward.
//! Removing an artifact removes every trace link touching it.

use crate::context::{CommitContext, Origin, Pending};
use crate::error::CommitError;
use crate::pipeline::CommitStep;
use crate::result::AppliedEntity;
use reqtrace_model::{
    EntityChanges, EntityId, EntityKind, EntityKindTag, Snapshot, ValidationIssue,
};
use std::collections::{BTreeMap, BTreeSet};

/// Step 1
#[derive(Debug, Clone, Copy, Default)]
pub struct CarryForward;

impl CommitStep for CarryForward {
    fn name(&self) -> &'static str {
        "carry-forward"
    }

    fn apply(&self, ctx: &mut CommitContext<'_>) -> Result<(), CommitError> {
        plan_artifacts(ctx);
        plan_traces(ctx);

        tracing::debug!(
            "Working set for {}: {} artifacts, {} traces, {} removed",
            ctx.destination.id,
            ctx.artifacts.len(),
            ctx.traces.len(),
            ctx.removed_artifacts.len() + ctx.removed_traces.len()
        );
        Ok(())
    }
}

/// Explicit changes of one kind resolved against the prior snapshot
struct Plan<K: EntityKind> {
    pending: BTreeMap<K::Key, Pending<K>>,
    removed: BTreeMap<K::Key, EntityId>,
    errors: Vec<(String, ValidationIssue)>,
}

fn plan<K: EntityKind>(
    changes: &EntityChanges<K>,
    prior: &Snapshot<K>,
    label: impl Fn(&K::Attributes) -> String,
) -> Plan<K> {
    let mut plan = Plan {
        pending: BTreeMap::new(),
        removed: BTreeMap::new(),
        errors: Vec::new(),
    };
    let mut seen = BTreeSet::new();

    for key in &changes.removed {
        if !seen.insert(key.clone()) {
            plan.errors
                .push((key.to_string(), ValidationIssue::Duplicate(key.to_string())));
            continue;
        }
        match prior.get(key) {
            Some(revision) => {
                plan.removed.insert(key.clone(), revision.entity_id);
            }
            None => plan
                .errors
                .push((key.to_string(), ValidationIssue::NotFound(key.to_string()))),
        }
    }

    for attributes in &changes.modified {
        let key = match K::key(attributes) {
            Ok(key) => key,
            Err(issue) => {
                plan.errors.push((label(attributes), issue));
                continue;
            }
        };
        if !seen.insert(key.clone()) {
            plan.errors
                .push((key.to_string(), ValidationIssue::Duplicate(key.to_string())));
            continue;
        }
        match prior.get(&key) {
            Some(revision) => {
                plan.pending.insert(
                    key,
                    Pending::new(
                        Some(revision.entity_id),
                        attributes.clone(),
                        Origin::Modified,
                    ),
                );
            }
            None => plan
                .errors
                .push((key.to_string(), ValidationIssue::NotFound(key.to_string()))),
        }
    }

    for attributes in &changes.added {
        let key = match K::key(attributes) {
            Ok(key) => key,
            Err(issue) => {
                plan.errors.push((label(attributes), issue));
                continue;
            }
        };
        if !seen.insert(key.clone()) {
            plan.errors
                .push((key.to_string(), ValidationIssue::Duplicate(key.to_string())));
            continue;
        }
        if prior.contains_key(&key) {
            plan.errors
                .push((key.to_string(), ValidationIssue::AlreadyExists(key.to_string())));
            continue;
        }
        plan.pending
            .insert(key, Pending::new(None, attributes.clone(), Origin::Added));
    }

    plan
}

fn plan_artifacts(ctx: &mut CommitContext<'_>) {
    let plan = plan(&ctx.changes.artifacts, &ctx.prior_artifacts, |artifact| {
        artifact.name.clone()
    });

    for (key, issue) in plan.errors {
        ctx.result.record_error(EntityKindTag::Artifact, key, issue);
    }
    for (key, entity_id) in plan.removed {
        ctx.result.artifacts.removed.push(AppliedEntity {
            entity_id,
            key: key.to_string(),
        });
        ctx.removed_artifacts.insert(key);
    }
    ctx.artifacts = plan.pending;

    for (key, revision) in &ctx.prior_artifacts {
        if ctx.removed_artifacts.contains(key) || ctx.artifacts.contains_key(key) {
            continue;
        }
        ctx.artifacts.insert(
            key.clone(),
            Pending::new(
                Some(revision.entity_id),
                revision.attributes.clone(),
                Origin::Carried,
            ),
        );
    }
}

fn plan_traces(ctx: &mut CommitContext<'_>) {
    let mut plan = plan(&ctx.changes.traces, &ctx.prior_traces, |trace| {
        format!("{} -> {}", trace.source, trace.target)
    });

    for (key, issue) in plan.errors {
        ctx.result.record_error(EntityKindTag::Trace, key, issue);
    }

    // updates cannot target a link whose endpoint this commit removes
    let orphaned: Vec<_> = plan
        .pending
        .iter()
        .filter(|(_, pending)| pending.origin == Origin::Modified)
        .filter_map(|(key, _)| {
            let (low, high) = key.endpoints();
            [low, high]
                .into_iter()
                .find(|endpoint| ctx.removed_artifacts.contains(*endpoint))
                .map(|endpoint| (key.clone(), endpoint.clone()))
        })
        .collect();
    for (key, endpoint) in orphaned {
        plan.pending.remove(&key);
        ctx.result.record_error(
            EntityKindTag::Trace,
            key.to_string(),
            ValidationIssue::EndpointRemoved(endpoint),
        );
    }

    for (key, entity_id) in plan.removed {
        ctx.result.traces.removed.push(AppliedEntity {
            entity_id,
            key: key.to_string(),
        });
        ctx.removed_traces.insert(key);
    }

    let cascaded: Vec<_> = ctx
        .prior_traces
        .iter()
        .filter(|(key, _)| !ctx.removed_traces.contains(*key))
        .filter(|(key, _)| {
            ctx.removed_artifacts
                .iter()
                .any(|artifact| key.touches(artifact))
        })
        .map(|(key, revision)| (key.clone(), revision.entity_id))
        .collect();
    for (key, entity_id) in cascaded {
        tracing::debug!("Removing {} with its endpoint", key);
        ctx.result.traces.removed.push(AppliedEntity {
            entity_id,
            key: key.to_string(),
        });
        ctx.removed_traces.insert(key);
    }

    ctx.traces = plan.pending;
    for (key, revision) in &ctx.prior_traces {
        if ctx.removed_traces.contains(key) || ctx.traces.contains_key(key) {
            continue;
        }
        ctx.traces.insert(
            key.clone(),
            Pending::new(
                Some(revision.entity_id),
                revision.attributes.clone(),
                Origin::Carried,
            ),
        );
    }
}
