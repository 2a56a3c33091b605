//! Step 3: validate and write artifact revisions
//!
//! An invalid update keeps the prior state; an invalid add is dropped. New
//! artifacts get a fresh entity id unless an earlier run against the same
//! destination already assigned one.

use crate::context::{CommitContext, Origin, Pending};
use crate::error::CommitError;
use crate::pipeline::CommitStep;
use crate::result::AppliedEntity;
use reqtrace_model::{
    ArtifactKind, ArtifactRecord, EntityKind, EntityKindTag, Project, ValidationIssue,
};
use std::mem;

/// Step 3
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistArtifacts;

impl CommitStep for PersistArtifacts {
    fn name(&self) -> &'static str {
        "persist-artifacts"
    }

    fn apply(&self, ctx: &mut CommitContext<'_>) -> Result<(), CommitError> {
        let rejected: Vec<_> = ctx
            .artifacts
            .iter()
            .filter(|(_, pending)| pending.is_submitted())
            .filter_map(|(key, pending)| {
                validate(&ctx.project, &pending.attributes)
                    .err()
                    .map(|issue| (key.clone(), pending.origin, issue))
            })
            .collect();

        for (key, origin, issue) in rejected {
            ctx.result
                .record_error(EntityKindTag::Artifact, key.to_string(), issue);
            ctx.artifacts.remove(&key);
            if origin == Origin::Modified {
                if let Some(prior) = ctx.prior_artifacts.get(&key) {
                    ctx.artifacts.insert(
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

        if ctx.should_halt() {
            return Ok(());
        }

        let revisions = ctx.revisions();
        let mut working = mem::take(&mut ctx.artifacts);
        for (key, pending) in &mut working {
            let entity_id = match pending.entity_id {
                Some(id) => id,
                None => ctx.artifact_identity(key),
            };
            pending.entity_id = Some(entity_id);

            match pending.origin {
                Origin::Carried => {
                    match ctx.prior_artifacts.get(key) {
                        Some(prior) => revisions.carry_forward(prior, &ctx.destination)?,
                        None => revisions.record_revision::<ArtifactKind>(
                            entity_id,
                            &ctx.destination,
                            pending.attributes.clone(),
                        )?,
                    };
                    ctx.result.artifacts.carried += 1;
                }
                Origin::Added | Origin::Modified => {
                    revisions.record_revision::<ArtifactKind>(
                        entity_id,
                        &ctx.destination,
                        pending.attributes.clone(),
                    )?;
                    let applied = AppliedEntity {
                        entity_id,
                        key: key.to_string(),
                    };
                    if pending.origin == Origin::Added {
                        ctx.result.artifacts.added.push(applied);
                    } else {
                        ctx.result.artifacts.modified.push(applied);
                    }
                }
            }
            ctx.artifact_ids.insert(key.clone(), entity_id);
        }
        ctx.artifacts = working;

        tracing::debug!(
            "Wrote {} artifact revisions to {}",
            ctx.artifacts.len(),
            ctx.destination.id
        );
        Ok(())
    }
}

fn validate(project: &Project, artifact: &ArtifactRecord) -> Result<(), ValidationIssue> {
    ArtifactKind::validate(artifact)?;
    if !project.accepts_type(&artifact.artifact_type) {
        return Err(ValidationIssue::UndeclaredType(artifact.artifact_type.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undeclared_type_is_rejected() {
        let project = Project::new("p", "").with_artifact_type("requirement");
        assert_eq!(
            validate(&project, &ArtifactRecord::new("A", "design", "")),
            Err(ValidationIssue::UndeclaredType("design".into()))
        );
        assert!(validate(&project, &ArtifactRecord::new("A", "requirement", "")).is_ok());
    }

    #[test]
    fn open_project_accepts_any_type() {
        let project = Project::new("p", "");
        assert!(validate(&project, &ArtifactRecord::new("A", "anything", "")).is_ok());
        assert_eq!(
            validate(&project, &ArtifactRecord::new("A", " ", "")),
            Err(ValidationIssue::MissingField("artifact_type".into()))
        );
    }
}
