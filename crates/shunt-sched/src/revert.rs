//! Revert construction.
//!
//! A revert is an ordinary migration whose statement references the
//! migration it undoes. Its plan is the structural inverse of the plan the
//! original resolved to, using the held pre-image the original left behind.

use crate::error::{SchedError, SchedResult};
use chrono::{DateTime, Utc};
use shunt_core::{
    ArtifactKind, ArtifactName, DdlStrategySetting, Migration, MigrationContext, MigrationStatus,
    MigrationUuid, PlanAction,
};
use shunt_db::ExecutionPlan;

/// Statement text recorded for a revert of `uuid`.
pub fn revert_statement(uuid: &MigrationUuid) -> String {
    format!("REVERT '{}'", uuid)
}

fn revert_error(original: &Migration, reason: impl Into<String>) -> SchedError {
    SchedError::Revert {
        uuid: original.uuid.to_string(),
        reason: reason.into(),
    }
}

/// The held pre-image `original` left behind.
fn held_artifact(original: &Migration) -> SchedResult<String> {
    if original.cleanup_at.is_some() {
        return Err(revert_error(original, "its artifacts were already cleaned up"));
    }
    original
        .artifacts
        .iter()
        .find(|a| {
            ArtifactName::parse(a)
                .is_some_and(|n| n.kind == ArtifactKind::Held && n.is_owned_by(&original.uuid))
        })
        .cloned()
        .ok_or_else(|| revert_error(original, "no held pre-image artifact was recorded"))
}

/// Inverse plan of a completed migration.
pub fn revert_plan(original: &Migration) -> SchedResult<ExecutionPlan> {
    if original.status != MigrationStatus::Complete {
        return Err(revert_error(
            original,
            format!("migration is {}; only complete migrations can be reverted", original.status),
        ));
    }
    let action = original
        .ddl_action
        .ok_or_else(|| revert_error(original, "no executed plan was recorded"))?;
    let object = original.object_kind;
    let name = original.table.to_string();

    let plan = match action {
        PlanAction::Noop => ExecutionPlan::Noop {
            reason: format!("{} was a no-op", original.uuid),
        },
        PlanAction::Create | PlanAction::Restore => ExecutionPlan::Drop { object, name },
        PlanAction::Drop => ExecutionPlan::Restore {
            object,
            name,
            artifact: held_artifact(original)?,
        },
        PlanAction::Alter | PlanAction::Replace | PlanAction::Swap => ExecutionPlan::Swap {
            object,
            name,
            artifact: held_artifact(original)?,
        },
    };
    Ok(plan)
}

/// Build the revert record for `original`. Fails when the original is not
/// complete or its pre-image is gone.
pub fn build_revert(
    original: &Migration,
    uuid: MigrationUuid,
    setting: &DdlStrategySetting,
    context: MigrationContext,
    now: DateTime<Utc>,
) -> SchedResult<Migration> {
    revert_plan(original)?;
    let mut options = setting.options.clone();
    // reverts always resolve from the recorded plan
    options.declarative = false;
    let mut revert = Migration::new(
        uuid,
        original.keyspace.clone(),
        original.shard.clone(),
        original.table.clone(),
        original.object_kind,
        revert_statement(&original.uuid),
        setting.strategy,
        options,
        context,
        now,
    );
    revert.is_revert = true;
    revert.reverted_uuid = Some(original.uuid.clone());
    Ok(revert)
}

#[cfg(test)]
#[path = "revert_test.rs"]
mod tests;
