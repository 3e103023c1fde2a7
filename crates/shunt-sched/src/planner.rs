//! Execution planning.
//!
//! Turns a migration record into the concrete [`ExecutionPlan`] its worker
//! hands to the engine. Plans are resolved when the migration starts
//! running, against the live schema at that moment.

use crate::declarative;
use crate::error::{SchedError, SchedResult};
use crate::revert::revert_plan;
use shunt_core::{Migration, ObjectKind};
use shunt_db::{ExecutionPlan, ObjectDefinition, SchemaInspector};
use shunt_meta::MigrationStore;
use shunt_sql::{DdlAction, DdlStatement, StatementAnalyzer};

/// Resolve the plan for `migration`.
pub async fn resolve_plan<I: SchemaInspector + ?Sized>(
    analyzer: &StatementAnalyzer,
    inspector: &I,
    store: &dyn MigrationStore,
    migration: &Migration,
) -> SchedResult<ExecutionPlan> {
    if migration.is_revert {
        let reverted = migration.reverted_uuid.as_ref().ok_or_else(|| {
            SchedError::Planning(format!("revert {} has no reverted migration", migration.uuid))
        })?;
        let original = store
            .get(reverted)
            .await?
            .ok_or_else(|| SchedError::UnknownMigration(reverted.to_string()))?;
        return revert_plan(&original);
    }

    let stmt = analyzer.classify(&migration.statement)?;
    if migration.options.declarative {
        return declarative::resolve(analyzer, inspector, &stmt).await;
    }
    let live = inspector.show_create(stmt.name.as_str()).await?;
    plain_plan(analyzer, &stmt, live)
}

fn planning(stmt: &DdlStatement, reason: &str) -> SchedError {
    SchedError::Planning(format!("{} {}: {}", stmt.object, stmt.name, reason))
}

/// Plan for a statement taken literally, honoring its existence qualifiers.
fn plain_plan(
    analyzer: &StatementAnalyzer,
    stmt: &DdlStatement,
    live: Option<ObjectDefinition>,
) -> SchedResult<ExecutionPlan> {
    let name = stmt.name.to_string();
    let live_kind = live.as_ref().map(|d| d.object);

    match stmt.action {
        DdlAction::Create => match live_kind {
            None => {
                // The engines take plain CREATE text; qualifiers are resolved here.
                let sql = if stmt.if_not_exists || stmt.or_replace {
                    analyzer.render(&analyzer.definition_of(stmt)?)
                } else {
                    stmt.sql.clone()
                };
                Ok(ExecutionPlan::Create {
                    object: stmt.object,
                    name,
                    sql,
                })
            }
            Some(_) if stmt.if_not_exists => Ok(ExecutionPlan::Noop {
                reason: format!("{} {} already exists", stmt.object, name),
            }),
            Some(ObjectKind::View) if stmt.or_replace && stmt.object == ObjectKind::View => {
                replace_view(analyzer, stmt)
            }
            Some(_) => Err(planning(stmt, "already exists")),
        },
        DdlAction::Alter if stmt.is_alter_view() => match live_kind {
            Some(ObjectKind::View) => replace_view(analyzer, stmt),
            Some(ObjectKind::Table) => Err(planning(stmt, "is a table")),
            None => Err(planning(stmt, "does not exist")),
        },
        DdlAction::Alter => match live_kind {
            Some(ObjectKind::Table) => Ok(ExecutionPlan::Alter {
                name,
                sql: stmt.sql.clone(),
            }),
            Some(ObjectKind::View) => Err(planning(stmt, "is a view")),
            None => Err(planning(stmt, "does not exist")),
        },
        DdlAction::Drop => match live_kind {
            None if stmt.if_exists => Ok(ExecutionPlan::Noop {
                reason: format!("{} {} does not exist", stmt.object, name),
            }),
            None => Err(planning(stmt, "does not exist")),
            Some(kind) if kind != stmt.object => {
                Err(planning(stmt, &format!("exists as a {}", kind)))
            }
            Some(kind) => Ok(ExecutionPlan::Drop { object: kind, name }),
        },
    }
}

fn replace_view(analyzer: &StatementAnalyzer, stmt: &DdlStatement) -> SchedResult<ExecutionPlan> {
    Ok(ExecutionPlan::Replace {
        object: ObjectKind::View,
        name: stmt.name.to_string(),
        sql: analyzer.render(&analyzer.definition_of(stmt)?),
    })
}

#[cfg(test)]
#[path = "planner_test.rs"]
mod tests;
