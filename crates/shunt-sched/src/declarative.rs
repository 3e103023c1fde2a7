//! Declarative resolution.
//!
//! A declarative statement names a desired end state. Resolution compares it
//! with the live object and picks the concrete plan that converges the two.

use crate::error::{SchedError, SchedResult};
use shunt_db::{ExecutionPlan, SchemaInspector};
use shunt_sql::{DdlAction, DdlStatement, ObjectDiff, StatementAnalyzer};

/// Reject statement forms that contradict declarative mode.
pub fn check_statement(stmt: &DdlStatement) -> SchedResult<()> {
    match stmt.declarative_violation() {
        Some(reason) => Err(SchedError::Submission(reason)),
        None => Ok(()),
    }
}

/// Resolve a declarative statement against the live schema.
pub async fn resolve<I: SchemaInspector + ?Sized>(
    analyzer: &StatementAnalyzer,
    inspector: &I,
    stmt: &DdlStatement,
) -> SchedResult<ExecutionPlan> {
    check_statement(stmt)?;
    let name = stmt.name.as_str();
    let live = inspector.show_create(name).await?;

    match (stmt.action, live) {
        (DdlAction::Drop, None) => Ok(ExecutionPlan::Noop {
            reason: format!("{} {} does not exist", stmt.object, name),
        }),
        (DdlAction::Drop, Some(current)) => {
            if current.object != stmt.object {
                return Err(SchedError::Planning(format!(
                    "cannot drop {} {}: it is a {}",
                    stmt.object, name, current.object
                )));
            }
            Ok(ExecutionPlan::Drop {
                object: current.object,
                name: name.to_string(),
            })
        }
        (DdlAction::Create, None) => Ok(ExecutionPlan::Create {
            object: stmt.object,
            name: name.to_string(),
            sql: stmt.sql.clone(),
        }),
        (DdlAction::Create, Some(current)) => {
            let current = analyzer.definition(&current.sql)?;
            let desired = analyzer.definition_of(stmt)?;
            match analyzer.diff(&current, &desired) {
                ObjectDiff::Identical => Ok(ExecutionPlan::Noop {
                    reason: format!("{} {} already matches the desired definition", stmt.object, name),
                }),
                ObjectDiff::AlterTable(sql) => {
                    log::debug!("Declarative diff for {}: {}", name, sql);
                    Ok(ExecutionPlan::Alter {
                        name: name.to_string(),
                        sql,
                    })
                }
                ObjectDiff::ReplaceView => Ok(ExecutionPlan::Replace {
                    object: desired.kind(),
                    name: name.to_string(),
                    sql: analyzer.render(&desired),
                }),
                ObjectDiff::KindMismatch { current, desired } => Err(SchedError::Planning(format!(
                    "{} exists as a {}; declarative {} cannot change its kind",
                    name, current, desired
                ))),
            }
        }
        (DdlAction::Alter, _) => Err(SchedError::Submission(format!(
            "{} is not allowed in declarative migrations",
            stmt
        ))),
    }
}

#[cfg(test)]
#[path = "declarative_test.rs"]
mod tests;
