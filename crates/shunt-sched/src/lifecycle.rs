//! Lifecycle state machine: legal transitions and operator command
//! validation.
//!
//! Validation is pure. It looks at one record and says whether a command
//! applies, is a no-op, or is an error. The store then applies the change
//! with a conditional update, so a command that loses a race with the tick
//! degrades to a no-op instead of a lost update.

use crate::error::{SchedError, SchedResult};
use shunt_core::{CutOverConfig, Migration, MigrationStatus, OptionFlag};
use std::fmt;
use std::time::Duration;

use MigrationStatus::{Cancelled, Complete, Failed, Queued, Ready, Running};

/// State changes a migration can go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Tick review: `queued` → `ready`
    Review,
    /// Operator launch of a postponed migration: `queued` → `ready`
    Launch,
    /// Admission: `ready` → `running`
    Start,
    /// Engine success: `running` → `complete`
    Complete,
    /// Engine or batch failure
    Fail,
    /// Operator abort
    Cancel,
    /// Explicit resubmission: `failed` / `cancelled` → `queued`
    Requeue,
}

impl Transition {
    /// States the transition may leave from.
    pub fn from(&self) -> &'static [MigrationStatus] {
        match self {
            Transition::Review | Transition::Launch => &[Queued],
            Transition::Start => &[Ready],
            Transition::Complete => &[Running],
            Transition::Fail | Transition::Cancel => &MigrationStatus::ACTIVE,
            Transition::Requeue => &[Failed, Cancelled],
        }
    }

    pub fn to(&self) -> MigrationStatus {
        match self {
            Transition::Review | Transition::Launch => Ready,
            Transition::Start => Running,
            Transition::Complete => Complete,
            Transition::Fail => Failed,
            Transition::Cancel => Cancelled,
            Transition::Requeue => Queued,
        }
    }

    pub fn allowed(&self, status: MigrationStatus) -> bool {
        self.from().contains(&status)
    }
}

/// Operator commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Launch,
    Complete,
    Cancel,
    ForceCutOver,
    SetCutOverThreshold(Duration),
    Cleanup,
    Retry,
    Postpone,
}

impl OperatorCommand {
    pub fn name(&self) -> &'static str {
        match self {
            OperatorCommand::Launch => "launch",
            OperatorCommand::Complete => "complete",
            OperatorCommand::Cancel => "cancel",
            OperatorCommand::ForceCutOver => "force-cut-over",
            OperatorCommand::SetCutOverThreshold(_) => "set-cutover-threshold",
            OperatorCommand::Cleanup => "cleanup",
            OperatorCommand::Retry => "retry",
            OperatorCommand::Postpone => "postpone",
        }
    }
}

impl fmt::Display for OperatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of an operator command on one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied,
    NoOp,
}

impl CommandOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CommandOutcome::Applied)
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CommandOutcome::Applied => "applied",
            CommandOutcome::NoOp => "no-op",
        })
    }
}

fn invalid(command: OperatorCommand, m: &Migration, reason: impl Into<String>) -> SchedError {
    SchedError::InvalidTransition {
        command: command.name().to_string(),
        uuid: m.uuid.to_string(),
        reason: reason.into(),
    }
}

/// Validate `command` against the current record.
///
/// Returns the threshold to store for `SetCutOverThreshold` after range
/// checking; other commands return `None` alongside the outcome.
pub fn validate(
    command: OperatorCommand,
    m: &Migration,
    cutover: &CutOverConfig,
) -> SchedResult<(CommandOutcome, Option<Duration>)> {
    let status = m.status;
    let outcome = match command {
        OperatorCommand::Launch => {
            if status == Queued && m.options.postpone_launch {
                CommandOutcome::Applied
            } else {
                CommandOutcome::NoOp
            }
        }
        OperatorCommand::Complete => {
            if status.is_active() && m.options.postpone_completion {
                CommandOutcome::Applied
            } else {
                CommandOutcome::NoOp
            }
        }
        OperatorCommand::Cancel => {
            if status.is_active() {
                CommandOutcome::Applied
            } else {
                CommandOutcome::NoOp
            }
        }
        OperatorCommand::ForceCutOver => {
            if status != Running {
                return Err(invalid(command, m, format!("status is {}, not running", status)));
            }
            if m.force_cutover {
                CommandOutcome::NoOp
            } else {
                CommandOutcome::Applied
            }
        }
        OperatorCommand::SetCutOverThreshold(requested) => {
            if !m.strategy.supports(OptionFlag::CutoverThreshold) {
                return Err(invalid(
                    command,
                    m,
                    format!("strategy {} has no cut-over", m.strategy),
                ));
            }
            if status.is_terminal() {
                return Err(invalid(command, m, format!("status is {}", status)));
            }
            let threshold = cutover
                .validate_threshold(requested)
                .map_err(SchedError::OutOfRange)?;
            return Ok((CommandOutcome::Applied, Some(threshold)));
        }
        OperatorCommand::Cleanup => {
            if m.completed_at.is_none() {
                return Err(invalid(command, m, format!("status is {}, not terminal", status)));
            }
            if m.cleanup_at.is_some() || m.cleanup_requested {
                CommandOutcome::NoOp
            } else {
                CommandOutcome::Applied
            }
        }
        OperatorCommand::Retry => {
            if let Some(cleaned) = m.cleanup_at {
                return Err(invalid(
                    command,
                    m,
                    format!("artifacts were cleaned up at {}", cleaned),
                ));
            }
            if status.is_retryable() {
                CommandOutcome::Applied
            } else if status == Complete {
                return Err(invalid(command, m, "migration already completed"));
            } else {
                CommandOutcome::NoOp
            }
        }
        OperatorCommand::Postpone => {
            if !m.strategy.supports(OptionFlag::PostponeCompletion) {
                return Err(invalid(
                    command,
                    m,
                    format!("strategy {} cannot postpone completion", m.strategy),
                ));
            }
            if status.is_terminal() {
                return Err(invalid(command, m, format!("status is {}", status)));
            }
            if m.options.postpone_completion {
                CommandOutcome::NoOp
            } else {
                CommandOutcome::Applied
            }
        }
    };
    Ok((outcome, None))
}

#[cfg(test)]
#[path = "lifecycle_test.rs"]
mod tests;
