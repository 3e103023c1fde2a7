//! Error types for the scheduler.

use shunt_core::{CoreError, MigrationUuid};
use shunt_db::DbError;
use shunt_meta::MetaError;
use shunt_sql::SqlError;
use thiserror::Error;

/// Scheduler errors
#[derive(Error, Debug)]
pub enum SchedError {
    /// Submission rejected; no record was created
    #[error("[S001] Submission rejected: {0}")]
    Submission(String),

    /// No migration with this uuid on the shard
    #[error("[S002] Unknown migration: {0}")]
    UnknownMigration(String),

    /// Operator command not valid in the migration's current state
    #[error("[S003] Cannot {command} migration {uuid}: {reason}")]
    InvalidTransition {
        command: String,
        uuid: String,
        reason: String,
    },

    /// Operator-supplied value outside the enforced range
    #[error("[S004] Value out of range: {0}")]
    OutOfRange(String),

    /// Revert cannot be built for the target migration
    #[error("[S005] Cannot revert {uuid}: {reason}")]
    Revert { uuid: String, reason: String },

    /// The migration cannot be planned against the live schema
    #[error("[S006] Planning failed: {0}")]
    Planning(String),

    /// Strategy or identifier error
    #[error("[S007] {0}")]
    Core(#[from] CoreError),

    /// Statement analysis error
    #[error("[S008] {0}")]
    Sql(#[from] SqlError),

    /// Migration store error
    #[error("[S009] {0}")]
    Store(#[from] MetaError),

    /// Execution engine error
    #[error("[S010] {0}")]
    Engine(#[from] DbError),

    /// Some statements of a batch conflicted and were not recorded; the
    /// others were
    #[error(
        "[S011] Submission partly rejected: {} recorded, {} rejected: {}",
        .recorded.len(),
        .rejected.len(),
        .rejected.join("; ")
    )]
    PartlyRejected {
        recorded: Vec<MigrationUuid>,
        rejected: Vec<String>,
    },
}

impl SchedError {
    /// Errors raised synchronously at submission time.
    pub fn is_submission(&self) -> bool {
        matches!(
            self,
            SchedError::Submission(_)
                | SchedError::PartlyRejected { .. }
                | SchedError::Core(_)
                | SchedError::Sql(_)
        )
    }

    /// Errors raised synchronously for operator commands.
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            SchedError::UnknownMigration(_)
                | SchedError::InvalidTransition { .. }
                | SchedError::OutOfRange(_)
                | SchedError::Revert { .. }
        )
    }
}

/// Result type alias for SchedError
pub type SchedResult<T> = Result<T, SchedError>;
