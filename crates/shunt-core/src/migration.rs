//! The migration record: one schema-change request and its lifecycle.

use crate::error::{CoreError, CoreResult};
use crate::identifiers::{Keyspace, MigrationContext, Shard};
use crate::migration_uuid::MigrationUuid;
use crate::status::MigrationStatus;
use crate::strategy::{MigrationOptions, Strategy};
use crate::table_name::TableName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of schema object a statement targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    #[default]
    Table,
    View,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Table => "table",
            ObjectKind::View => "view",
        }
    }

    /// SQL keyword for this kind (`TABLE` / `VIEW`).
    pub fn keyword(&self) -> &'static str {
        match self {
            ObjectKind::Table => "TABLE",
            ObjectKind::View => "VIEW",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = CoreError;
    fn from_str(s: &str) -> CoreResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(ObjectKind::Table),
            "view" => Ok(ObjectKind::View),
            _ => Err(CoreError::UnknownVariant {
                kind: "object kind",
                value: s.to_string(),
            }),
        }
    }
}

/// The concrete action a migration resolved to when it started executing.
///
/// Recorded on the migration so the revert path knows what to invert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanAction {
    Create,
    Alter,
    Drop,
    /// Hold the current object aside and install a new definition
    Replace,
    /// Exchange the live object with a held artifact
    Swap,
    /// Bring a held artifact back under its original name
    Restore,
    /// Nothing to do; completes immediately without artifacts
    Noop,
}

impl PlanAction {
    pub const ALL: [PlanAction; 7] = [
        PlanAction::Create,
        PlanAction::Alter,
        PlanAction::Drop,
        PlanAction::Replace,
        PlanAction::Swap,
        PlanAction::Restore,
        PlanAction::Noop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanAction::Create => "create",
            PlanAction::Alter => "alter",
            PlanAction::Drop => "drop",
            PlanAction::Replace => "replace",
            PlanAction::Swap => "swap",
            PlanAction::Restore => "restore",
            PlanAction::Noop => "noop",
        }
    }
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanAction {
    type Err = CoreError;
    fn from_str(s: &str) -> CoreResult<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "plan action",
                value: s.to_string(),
            })
    }
}

/// One schema-change request and its full lifecycle record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Migration {
    pub uuid: MigrationUuid,
    pub keyspace: Keyspace,
    pub shard: Shard,
    /// Object the statement targets (for reverts, the reverted object)
    pub table: TableName,
    /// DDL text; for reverts `REVERT '<uuid>'`
    pub statement: String,
    pub strategy: Strategy,
    pub options: MigrationOptions,
    pub migration_context: MigrationContext,
    pub status: MigrationStatus,
    pub is_revert: bool,
    pub reverted_uuid: Option<MigrationUuid>,
    pub sequence_number: i64,
    pub ready_to_complete: bool,
    pub artifacts: Vec<String>,
    pub requested_at: DateTime<Utc>,
    pub ready_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cleanup_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub retries: i32,
    pub message: String,
    pub progress: f64,
    pub user_throttle_ratio: f64,
    pub object_kind: ObjectKind,
    /// Resolved action, set when execution starts
    pub ddl_action: Option<PlanAction>,
    pub cancel_requested: bool,
    pub force_cutover: bool,
    pub cleanup_requested: bool,
}

impl Migration {
    /// A freshly submitted record in `queued`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        uuid: MigrationUuid,
        keyspace: Keyspace,
        shard: Shard,
        table: TableName,
        object_kind: ObjectKind,
        statement: impl Into<String>,
        strategy: Strategy,
        options: MigrationOptions,
        migration_context: MigrationContext,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            uuid,
            keyspace,
            shard,
            table,
            statement: statement.into(),
            strategy,
            options,
            migration_context,
            status: MigrationStatus::Queued,
            is_revert: false,
            reverted_uuid: None,
            sequence_number: 0,
            ready_to_complete: false,
            artifacts: Vec::new(),
            requested_at: now,
            ready_at: None,
            started_at: None,
            completed_at: None,
            cleanup_at: None,
            updated_at: now,
            retries: 0,
            message: String::new(),
            progress: 0.0,
            user_throttle_ratio: 0.0,
            object_kind,
            ddl_action: None,
            cancel_requested: false,
            force_cutover: false,
            cleanup_requested: false,
        }
    }

    /// Strategy string as it would be submitted, e.g. `online --singleton`.
    pub fn strategy_string(&self) -> String {
        let mut out = self.strategy.to_string();
        for flag in self.options.to_flags() {
            out.push(' ');
            out.push_str(&flag);
        }
        out
    }

    /// Whether this migration may run alongside other concurrent migrations.
    pub fn is_concurrent(&self) -> bool {
        self.options.allow_concurrent
    }

    /// Whether this migration is part of a completion-ordered batch.
    pub fn in_order_batch(&self) -> Option<&MigrationContext> {
        self.options
            .in_order_completion
            .then_some(&self.migration_context)
    }

    /// Completion-timestamp invariant: `completed_at` is set exactly for
    /// terminal states.
    pub fn is_consistent(&self) -> bool {
        self.completed_at.is_some() == self.status.is_terminal()
            && (self.cleanup_at.is_none() || self.completed_at.is_some())
    }
}

#[cfg(test)]
#[path = "migration_test.rs"]
mod tests;
