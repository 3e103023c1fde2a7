//! Shared helpers for moving migration records in and out of DuckDB rows.

use crate::error::{MetaError, MetaResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use shunt_core::{
    Keyspace, Migration, MigrationContext, MigrationOptions, MigrationStatus, MigrationUuid,
    ObjectKind, PlanAction, Shard, Strategy, TableName,
};
use std::time::Duration;

/// Column list shared by every record query. Timestamps are read back as
/// text so they round-trip without a driver-side time feature.
pub(crate) const SELECT_COLUMNS: &str = "uuid, keyspace, shard, table_name, object_kind, \
     statement, strategy, options, migration_context, status, is_revert, reverted_uuid, \
     sequence_number, ready_to_complete, artifacts, \
     CAST(requested_at AS VARCHAR), CAST(ready_at AS VARCHAR), CAST(started_at AS VARCHAR), \
     CAST(completed_at AS VARCHAR), CAST(cleanup_at AS VARCHAR), CAST(updated_at AS VARCHAR), \
     retries, message, progress, user_throttle_ratio, ddl_action, cancel_requested, \
     force_cutover, cleanup_requested, postpone_launch, postpone_completion, cutover_threshold_ms";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Render a timestamp for a `CAST(? AS TIMESTAMP)` parameter.
pub(crate) fn ts(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Render an optional timestamp parameter.
pub(crate) fn ts_opt(at: &Option<DateTime<Utc>>) -> Option<String> {
    at.as_ref().map(ts)
}

fn parse_ts(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Artifacts are stored as an ordered comma-separated list.
pub(crate) fn join_artifacts(artifacts: &[String]) -> String {
    artifacts.join(",")
}

pub(crate) fn split_artifacts(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn duration_ms(duration: Option<Duration>) -> Option<i64> {
    duration.map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

/// The raw column values of one `migrations` row, before validation.
pub(crate) struct MigrationRow {
    uuid: String,
    keyspace: String,
    shard: String,
    table_name: String,
    object_kind: String,
    statement: String,
    strategy: String,
    options: String,
    migration_context: String,
    status: String,
    is_revert: bool,
    reverted_uuid: Option<String>,
    sequence_number: i64,
    ready_to_complete: bool,
    artifacts: String,
    requested_at: Option<String>,
    ready_at: Option<String>,
    started_at: Option<String>,
    completed_at: Option<String>,
    cleanup_at: Option<String>,
    updated_at: Option<String>,
    retries: i32,
    message: String,
    progress: f64,
    user_throttle_ratio: f64,
    ddl_action: Option<String>,
    cancel_requested: bool,
    force_cutover: bool,
    cleanup_requested: bool,
    postpone_launch: bool,
    postpone_completion: bool,
    cutover_threshold_ms: Option<i64>,
}

impl MigrationRow {
    /// Read a row selected with [`SELECT_COLUMNS`].
    pub(crate) fn read(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            uuid: row.get(0)?,
            keyspace: row.get(1)?,
            shard: row.get(2)?,
            table_name: row.get(3)?,
            object_kind: row.get(4)?,
            statement: row.get(5)?,
            strategy: row.get(6)?,
            options: row.get(7)?,
            migration_context: row.get(8)?,
            status: row.get(9)?,
            is_revert: row.get(10)?,
            reverted_uuid: row.get(11)?,
            sequence_number: row.get(12)?,
            ready_to_complete: row.get(13)?,
            artifacts: row.get(14)?,
            requested_at: row.get(15)?,
            ready_at: row.get(16)?,
            started_at: row.get(17)?,
            completed_at: row.get(18)?,
            cleanup_at: row.get(19)?,
            updated_at: row.get(20)?,
            retries: row.get(21)?,
            message: row.get(22)?,
            progress: row.get(23)?,
            user_throttle_ratio: row.get(24)?,
            ddl_action: row.get(25)?,
            cancel_requested: row.get(26)?,
            force_cutover: row.get(27)?,
            cleanup_requested: row.get(28)?,
            postpone_launch: row.get(29)?,
            postpone_completion: row.get(30)?,
            cutover_threshold_ms: row.get(31)?,
        })
    }

    /// Validate the raw values into a [`Migration`].
    pub(crate) fn into_migration(self) -> MetaResult<Migration> {
        let uuid_text = self.uuid.clone();
        let corrupt = move |reason: String| MetaError::CorruptRecord {
            uuid: uuid_text.clone(),
            reason,
        };
        let timestamp = |field: &str, value: Option<String>| -> MetaResult<Option<DateTime<Utc>>> {
            match value {
                None => Ok(None),
                Some(text) => parse_ts(&text)
                    .map(Some)
                    .ok_or_else(|| corrupt(format!("invalid {field} '{text}'"))),
            }
        };

        let requested_at = timestamp("requested_at", self.requested_at)?
            .ok_or_else(|| corrupt("requested_at is null".to_string()))?;
        let updated_at = timestamp("updated_at", self.updated_at)?.unwrap_or(requested_at);
        let ready_at = timestamp("ready_at", self.ready_at)?;
        let started_at = timestamp("started_at", self.started_at)?;
        let completed_at = timestamp("completed_at", self.completed_at)?;
        let cleanup_at = timestamp("cleanup_at", self.cleanup_at)?;

        let uuid = MigrationUuid::parse(&self.uuid).map_err(|e| corrupt(e.to_string()))?;
        let keyspace = Keyspace::parse(self.keyspace).map_err(|e| corrupt(e.to_string()))?;
        let shard = Shard::parse(self.shard).map_err(|e| corrupt(e.to_string()))?;
        let migration_context =
            MigrationContext::parse(self.migration_context).map_err(|e| corrupt(e.to_string()))?;
        let status = self
            .status
            .parse::<MigrationStatus>()
            .map_err(|e| corrupt(e.to_string()))?;
        let strategy = self
            .strategy
            .parse::<Strategy>()
            .map_err(|e| corrupt(e.to_string()))?;
        let object_kind = self
            .object_kind
            .parse::<ObjectKind>()
            .map_err(|e| corrupt(e.to_string()))?;
        let ddl_action = self
            .ddl_action
            .map(|a| a.parse::<PlanAction>())
            .transpose()
            .map_err(|e| corrupt(e.to_string()))?;
        let reverted_uuid = self
            .reverted_uuid
            .map(|u| MigrationUuid::parse(&u))
            .transpose()
            .map_err(|e| corrupt(e.to_string()))?;

        let mut options: MigrationOptions =
            serde_json::from_str(&self.options).map_err(|e| corrupt(format!("options: {e}")))?;
        options.postpone_launch = self.postpone_launch;
        options.postpone_completion = self.postpone_completion;
        options.cutover_threshold = self
            .cutover_threshold_ms
            .and_then(|ms| u64::try_from(ms).ok())
            .map(Duration::from_millis);

        Ok(Migration {
            uuid,
            keyspace,
            shard,
            table: TableName::new(self.table_name),
            statement: self.statement,
            strategy,
            options,
            migration_context,
            status,
            is_revert: self.is_revert,
            reverted_uuid,
            sequence_number: self.sequence_number,
            ready_to_complete: self.ready_to_complete,
            artifacts: split_artifacts(&self.artifacts),
            requested_at,
            ready_at,
            started_at,
            completed_at,
            cleanup_at,
            updated_at,
            retries: self.retries,
            message: self.message,
            progress: self.progress,
            user_throttle_ratio: self.user_throttle_ratio,
            object_kind,
            ddl_action,
            cancel_requested: self.cancel_requested,
            force_cutover: self.force_cutover,
            cleanup_requested: self.cleanup_requested,
        })
    }
}

/// Render a status list for `status IN (..)` clauses.
pub(crate) fn status_list(statuses: &[MigrationStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}
