//! [`MigrationStore`] on DuckDB.

use crate::connection::DuckDbStore;
use crate::error::{MetaError, MetaResult, MetaResultExt};
use crate::row_helpers::{
    duration_ms, join_artifacts, status_list, ts, ts_opt, MigrationRow, SELECT_COLUMNS,
};
use crate::store::{MigrationFilter, MigrationStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::{Connection, ToSql};
use shunt_core::{Migration, MigrationUuid, ObjectKind, PlanAction};
use std::time::Duration;

const ACTIVE: &str = "('queued', 'ready', 'running')";
const RETRYABLE: &str = "('failed', 'cancelled')";

const INSERT_SQL: &str = "INSERT INTO shunt_meta.migrations (
        uuid, keyspace, shard, table_name, object_kind, statement, strategy, options,
        migration_context, status, is_revert, reverted_uuid, sequence_number,
        ready_to_complete, artifacts, requested_at, ready_at, started_at, completed_at,
        cleanup_at, updated_at, retries, message, progress, user_throttle_ratio, ddl_action,
        cancel_requested, force_cutover, cleanup_requested, postpone_launch,
        postpone_completion, cutover_threshold_ms
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
        CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP),
        CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP),
        ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

fn insert_row(conn: &Connection, m: &Migration) -> MetaResult<()> {
    let exists: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM shunt_meta.migrations WHERE uuid = ?",
            duckdb::params![m.uuid.as_str()],
            |row| row.get(0),
        )
        .query_context("check existing migration")?;
    if exists > 0 {
        return Err(MetaError::DuplicateMigration(m.uuid.to_string()));
    }

    let options = serde_json::to_string(&m.options)
        .map_err(|e| MetaError::QueryError(format!("serialize options: {e}")))?;
    conn.execute(
        INSERT_SQL,
        duckdb::params![
            m.uuid.as_str(),
            m.keyspace.as_str(),
            m.shard.as_str(),
            m.table.as_str(),
            m.object_kind.as_str(),
            m.statement,
            m.strategy.as_str(),
            options,
            m.migration_context.as_str(),
            m.status.as_str(),
            m.is_revert,
            m.reverted_uuid.as_ref().map(|u| u.as_str()),
            m.sequence_number,
            m.ready_to_complete,
            join_artifacts(&m.artifacts),
            ts(&m.requested_at),
            ts_opt(&m.ready_at),
            ts_opt(&m.started_at),
            ts_opt(&m.completed_at),
            ts_opt(&m.cleanup_at),
            ts(&m.updated_at),
            m.retries,
            m.message,
            m.progress,
            m.user_throttle_ratio,
            m.ddl_action.map(|a| a.as_str()),
            m.cancel_requested,
            m.force_cutover,
            m.cleanup_requested,
            m.options.postpone_launch,
            m.options.postpone_completion,
            duration_ms(m.options.cutover_threshold),
        ],
    )
    .query_context("insert migration")?;
    Ok(())
}

impl DuckDbStore {
    fn select(&self, clause: &str, params: &[&dyn ToSql]) -> MetaResult<Vec<Migration>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM shunt_meta.migrations {} ORDER BY sequence_number, requested_at",
            SELECT_COLUMNS, clause
        );
        let mut stmt = conn.prepare(&sql).query_context("prepare migration query")?;
        let rows = stmt
            .query_map(params, MigrationRow::read)
            .query_context("query migrations")?
            .collect::<Result<Vec<_>, _>>()
            .query_context("read migration rows")?;
        rows.into_iter().map(MigrationRow::into_migration).collect()
    }
}

#[async_trait]
impl MigrationStore for DuckDbStore {
    async fn insert_batch(&self, migrations: &[Migration]) -> MetaResult<()> {
        self.transaction(|conn| {
            for migration in migrations {
                insert_row(conn, migration)?;
            }
            Ok(())
        })?;
        for migration in migrations {
            log::debug!(
                "Stored migration {} (sequence {})",
                migration.uuid,
                migration.sequence_number
            );
        }
        Ok(())
    }

    async fn get(&self, uuid: &MigrationUuid) -> MetaResult<Option<Migration>> {
        Ok(self
            .select("WHERE uuid = ?", duckdb::params![uuid.as_str()])?
            .into_iter()
            .next())
    }

    async fn query(&self, filter: &MigrationFilter) -> MetaResult<Vec<Migration>> {
        let mut conditions: Vec<String> = Vec::new();
        let mut values: Vec<String> = Vec::new();
        if let Some(pattern) = filter.like_pattern() {
            conditions.push("(uuid LIKE ? OR migration_context LIKE ?)".to_string());
            values.push(pattern.clone());
            values.push(pattern);
        }
        if !filter.statuses.is_empty() {
            conditions.push(format!("status IN ({})", status_list(&filter.statuses)));
        }
        if let Some(keyspace) = &filter.keyspace {
            conditions.push("keyspace = ?".to_string());
            values.push(keyspace.clone());
        }
        if let Some(shard) = &filter.shard {
            conditions.push("shard = ?".to_string());
            values.push(shard.clone());
        }
        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let params: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
        self.select(&clause, &params)
    }

    async fn active(&self) -> MetaResult<Vec<Migration>> {
        self.select(&format!("WHERE status IN {ACTIVE}"), &[])
    }

    async fn next_sequence(&self) -> MetaResult<i64> {
        let value = self
            .conn()?
            .query_row("SELECT nextval('shunt_meta.migration_seq')", [], |row| {
                row.get::<_, i64>(0)
            })
            .query_context("next sequence number")?;
        Ok(value)
    }

    async fn mark_ready(&self, uuid: &MigrationUuid, now: DateTime<Utc>) -> MetaResult<bool> {
        self.update(
            "mark ready",
            "UPDATE shunt_meta.migrations
             SET status = 'ready', ready_at = CAST(? AS TIMESTAMP), updated_at = CAST(? AS TIMESTAMP)
             WHERE uuid = ? AND status = 'queued' AND NOT postpone_launch",
            duckdb::params![ts(&now), ts(&now), uuid.as_str()],
        )
    }

    async fn launch(&self, uuid: &MigrationUuid, now: DateTime<Utc>) -> MetaResult<bool> {
        self.update(
            "launch",
            "UPDATE shunt_meta.migrations
             SET postpone_launch = false, status = 'ready',
                 ready_at = CAST(? AS TIMESTAMP), updated_at = CAST(? AS TIMESTAMP)
             WHERE uuid = ? AND status = 'queued' AND postpone_launch",
            duckdb::params![ts(&now), ts(&now), uuid.as_str()],
        )
    }

    async fn mark_running(&self, uuid: &MigrationUuid, now: DateTime<Utc>) -> MetaResult<bool> {
        self.update(
            "mark running",
            "UPDATE shunt_meta.migrations
             SET status = 'running', started_at = CAST(? AS TIMESTAMP),
                 updated_at = CAST(? AS TIMESTAMP), message = ''
             WHERE uuid = ? AND status = 'ready'",
            duckdb::params![ts(&now), ts(&now), uuid.as_str()],
        )
    }

    async fn mark_complete(
        &self,
        uuid: &MigrationUuid,
        artifacts: &[String],
        now: DateTime<Utc>,
    ) -> MetaResult<bool> {
        self.update(
            "mark complete",
            "UPDATE shunt_meta.migrations
             SET status = 'complete', completed_at = CAST(? AS TIMESTAMP),
                 updated_at = CAST(? AS TIMESTAMP), artifacts = ?, progress = 100,
                 ready_to_complete = true
             WHERE uuid = ? AND status = 'running'",
            duckdb::params![ts(&now), ts(&now), join_artifacts(artifacts), uuid.as_str()],
        )
    }

    async fn mark_failed(
        &self,
        uuid: &MigrationUuid,
        message: &str,
        now: DateTime<Utc>,
    ) -> MetaResult<bool> {
        self.update(
            "mark failed",
            &format!(
                "UPDATE shunt_meta.migrations
                 SET status = 'failed', completed_at = CAST(? AS TIMESTAMP),
                     updated_at = CAST(? AS TIMESTAMP), message = ?
                 WHERE uuid = ? AND status IN {ACTIVE}"
            ),
            duckdb::params![ts(&now), ts(&now), message, uuid.as_str()],
        )
    }

    async fn mark_cancelled(
        &self,
        uuid: &MigrationUuid,
        message: &str,
        now: DateTime<Utc>,
    ) -> MetaResult<bool> {
        self.update(
            "mark cancelled",
            &format!(
                "UPDATE shunt_meta.migrations
                 SET status = 'cancelled', completed_at = CAST(? AS TIMESTAMP),
                     updated_at = CAST(? AS TIMESTAMP), message = ?
                 WHERE uuid = ? AND status IN {ACTIVE}"
            ),
            duckdb::params![ts(&now), ts(&now), message, uuid.as_str()],
        )
    }

    async fn request_cancel(&self, uuid: &MigrationUuid) -> MetaResult<bool> {
        self.update(
            "request cancel",
            &format!(
                "UPDATE shunt_meta.migrations SET cancel_requested = true
                 WHERE uuid = ? AND status IN {ACTIVE} AND NOT cancel_requested"
            ),
            duckdb::params![uuid.as_str()],
        )
    }

    async fn requeue(&self, uuid: &MigrationUuid, now: DateTime<Utc>) -> MetaResult<bool> {
        self.update(
            "requeue",
            &format!(
                "UPDATE shunt_meta.migrations
                 SET status = 'queued', retries = retries + 1, updated_at = CAST(? AS TIMESTAMP),
                     ready_at = NULL, started_at = NULL, completed_at = NULL,
                     ready_to_complete = false, cancel_requested = false, force_cutover = false,
                     cleanup_requested = false, progress = 0, user_throttle_ratio = 0,
                     ddl_action = NULL, message = ''
                 WHERE uuid = ? AND status IN {RETRYABLE} AND cleanup_at IS NULL"
            ),
            duckdb::params![ts(&now), uuid.as_str()],
        )
    }

    async fn set_postpone_completion(
        &self,
        uuid: &MigrationUuid,
        postpone: bool,
    ) -> MetaResult<bool> {
        self.update(
            "set postpone completion",
            &format!(
                "UPDATE shunt_meta.migrations SET postpone_completion = ?
                 WHERE uuid = ? AND status IN {ACTIVE} AND postpone_completion <> ?"
            ),
            duckdb::params![postpone, uuid.as_str(), postpone],
        )
    }

    async fn request_force_cutover(&self, uuid: &MigrationUuid) -> MetaResult<bool> {
        self.update(
            "request force cut-over",
            "UPDATE shunt_meta.migrations SET force_cutover = true
             WHERE uuid = ? AND status = 'running' AND NOT force_cutover",
            duckdb::params![uuid.as_str()],
        )
    }

    async fn set_cutover_threshold(
        &self,
        uuid: &MigrationUuid,
        threshold: Duration,
    ) -> MetaResult<bool> {
        self.update(
            "set cut-over threshold",
            &format!(
                "UPDATE shunt_meta.migrations SET cutover_threshold_ms = ?
                 WHERE uuid = ? AND status IN {ACTIVE}"
            ),
            duckdb::params![duration_ms(Some(threshold)), uuid.as_str()],
        )
    }

    async fn set_ready_to_complete(&self, uuid: &MigrationUuid, ready: bool) -> MetaResult<bool> {
        self.update(
            "set ready to complete",
            "UPDATE shunt_meta.migrations SET ready_to_complete = ?
             WHERE uuid = ? AND status = 'running'",
            duckdb::params![ready, uuid.as_str()],
        )
    }

    async fn set_progress(&self, uuid: &MigrationUuid, percent: f64) -> MetaResult<bool> {
        self.update(
            "set progress",
            "UPDATE shunt_meta.migrations SET progress = ?
             WHERE uuid = ? AND status = 'running'",
            duckdb::params![percent.clamp(0.0, 100.0), uuid.as_str()],
        )
    }

    async fn set_throttle(
        &self,
        uuid: &MigrationUuid,
        ratio: f64,
        reason: &str,
    ) -> MetaResult<bool> {
        self.update(
            "set throttle",
            "UPDATE shunt_meta.migrations SET user_throttle_ratio = ?, message = ?
             WHERE uuid = ? AND status = 'running'",
            duckdb::params![ratio.clamp(0.0, 1.0), reason, uuid.as_str()],
        )
    }

    async fn set_message(&self, uuid: &MigrationUuid, message: &str) -> MetaResult<bool> {
        self.update(
            "set message",
            "UPDATE shunt_meta.migrations SET message = ? WHERE uuid = ?",
            duckdb::params![message, uuid.as_str()],
        )
    }

    async fn set_plan(
        &self,
        uuid: &MigrationUuid,
        action: PlanAction,
        object: ObjectKind,
    ) -> MetaResult<bool> {
        self.update(
            "set plan",
            "UPDATE shunt_meta.migrations SET ddl_action = ?, object_kind = ?
             WHERE uuid = ? AND status = 'running'",
            duckdb::params![action.as_str(), object.as_str(), uuid.as_str()],
        )
    }

    async fn add_artifact(&self, uuid: &MigrationUuid, artifact: &str) -> MetaResult<bool> {
        self.update(
            "add artifact",
            "UPDATE shunt_meta.migrations
             SET artifacts = CASE WHEN artifacts = '' THEN ? ELSE artifacts || ',' || ? END
             WHERE uuid = ? AND status = 'running'",
            duckdb::params![artifact, artifact, uuid.as_str()],
        )
    }

    async fn increment_retries(&self, uuid: &MigrationUuid) -> MetaResult<bool> {
        self.update(
            "increment retries",
            "UPDATE shunt_meta.migrations SET retries = retries + 1
             WHERE uuid = ? AND status = 'running'",
            duckdb::params![uuid.as_str()],
        )
    }

    async fn request_cleanup(&self, uuid: &MigrationUuid) -> MetaResult<bool> {
        self.update(
            "request cleanup",
            "UPDATE shunt_meta.migrations SET cleanup_requested = true
             WHERE uuid = ? AND completed_at IS NOT NULL AND cleanup_at IS NULL
               AND NOT cleanup_requested",
            duckdb::params![uuid.as_str()],
        )
    }

    async fn request_cleanup_all(&self) -> MetaResult<usize> {
        self.update_many(
            "request cleanup all",
            "UPDATE shunt_meta.migrations SET cleanup_requested = true
             WHERE completed_at IS NOT NULL AND cleanup_at IS NULL AND NOT cleanup_requested",
            &[],
        )
    }

    async fn cleanup_candidates(&self) -> MetaResult<Vec<Migration>> {
        self.select(
            "WHERE completed_at IS NOT NULL AND cleanup_at IS NULL",
            &[],
        )
    }

    async fn retain_artifacts(
        &self,
        uuid: &MigrationUuid,
        remaining: &[String],
    ) -> MetaResult<bool> {
        self.update(
            "retain artifacts",
            "UPDATE shunt_meta.migrations SET artifacts = ?
             WHERE uuid = ? AND completed_at IS NOT NULL AND cleanup_at IS NULL",
            duckdb::params![join_artifacts(remaining), uuid.as_str()],
        )
    }

    async fn mark_cleaned_up(&self, uuid: &MigrationUuid, now: DateTime<Utc>) -> MetaResult<bool> {
        self.update(
            "mark cleaned up",
            "UPDATE shunt_meta.migrations
             SET artifacts = '', cleanup_at = CAST(? AS TIMESTAMP), updated_at = CAST(? AS TIMESTAMP)
             WHERE uuid = ? AND completed_at IS NOT NULL AND cleanup_at IS NULL",
            duckdb::params![ts(&now), ts(&now), uuid.as_str()],
        )
    }
}

#[cfg(test)]
#[path = "records_test.rs"]
mod tests;
