//! The migration store contract.
//!
//! Every transition is a conditional single-statement update guarded by the
//! states it may leave from. The returned `bool` reports whether the row
//! changed, so callers can tell an applied transition from a lost race or a
//! no-op without holding a lock across the read and the write.

use crate::error::MetaResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shunt_core::{Migration, MigrationStatus, MigrationUuid, ObjectKind, PlanAction};
use std::time::Duration;

/// Selection criteria for [`MigrationStore::query`].
#[derive(Debug, Clone, Default)]
pub struct MigrationFilter {
    /// Matches uuid or migration context; `%` and `*` are wildcards
    pub pattern: Option<String>,
    /// Empty means any status
    pub statuses: Vec<MigrationStatus>,
    pub keyspace: Option<String>,
    pub shard: Option<String>,
}

impl MigrationFilter {
    /// Everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Uuid or context pattern. `all` and the empty string match everything.
    pub fn pattern(pattern: &str) -> Self {
        let trimmed = pattern.trim();
        Self {
            pattern: (!trimmed.is_empty() && !trimmed.eq_ignore_ascii_case("all"))
                .then(|| trimmed.to_string()),
            ..Self::default()
        }
    }

    pub fn with_statuses(mut self, statuses: &[MigrationStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    /// The pattern as a `LIKE` expression.
    pub fn like_pattern(&self) -> Option<String> {
        self.pattern.as_ref().map(|p| p.replace('*', "%"))
    }
}

/// Durable table of migration records.
#[async_trait]
pub trait MigrationStore: Send + Sync {
    /// Insert one new record.
    async fn insert(&self, migration: &Migration) -> MetaResult<()> {
        self.insert_batch(std::slice::from_ref(migration)).await
    }

    /// Insert several records atomically: all or none.
    async fn insert_batch(&self, migrations: &[Migration]) -> MetaResult<()>;

    async fn get(&self, uuid: &MigrationUuid) -> MetaResult<Option<Migration>>;

    /// Records matching `filter`, in sequence order.
    async fn query(&self, filter: &MigrationFilter) -> MetaResult<Vec<Migration>>;

    /// All `queued`, `ready` and `running` records, in sequence order.
    async fn active(&self) -> MetaResult<Vec<Migration>>;

    /// Allocate the next sequence number. Never reused.
    async fn next_sequence(&self) -> MetaResult<i64>;

    /// `queued` → `ready` unless launch is postponed.
    async fn mark_ready(&self, uuid: &MigrationUuid, now: DateTime<Utc>) -> MetaResult<bool>;

    /// Clear `postpone-launch` on a queued record and make it `ready`.
    async fn launch(&self, uuid: &MigrationUuid, now: DateTime<Utc>) -> MetaResult<bool>;

    /// `ready` → `running`.
    async fn mark_running(&self, uuid: &MigrationUuid, now: DateTime<Utc>) -> MetaResult<bool>;

    /// `running` → `complete`, replacing the artifact list.
    async fn mark_complete(
        &self,
        uuid: &MigrationUuid,
        artifacts: &[String],
        now: DateTime<Utc>,
    ) -> MetaResult<bool>;

    /// Any non-terminal state → `failed`.
    async fn mark_failed(
        &self,
        uuid: &MigrationUuid,
        message: &str,
        now: DateTime<Utc>,
    ) -> MetaResult<bool>;

    /// Any non-terminal state → `cancelled`.
    async fn mark_cancelled(
        &self,
        uuid: &MigrationUuid,
        message: &str,
        now: DateTime<Utc>,
    ) -> MetaResult<bool>;

    /// Ask the worker of a non-terminal record to stop.
    async fn request_cancel(&self, uuid: &MigrationUuid) -> MetaResult<bool>;

    /// `failed` / `cancelled` → `queued` for a new attempt, counting a retry.
    /// A record whose artifacts were already reaped stays terminal.
    async fn requeue(&self, uuid: &MigrationUuid, now: DateTime<Utc>) -> MetaResult<bool>;

    async fn set_postpone_completion(&self, uuid: &MigrationUuid, postpone: bool)
        -> MetaResult<bool>;

    /// Only `running` records can be forced.
    async fn request_force_cutover(&self, uuid: &MigrationUuid) -> MetaResult<bool>;

    async fn set_cutover_threshold(
        &self,
        uuid: &MigrationUuid,
        threshold: Duration,
    ) -> MetaResult<bool>;

    async fn set_ready_to_complete(&self, uuid: &MigrationUuid, ready: bool) -> MetaResult<bool>;

    async fn set_progress(&self, uuid: &MigrationUuid, percent: f64) -> MetaResult<bool>;

    async fn set_throttle(&self, uuid: &MigrationUuid, ratio: f64, reason: &str)
        -> MetaResult<bool>;

    async fn set_message(&self, uuid: &MigrationUuid, message: &str) -> MetaResult<bool>;

    /// Record the action and object kind a running migration resolved to.
    async fn set_plan(
        &self,
        uuid: &MigrationUuid,
        action: PlanAction,
        object: ObjectKind,
    ) -> MetaResult<bool>;

    /// Append an artifact to a running record.
    async fn add_artifact(&self, uuid: &MigrationUuid, artifact: &str) -> MetaResult<bool>;

    async fn increment_retries(&self, uuid: &MigrationUuid) -> MetaResult<bool>;

    /// Flag a completed record for immediate reaping.
    async fn request_cleanup(&self, uuid: &MigrationUuid) -> MetaResult<bool>;

    /// Flag every completed, not yet cleaned record; returns the count.
    async fn request_cleanup_all(&self) -> MetaResult<usize>;

    /// Records with `completed_at` set and `cleanup_at` unset.
    async fn cleanup_candidates(&self) -> MetaResult<Vec<Migration>>;

    /// Replace the artifact list of a completed record after a partial reap.
    async fn retain_artifacts(&self, uuid: &MigrationUuid, remaining: &[String])
        -> MetaResult<bool>;

    /// Clear the artifact list and set `cleanup_at`. Happens at most once.
    async fn mark_cleaned_up(&self, uuid: &MigrationUuid, now: DateTime<Utc>) -> MetaResult<bool>;
}
