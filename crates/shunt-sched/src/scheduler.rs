//! Per-shard scheduler.
//!
//! The store is the only scheduling state. Each tick reads a fresh snapshot,
//! applies the lifecycle transitions it is responsible for and hands
//! admitted migrations to workers. Submissions, operator commands and ticks
//! are serialized by one async mutex so a tick always runs to completion on
//! a consistent view; workers run outside it and only touch the store
//! through conditional updates.

use crate::admission::{check_submission, evaluate, in_order_verdict, Admission, InOrderVerdict};
use crate::declarative;
use crate::error::{SchedError, SchedResult};
use crate::lifecycle::{validate, CommandOutcome, OperatorCommand};
use crate::reaper::{ReapReport, Reaper};
use crate::revert::build_revert;
use crate::worker::Worker;
use chrono::{DateTime, Utc};
use shunt_core::{
    Config, DdlStrategySetting, Keyspace, Migration, MigrationContext, MigrationStatus,
    MigrationUuid, Shard,
};
use shunt_db::ExecutionEngine;
use shunt_meta::{MigrationFilter, MigrationStore};
use shunt_sql::StatementAnalyzer;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A submission: one statement or a semicolon-separated batch.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub sql: String,
    /// `<strategy> [--flag[=value] ...]`
    pub strategy: String,
    /// Shared by every statement; generated when absent
    pub context: Option<MigrationContext>,
    /// One per statement; generated when empty
    pub uuids: Vec<MigrationUuid>,
}

impl SubmitRequest {
    pub fn new(sql: impl Into<String>, strategy: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            strategy: strategy.into(),
            context: None,
            uuids: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: MigrationContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_uuids(mut self, uuids: Vec<MigrationUuid>) -> Self {
        self.uuids = uuids;
        self
    }
}

/// A request to revert a completed migration.
#[derive(Debug, Clone)]
pub struct RevertRequest {
    pub reverted: MigrationUuid,
    pub uuid: Option<MigrationUuid>,
    pub strategy: String,
    pub context: Option<MigrationContext>,
}

impl RevertRequest {
    pub fn new(reverted: MigrationUuid) -> Self {
        Self {
            reverted,
            uuid: None,
            strategy: "online".to_string(),
            context: None,
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Running records with no live worker that got a new one
    pub resumed: usize,
    /// In-order members failed after a predecessor failed
    pub bailed_out: usize,
    /// `queued` → `ready`
    pub readied: usize,
    /// `ready` → `running`
    pub started: usize,
    pub reaped: ReapReport,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        *self == TickReport::default()
    }
}

struct WorkerHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Scheduler for the migrations of one shard.
pub struct ShardScheduler {
    keyspace: Keyspace,
    shard: Shard,
    store: Arc<dyn MigrationStore>,
    engine: Arc<dyn ExecutionEngine>,
    analyzer: Arc<StatementAnalyzer>,
    config: Arc<Config>,
    reaper: Reaper,
    tick_lock: tokio::sync::Mutex<()>,
    workers: Mutex<HashMap<MigrationUuid, WorkerHandle>>,
    shutdown: CancellationToken,
}

/// Whether an active migration can only move on after an operator command.
fn awaits_operator(m: &Migration) -> bool {
    match m.status {
        MigrationStatus::Queued => m.options.postpone_launch,
        MigrationStatus::Running => m.options.postpone_completion && m.ready_to_complete,
        _ => false,
    }
}

/// The record a failed or cancelled migration becomes when it runs again,
/// for the same exclusivity checks a fresh submission goes through.
fn rerun_candidate(m: &Migration) -> Result<Migration, String> {
    if let Some(cleaned) = m.cleanup_at {
        return Err(format!(
            "migration {} cannot run again: its artifacts were cleaned up at {}",
            m.uuid, cleaned
        ));
    }
    let mut candidate = m.clone();
    candidate.status = MigrationStatus::Queued;
    candidate.completed_at = None;
    Ok(candidate)
}

impl ShardScheduler {
    pub fn new(
        keyspace: Keyspace,
        shard: Shard,
        store: Arc<dyn MigrationStore>,
        engine: Arc<dyn ExecutionEngine>,
        analyzer: Arc<StatementAnalyzer>,
        config: Arc<Config>,
    ) -> Self {
        let reaper = Reaper::new(store.clone(), engine.clone(), config.artifacts.retain);
        Self {
            keyspace,
            shard,
            store,
            engine,
            analyzer,
            config,
            reaper,
            tick_lock: tokio::sync::Mutex::new(()),
            workers: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    pub fn shard(&self) -> &Shard {
        &self.shard
    }

    pub fn store(&self) -> &Arc<dyn MigrationStore> {
        &self.store
    }

    pub fn analyzer(&self) -> &StatementAnalyzer {
        &self.analyzer
    }

    fn workers(&self) -> MutexGuard<'_, HashMap<MigrationUuid, WorkerHandle>> {
        self.workers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn has_worker(&self, uuid: &MigrationUuid) -> bool {
        self.workers()
            .get(uuid)
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Number of workers still running.
    pub fn worker_count(&self) -> usize {
        self.workers()
            .values()
            .filter(|w| !w.handle.is_finished())
            .count()
    }

    /// Record a submission. Returns one uuid per statement, in order.
    ///
    /// Resubmitting a known uuid under the same context does not create a
    /// record: an active migration is left alone and a failed or cancelled
    /// one goes back to `queued`, subject to the same exclusivity checks as
    /// a new statement. Statements that conflict are rejected one by one;
    /// when others were recorded the error is [`SchedError::PartlyRejected`].
    pub async fn submit(&self, request: &SubmitRequest) -> SchedResult<Vec<MigrationUuid>> {
        let setting = DdlStrategySetting::parse(&request.strategy)?;
        if let Some(threshold) = setting.options.cutover_threshold {
            self.config
                .cutover
                .validate_threshold(threshold)
                .map_err(SchedError::Submission)?;
        }
        let statements = self.analyzer.split(&request.sql)?;
        let uuids: Vec<MigrationUuid> = if request.uuids.is_empty() {
            statements.iter().map(|_| MigrationUuid::generate()).collect()
        } else if request.uuids.len() == statements.len() {
            request.uuids.clone()
        } else {
            return Err(SchedError::Submission(format!(
                "{} uuid(s) given for {} statement(s)",
                request.uuids.len(),
                statements.len()
            )));
        };
        let context = request
            .context
            .clone()
            .unwrap_or_else(|| MigrationContext::generated(&MigrationUuid::generate().compact()));

        let _guard = self.tick_lock.lock().await;
        let now = Utc::now();
        let live = self.store.active().await?;
        let mut batch: Vec<Migration> = Vec::new();
        let mut requeued: Vec<Migration> = Vec::new();
        let mut rejected: Vec<(MigrationUuid, String)> = Vec::new();

        for (sql, uuid) in statements.iter().zip(&uuids) {
            if batch.iter().chain(&requeued).any(|m| &m.uuid == uuid) {
                return Err(SchedError::Submission(format!(
                    "uuid {} appears twice in one submission",
                    uuid
                )));
            }
            let (candidate, rerun) = match self.store.get(uuid).await? {
                Some(existing) => {
                    if existing.migration_context != context {
                        return Err(SchedError::Submission(format!(
                            "migration {} already exists under context {}",
                            uuid, existing.migration_context
                        )));
                    }
                    if !existing.status.is_retryable() {
                        log::info!(
                            "Resubmission of {} ignored: migration is {}",
                            uuid,
                            existing.status
                        );
                        continue;
                    }
                    (rerun_candidate(&existing).map_err(SchedError::Submission)?, true)
                }
                None => {
                    let stmt = self.analyzer.analyze(sql)?;
                    if setting.options.declarative {
                        declarative::check_statement(&stmt)?;
                    }
                    let migration = Migration::new(
                        uuid.clone(),
                        self.keyspace.clone(),
                        self.shard.clone(),
                        stmt.name.clone(),
                        stmt.object,
                        sql.clone(),
                        setting.strategy,
                        setting.options.clone(),
                        context.clone(),
                        now,
                    );
                    (migration, false)
                }
            };

            // A conflicting statement is rejected alone; the rest of the
            // batch is still recorded.
            let pending: Vec<Migration> = batch.iter().chain(&requeued).cloned().collect();
            match check_submission(&candidate, &live, &pending) {
                Ok(()) if rerun => requeued.push(candidate),
                Ok(()) => batch.push(candidate),
                Err(reason) => {
                    log::warn!("Statement {} rejected: {}", uuid, reason);
                    rejected.push((uuid.clone(), reason));
                }
            }
        }

        for m in batch.iter_mut() {
            m.sequence_number = self.store.next_sequence().await?;
        }
        if !batch.is_empty() {
            self.store.insert_batch(&batch).await?;
        }
        for m in &requeued {
            if self.store.requeue(&m.uuid, now).await? {
                log::info!("Requeued {} on resubmission", m.uuid);
            }
        }
        log::info!(
            "Submitted {} migration(s) to {}/{} under context {} with '{}' ({} new, {} rejected)",
            uuids.len(),
            self.keyspace,
            self.shard,
            context,
            setting.raw,
            batch.len(),
            rejected.len()
        );

        if rejected.is_empty() {
            return Ok(uuids);
        }
        let recorded: Vec<MigrationUuid> = uuids
            .into_iter()
            .filter(|u| !rejected.iter().any(|(r, _)| r == u))
            .collect();
        let rejected: Vec<String> = rejected
            .into_iter()
            .map(|(uuid, reason)| format!("{}: {}", uuid, reason))
            .collect();
        if recorded.is_empty() {
            return Err(SchedError::Submission(rejected.join("; ")));
        }
        Err(SchedError::PartlyRejected { recorded, rejected })
    }

    /// Submit the inverse of a completed migration.
    pub async fn revert(&self, request: &RevertRequest) -> SchedResult<MigrationUuid> {
        let setting = DdlStrategySetting::parse(&request.strategy)?;
        let _guard = self.tick_lock.lock().await;
        let original = self
            .store
            .get(&request.reverted)
            .await?
            .ok_or_else(|| SchedError::UnknownMigration(request.reverted.to_string()))?;
        let uuid = request.uuid.clone().unwrap_or_else(MigrationUuid::generate);

        if let Some(existing) = self.store.get(&uuid).await? {
            if existing.reverted_uuid.as_ref() != Some(&original.uuid) {
                return Err(SchedError::Submission(format!(
                    "uuid {} is already used by another migration",
                    uuid
                )));
            }
            if existing.status.is_retryable() {
                let candidate = rerun_candidate(&existing).map_err(SchedError::Submission)?;
                let live = self.store.active().await?;
                check_submission(&candidate, &live, &[]).map_err(SchedError::Submission)?;
                self.store.requeue(&uuid, Utc::now()).await?;
            }
            return Ok(uuid);
        }

        let context = request
            .context
            .clone()
            .unwrap_or_else(|| MigrationContext::generated(&uuid.compact()));
        let mut revert = build_revert(&original, uuid.clone(), &setting, context, Utc::now())?;
        let live = self.store.active().await?;
        check_submission(&revert, &live, &[]).map_err(SchedError::Submission)?;
        revert.sequence_number = self.store.next_sequence().await?;
        self.store.insert(&revert).await?;
        log::info!("Submitted revert {} of {}", uuid, original.uuid);
        Ok(uuid)
    }

    /// Apply an operator command to one migration.
    pub async fn command(
        &self,
        uuid: &MigrationUuid,
        command: OperatorCommand,
    ) -> SchedResult<CommandOutcome> {
        let _guard = self.tick_lock.lock().await;
        let m = self
            .store
            .get(uuid)
            .await?
            .ok_or_else(|| SchedError::UnknownMigration(uuid.to_string()))?;
        self.apply(&m, command, Utc::now()).await
    }

    async fn apply(
        &self,
        m: &Migration,
        command: OperatorCommand,
        now: DateTime<Utc>,
    ) -> SchedResult<CommandOutcome> {
        let (outcome, threshold) = validate(command, m, &self.config.cutover)?;
        if !outcome.is_applied() {
            log::info!("{} on {} ({}) is a no-op", command, m.uuid, m.status);
            return Ok(CommandOutcome::NoOp);
        }
        let uuid = &m.uuid;
        let applied = match command {
            OperatorCommand::Launch => self.store.launch(uuid, now).await?,
            OperatorCommand::Complete => self.store.set_postpone_completion(uuid, false).await?,
            OperatorCommand::Postpone => self.store.set_postpone_completion(uuid, true).await?,
            OperatorCommand::Cancel => {
                if m.status == MigrationStatus::Running && self.has_worker(uuid) {
                    let requested = self.store.request_cancel(uuid).await?;
                    if let Some(worker) = self.workers().get(uuid) {
                        worker.cancel.cancel();
                    }
                    requested
                } else {
                    self.store
                        .mark_cancelled(uuid, "cancelled by operator", now)
                        .await?
                }
            }
            OperatorCommand::ForceCutOver => self.store.request_force_cutover(uuid).await?,
            OperatorCommand::SetCutOverThreshold(requested) => {
                self.store
                    .set_cutover_threshold(uuid, threshold.unwrap_or(requested))
                    .await?
            }
            OperatorCommand::Cleanup => self.store.request_cleanup(uuid).await?,
            OperatorCommand::Retry => {
                let live = self.store.active().await?;
                rerun_candidate(m)
                    .and_then(|candidate| check_submission(&candidate, &live, &[]))
                    .map_err(|reason| SchedError::InvalidTransition {
                        command: command.name().to_string(),
                        uuid: uuid.to_string(),
                        reason,
                    })?;
                self.store.requeue(uuid, now).await?
            }
        };
        if applied {
            log::info!("{} applied to {}", command, uuid);
            Ok(CommandOutcome::Applied)
        } else {
            log::info!("{} on {} lost a race and is a no-op", command, uuid);
            Ok(CommandOutcome::NoOp)
        }
    }

    /// Apply `command` to every active migration it applies to.
    async fn apply_all(&self, command: OperatorCommand) -> SchedResult<usize> {
        let _guard = self.tick_lock.lock().await;
        let now = Utc::now();
        let mut count = 0;
        for m in self.store.active().await? {
            if self.apply(&m, command, now).await?.is_applied() {
                count += 1;
            }
        }
        Ok(count)
    }

    pub async fn launch_all(&self) -> SchedResult<usize> {
        self.apply_all(OperatorCommand::Launch).await
    }

    pub async fn complete_all(&self) -> SchedResult<usize> {
        self.apply_all(OperatorCommand::Complete).await
    }

    pub async fn cancel_all(&self) -> SchedResult<usize> {
        self.apply_all(OperatorCommand::Cancel).await
    }

    /// Mark every finished migration's artifacts for immediate reaping.
    pub async fn cleanup_all(&self) -> SchedResult<usize> {
        let _guard = self.tick_lock.lock().await;
        Ok(self.store.request_cleanup_all().await?)
    }

    pub async fn show(&self, filter: &MigrationFilter) -> SchedResult<Vec<Migration>> {
        Ok(self.store.query(filter).await?)
    }

    pub async fn get(&self, uuid: &MigrationUuid) -> SchedResult<Option<Migration>> {
        Ok(self.store.get(uuid).await?)
    }

    /// One scheduling pass.
    pub async fn tick(&self) -> SchedResult<TickReport> {
        let _guard = self.tick_lock.lock().await;
        let mut report = TickReport::default();
        self.workers().retain(|_, w| !w.handle.is_finished());

        // Running records nobody drives, e.g. after a restart.
        for m in self.store.active().await? {
            if m.status == MigrationStatus::Running && !self.has_worker(&m.uuid) {
                log::warn!("Resuming {}: no worker was driving it", m.uuid);
                self.store.increment_retries(&m.uuid).await?;
                self.spawn_worker(m);
                report.resumed += 1;
            }
        }

        self.bail_out(&mut report).await?;

        let now = Utc::now();
        for m in self.store.active().await? {
            if m.status == MigrationStatus::Queued && !m.options.postpone_launch {
                if self.store.mark_ready(&m.uuid, now).await? {
                    log::debug!("{} is ready", m.uuid);
                    report.readied += 1;
                }
            }
        }

        self.admit(&mut report).await?;

        report.reaped = self.reaper.sweep(Utc::now()).await?;
        if !report.is_empty() {
            log::debug!("Tick on {}/{}: {:?}", self.keyspace, self.shard, report);
        }
        Ok(report)
    }

    /// Bail-out message for an in-order member whose predecessor failed.
    /// Batch members are read once per context and kept in `cache`.
    async fn bail_out_message(
        &self,
        m: &Migration,
        cache: &mut HashMap<MigrationContext, Vec<Migration>>,
    ) -> SchedResult<Option<String>> {
        let Some(context) = m.in_order_batch() else {
            return Ok(None);
        };
        if !cache.contains_key(context) {
            let batch = self
                .store
                .query(&MigrationFilter::pattern(context.as_str()))
                .await?;
            cache.insert(context.clone(), batch);
        }
        Ok(cache
            .get(context)
            .and_then(|batch| in_order_verdict(m, batch).bail_out_message()))
    }

    async fn fail_member(
        &self,
        m: &Migration,
        message: &str,
        cache: &mut HashMap<MigrationContext, Vec<Migration>>,
        report: &mut TickReport,
    ) -> SchedResult<()> {
        if !self.store.mark_failed(&m.uuid, message, Utc::now()).await? {
            return Ok(());
        }
        log::info!("{} bailed out: {}", m.uuid, message);
        report.bailed_out += 1;
        for batch in cache.values_mut() {
            for member in batch.iter_mut().filter(|b| b.uuid == m.uuid) {
                member.status = MigrationStatus::Failed;
            }
        }
        Ok(())
    }

    /// Fail waiting in-order members whose predecessor failed.
    async fn bail_out(&self, report: &mut TickReport) -> SchedResult<()> {
        let mut cache = HashMap::new();
        for m in self.store.active().await? {
            if m.status == MigrationStatus::Running {
                continue;
            }
            if let Some(message) = self.bail_out_message(&m, &mut cache).await? {
                self.fail_member(&m, &message, &mut cache, report).await?;
            }
        }
        Ok(())
    }

    /// Start ready migrations in sequence order, each checked against the
    /// running set plus everything admitted earlier in this pass.
    async fn admit(&self, report: &mut TickReport) -> SchedResult<()> {
        let active = self.store.active().await?;
        let mut running: Vec<Migration> = active
            .iter()
            .filter(|m| m.status == MigrationStatus::Running)
            .cloned()
            .collect();
        let mut candidates: Vec<&Migration> = active
            .iter()
            .filter(|m| m.status == MigrationStatus::Ready)
            .collect();
        candidates.sort_by_key(|m| m.sequence_number);
        let mut cache = HashMap::new();

        for candidate in candidates {
            let verdict = {
                let refs: Vec<&Migration> = running.iter().collect();
                evaluate(candidate, &refs)
            };
            match verdict {
                Admission::Blocked(reason) => {
                    log::debug!("{} stays ready: {}", candidate.uuid, reason);
                }
                Admission::Admit => {
                    // a predecessor may have failed since the bail-out pass
                    if let Some(message) = self.bail_out_message(candidate, &mut cache).await? {
                        self.fail_member(candidate, &message, &mut cache, report)
                            .await?;
                        continue;
                    }
                    if !self.store.mark_running(&candidate.uuid, Utc::now()).await? {
                        continue;
                    }
                    let Some(started) = self.store.get(&candidate.uuid).await? else {
                        continue;
                    };
                    log::info!(
                        "Starting {} on {} ({})",
                        started.uuid,
                        started.table,
                        started.strategy_string()
                    );
                    running.push(started.clone());
                    self.spawn_worker(started);
                    report.started += 1;
                }
            }
        }
        Ok(())
    }

    fn spawn_worker(&self, migration: Migration) {
        let cancel = self.shutdown.child_token();
        let worker = Worker {
            store: self.store.clone(),
            engine: self.engine.clone(),
            analyzer: self.analyzer.clone(),
            config: self.config.clone(),
        };
        let uuid = migration.uuid.clone();
        let handle = tokio::spawn(worker.run(migration, cancel.clone()));
        self.workers().insert(uuid, WorkerHandle { cancel, handle });
    }

    /// Whether nothing can happen without an operator: every active
    /// migration waits for `launch` or `complete`, or is held behind one
    /// that does.
    pub async fn is_idle(&self) -> SchedResult<bool> {
        let active = self.store.active().await?;
        let running: Vec<&Migration> = active
            .iter()
            .filter(|m| m.status == MigrationStatus::Running)
            .collect();
        Ok(active.iter().all(|m| {
            awaits_operator(m)
                || match m.status {
                    MigrationStatus::Ready => !evaluate(m, &running).is_admitted(),
                    MigrationStatus::Running => {
                        m.ready_to_complete
                            && matches!(in_order_verdict(m, &active), InOrderVerdict::Wait(_))
                    }
                    _ => false,
                }
        }))
    }

    /// Tick every `tick_interval` until `shutdown` fires, then stop the
    /// workers.
    pub async fn run(&self, shutdown: CancellationToken) -> SchedResult<()> {
        let mut interval = tokio::time::interval(self.config.scheduler.tick_interval);
        log::info!(
            "Scheduler for {}/{} running with {} engine",
            self.keyspace,
            self.shard,
            self.engine.engine_type()
        );
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        log::error!("Tick on {}/{} failed: {}", self.keyspace, self.shard, e);
                    }
                }
            }
        }
        self.stop_workers().await;
        Ok(())
    }

    /// Cancel every worker and wait for them to release engine resources.
    /// Their records stay `running` and are resumed by the next scheduler;
    /// this scheduler cannot start workers afterwards.
    pub async fn stop_workers(&self) {
        self.shutdown.cancel();
        let handles: Vec<(MigrationUuid, WorkerHandle)> = self.workers().drain().collect();
        for (uuid, worker) in handles {
            if let Err(e) = worker.handle.await {
                log::warn!("Worker for {} ended abnormally: {}", uuid, e);
            }
        }
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
