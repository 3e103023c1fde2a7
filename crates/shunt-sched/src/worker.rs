//! Per-migration worker.
//!
//! One tokio task per running migration. The worker resolves the plan,
//! drives the engine and mirrors engine events into the store. Every poll
//! interval it re-reads the record and republishes the cut-over gate, so
//! operator commands reach a running engine without any shared memory
//! besides the store.

use crate::admission::{in_order_verdict, InOrderVerdict};
use crate::error::SchedResult;
use crate::planner::resolve_plan;
use chrono::{DateTime, Utc};
use shunt_core::{Config, Migration, MigrationUuid};
use shunt_db::{
    CutOverGate, DbError, EngineEvent, ExecutionControl, ExecutionEngine, ExecutionOutcome,
    ExecutionPlan, ExecutionRequest,
};
use shunt_meta::{MigrationFilter, MigrationStore};
use shunt_sql::StatementAnalyzer;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Why a worker stopped its engine early.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Stop {
    Operator,
    BailOut(String),
}

/// What the record says the engine should do right now.
struct Snapshot {
    gate: CutOverGate,
    verdict: InOrderVerdict,
    cancel_requested: bool,
}

#[derive(Clone)]
pub(crate) struct Worker {
    pub(crate) store: Arc<dyn MigrationStore>,
    pub(crate) engine: Arc<dyn ExecutionEngine>,
    pub(crate) analyzer: Arc<StatementAnalyzer>,
    pub(crate) config: Arc<Config>,
}

/// Cut-over gate for `m` at `now`.
pub(crate) fn gate_for(
    m: &Migration,
    verdict: &InOrderVerdict,
    config: &Config,
    now: DateTime<Utc>,
) -> CutOverGate {
    let overdue = match (m.options.force_cut_over_after, m.started_at) {
        (Some(after), Some(started)) => chrono::Duration::from_std(after)
            .map(|after| started + after <= now)
            .unwrap_or(false),
        _ => false,
    };
    CutOverGate {
        allowed: !m.options.postpone_completion && *verdict == InOrderVerdict::Proceed,
        force: m.force_cutover || overdue,
        threshold: m
            .options
            .cutover_threshold
            .unwrap_or(config.cutover.default_threshold),
    }
}

impl Worker {
    pub(crate) async fn run(self, migration: Migration, cancel: CancellationToken) {
        let uuid = migration.uuid.clone();
        if let Err(e) = self.drive(migration, cancel).await {
            log::error!("Worker for {} stopped on a store error: {}", uuid, e);
        }
    }

    async fn drive(&self, migration: Migration, cancel: CancellationToken) -> SchedResult<()> {
        let uuid = migration.uuid.clone();
        let plan = match resolve_plan(
            &self.analyzer,
            self.engine.as_ref(),
            self.store.as_ref(),
            &migration,
        )
        .await
        {
            Ok(plan) => plan,
            Err(e) => {
                log::warn!("Migration {} cannot be planned: {}", uuid, e);
                self.store.mark_failed(&uuid, &e.to_string(), Utc::now()).await?;
                return Ok(());
            }
        };
        let object = if plan.is_noop() {
            migration.object_kind
        } else {
            plan.object()
        };
        self.store.set_plan(&uuid, plan.action(), object).await?;
        log::info!(
            "Migration {} resolved to {} {} via {}",
            uuid,
            plan.action(),
            plan.name().unwrap_or("-"),
            self.engine.engine_type()
        );

        let max_retries = self.config.scheduler.max_transient_retries;
        let mut attempt = 0u32;
        loop {
            let (result, stop) = self.execute_once(&migration, &plan, &cancel).await?;
            match result {
                Ok(outcome) => return self.finish(&migration, outcome, &cancel).await,
                Err(DbError::Cancelled) => return self.stopped(&uuid, stop).await,
                Err(e) if e.is_transient() && attempt < max_retries => {
                    attempt += 1;
                    self.store.increment_retries(&uuid).await?;
                    log::warn!(
                        "Transient failure on {} (attempt {}/{}): {}",
                        uuid,
                        attempt,
                        max_retries,
                        e
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return self.stopped(&uuid, stop).await,
                        _ = tokio::time::sleep(self.config.scheduler.worker_poll_interval) => {}
                    }
                }
                Err(e) => {
                    log::warn!("Migration {} failed: {}", uuid, e);
                    self.store.mark_failed(&uuid, &e.to_string(), Utc::now()).await?;
                    return Ok(());
                }
            }
        }
    }

    /// One engine invocation with the event and gate plumbing around it.
    async fn execute_once(
        &self,
        migration: &Migration,
        plan: &ExecutionPlan,
        cancel: &CancellationToken,
    ) -> SchedResult<(Result<ExecutionOutcome, DbError>, Option<Stop>)> {
        let uuid = &migration.uuid;
        let initial = self.snapshot(uuid).await?;
        let (gate_tx, gate_rx) = watch::channel(
            initial
                .as_ref()
                .map(|s| s.gate)
                .unwrap_or_else(|| CutOverGate::closed(self.config.cutover.default_threshold)),
        );
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let engine_cancel = cancel.child_token();
        let request = ExecutionRequest {
            uuid: uuid.clone(),
            strategy: migration.strategy,
            plan: plan.clone(),
            prefer_instant_ddl: migration.options.prefer_instant_ddl,
        };
        let control = ExecutionControl {
            cancel: engine_cancel.clone(),
            gate: gate_rx,
        };

        let execution = self.engine.execute(request, control, events_tx);
        tokio::pin!(execution);
        let mut poll = tokio::time::interval(self.config.scheduler.worker_poll_interval);
        let mut stop = None;

        let result = loop {
            tokio::select! {
                result = &mut execution => break result,
                Some(event) = events_rx.recv() => self.record_event(uuid, event).await,
                _ = poll.tick() => {
                    let Some(snapshot) = self.snapshot(uuid).await? else {
                        continue;
                    };
                    gate_tx.send_replace(snapshot.gate);
                    if stop.is_none() {
                        if snapshot.cancel_requested {
                            stop = Some(Stop::Operator);
                        } else if let Some(message) = snapshot.verdict.bail_out_message() {
                            stop = Some(Stop::BailOut(message));
                        }
                        if let Some(reason) = &stop {
                            log::info!("Stopping engine for {}: {:?}", uuid, reason);
                            engine_cancel.cancel();
                        }
                    }
                }
            }
        };
        while let Ok(event) = events_rx.try_recv() {
            self.record_event(uuid, event).await;
        }
        Ok((result, stop))
    }

    /// Current gate and stop signals for a migration; `None` once the
    /// record is gone.
    async fn snapshot(&self, uuid: &MigrationUuid) -> SchedResult<Option<Snapshot>> {
        let Some(m) = self.store.get(uuid).await? else {
            return Ok(None);
        };
        let verdict = self.verdict(&m).await?;
        Ok(Some(Snapshot {
            gate: gate_for(&m, &verdict, &self.config, Utc::now()),
            cancel_requested: m.cancel_requested,
            verdict,
        }))
    }

    async fn verdict(&self, m: &Migration) -> SchedResult<InOrderVerdict> {
        let Some(context) = m.in_order_batch() else {
            return Ok(InOrderVerdict::Proceed);
        };
        let members = self
            .store
            .query(&MigrationFilter::pattern(context.as_str()))
            .await?;
        Ok(in_order_verdict(m, &members))
    }

    async fn record_event(&self, uuid: &MigrationUuid, event: EngineEvent) {
        let recorded = match &event {
            EngineEvent::ArtifactCreated(name) => self.store.add_artifact(uuid, name).await,
            EngineEvent::Progress { percent } => self.store.set_progress(uuid, *percent).await,
            EngineEvent::ReadyToComplete => {
                log::info!("Migration {} is ready to complete", uuid);
                self.store.set_ready_to_complete(uuid, true).await
            }
            EngineEvent::Throttled { ratio, reason } => {
                self.store.set_throttle(uuid, *ratio, reason).await
            }
            EngineEvent::CutOverTimedOut { attempt } => {
                log::info!("Cut-over attempt {} for {} timed out", attempt, uuid);
                let message = format!("cut-over attempt {} timed out waiting for locks", attempt);
                self.store.set_message(uuid, &message).await
            }
            EngineEvent::SessionsTerminated { count } => {
                log::warn!("Forced cut-over of {} terminated {} sessions", uuid, count);
                let message = format!("forced cut-over terminated {} sessions", count);
                self.store.set_message(uuid, &message).await
            }
        };
        if let Err(e) = recorded {
            log::warn!("Could not record {:?} for {}: {}", event, uuid, e);
        }
    }

    /// Record success once in-order predecessors allow it.
    async fn finish(
        &self,
        migration: &Migration,
        outcome: ExecutionOutcome,
        cancel: &CancellationToken,
    ) -> SchedResult<()> {
        let uuid = &migration.uuid;
        loop {
            let Some(current) = self.store.get(uuid).await? else {
                return Ok(());
            };
            match self.verdict(&current).await? {
                InOrderVerdict::Proceed => break,
                bail @ InOrderVerdict::BailOut { .. } => {
                    let message = bail.bail_out_message().unwrap_or_default();
                    self.store.mark_failed(uuid, &message, Utc::now()).await?;
                    return Ok(());
                }
                InOrderVerdict::Wait(predecessor) => {
                    log::debug!("{} waits for {} before completing", uuid, predecessor);
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            let stop = current.cancel_requested.then_some(Stop::Operator);
                            return self.stopped(uuid, stop).await;
                        }
                        _ = tokio::time::sleep(self.config.scheduler.worker_poll_interval) => {}
                    }
                }
            }
        }
        if self
            .store
            .mark_complete(uuid, &outcome.artifacts, Utc::now())
            .await?
        {
            log::info!(
                "Migration {} complete with {} artifact(s)",
                uuid,
                outcome.artifacts.len()
            );
        } else {
            log::warn!("Migration {} finished but was no longer running", uuid);
        }
        Ok(())
    }

    /// The engine stopped on cancellation: record why, or leave the record
    /// running for the next scheduler when the process is shutting down.
    async fn stopped(&self, uuid: &MigrationUuid, stop: Option<Stop>) -> SchedResult<()> {
        let stop = match stop {
            Some(stop) => Some(stop),
            None => self
                .store
                .get(uuid)
                .await?
                .filter(|m| m.cancel_requested)
                .map(|_| Stop::Operator),
        };
        match stop {
            Some(Stop::Operator) => {
                self.store
                    .mark_cancelled(uuid, "cancelled by operator", Utc::now())
                    .await?;
                log::info!("Migration {} cancelled", uuid);
            }
            Some(Stop::BailOut(message)) => {
                self.store.mark_failed(uuid, &message, Utc::now()).await?;
                log::info!("Migration {} bailed out: {}", uuid, message);
            }
            None => log::info!("Worker for {} stopped by shutdown", uuid),
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "worker_test.rs"]
mod tests;
