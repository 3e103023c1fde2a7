//! Deterministic in-memory execution engine.
//!
//! The catalog holds modeled definitions rather than text, so renames only
//! touch the name and a swap followed by its inverse restores the original
//! definition exactly. Competing sessions, throttling and failures can be
//! simulated per object.

use crate::cutover::{await_throttle, checkpoint, cut_over, pause, Attempt};
use crate::error::{DbError, DbResult};
use crate::throttle::NeverThrottle;
use crate::traits::{
    CutOverGate, EngineEvent, EventSender, ExecutionControl, ExecutionEngine, ExecutionOutcome,
    ExecutionPlan, ExecutionRequest, ObjectDefinition, SchemaInspector, ThrottleOracle,
};
use async_trait::async_trait;
use chrono::Utc;
use shunt_core::{ArtifactKind, ArtifactName, MigrationUuid, ObjectKind};
use shunt_sql::{SchemaObject, StatementAnalyzer, TableDefinition};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Application name reported to the throttle oracle.
const THROTTLE_APP: &str = "online-ddl";

/// A simulated failure attached to an object name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Fails the next `remaining` executions with a retryable error
    Transient { remaining: u32 },
    /// Fails every execution with this message
    Permanent(String),
}

impl Fault {
    pub fn transient(times: u32) -> Self {
        Fault::Transient {
            remaining: times.max(1),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Fault::Permanent(message.into())
    }
}

/// Timing knobs for the simulated copy and cut-over.
#[derive(Debug, Clone)]
pub struct MemoryEngineOptions {
    /// Number of row-copy chunks an online ALTER goes through
    pub copy_chunks: u32,
    pub chunk_delay: Duration,
    /// Cap on how long one cut-over attempt waits on held locks
    pub lock_wait: Duration,
    pub throttle_backoff: Duration,
}

impl Default for MemoryEngineOptions {
    fn default() -> Self {
        Self {
            copy_chunks: 4,
            chunk_delay: Duration::ZERO,
            lock_wait: Duration::from_millis(10),
            throttle_backoff: Duration::from_millis(10),
        }
    }
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

#[derive(Default)]
struct Catalog {
    objects: BTreeMap<String, SchemaObject>,
    /// Sessions holding a lock on each object
    locks: HashMap<String, u32>,
    faults: HashMap<String, Fault>,
}

impl Catalog {
    fn get(&self, name: &str) -> DbResult<&SchemaObject> {
        self.objects
            .get(&key(name))
            .ok_or_else(|| DbError::ObjectNotFound(name.to_string()))
    }

    fn require_absent(&self, name: &str) -> DbResult<()> {
        if self.objects.contains_key(&key(name)) {
            return Err(DbError::ObjectExists(name.to_string()));
        }
        Ok(())
    }

    fn require_kind(&self, name: &str, object: ObjectKind) -> DbResult<()> {
        let actual = self.get(name)?.kind();
        if actual != object {
            return Err(DbError::InvalidPlan(format!(
                "{} is a {}, not a {}",
                name, actual, object
            )));
        }
        Ok(())
    }

    fn insert_new(&mut self, object: SchemaObject) -> DbResult<()> {
        self.require_absent(object.name().as_str())?;
        self.objects.insert(key(object.name().as_str()), object);
        Ok(())
    }

    fn remove(&mut self, name: &str) -> DbResult<SchemaObject> {
        self.objects
            .remove(&key(name))
            .ok_or_else(|| DbError::ObjectNotFound(name.to_string()))
    }

    fn rename(&mut self, from: &str, to: &str) -> DbResult<()> {
        self.get(from)?;
        self.require_absent(to)?;
        let object = self.remove(from)?;
        self.objects.insert(key(to), object.renamed(to));
        Ok(())
    }

    /// Move live `name` to `held`, then move `incoming` into `name`.
    fn exchange(&mut self, name: &str, incoming: &str, held: &str) -> DbResult<()> {
        let display = self.get(name)?.name().to_string();
        self.get(incoming)?;
        self.require_absent(held)?;
        let live = self.remove(name)?;
        let replacement = self.remove(incoming)?;
        self.objects.insert(key(held), live.renamed(held));
        self.objects.insert(key(name), replacement.renamed(&display));
        Ok(())
    }

    /// Lock check before a cut-over step; `Some(Locked)` means wait.
    fn acquire(&mut self, name: &str, gate: &CutOverGate, events: &EventSender) -> Option<Attempt> {
        let sessions = self.locks.get(&key(name)).copied().unwrap_or(0);
        if sessions == 0 {
            return None;
        }
        if !gate.force {
            return Some(Attempt::Locked);
        }
        self.locks.remove(&key(name));
        log::warn!(
            "Forced cut-over on {} terminated {} conflicting sessions",
            name,
            sessions
        );
        let _ = events.send(EngineEvent::SessionsTerminated { count: sessions });
        None
    }
}

/// In-memory catalog engine for tests and dry runs.
pub struct MemoryEngine {
    analyzer: StatementAnalyzer,
    catalog: Mutex<Catalog>,
    throttle: Arc<dyn ThrottleOracle>,
    options: MemoryEngineOptions,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            analyzer: StatementAnalyzer::mysql(),
            catalog: Mutex::new(Catalog::default()),
            throttle: Arc::new(NeverThrottle),
            options: MemoryEngineOptions::default(),
        }
    }

    pub fn with_analyzer(mut self, analyzer: StatementAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_throttle(mut self, throttle: Arc<dyn ThrottleOracle>) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_options(mut self, options: MemoryEngineOptions) -> Self {
        self.options = options;
        self
    }

    fn catalog(&self) -> DbResult<MutexGuard<'_, Catalog>> {
        self.catalog
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    /// Install an object directly from its `CREATE` statement.
    pub fn seed(&self, create_sql: &str) -> DbResult<()> {
        let object = self.analyzer.definition(create_sql)?;
        self.catalog()?.insert_new(object)
    }

    pub fn object(&self, name: &str) -> Option<SchemaObject> {
        self.catalog().ok()?.get(name).ok().cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.object(name).is_some()
    }

    /// Every object name in the catalog, artifacts included, sorted.
    pub fn object_names(&self) -> Vec<String> {
        self.catalog()
            .map(|c| c.objects.values().map(|o| o.name().to_string()).collect())
            .unwrap_or_default()
    }

    /// Simulate `sessions` competing sessions holding a lock on `name`.
    pub fn lock_object(&self, name: &str, sessions: u32) {
        if let Ok(mut catalog) = self.catalog() {
            catalog.locks.insert(key(name), sessions);
        }
    }

    pub fn unlock_object(&self, name: &str) {
        if let Ok(mut catalog) = self.catalog() {
            catalog.locks.remove(&key(name));
        }
    }

    /// Make executions against `name` (or drops of artifact `name`) fail.
    pub fn inject_fault(&self, name: &str, fault: Fault) {
        if let Ok(mut catalog) = self.catalog() {
            catalog.faults.insert(key(name), fault);
        }
    }

    pub fn clear_fault(&self, name: &str) {
        if let Ok(mut catalog) = self.catalog() {
            catalog.faults.remove(&key(name));
        }
    }

    fn trip_fault(&self, name: &str) -> DbResult<()> {
        let mut catalog = self.catalog()?;
        let k = key(name);
        let exhausted = match catalog.faults.get_mut(&k) {
            None => return Ok(()),
            Some(Fault::Permanent(message)) => return Err(DbError::ExecutionError(message.clone())),
            Some(Fault::Transient { remaining }) => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
        };
        if exhausted {
            catalog.faults.remove(&k);
        }
        Err(DbError::Transient(format!(
            "lost connection to target while working on {}",
            name
        )))
    }

    fn table(&self, name: &str) -> DbResult<TableDefinition> {
        match self.catalog()?.get(name)? {
            SchemaObject::Table(t) => Ok(t.clone()),
            SchemaObject::View(_) => Err(DbError::InvalidPlan(format!(
                "{} is a view; views cannot be altered",
                name
            ))),
        }
    }

    fn held_name(uuid: &MigrationUuid) -> String {
        ArtifactName::new(ArtifactKind::Held, uuid, Utc::now()).to_string()
    }

    /// Simulated row copy into a shadow object.
    async fn copy_rows(&self, control: &ExecutionControl, events: &EventSender) -> DbResult<()> {
        let chunks = self.options.copy_chunks.max(1);
        let mut last_ratio = 0.0;
        for chunk in 1..=chunks {
            await_throttle(
                self.throttle.as_ref(),
                THROTTLE_APP,
                control,
                events,
                self.options.throttle_backoff,
                &mut last_ratio,
            )
            .await?;
            pause(control, self.options.chunk_delay).await?;
            let _ = events.send(EngineEvent::Progress {
                percent: f64::from(chunk) * 100.0 / f64::from(chunks),
            });
        }
        Ok(())
    }

    /// Signal readiness and run the cut-over step under the lock simulation.
    async fn finish<F>(
        &self,
        name: &str,
        control: &mut ExecutionControl,
        events: &EventSender,
        mut step: F,
    ) -> DbResult<()>
    where
        F: FnMut(&mut Catalog) -> DbResult<()>,
    {
        let _ = events.send(EngineEvent::Progress { percent: 100.0 });
        let _ = events.send(EngineEvent::ReadyToComplete);
        cut_over(control, events, self.options.lock_wait, |gate| {
            let mut catalog = self.catalog()?;
            if let Some(locked) = catalog.acquire(name, gate, events) {
                return Ok(locked);
            }
            step(&mut catalog)?;
            Ok(Attempt::Done)
        })
        .await
    }

    async fn run_alter(
        &self,
        request: &ExecutionRequest,
        name: &str,
        sql: &str,
        control: &mut ExecutionControl,
        events: &EventSender,
    ) -> DbResult<ExecutionOutcome> {
        let altered = self.analyzer.apply_alter(&self.table(name)?, sql)?;
        let in_place = !request.strategy.keeps_artifacts()
            || (request.prefer_instant_ddl && self.analyzer.is_instant_alter(sql)?);
        if in_place {
            log::debug!("Applying ALTER on {} in place", name);
            self.finish(name, control, events, |catalog| {
                let live = match catalog.get(name)? {
                    SchemaObject::Table(t) => t.clone(),
                    SchemaObject::View(_) => {
                        return Err(DbError::InvalidPlan(format!("{} is a view", name)))
                    }
                };
                let altered = self.analyzer.apply_alter(&live, sql)?;
                catalog.objects.insert(key(name), SchemaObject::Table(altered));
                Ok(())
            })
            .await?;
            return Ok(ExecutionOutcome::default());
        }

        let shadow = ArtifactName::new(ArtifactKind::Shadow, &request.uuid, Utc::now()).to_string();
        self.catalog()?
            .insert_new(SchemaObject::Table(altered.renamed(&shadow)))?;
        let _ = events.send(EngineEvent::ArtifactCreated(shadow.clone()));
        log::debug!("Created shadow {} for {}", shadow, name);

        let held = Self::held_name(&request.uuid);
        let staged = async {
            self.copy_rows(control, events).await?;
            self.finish(name, control, events, |catalog| {
                catalog.exchange(name, &shadow, &held)
            })
            .await
        }
        .await;
        if let Err(e) = staged {
            if let Ok(mut catalog) = self.catalog() {
                catalog.objects.remove(&key(&shadow));
            }
            return Err(e);
        }
        Ok(ExecutionOutcome {
            artifacts: vec![held],
        })
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchemaInspector for MemoryEngine {
    async fn show_create(&self, name: &str) -> DbResult<Option<ObjectDefinition>> {
        let catalog = self.catalog()?;
        Ok(catalog.get(name).ok().map(|object| ObjectDefinition {
            object: object.kind(),
            sql: self.analyzer.render(object),
        }))
    }
}

#[async_trait]
impl ExecutionEngine for MemoryEngine {
    fn engine_type(&self) -> &'static str {
        "memory"
    }

    async fn execute(
        &self,
        request: ExecutionRequest,
        mut control: ExecutionControl,
        events: EventSender,
    ) -> DbResult<ExecutionOutcome> {
        checkpoint(&control)?;
        if let Some(name) = request.plan.name() {
            self.trip_fault(name)?;
        }
        log::info!(
            "Executing {} plan for {} ({})",
            request.plan.action(),
            request.uuid,
            request.strategy
        );
        let keep = request.strategy.keeps_artifacts();
        let control = &mut control;
        let events = &events;

        match &request.plan {
            ExecutionPlan::Noop { reason } => {
                log::info!("Nothing to execute for {}: {}", request.uuid, reason);
                Ok(ExecutionOutcome::default())
            }
            ExecutionPlan::Create { name, sql, .. } => {
                let object = self.analyzer.definition(sql)?;
                self.catalog()?.require_absent(name)?;
                self.finish(name, control, events, |catalog| {
                    catalog.insert_new(object.clone())
                })
                .await?;
                Ok(ExecutionOutcome::default())
            }
            ExecutionPlan::Alter { name, sql } => {
                self.run_alter(&request, name, sql, control, events).await
            }
            ExecutionPlan::Drop { object, name } => {
                self.catalog()?.require_kind(name, *object)?;
                let held = Self::held_name(&request.uuid);
                self.finish(name, control, events, |catalog| {
                    if keep {
                        catalog.rename(name, &held)
                    } else {
                        catalog.remove(name).map(|_| ())
                    }
                })
                .await?;
                Ok(ExecutionOutcome {
                    artifacts: if keep { vec![held] } else { Vec::new() },
                })
            }
            ExecutionPlan::Replace { name, sql, .. } => {
                let object = self.analyzer.definition(sql)?;
                self.catalog()?.get(name)?;
                let held = Self::held_name(&request.uuid);
                self.finish(name, control, events, |catalog| {
                    if keep {
                        catalog.rename(name, &held)?;
                    } else {
                        catalog.remove(name)?;
                    }
                    catalog.insert_new(object.clone())
                })
                .await?;
                Ok(ExecutionOutcome {
                    artifacts: if keep { vec![held] } else { Vec::new() },
                })
            }
            ExecutionPlan::Swap {
                object,
                name,
                artifact,
            } => {
                {
                    let catalog = self.catalog()?;
                    catalog.require_kind(name, *object)?;
                    catalog.get(artifact)?;
                }
                let held = Self::held_name(&request.uuid);
                self.finish(name, control, events, |catalog| {
                    catalog.exchange(name, artifact, &held)
                })
                .await?;
                Ok(ExecutionOutcome {
                    artifacts: vec![held],
                })
            }
            ExecutionPlan::Restore { name, artifact, .. } => {
                {
                    let catalog = self.catalog()?;
                    catalog.get(artifact)?;
                    catalog.require_absent(name)?;
                }
                self.finish(name, control, events, |catalog| catalog.rename(artifact, name))
                    .await?;
                Ok(ExecutionOutcome::default())
            }
        }
    }

    async fn drop_artifact(&self, name: &str) -> DbResult<()> {
        if ArtifactName::parse(name).is_none() {
            return Err(DbError::InvalidPlan(format!(
                "refusing to drop {}: not an artifact name",
                name
            )));
        }
        self.trip_fault(name)?;
        if self.catalog()?.objects.remove(&key(name)).is_some() {
            log::debug!("Dropped artifact {}", name);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
