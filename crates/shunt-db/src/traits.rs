//! Collaborator contracts driven by the scheduler.

use crate::error::DbResult;
use async_trait::async_trait;
use shunt_core::{MigrationUuid, ObjectKind, PlanAction, Strategy};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// A live object's definition as reported by the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDefinition {
    pub object: ObjectKind,
    /// `CREATE TABLE` / `CREATE VIEW` text
    pub sql: String,
}

/// Reads live schema from the execution target.
#[async_trait]
pub trait SchemaInspector: Send + Sync {
    /// Definition of `name`, or `None` when no such table or view exists.
    async fn show_create(&self, name: &str) -> DbResult<Option<ObjectDefinition>>;
}

/// Answer from a throttle check.
#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleCheck {
    pub throttled: bool,
    /// Share of work currently held back, 0.0 to 1.0
    pub ratio: f64,
    pub reason: String,
}

impl ThrottleCheck {
    pub fn ok() -> Self {
        Self {
            throttled: false,
            ratio: 0.0,
            reason: String::new(),
        }
    }
}

/// Decides whether a running migration should hold back before a costly step.
#[async_trait]
pub trait ThrottleOracle: Send + Sync {
    async fn check(&self, app: &str) -> ThrottleCheck;
}

/// What an engine must do for one migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionPlan {
    /// Create `name` from a full `CREATE` statement
    Create {
        object: ObjectKind,
        name: String,
        sql: String,
    },
    /// Apply an `ALTER TABLE` to `name`
    Alter { name: String, sql: String },
    /// Remove `name`; online engines keep it as a held artifact
    Drop { object: ObjectKind, name: String },
    /// Hold the current `name` aside and install a new definition
    Replace {
        object: ObjectKind,
        name: String,
        sql: String,
    },
    /// Exchange the live `name` with a held `artifact`
    Swap {
        object: ObjectKind,
        name: String,
        artifact: String,
    },
    /// Rename a held `artifact` back to `name`
    Restore {
        object: ObjectKind,
        name: String,
        artifact: String,
    },
    /// Nothing to execute
    Noop { reason: String },
}

impl ExecutionPlan {
    /// Tag persisted on the migration record.
    pub fn action(&self) -> PlanAction {
        match self {
            ExecutionPlan::Create { .. } => PlanAction::Create,
            ExecutionPlan::Alter { .. } => PlanAction::Alter,
            ExecutionPlan::Drop { .. } => PlanAction::Drop,
            ExecutionPlan::Replace { .. } => PlanAction::Replace,
            ExecutionPlan::Swap { .. } => PlanAction::Swap,
            ExecutionPlan::Restore { .. } => PlanAction::Restore,
            ExecutionPlan::Noop { .. } => PlanAction::Noop,
        }
    }

    pub fn object(&self) -> ObjectKind {
        match self {
            ExecutionPlan::Create { object, .. }
            | ExecutionPlan::Drop { object, .. }
            | ExecutionPlan::Replace { object, .. }
            | ExecutionPlan::Swap { object, .. }
            | ExecutionPlan::Restore { object, .. } => *object,
            ExecutionPlan::Alter { .. } | ExecutionPlan::Noop { .. } => ObjectKind::Table,
        }
    }

    /// Target object name; `None` for no-ops.
    pub fn name(&self) -> Option<&str> {
        match self {
            ExecutionPlan::Create { name, .. }
            | ExecutionPlan::Alter { name, .. }
            | ExecutionPlan::Drop { name, .. }
            | ExecutionPlan::Replace { name, .. }
            | ExecutionPlan::Swap { name, .. }
            | ExecutionPlan::Restore { name, .. } => Some(name),
            ExecutionPlan::Noop { .. } => None,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, ExecutionPlan::Noop { .. })
    }
}

/// One engine invocation.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub uuid: MigrationUuid,
    pub strategy: Strategy,
    pub plan: ExecutionPlan,
    pub prefer_instant_ddl: bool,
}

/// Cut-over permission, republished by the worker from store state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutOverGate {
    /// Postponement cleared and ordering predecessors done
    pub allowed: bool,
    /// Terminate conflicting sessions instead of waiting on them
    pub force: bool,
    /// Lock wait budget for one cut-over attempt
    pub threshold: Duration,
}

impl CutOverGate {
    pub fn closed(threshold: Duration) -> Self {
        Self {
            allowed: false,
            force: false,
            threshold,
        }
    }
}

/// Signals an engine observes while it runs.
pub struct ExecutionControl {
    pub cancel: CancellationToken,
    pub gate: watch::Receiver<CutOverGate>,
}

/// Progress reported by an engine during execution.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A side object now exists and belongs to the migration
    ArtifactCreated(String),
    Progress { percent: f64 },
    /// Staging done; cut-over may proceed once the gate allows it
    ReadyToComplete,
    Throttled { ratio: f64, reason: String },
    /// A cut-over attempt gave up waiting for locks
    CutOverTimedOut { attempt: u32 },
    /// Forced cut-over killed competing sessions
    SessionsTerminated { count: u32 },
}

pub type EventSender = mpsc::UnboundedSender<EngineEvent>;

/// Result of a successful execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Objects left behind for revert and inspection
    pub artifacts: Vec<String>,
}

/// Performs schema changes on a target.
///
/// Implementations must be Send + Sync; the scheduler runs one `execute`
/// per running migration concurrently.
#[async_trait]
pub trait ExecutionEngine: SchemaInspector {
    /// Engine identifier for logging
    fn engine_type(&self) -> &'static str;

    /// Run a migration to completion: stage, report readiness, wait for the
    /// cut-over gate and cut over. Returns [`DbError::Cancelled`] after
    /// releasing staged objects when `control.cancel` fires.
    ///
    /// [`DbError::Cancelled`]: crate::error::DbError::Cancelled
    async fn execute(
        &self,
        request: ExecutionRequest,
        control: ExecutionControl,
        events: EventSender,
    ) -> DbResult<ExecutionOutcome>;

    /// Drop an artifact. Missing artifacts count as dropped.
    async fn drop_artifact(&self, name: &str) -> DbResult<()>;
}
