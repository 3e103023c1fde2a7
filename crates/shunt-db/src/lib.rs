//! shunt-db - Execution engines for Shunt
//!
//! This crate provides the collaborator contracts the scheduler drives
//! (`ExecutionEngine`, `SchemaInspector`, `ThrottleOracle`) together with a
//! deterministic in-memory engine and an engine that executes plans against
//! a DuckDB target.

pub(crate) mod cutover;
pub mod duckdb;
pub mod error;
pub mod memory;
pub mod throttle;
pub mod traits;

pub use duckdb::DuckDbEngine;
pub use error::{DbError, DbResult};
pub use memory::{Fault, MemoryEngine, MemoryEngineOptions};
pub use throttle::{ManualThrottle, NeverThrottle};
pub use traits::{
    CutOverGate, EngineEvent, EventSender, ExecutionControl, ExecutionEngine, ExecutionOutcome,
    ExecutionPlan, ExecutionRequest, ObjectDefinition, SchemaInspector, ThrottleCheck,
    ThrottleOracle,
};
