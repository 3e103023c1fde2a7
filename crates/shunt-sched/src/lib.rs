//! shunt-sched - Migration scheduler for Shunt
//!
//! Owns the lifecycle of every migration on a shard: submission checks,
//! admission control, the scheduling tick, one worker per running
//! migration, operator commands, declarative resolution, reverts and
//! artifact reaping. [`KeyspaceScheduler`] fans all of it out over the
//! shards of a keyspace.

pub mod admission;
pub mod declarative;
pub mod error;
pub mod keyspace;
pub mod lifecycle;
pub mod planner;
pub mod reaper;
pub mod revert;
pub mod scheduler;
#[cfg(test)]
pub(crate) mod test_utils;
mod worker;

pub use admission::{Admission, InOrderVerdict};
pub use error::{SchedError, SchedResult};
pub use keyspace::{KeyspaceScheduler, ShardOutcome};
pub use lifecycle::{CommandOutcome, OperatorCommand, Transition};
pub use reaper::{ReapReport, Reaper};
pub use scheduler::{RevertRequest, ShardScheduler, SubmitRequest, TickReport};
