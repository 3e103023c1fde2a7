//! Lifecycle status of a migration.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical states a migration passes through.
///
/// `queued → ready → running → complete | failed`, with `cancelled`
/// reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    /// Accepted; not yet reviewed, or waiting for an explicit launch
    Queued,
    /// Eligible to run; waiting for admission
    Ready,
    /// An execution engine invocation is in progress
    Running,
    /// Terminal: the change is live
    Complete,
    /// Terminal: execution or batch propagation error
    Failed,
    /// Terminal: operator abort
    Cancelled,
}

impl MigrationStatus {
    /// All states, in lifecycle order.
    pub const ALL: [MigrationStatus; 6] = [
        MigrationStatus::Queued,
        MigrationStatus::Ready,
        MigrationStatus::Running,
        MigrationStatus::Complete,
        MigrationStatus::Failed,
        MigrationStatus::Cancelled,
    ];

    /// States a migration can still leave.
    pub const ACTIVE: [MigrationStatus; 3] = [
        MigrationStatus::Queued,
        MigrationStatus::Ready,
        MigrationStatus::Running,
    ];

    /// States with an outcome; exactly the states that carry `completed_at`.
    pub const TERMINAL: [MigrationStatus; 3] = [
        MigrationStatus::Complete,
        MigrationStatus::Failed,
        MigrationStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::Queued => "queued",
            MigrationStatus::Ready => "ready",
            MigrationStatus::Running => "running",
            MigrationStatus::Complete => "complete",
            MigrationStatus::Failed => "failed",
            MigrationStatus::Cancelled => "cancelled",
        }
    }

    /// True for `complete`, `failed` and `cancelled`.
    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }

    /// True for `queued`, `ready` and `running`.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Terminal states that an explicit resubmission may re-run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MigrationStatus::Failed | MigrationStatus::Cancelled)
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "migration status",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
#[path = "status_test.rs"]
mod tests;
