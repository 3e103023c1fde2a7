//! Artifact reaping.

use crate::error::SchedResult;
use chrono::{DateTime, Utc};
use shunt_core::Migration;
use shunt_db::ExecutionEngine;
use shunt_meta::MigrationStore;
use std::sync::Arc;
use std::time::Duration;

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Migrations whose artifacts are all gone
    pub cleaned: usize,
    /// Artifacts dropped
    pub dropped: usize,
    /// Artifact drops that failed and will be retried next sweep
    pub failed: usize,
}

/// Drops artifacts of finished migrations once their retention window
/// elapses, or right away when cleanup was requested.
pub struct Reaper {
    store: Arc<dyn MigrationStore>,
    engine: Arc<dyn ExecutionEngine>,
    default_retain: Duration,
}

impl Reaper {
    pub fn new(
        store: Arc<dyn MigrationStore>,
        engine: Arc<dyn ExecutionEngine>,
        default_retain: Duration,
    ) -> Self {
        Self {
            store,
            engine,
            default_retain,
        }
    }

    /// Whether `m`'s artifacts are due for removal at `now`.
    pub fn is_due(&self, m: &Migration, now: DateTime<Utc>) -> bool {
        let Some(completed_at) = m.completed_at else {
            return false;
        };
        if m.cleanup_at.is_some() {
            return false;
        }
        if m.cleanup_requested {
            return true;
        }
        let retain = m.options.retain_artifacts.unwrap_or(self.default_retain);
        match chrono::Duration::from_std(retain) {
            Ok(retain) => now >= completed_at + retain,
            Err(_) => false,
        }
    }

    pub async fn sweep(&self, now: DateTime<Utc>) -> SchedResult<ReapReport> {
        let mut report = ReapReport::default();
        for m in self.store.cleanup_candidates().await? {
            if !self.is_due(&m, now) {
                continue;
            }
            let mut remaining = Vec::new();
            for artifact in &m.artifacts {
                match self.engine.drop_artifact(artifact).await {
                    Ok(()) => {
                        report.dropped += 1;
                        log::info!("Dropped artifact {} of {}", artifact, m.uuid);
                    }
                    Err(e) => {
                        report.failed += 1;
                        log::warn!("Failed to drop artifact {} of {}: {}", artifact, m.uuid, e);
                        remaining.push(artifact.clone());
                    }
                }
            }
            if remaining.is_empty() {
                if self.store.mark_cleaned_up(&m.uuid, now).await? {
                    report.cleaned += 1;
                }
            } else {
                self.store.retain_artifacts(&m.uuid, &remaining).await?;
            }
        }
        if report != ReapReport::default() {
            log::debug!(
                "Reaper: {} cleaned, {} dropped, {} failed",
                report.cleaned,
                report.dropped,
                report.failed
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
#[path = "reaper_test.rs"]
mod tests;
