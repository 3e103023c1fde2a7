//! Keyspace-wide fan-out over shard schedulers.
//!
//! A submission reaches every shard with the same uuids and context, so one
//! logical migration is a family of per-shard records that progress
//! independently. Commands address that family by uuid and report one
//! outcome per shard.

use crate::error::{SchedError, SchedResult};
use crate::lifecycle::OperatorCommand;
use crate::scheduler::{RevertRequest, ShardScheduler, SubmitRequest, TickReport};
use shunt_core::{Keyspace, Migration, MigrationContext, MigrationUuid, Shard};
use shunt_meta::MigrationFilter;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What a command did on one shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardOutcome {
    pub shard: Shard,
    /// Records the command changed
    pub affected: usize,
    pub error: Option<String>,
}

impl fmt::Display for ShardOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(error) => write!(f, "{}: error: {}", self.shard, error),
            None => write!(f, "{}: {} affected", self.shard, self.affected),
        }
    }
}

/// Commands that apply to every matching migration of a shard.
#[derive(Debug, Clone, Copy)]
enum Bulk {
    Launch,
    Complete,
    Cancel,
    Cleanup,
}

/// Schedulers for every shard of one keyspace.
pub struct KeyspaceScheduler {
    keyspace: Keyspace,
    shards: Vec<Arc<ShardScheduler>>,
}

impl KeyspaceScheduler {
    pub fn new(keyspace: Keyspace, shards: Vec<Arc<ShardScheduler>>) -> Self {
        Self { keyspace, shards }
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    pub fn shards(&self) -> &[Arc<ShardScheduler>] {
        &self.shards
    }

    fn selected<'a>(
        &'a self,
        filter: Option<&'a [Shard]>,
    ) -> impl Iterator<Item = &'a Arc<ShardScheduler>> + 'a {
        self.shards
            .iter()
            .filter(move |s| filter.map_or(true, |wanted| wanted.contains(s.shard())))
    }

    /// Submit to every shard. Uuids and context are fixed up front so each
    /// shard records the same identities.
    pub async fn submit(&self, request: &SubmitRequest) -> SchedResult<Vec<MigrationUuid>> {
        let Some(first) = self.shards.first() else {
            return Err(SchedError::Submission(format!(
                "keyspace {} has no shards",
                self.keyspace
            )));
        };
        let mut request = request.clone();
        if request.uuids.is_empty() {
            let count = first.analyzer().split(&request.sql)?.len();
            request.uuids = (0..count).map(|_| MigrationUuid::generate()).collect();
        }
        if request.context.is_none() {
            request.context = Some(MigrationContext::generated(
                &MigrationUuid::generate().compact(),
            ));
        }
        // a partial rejection on one shard does not stop the others
        let mut partial = None;
        for shard in &self.shards {
            match shard.submit(&request).await {
                Ok(_) => {}
                Err(e @ SchedError::PartlyRejected { .. }) => {
                    log::warn!("{}/{}: {}", self.keyspace, shard.shard(), e);
                    partial.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }
        match partial {
            Some(e) => Err(e),
            None => Ok(request.uuids),
        }
    }

    /// Revert `request.reverted` on every shard that knows it.
    pub async fn revert(&self, request: &RevertRequest) -> SchedResult<MigrationUuid> {
        let mut request = request.clone();
        let uuid = request
            .uuid
            .get_or_insert_with(MigrationUuid::generate)
            .clone();
        if request.context.is_none() {
            request.context = Some(MigrationContext::generated(&uuid.compact()));
        }
        let mut known = 0;
        for shard in &self.shards {
            match shard.revert(&request).await {
                Ok(_) => known += 1,
                Err(SchedError::UnknownMigration(_)) => {}
                Err(e) => return Err(e),
            }
        }
        if known == 0 {
            return Err(SchedError::UnknownMigration(request.reverted.to_string()));
        }
        Ok(uuid)
    }

    /// Apply `command` to `uuid` on the selected shards.
    ///
    /// Command errors are reported per shard. It is an error only when no
    /// selected shard knows the migration.
    pub async fn command(
        &self,
        uuid: &MigrationUuid,
        command: OperatorCommand,
        shards: Option<&[Shard]>,
    ) -> SchedResult<Vec<ShardOutcome>> {
        let mut outcomes = Vec::new();
        let mut known = false;
        for shard in self.selected(shards) {
            let outcome = match shard.command(uuid, command).await {
                Ok(applied) => {
                    known = true;
                    ShardOutcome {
                        shard: shard.shard().clone(),
                        affected: usize::from(applied.is_applied()),
                        error: None,
                    }
                }
                Err(e @ SchedError::UnknownMigration(_)) => ShardOutcome {
                    shard: shard.shard().clone(),
                    affected: 0,
                    error: Some(e.to_string()),
                },
                Err(e) if e.is_command() => {
                    known = true;
                    ShardOutcome {
                        shard: shard.shard().clone(),
                        affected: 0,
                        error: Some(e.to_string()),
                    }
                }
                Err(e) => return Err(e),
            };
            outcomes.push(outcome);
        }
        if !known {
            return Err(SchedError::UnknownMigration(uuid.to_string()));
        }
        Ok(outcomes)
    }

    async fn bulk(
        &self,
        command: Bulk,
        shards: Option<&[Shard]>,
    ) -> SchedResult<Vec<ShardOutcome>> {
        let mut outcomes = Vec::new();
        for shard in self.selected(shards) {
            let affected = match command {
                Bulk::Launch => shard.launch_all().await?,
                Bulk::Complete => shard.complete_all().await?,
                Bulk::Cancel => shard.cancel_all().await?,
                Bulk::Cleanup => shard.cleanup_all().await?,
            };
            outcomes.push(ShardOutcome {
                shard: shard.shard().clone(),
                affected,
                error: None,
            });
        }
        Ok(outcomes)
    }

    pub async fn launch_all(&self, shards: Option<&[Shard]>) -> SchedResult<Vec<ShardOutcome>> {
        self.bulk(Bulk::Launch, shards).await
    }

    pub async fn complete_all(&self, shards: Option<&[Shard]>) -> SchedResult<Vec<ShardOutcome>> {
        self.bulk(Bulk::Complete, shards).await
    }

    pub async fn cancel_all(&self, shards: Option<&[Shard]>) -> SchedResult<Vec<ShardOutcome>> {
        self.bulk(Bulk::Cancel, shards).await
    }

    pub async fn cleanup_all(&self, shards: Option<&[Shard]>) -> SchedResult<Vec<ShardOutcome>> {
        self.bulk(Bulk::Cleanup, shards).await
    }

    /// Records matching `filter` on every shard, shard by shard.
    pub async fn show(&self, filter: &MigrationFilter) -> SchedResult<Vec<Migration>> {
        let mut all = Vec::new();
        for shard in &self.shards {
            all.extend(shard.show(filter).await?);
        }
        Ok(all)
    }

    pub async fn tick_all(&self) -> SchedResult<Vec<(Shard, TickReport)>> {
        let mut reports = Vec::with_capacity(self.shards.len());
        for shard in &self.shards {
            reports.push((shard.shard().clone(), shard.tick().await?));
        }
        Ok(reports)
    }

    pub async fn is_idle(&self) -> SchedResult<bool> {
        for shard in &self.shards {
            if !shard.is_idle().await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Run every shard's tick loop until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) -> SchedResult<()> {
        let mut handles = Vec::with_capacity(self.shards.len());
        for shard in &self.shards {
            let shard = shard.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move { shard.run(shutdown).await }));
        }
        for handle in handles {
            match handle.await {
                Ok(result) => result?,
                Err(e) => {
                    log::error!("Scheduler task for {} ended abnormally: {}", self.keyspace, e)
                }
            }
        }
        Ok(())
    }

    /// Stop every shard's workers.
    pub async fn stop_workers(&self) {
        for shard in &self.shards {
            shard.stop_workers().await;
        }
    }
}

#[cfg(test)]
#[path = "keyspace_test.rs"]
mod tests;
