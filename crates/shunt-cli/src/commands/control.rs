//! Operator command implementations: per-migration commands and their
//! bulk counterparts.

use anyhow::Result;
use shunt_sched::{KeyspaceScheduler, OperatorCommand};

use crate::cli::{GlobalArgs, ShardArgs, TargetArgs, ThresholdArgs};
use crate::commands::common::{
    load_config, open_keyspace, parse_shards, parse_uuid, report_outcomes,
};

/// Bulk operations over every active migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bulk {
    Launch,
    Complete,
    Cancel,
    Cleanup,
}

impl Bulk {
    fn name(&self) -> &'static str {
        match self {
            Bulk::Launch => "launch-all",
            Bulk::Complete => "complete-all",
            Bulk::Cancel => "cancel-all",
            Bulk::Cleanup => "cleanup-all",
        }
    }
}

async fn apply(
    keyspace: &KeyspaceScheduler,
    uuid: &str,
    shards: &ShardArgs,
    command: OperatorCommand,
) -> Result<()> {
    let uuid = parse_uuid(uuid)?;
    let shards = parse_shards(shards)?;
    let outcomes = keyspace
        .command(&uuid, command, shards.as_deref())
        .await?;
    report_outcomes(command.name(), &outcomes)
}

/// Execute a single-migration operator command
pub async fn execute(
    args: &TargetArgs,
    command: OperatorCommand,
    global: &GlobalArgs,
) -> Result<()> {
    let config = load_config(global)?;
    let keyspace = open_keyspace(&config)?;
    apply(&keyspace, &args.uuid, &args.shards, command).await
}

/// Execute the set-cutover-threshold command
pub async fn execute_threshold(args: &ThresholdArgs, global: &GlobalArgs) -> Result<()> {
    let config = load_config(global)?;
    let keyspace = open_keyspace(&config)?;
    let command = OperatorCommand::SetCutOverThreshold(args.threshold);
    apply(&keyspace, &args.uuid, &args.shards, command).await
}

/// Execute a bulk command
pub async fn execute_bulk(args: &ShardArgs, bulk: Bulk, global: &GlobalArgs) -> Result<()> {
    let config = load_config(global)?;
    let keyspace = open_keyspace(&config)?;
    let shards = parse_shards(args)?;
    let filter = shards.as_deref();
    let outcomes = match bulk {
        Bulk::Launch => keyspace.launch_all(filter).await?,
        Bulk::Complete => keyspace.complete_all(filter).await?,
        Bulk::Cancel => keyspace.cancel_all(filter).await?,
        Bulk::Cleanup => keyspace.cleanup_all(filter).await?,
    };
    report_outcomes(bulk.name(), &outcomes)
}
