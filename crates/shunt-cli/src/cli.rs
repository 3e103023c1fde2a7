//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::time::Duration;

/// Shunt - online schema migrations with scheduling, cut-over control and revert
#[derive(Parser, Debug)]
#[command(name = "shunt")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (default: shunt.yml, optional)
    #[arg(short, long, global = true, env = "SHUNT_CONFIG")]
    pub config: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit one statement or a semicolon-separated batch
    Submit(SubmitArgs),

    /// Show migrations matching a uuid or context pattern
    Show(ShowArgs),

    /// Launch a migration submitted with --postpone-launch
    Launch(TargetArgs),

    /// Allow a --postpone-completion migration to cut over
    Complete(TargetArgs),

    /// Cancel a pending or running migration
    Cancel(TargetArgs),

    /// Cut over now, terminating sessions that hold the table
    ForceCutOver(TargetArgs),

    /// Hold a migration before cut-over until `complete`
    Postpone(TargetArgs),

    /// Requeue a failed or cancelled migration
    Retry(TargetArgs),

    /// Drop the artifacts of a finished migration on the next tick
    Cleanup(TargetArgs),

    /// Launch every postponed migration
    LaunchAll(ShardArgs),

    /// Complete every postponed migration
    CompleteAll(ShardArgs),

    /// Cancel every pending or running migration
    CancelAll(ShardArgs),

    /// Drop the artifacts of every finished migration
    CleanupAll(ShardArgs),

    /// Change how long a cut-over may wait on locks
    SetCutoverThreshold(ThresholdArgs),

    /// Submit the inverse of a completed migration
    Revert(RevertArgs),

    /// Run the scheduler tick loop
    Run(RunArgs),
}

/// Arguments for the submit command
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// DDL statement(s)
    pub sql: String,

    /// Strategy and flags, e.g. "online --postpone-completion"
    #[arg(short, long, default_value = "online")]
    pub strategy: String,

    /// Migration context shared by the batch (generated when absent)
    #[arg(long)]
    pub context: Option<String>,

    /// Explicit uuids, one per statement (comma-separated)
    #[arg(short, long)]
    pub uuid: Option<String>,
}

/// Arguments for the show command
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Uuid or context; `%` and `*` are wildcards (default: all)
    pub pattern: Option<String>,

    /// Only these statuses (comma-separated)
    #[arg(long)]
    pub status: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: ShowOutput,
}

/// Show output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowOutput {
    /// Table format
    Table,
    /// JSON output
    Json,
}

/// A migration uuid and the shards to apply a command on
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Migration uuid
    pub uuid: String,

    #[command(flatten)]
    pub shards: ShardArgs,
}

/// Shard selection
#[derive(Args, Debug, Default)]
pub struct ShardArgs {
    /// Shards to apply to (comma-separated, default: all)
    #[arg(long, allow_hyphen_values = true)]
    pub shards: Option<String>,
}

/// Arguments for the set-cutover-threshold command
#[derive(Args, Debug)]
pub struct ThresholdArgs {
    /// Migration uuid
    pub uuid: String,

    /// New threshold, e.g. 15s
    #[arg(value_parser = humantime::parse_duration)]
    pub threshold: Duration,

    #[command(flatten)]
    pub shards: ShardArgs,
}

/// Arguments for the revert command
#[derive(Args, Debug)]
pub struct RevertArgs {
    /// Uuid of the completed migration to revert
    pub uuid: String,

    /// Strategy and flags for the revert migration
    #[arg(short, long, default_value = "online")]
    pub strategy: String,

    /// Migration context for the revert (generated when absent)
    #[arg(long)]
    pub context: Option<String>,

    /// Uuid for the revert migration (generated when absent)
    #[arg(long)]
    pub revert_uuid: Option<String>,
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Exit once every migration is finished or waits for an operator
    #[arg(long)]
    pub until_idle: bool,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
