//! Show command implementation

use anyhow::{Context, Result};
use shunt_core::{Migration, MigrationStatus};
use shunt_meta::MigrationFilter;

use crate::cli::{GlobalArgs, ShowArgs, ShowOutput};
use crate::commands::common::{load_config, open_keyspace, split_list};

/// Build the store filter from the pattern and status arguments.
pub(crate) fn build_filter(args: &ShowArgs) -> Result<MigrationFilter> {
    let filter = match &args.pattern {
        Some(pattern) => MigrationFilter::pattern(pattern),
        None => MigrationFilter::all(),
    };
    let Some(raw) = &args.status else {
        return Ok(filter);
    };
    let statuses = split_list(raw)
        .map(|s| {
            s.parse::<MigrationStatus>()
                .with_context(|| format!("Unknown status '{}'", s))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(filter.with_statuses(&statuses))
}

/// Execute the show command
pub async fn execute(args: &ShowArgs, global: &GlobalArgs) -> Result<()> {
    let config = load_config(global)?;
    let filter = build_filter(args)?;
    let keyspace = open_keyspace(&config)?;
    let migrations = keyspace.show(&filter).await?;

    match args.output {
        ShowOutput::Table => print_table(&migrations),
        ShowOutput::Json => print_json(&migrations)?,
    }
    Ok(())
}

/// One-line summary of what a record is doing right now.
pub(crate) fn state_note(m: &Migration) -> String {
    match m.status {
        MigrationStatus::Queued if m.options.postpone_launch => "awaiting launch".to_string(),
        MigrationStatus::Running if m.ready_to_complete && m.options.postpone_completion => {
            "awaiting complete".to_string()
        }
        MigrationStatus::Running if m.ready_to_complete => "cutting over".to_string(),
        MigrationStatus::Running => format!("{:.0}%", m.progress),
        _ if m.cleanup_at.is_some() => "cleaned up".to_string(),
        _ => "-".to_string(),
    }
}

/// Print migrations in table format
fn print_table(migrations: &[Migration]) {
    if migrations.is_empty() {
        println!("No migrations found.");
        return;
    }

    // Calculate column widths
    let uuid_width = 36;
    let shard_width = migrations
        .iter()
        .map(|m| m.shard.len())
        .max()
        .unwrap_or(5)
        .max(5);
    let table_width = migrations
        .iter()
        .map(|m| m.table.len())
        .max()
        .unwrap_or(5)
        .max(5);
    let strategy_width = migrations
        .iter()
        .map(|m| m.strategy_string().len())
        .max()
        .unwrap_or(8)
        .max(8);
    let status_width = 9;
    let state_width = 17;

    // Print header
    println!(
        "{:<uuid_width$}  {:<shard_width$}  {:<table_width$}  {:<strategy_width$}  {:<status_width$}  {:<state_width$}  {:>7}  MESSAGE",
        "UUID", "SHARD", "TABLE", "STRATEGY", "STATUS", "STATE", "RETRIES",
    );
    println!(
        "{:-<uuid_width$}  {:-<shard_width$}  {:-<table_width$}  {:-<strategy_width$}  {:-<status_width$}  {:-<state_width$}  {:->7}  {}",
        "", "", "", "", "", "", "", "-".repeat(20),
    );

    for m in migrations {
        let message = if m.message.is_empty() { "-" } else { m.message.as_str() };
        println!(
            "{:<uuid_width$}  {:<shard_width$}  {:<table_width$}  {:<strategy_width$}  {:<status_width$}  {:<state_width$}  {:>7}  {}",
            m.uuid.as_str(),
            m.shard.as_str(),
            m.table.as_str(),
            m.strategy_string(),
            m.status.as_str(),
            state_note(m),
            m.retries,
            message,
        );
    }

    println!();
    let active = migrations.iter().filter(|m| m.status.is_active()).count();
    println!("{} migrations, {} active", migrations.len(), active);
}

/// Print migrations in JSON format
fn print_json(migrations: &[Migration]) -> Result<()> {
    let json = serde_json::to_string_pretty(migrations).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
#[path = "show_test.rs"]
mod tests;
