//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use shunt_core::{Config, Keyspace, MigrationUuid, Shard, TargetDialect};
use shunt_db::{DuckDbEngine, ExecutionEngine, MemoryEngine};
use shunt_meta::DuckDbStore;
use shunt_sched::{KeyspaceScheduler, ShardOutcome, ShardScheduler};
use shunt_sql::StatementAnalyzer;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::{GlobalArgs, ShardArgs};

/// Default config file, looked up in the working directory.
const DEFAULT_CONFIG: &str = "shunt.yml";

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and cleanup happens properly.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Control flow only; the command already reported what went wrong.
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Load the configuration named by `--config`, or `shunt.yml` when present.
pub(crate) fn load_config(global: &GlobalArgs) -> Result<Config> {
    match &global.config {
        Some(path) => Config::load(Path::new(path))
            .with_context(|| format!("Failed to load config from {}", path)),
        None => Config::load_or_default(Path::new(DEFAULT_CONFIG))
            .context("Failed to load shunt.yml"),
    }
}

/// DuckDB target file for one shard. A single-shard keyspace uses the
/// configured path as is; otherwise each shard gets `<stem>-<shard>.<ext>`.
pub(crate) fn target_path(config: &Config, base: &Path, shard: &str) -> PathBuf {
    if config.shards.len() == 1 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "target".to_string());
    let name = match base.extension() {
        Some(ext) => format!("{}-{}.{}", stem, shard, ext.to_string_lossy()),
        None => format!("{}-{}", stem, shard),
    };
    base.with_file_name(name)
}

fn build_engine(
    config: &Config,
    shard: &str,
) -> Result<(Arc<dyn ExecutionEngine>, StatementAnalyzer)> {
    match config.target.dialect {
        TargetDialect::Duckdb => {
            let engine = match &config.target.path {
                Some(base) => {
                    let path = target_path(config, base, shard);
                    DuckDbEngine::from_path(&path).with_context(|| {
                        format!("Failed to open target database {}", path.display())
                    })?
                }
                None => DuckDbEngine::in_memory().context("Failed to open in-memory target")?,
            };
            Ok((Arc::new(engine), StatementAnalyzer::duckdb()))
        }
        TargetDialect::Mysql => {
            log::debug!("Shard {} runs against the in-memory catalog", shard);
            Ok((Arc::new(MemoryEngine::new()), StatementAnalyzer::mysql()))
        }
    }
}

/// Build one scheduler per configured shard, each over its own store.
pub(crate) fn open_keyspace(config: &Config) -> Result<KeyspaceScheduler> {
    let keyspace = Keyspace::parse(&config.keyspace)?;
    let shared = Arc::new(config.clone());

    let mut shards = Vec::with_capacity(config.shards.len());
    for name in &config.shards {
        let shard = Shard::parse(name)?;
        let store_path = config.store_path(name);
        let store = DuckDbStore::open(&store_path).with_context(|| {
            format!("Failed to open migration store {}", store_path.display())
        })?;
        let (engine, analyzer) = build_engine(config, name)?;
        shards.push(Arc::new(ShardScheduler::new(
            keyspace.clone(),
            shard,
            Arc::new(store),
            engine,
            Arc::new(analyzer),
            shared.clone(),
        )));
    }
    Ok(KeyspaceScheduler::new(keyspace, shards))
}

/// Parse a comma-separated shard list; `None` selects every shard.
pub(crate) fn parse_shards(args: &ShardArgs) -> Result<Option<Vec<Shard>>> {
    let Some(raw) = &args.shards else {
        return Ok(None);
    };
    let shards = split_list(raw)
        .map(Shard::parse)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(shards))
}

pub(crate) fn parse_uuid(raw: &str) -> Result<MigrationUuid> {
    MigrationUuid::parse(raw).with_context(|| format!("Invalid migration uuid '{}'", raw))
}

/// Split a comma-separated argument, dropping blanks.
pub(crate) fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Print per-shard results. Fails when every shard reported an error.
pub(crate) fn report_outcomes(command: &str, outcomes: &[ShardOutcome]) -> Result<()> {
    let mut total = 0;
    for outcome in outcomes {
        println!("  {}", outcome);
        total += outcome.affected;
    }
    println!("{}: {} migration(s) affected", command, total);
    if !outcomes.is_empty() && outcomes.iter().all(|o| o.error.is_some()) {
        return Err(ExitCode(1).into());
    }
    Ok(())
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
