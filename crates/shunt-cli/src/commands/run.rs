//! Run command implementation: the scheduler tick loop.

use anyhow::Result;
use shunt_core::MigrationStatus;
use shunt_meta::MigrationFilter;
use shunt_sched::KeyspaceScheduler;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cli::{GlobalArgs, RunArgs};
use crate::commands::common::{load_config, open_keyspace};

/// Execute the run command
pub async fn execute(args: &RunArgs, global: &GlobalArgs) -> Result<()> {
    let config = load_config(global)?;
    let keyspace = open_keyspace(&config)?;

    if args.until_idle {
        let ticks = run_until_idle(&keyspace, config.scheduler.tick_interval).await?;
        log::info!("Keyspace {} idle after {} tick(s)", keyspace.keyspace(), ticks);
    } else {
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::warn!("Cannot listen for Ctrl-C: {}", e);
                return;
            }
            log::info!("Interrupted, stopping schedulers");
            signal.cancel();
        });
        keyspace.run(shutdown).await?;
    }

    print_summary(&keyspace).await
}

/// Tick every shard until nothing can progress without an operator, or
/// until Ctrl-C. Returns the number of ticks.
pub(crate) async fn run_until_idle(
    keyspace: &KeyspaceScheduler,
    every: Duration,
) -> Result<usize> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interval = tokio::time::interval(every);
    let mut ticks = 0;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                log::info!("Interrupted after {} tick(s)", ticks);
                break;
            }
            _ = interval.tick() => {
                for (shard, report) in keyspace.tick_all().await? {
                    if !report.is_empty() {
                        log::debug!("Shard {}: {:?}", shard, report);
                    }
                }
                ticks += 1;
                if keyspace.is_idle().await? {
                    break;
                }
            }
        }
    }
    keyspace.stop_workers().await;
    Ok(ticks)
}

/// Print how many migrations are in each status.
async fn print_summary(keyspace: &KeyspaceScheduler) -> Result<()> {
    let migrations = keyspace.show(&MigrationFilter::all()).await?;
    let counts: Vec<String> = MigrationStatus::ALL
        .iter()
        .filter_map(|status| {
            let n = migrations.iter().filter(|m| m.status == *status).count();
            (n > 0).then(|| format!("{} {}", n, status))
        })
        .collect();
    if counts.is_empty() {
        println!("No migrations.");
    } else {
        println!("{}", counts.join(", "));
    }
    Ok(())
}

#[cfg(test)]
#[path = "run_test.rs"]
mod tests;
