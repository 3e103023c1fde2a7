//! Submit command implementation

use anyhow::{Context, Result};
use shunt_core::MigrationContext;
use shunt_sched::{SchedError, SubmitRequest};

use crate::cli::{GlobalArgs, SubmitArgs};
use crate::commands::common::{load_config, open_keyspace, parse_uuid, split_list, ExitCode};

/// Build the scheduler request from command-line arguments.
pub(crate) fn build_request(args: &SubmitArgs) -> Result<SubmitRequest> {
    let mut request = SubmitRequest::new(args.sql.as_str(), args.strategy.as_str());
    if let Some(context) = &args.context {
        let context = MigrationContext::parse(context.as_str())
            .with_context(|| format!("Invalid migration context '{}'", context))?;
        request = request.with_context(context);
    }
    if let Some(raw) = &args.uuid {
        let uuids = split_list(raw).map(parse_uuid).collect::<Result<Vec<_>>>()?;
        request = request.with_uuids(uuids);
    }
    Ok(request)
}

/// Execute the submit command
pub async fn execute(args: &SubmitArgs, global: &GlobalArgs) -> Result<()> {
    let config = load_config(global)?;
    let request = build_request(args)?;
    let keyspace = open_keyspace(&config)?;

    let uuids = match keyspace.submit(&request).await {
        Ok(uuids) => uuids,
        Err(SchedError::PartlyRejected { recorded, rejected }) => {
            for uuid in &recorded {
                println!("{}", uuid);
            }
            for reason in &rejected {
                eprintln!("Rejected {}", reason);
            }
            return Err(ExitCode(1).into());
        }
        Err(e) => return Err(anyhow::Error::new(e).context("Submission rejected")),
    };
    if global.verbose {
        eprintln!(
            "Submitted {} migration(s) to {} shard(s) of {}",
            uuids.len(),
            keyspace.shards().len(),
            keyspace.keyspace()
        );
    }
    for uuid in uuids {
        println!("{}", uuid);
    }
    Ok(())
}

#[cfg(test)]
#[path = "submit_test.rs"]
mod tests;
