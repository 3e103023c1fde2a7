//! Revert command implementation

use anyhow::{Context, Result};
use shunt_core::MigrationContext;
use shunt_sched::RevertRequest;

use crate::cli::{GlobalArgs, RevertArgs};
use crate::commands::common::{load_config, open_keyspace, parse_uuid};

/// Execute the revert command
pub async fn execute(args: &RevertArgs, global: &GlobalArgs) -> Result<()> {
    let config = load_config(global)?;
    let mut request = RevertRequest::new(parse_uuid(&args.uuid)?);
    request.strategy = args.strategy.clone();
    if let Some(uuid) = &args.revert_uuid {
        request.uuid = Some(parse_uuid(uuid)?);
    }
    if let Some(context) = &args.context {
        request.context = Some(
            MigrationContext::parse(context.as_str())
                .with_context(|| format!("Invalid migration context '{}'", context))?,
        );
    }

    let keyspace = open_keyspace(&config)?;
    let uuid = keyspace
        .revert(&request)
        .await
        .with_context(|| format!("Cannot revert {}", args.uuid))?;
    println!("{}", uuid);
    Ok(())
}
