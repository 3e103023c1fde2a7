//! Shunt CLI - submit, inspect and drive online schema migrations

use anyhow::Result;
use clap::Parser;
use shunt_sched::OperatorCommand;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::common::ExitCode;
use commands::control::{self, Bulk};
use commands::{revert, run, show, submit};

/// Install the fmt subscriber on stderr. Library crates log through the
/// `log` facade, which the subscriber picks up.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(verbose)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

async fn dispatch(cli: &Cli) -> Result<()> {
    let global = &cli.global;
    match &cli.command {
        Commands::Submit(args) => submit::execute(args, global).await,
        Commands::Show(args) => show::execute(args, global).await,
        Commands::Launch(args) => control::execute(args, OperatorCommand::Launch, global).await,
        Commands::Complete(args) => control::execute(args, OperatorCommand::Complete, global).await,
        Commands::Cancel(args) => control::execute(args, OperatorCommand::Cancel, global).await,
        Commands::ForceCutOver(args) => {
            control::execute(args, OperatorCommand::ForceCutOver, global).await
        }
        Commands::Postpone(args) => control::execute(args, OperatorCommand::Postpone, global).await,
        Commands::Retry(args) => control::execute(args, OperatorCommand::Retry, global).await,
        Commands::Cleanup(args) => control::execute(args, OperatorCommand::Cleanup, global).await,
        Commands::LaunchAll(args) => control::execute_bulk(args, Bulk::Launch, global).await,
        Commands::CompleteAll(args) => control::execute_bulk(args, Bulk::Complete, global).await,
        Commands::CancelAll(args) => control::execute_bulk(args, Bulk::Cancel, global).await,
        Commands::CleanupAll(args) => control::execute_bulk(args, Bulk::Cleanup, global).await,
        Commands::SetCutoverThreshold(args) => control::execute_threshold(args, global).await,
        Commands::Revert(args) => revert::execute(args, global).await,
        Commands::Run(args) => run::execute(args, global).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    if let Err(err) = dispatch(&cli).await {
        if let Some(code) = err.downcast_ref::<ExitCode>() {
            std::process::exit(code.0);
        }
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
