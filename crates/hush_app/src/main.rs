mod cli;

use std::process::ExitCode;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use hush_core::{DEFAULT_FILTER, ErrorCategory, init_logging};
use hush_ledger::{ConfigSource, HederaLedger, OperationKind, Outcome, RunError, execute};
use tracing::{Level, error, info, warn};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut source = ConfigSource::from_env();
    cli.global.apply(&mut source);

    let _guard = match init_logging(source.log_dir().as_deref(), DEFAULT_FILTER) {
        Ok(guard) => guard,
        Err(e) => {
            let category = ErrorCategory::Config;
            eprintln!("{}: {e:#}", category.label());
            return ExitCode::from(category.exit_status().code());
        }
    };

    let Some(request) = cli.command.into_request() else {
        return print_burn_usage();
    };
    let operation = request.kind();
    info!(%operation, "starting");

    let result = execute(request, &source, |config| {
        if config.network.is_production() && operation.mutates() {
            warn!(network = %config.network, "submitting to mainnet; fees are real");
        }
        HederaLedger::connect(config.network, &config.operator)
    })
    .await;

    match result {
        Ok(outcome) => match print_outcome(&outcome, cli.global.json) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{}: {e:#}", ErrorCategory::Internal.label());
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            report_failure(operation, &err);
            ExitCode::from(err.exit_status().code())
        }
    }
}

/// Logs a failed run. The stderr layer prints the event, so the plain
/// diagnostic is only written when the filter drops errors.
fn report_failure(operation: OperationKind, err: &RunError) {
    let category = err.category();
    error!(
        %operation,
        category = category.label(),
        transaction_id = err.transaction_id(),
        "{err}"
    );
    if !tracing::enabled!(Level::ERROR) {
        eprintln!("{}: {err}", category.label());
    }
}

fn print_outcome(outcome: &Outcome, json: bool) -> anyhow::Result<()> {
    if json {
        let text =
            serde_json::to_string_pretty(outcome).context("Failed to serialize outcome")?;
        println!("{text}");
    } else {
        println!("{outcome}");
    }
    Ok(())
}

/// `burn-nft` with no argument prints its usage and succeeds.
fn print_burn_usage() -> ExitCode {
    let mut command = Cli::command();
    let tag = OperationKind::BurnNft.tag();
    match command.find_subcommand_mut(tag) {
        Some(sub) => {
            let _ = sub.print_help();
        }
        None => {
            let _ = command.print_help();
        }
    }
    ExitCode::SUCCESS
}
