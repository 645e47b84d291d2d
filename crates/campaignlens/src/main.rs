#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::Result;
use campaignlens::cli::app::{Cli, Command, RuntimeArgs};
use campaignlens::cli::{
    EXIT_RUNTIME_FAILURE, EXIT_SUCCESS, EXIT_TOOL_REJECTED, EXIT_USAGE_ERROR, commands,
    emit_envelope,
};
use campaignlens::config::{DatabaseConfig, database_url_from_env, resolve_database_config};
use campaignlens::models::EnvelopeCommandFailure;
use campaignlens::store::DatabaseManager;
use campaignlens::tools::{ToolCallFailure, ToolRuntime};
use clap::Parser;
use clap::error::ErrorKind;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    init_tracing();

    let command_name = command_name(&cli.command);
    tracing::info!(command = command_name, "starting");

    match execute(cli) {
        Ok(()) => {
            tracing::info!(command = command_name, exit_code = EXIT_SUCCESS, "completed");
            EXIT_SUCCESS
        }
        Err(error) => {
            let exit_code = report_failure(&error);
            tracing::info!(command = command_name, exit_code, "failed");
            exit_code
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .try_init();
}

fn execute(cli: Cli) -> Result<()> {
    let database = DatabaseManager::new(&resolve_database(&cli.runtime)?);
    match cli.command {
        Command::Tools(args) => commands::tools::run(&args, &ToolRuntime::standard(database)),
        Command::Call(args) => commands::call::run(&args, &ToolRuntime::standard(database)),
        Command::Db(args) => commands::db::run(&args, &database),
    }
}

/// Failed envelopes go to stdout like successful ones; everything else is
/// reported on stderr.
fn report_failure(error: &anyhow::Error) -> i32 {
    if let Some(failure) = error.downcast_ref::<EnvelopeCommandFailure>() {
        if let Err(emit_error) = emit_envelope(failure.envelope()) {
            eprintln!("campaignlens: {emit_error:#}");
        }
        return failure.exit_code();
    }

    eprintln!("campaignlens: {error:#}");
    if error.downcast_ref::<ToolCallFailure>().is_some() {
        EXIT_TOOL_REJECTED
    } else {
        EXIT_RUNTIME_FAILURE
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = error.print();
            EXIT_SUCCESS
        }
        _ => {
            let _ = error.print();
            EXIT_USAGE_ERROR
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Tools(_) => "tools",
        Command::Call(_) => "call",
        Command::Db(args) => args.command.name(),
    }
}

fn resolve_database(args: &RuntimeArgs) -> Result<DatabaseConfig> {
    let home_dir = std::env::var_os("HOME").map(PathBuf::from);
    let cwd = std::env::current_dir()?;
    let env_url = database_url_from_env();

    let config = resolve_database_config(
        args.database_url.as_deref(),
        env_url.as_deref(),
        home_dir.as_deref(),
        &cwd,
    )?;
    tracing::debug!(
        database_url = %config.database_url,
        database_path = %config.database_path.display(),
        "resolved database"
    );
    Ok(config)
}
