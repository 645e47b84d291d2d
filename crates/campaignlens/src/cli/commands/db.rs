use std::path::PathBuf;

use anyhow::{Error, Result};
use clap::{Args, Subcommand};
use serde_json::json;

use crate::cli::{EXIT_RUNTIME_FAILURE, emit_envelope};
use crate::models::{EnvelopeCommandFailure, ResponseEnvelope, dataset_json_schema};
use crate::store::{DatabaseManager, STORE_SCHEMA_VERSION, load_dataset_file};

#[derive(Debug, Clone, Args)]
pub struct DbArgs {
    #[command(subcommand)]
    pub command: DbCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum DbCommand {
    /// Create tables if they do not exist.
    Init,
    /// Probe the store with `SELECT 1`.
    Check,
    /// Load a JSON dataset fixture in one transaction.
    Load(DbLoadArgs),
    /// Print the JSON schema of dataset fixtures.
    Schema,
}

#[derive(Debug, Clone, Args)]
pub struct DbLoadArgs {
    #[arg(value_name = "FIXTURE")]
    pub fixture: PathBuf,
}

impl DbCommand {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Init => "db.init",
            Self::Check => "db.check",
            Self::Load(_) => "db.load",
            Self::Schema => "db.schema",
        }
    }
}

pub fn run(args: &DbArgs, database: &DatabaseManager) -> Result<()> {
    let envelope = db_envelope(args, database)?;
    emit_envelope(&envelope)
}

pub fn db_envelope(args: &DbArgs, database: &DatabaseManager) -> Result<ResponseEnvelope> {
    let command = args.command.name();
    let database_path = database.database_path().display().to_string();

    match &args.command {
        DbCommand::Init => {
            database
                .create_tables()
                .map_err(|error| store_failure(command, "database_init_failed", &error))?;
            Ok(ResponseEnvelope::ok(
                command,
                json!({
                    "database_path": database_path,
                    "schema_version": STORE_SCHEMA_VERSION,
                }),
            ))
        }
        DbCommand::Check => {
            if !database.test_connection() {
                return Err(Error::new(EnvelopeCommandFailure::new(
                    ResponseEnvelope::error(command, "database_unreachable", "database connection failed")
                        .with_error_details(json!({ "database_path": database_path })),
                    EXIT_RUNTIME_FAILURE,
                )));
            }
            Ok(ResponseEnvelope::ok(
                command,
                json!({ "database_path": database_path, "connected": true }),
            ))
        }
        DbCommand::Load(load_args) => {
            let stats = load_dataset_file(database, &load_args.fixture)
                .map_err(|error| store_failure(command, "dataset_load_failed", &error))?;
            Ok(ResponseEnvelope::ok(
                command,
                json!({
                    "database_path": database_path,
                    "fixture": load_args.fixture.display().to_string(),
                    "rows": stats,
                }),
            )
            .with_meta("total_rows", json!(stats.total_rows())))
        }
        DbCommand::Schema => Ok(ResponseEnvelope::ok(command, dataset_json_schema())),
    }
}

fn store_failure(command: &str, code: &str, error: &Error) -> Error {
    Error::new(EnvelopeCommandFailure::new(
        ResponseEnvelope::error(command, code, "database operation failed")
            .with_error_details(json!({ "cause": format!("{error:#}") })),
        EXIT_RUNTIME_FAILURE,
    ))
}
