use clap::{Args, Parser, Subcommand};

use super::commands::{call::CallArgs, db::DbArgs, tools::ToolsArgs};

#[derive(Debug, Parser)]
#[command(
    name = "campaignlens",
    version,
    about = "Campaign performance analytics tools over a relational store"
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    /// Store location; overrides `DATABASE_URL`.
    #[arg(long, global = true, value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List registered tools.
    Tools(ToolsArgs),
    /// Invoke one tool with JSON keyword arguments.
    Call(CallArgs),
    /// Manage the campaign store.
    Db(DbArgs),
}
