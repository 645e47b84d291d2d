#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod models;
pub mod store;
pub mod tools;
pub mod utils;

pub use cli::app::{Cli, Command};
pub use tools::{ToolHost, ToolRegistry, ToolRuntime};
