pub mod app;
pub mod commands;

use anyhow::{Context, Result};

use crate::models::ResponseEnvelope;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_RUNTIME_FAILURE: i32 = 1;
pub const EXIT_TOOL_REJECTED: i32 = 2;
pub const EXIT_USAGE_ERROR: i32 = 64;

/// Writes one envelope as a single JSON line on stdout.
pub fn emit_envelope(envelope: &ResponseEnvelope) -> Result<()> {
    let encoded =
        serde_json::to_string(envelope).context("failed to encode response envelope")?;
    println!("{encoded}");
    Ok(())
}
