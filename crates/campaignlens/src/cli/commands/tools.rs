use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::cli::emit_envelope;
use crate::models::ResponseEnvelope;
use crate::tools::ToolHost;

#[derive(Debug, Clone, Args)]
pub struct ToolsArgs {
    /// Include generated input and output schemas.
    #[arg(long, default_value_t = false)]
    pub verbose: bool,
}

pub fn run(args: &ToolsArgs, host: &impl ToolHost) -> Result<()> {
    let envelope = tools_envelope(args, host);
    emit_envelope(&envelope)
}

#[must_use]
pub fn tools_envelope(args: &ToolsArgs, host: &impl ToolHost) -> ResponseEnvelope {
    let manifest = host.manifest(args.verbose);
    ResponseEnvelope::ok("tools", json!({ "tools": manifest }))
        .with_meta("tool_count", json!(manifest.len()))
        .with_meta("verbose", json!(args.verbose))
}
