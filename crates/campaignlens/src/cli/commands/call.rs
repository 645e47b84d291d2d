use std::path::{Path, PathBuf};

use anyhow::{Context, Error, Result};
use clap::Args;
use serde_json::{Map, Value, json};

use crate::cli::{EXIT_RUNTIME_FAILURE, EXIT_TOOL_REJECTED, emit_envelope};
use crate::models::{
    AgentConversation, EnvelopeCommandFailure, PERFORMANCE_DASHBOARD_AGENT, ResponseEnvelope,
};
use crate::store::record_conversation;
use crate::tools::{ToolCallFailure, ToolHost, ToolRuntime};
use crate::utils::time::{format_utc, now_utc};

const COMMAND: &str = "call";

#[derive(Debug, Clone, Args)]
pub struct CallArgs {
    #[arg(value_name = "TOOL")]
    pub tool: String,

    /// Keyword arguments as a JSON object.
    #[arg(long = "args", value_name = "JSON")]
    pub arguments: Option<String>,

    /// Also write the raw tool payload to this file.
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Record the exchange as an agent conversation with this query text.
    #[arg(long, value_name = "TEXT")]
    pub user_query: Option<String>,

    #[arg(long, value_name = "ID", requires = "user_query")]
    pub session_id: Option<String>,
}

pub fn run(args: &CallArgs, runtime: &ToolRuntime) -> Result<()> {
    let envelope = call_envelope(args, runtime)?;
    emit_envelope(&envelope)
}

/// Invokes the tool and wraps its payload; failures come back as
/// [`EnvelopeCommandFailure`] carrying the exit code.
pub fn call_envelope(args: &CallArgs, runtime: &ToolRuntime) -> Result<ResponseEnvelope> {
    let arguments = parse_cli_arguments(&args.tool, args.arguments.as_deref())?;

    let payload = runtime
        .call_tool(&args.tool, arguments.clone())
        .map_err(|error| classify_tool_error(&args.tool, error))?;
    let data: Value = serde_json::from_str(&payload)
        .with_context(|| format!("tool `{}` returned invalid JSON", args.tool))?;

    let mut envelope = ResponseEnvelope::ok(COMMAND, data.clone())
        .with_meta("tool", json!(args.tool))
        .with_meta("payload_bytes", json!(payload.len()));

    if let Some(message) = payload_message(&data) {
        envelope = envelope.with_warning("no_data", message);
    }

    if let Some(out) = &args.out {
        write_payload(out, &payload)?;
        envelope = envelope.with_meta("out", json!(out.display().to_string()));
    }

    if let Some(user_query) = &args.user_query {
        let conversation = conversation_record(args, user_query, &arguments, data)?;
        record_conversation(runtime.database(), &conversation)?;
        envelope = envelope.with_meta("conversation_id", json!(conversation.conversation_id));
    }

    Ok(envelope)
}

fn parse_cli_arguments(tool: &str, raw: Option<&str>) -> Result<Value> {
    let Some(raw) = raw else {
        return Ok(Value::Object(Map::new()));
    };

    let rejected = |cause: String| {
        let failure = ToolCallFailure::InvalidArguments {
            tool: tool.to_string(),
            cause,
        };
        Error::new(EnvelopeCommandFailure::new(
            ResponseEnvelope::error(COMMAND, failure.code(), failure.to_string())
                .with_meta("tool", json!(tool)),
            EXIT_TOOL_REJECTED,
        ))
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(rejected("arguments must be a JSON object".to_string())),
        Err(error) => Err(rejected(error.to_string())),
    }
}

fn classify_tool_error(tool: &str, error: Error) -> Error {
    if let Some(failure) = error.downcast_ref::<ToolCallFailure>() {
        let details = match failure {
            ToolCallFailure::UnknownTool { available, .. } => json!({ "available": available }),
            ToolCallFailure::InvalidArguments { cause, .. } => json!({ "cause": cause }),
        };
        return Error::new(EnvelopeCommandFailure::new(
            ResponseEnvelope::error(COMMAND, failure.code(), failure.to_string())
                .with_meta("tool", json!(tool))
                .with_error_details(details),
            EXIT_TOOL_REJECTED,
        ));
    }

    Error::new(EnvelopeCommandFailure::new(
        ResponseEnvelope::error(COMMAND, "tool_execution_failed", "tool execution failed")
            .with_meta("tool", json!(tool))
            .with_error_details(json!({ "cause": format!("{error:#}") })),
        EXIT_RUNTIME_FAILURE,
    ))
}

/// Empty-result notice a tool attached to its payload, at the top level or in
/// a portfolio block.
fn payload_message(data: &Value) -> Option<&str> {
    let object = data.as_object()?;
    if let Some(message) = object.get("message").and_then(Value::as_str) {
        return Some(message);
    }
    object
        .values()
        .filter_map(Value::as_object)
        .find_map(|block| block.get("message").and_then(Value::as_str))
}

fn write_payload(path: &Path, payload: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory: {}", parent.display()))?;
    }
    std::fs::write(path, payload)
        .with_context(|| format!("failed to write tool payload: {}", path.display()))
}

fn conversation_record(
    args: &CallArgs,
    user_query: &str,
    arguments: &Value,
    response: Value,
) -> Result<AgentConversation> {
    let now = now_utc();
    let agent_response = match response {
        Value::Object(object) => object.into_iter().collect(),
        other => [("payload".to_string(), other)].into_iter().collect(),
    };
    let context = [
        ("tool".to_string(), json!(args.tool)),
        ("arguments".to_string(), arguments.clone()),
    ]
    .into_iter()
    .collect();

    Ok(AgentConversation {
        conversation_id: format!("conv-{:x}", now.unix_timestamp_nanos()),
        session_id: args.session_id.clone(),
        agent_type: PERFORMANCE_DASHBOARD_AGENT.to_string(),
        user_query: user_query.to_string(),
        agent_response,
        context,
        created_at: format_utc(now)?,
    })
}
