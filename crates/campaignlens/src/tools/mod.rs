//! Read-only campaign analytics tools and the registry that exposes them to an
//! orchestration layer.
//!
//! Each tool is a plain function over a [`DatabaseManager`] with a typed
//! request and response. The registry maps tool names to handlers that accept
//! JSON keyword arguments and return the response as a JSON string, along with
//! generated input and output schemas.

pub mod aggregate;
pub mod compare;
pub mod derive;
pub mod metric;
pub mod query_metrics;
pub mod roi;
pub mod time_series;
pub mod window;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use anyhow::{Error, Result, bail};
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::store::DatabaseManager;

pub type ToolHandler = fn(&DatabaseManager, Value) -> Result<String>;

#[derive(Debug, Clone, Copy)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub input_schema: fn() -> Value,
    pub output_schema: fn() -> Value,
    pub handler: ToolHandler,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolManifest {
    pub name: String,
    pub title: String,
    pub description: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

impl ToolDefinition {
    #[must_use]
    pub fn manifest(&self, include_schemas: bool) -> ToolManifest {
        ToolManifest {
            name: self.name.to_string(),
            title: self.title.to_string(),
            description: self.description.to_string(),
            input_schema: include_schemas.then(|| (self.input_schema)()),
            output_schema: include_schemas.then(|| (self.output_schema)()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCallFailure {
    UnknownTool { name: String, available: Vec<String> },
    InvalidArguments { tool: String, cause: String },
}

impl ToolCallFailure {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownTool { .. } => "tool_unknown",
            Self::InvalidArguments { .. } => "tool_arguments_invalid",
        }
    }
}

impl Display for ToolCallFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTool { name, available } => write!(
                f,
                "unknown tool `{name}` (available: {})",
                available.join(", ")
            ),
            Self::InvalidArguments { tool, cause } => {
                write!(f, "invalid arguments for `{tool}`: {cause}")
            }
        }
    }
}

impl std::error::Error for ToolCallFailure {}

#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, ToolDefinition>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the five campaign analytics tools.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for definition in [
            query_metrics::definition(),
            aggregate::definition(),
            roi::definition(),
            compare::definition(),
            time_series::definition(),
        ] {
            registry.tools.insert(definition.name, definition);
        }
        registry
    }

    pub fn register(&mut self, definition: ToolDefinition) -> Result<()> {
        if self.tools.contains_key(definition.name) {
            bail!("tool `{}` is already registered", definition.name);
        }
        self.tools.insert(definition.name, definition);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.values()
    }

    pub fn invoke(&self, database: &DatabaseManager, name: &str, arguments: Value) -> Result<String> {
        let Some(definition) = self.get(name) else {
            return Err(Error::new(ToolCallFailure::UnknownTool {
                name: name.to_string(),
                available: self.names().iter().map(|tool| (*tool).to_string()).collect(),
            }));
        };

        tracing::debug!(tool = definition.name, "invoking tool");
        (definition.handler)(database, arguments)
    }
}

/// Narrow capability surface an orchestration layer drives.
pub trait ToolHost {
    fn manifest(&self, include_schemas: bool) -> Vec<ToolManifest>;

    fn call_tool(&self, name: &str, arguments: Value) -> Result<String>;
}

/// Binds a registry to the store it queries.
#[derive(Debug, Clone)]
pub struct ToolRuntime {
    registry: ToolRegistry,
    database: DatabaseManager,
}

impl ToolRuntime {
    #[must_use]
    pub fn new(registry: ToolRegistry, database: DatabaseManager) -> Self {
        Self { registry, database }
    }

    #[must_use]
    pub fn standard(database: DatabaseManager) -> Self {
        Self::new(ToolRegistry::standard(), database)
    }

    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    #[must_use]
    pub fn database(&self) -> &DatabaseManager {
        &self.database
    }
}

impl ToolHost for ToolRuntime {
    fn manifest(&self, include_schemas: bool) -> Vec<ToolManifest> {
        self.registry
            .definitions()
            .map(|definition| definition.manifest(include_schemas))
            .collect()
    }

    fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        self.registry.invoke(&self.database, name, arguments)
    }
}

/// Decodes keyword arguments; `null` is treated as an empty argument object.
pub(crate) fn parse_arguments<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T> {
    let arguments = match arguments {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|error| {
        Error::new(ToolCallFailure::InvalidArguments {
            tool: tool.to_string(),
            cause: error.to_string(),
        })
    })
}

pub(crate) fn invalid_arguments(tool: &str, cause: impl Into<String>) -> Error {
    Error::new(ToolCallFailure::InvalidArguments {
        tool: tool.to_string(),
        cause: cause.into(),
    })
}

pub(crate) fn encode_payload<T: Serialize>(payload: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(payload)?)
}

pub(crate) fn schema_value<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    match serde_json::to_value(schema) {
        Ok(value) => value,
        Err(error) => {
            panic!("failed to serialize generated tool schema: {error}");
        }
    }
}
