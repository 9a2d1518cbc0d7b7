//! Tools: the functions a specialist may ask the model runtime to call.
//!
//! The image analyst reaches the vision model through
//! [`VisionDamageTool`](crate::claim::VisionDamageTool); the repair shop
//! finder reaches the web through [`WebSearchTool`](crate::claim::WebSearchTool).
//! Implement [`Tool`] with typed arguments; the runner sees every tool as a
//! [`DynTool`] speaking JSON.

use std::sync::Arc;

use async_trait::async_trait;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ToolError;

/// `Result` of a tool call.
pub type ToolResult<T> = Result<T, ToolError>;

/// A callable function as the model sees it.
///
/// Serializes to the Chat Completions shape
/// `{"type": "function", "function": {name, description, parameters, strict}}`.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct ToolDefinition {
    /// snake_case tool name.
    pub name: String,
    /// When to call it.
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
    /// Strict argument validation.
    #[serde(default)]
    pub strict: Option<bool>,
}

impl ToolDefinition {
    /// A non-strict definition.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            strict: None,
        }
    }

    /// Turn strict mode on or off. Turning it on closes the arguments
    /// object (`additionalProperties: false`) unless the schema already
    /// says otherwise.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        if strict && let Some(object) = self.parameters.as_object_mut() {
            object
                .entry("additionalProperties")
                .or_insert(Value::Bool(false));
        }
        self
    }

    /// Tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Serialize for ToolDefinition {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut function = Map::new();
        function.insert("name".into(), self.name.clone().into());
        function.insert("description".into(), self.description.clone().into());
        function.insert("parameters".into(), self.parameters.clone());
        if let Some(strict) = self.strict {
            function.insert("strict".into(), strict.into());
        }

        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", "function")?;
        map.serialize_entry("function", &function)?;
        map.end()
    }
}

/// A typed tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model calls it by.
    const NAME: &'static str;

    /// Decoded arguments.
    type Args: for<'de> Deserialize<'de> + Send;

    /// Result handed back to the model as JSON.
    type Output: Serialize + Send;

    /// Failure; fatal variants abort the run.
    type Error: Into<ToolError> + Send;

    /// Tool name.
    fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Description shown to the model.
    fn description(&self) -> String;

    /// JSON schema of [`Args`](Self::Args).
    fn parameters_schema(&self) -> Value;

    /// Run the tool.
    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error>;

    /// Strict definition offered to the model.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters_schema())
            .with_strict(true)
    }

    /// Decode JSON arguments, run, encode the output.
    ///
    /// Arguments may arrive as an object or as a JSON-encoded string.
    async fn call_json(&self, args: Value) -> ToolResult<Value>
    where
        Self::Output: 'static,
    {
        let decoded: Self::Args = match args {
            Value::String(raw) => serde_json::from_str(&raw),
            other => serde_json::from_value(other),
        }
        .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let output = self.call(decoded).await.map_err(Into::into)?;
        serde_json::to_value(output).map_err(|e| ToolError::Execution(e.to_string()))
    }
}

/// Object-safe view of a [`Tool`].
#[async_trait]
pub trait DynTool: Send + Sync {
    /// Tool name.
    fn name(&self) -> &str;

    /// Definition offered to the model.
    fn definition(&self) -> ToolDefinition;

    /// Call with JSON arguments.
    async fn call_json(&self, args: Value) -> ToolResult<Value>;
}

#[async_trait]
impl<T: Tool + 'static> DynTool for T
where
    T::Output: 'static,
{
    fn name(&self) -> &str {
        Tool::name(self)
    }

    fn definition(&self) -> ToolDefinition {
        Tool::definition(self)
    }

    async fn call_json(&self, args: Value) -> ToolResult<Value> {
        Tool::call_json(self, args).await
    }
}

/// A tool shared by every agent and claim run that uses it.
pub type SharedTool = Arc<dyn DynTool>;
