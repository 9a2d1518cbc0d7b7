//! Agent configuration types.
//!
//! An [`Agent`] defines a specialist's identity (name, instructions), the
//! model it talks to, the tools it may call and the schema its final answer
//! must satisfy. Each agent owns its [`SharedChatProvider`], so the guardrail,
//! the specialists and the vision tool can each use a different model.
//!
//! # Example
//!
//! ```rust,ignore
//! use claimwise::prelude::*;
//!
//! let agent = Agent::new("cost_estimator")
//!     .instructions("You estimate repair costs for damaged vehicles.")
//!     .model("gpt-4o")
//!     .provider(provider.clone())
//!     .output_schema(OutputSchema::from_type::<CostEstimate>());
//!
//! let result = agent.run(Message::user(prompt)).await?;
//! let estimate: CostEstimate = result.parse()?;
//! ```

use std::fmt;

use serde_json::{Map, Value};

use crate::chat::{JsonSchemaSpec, ResponseFormat, SharedChatProvider};
use crate::error::Result;
use crate::message::Message;
use crate::tool::{SharedTool, ToolDefinition};

use super::result::RunResult;
use super::runner::Runner;

/// Default bound on reasoning steps per agent run.
pub const DEFAULT_MAX_STEPS: usize = 10;

/// Schema specification for structured agent output.
///
/// When set on an [`Agent`], the [`Runner`] will:
///
/// 1. Set `response_format` to a strict [`ResponseFormat::JsonSchema`] on
///    every request, constraining the model to produce conforming JSON.
/// 2. Parse the final text as JSON; text that is not JSON is a
///    [`SchemaViolation`](crate::Error::SchemaViolation), never a fallback.
#[derive(Debug, Clone)]
pub struct OutputSchema {
    /// Schema name (used in the `response_format` API parameter).
    name: String,
    /// JSON Schema definition.
    schema: Value,
    strict: bool,
}

impl OutputSchema {
    /// Creates a new output schema with strict mode enabled.
    ///
    /// The schema is normalised for strict mode: see [`ensure_strict_schema`].
    #[must_use]
    pub fn new(name: impl Into<String>, mut schema: Value) -> Self {
        ensure_strict_schema(&mut schema);
        Self {
            name: name.into(),
            schema,
            strict: true,
        }
    }

    /// Creates an output schema by generating JSON Schema from a Rust type.
    ///
    /// The schema name is the type's schema name (e.g. `DamageAssessment`).
    #[must_use]
    pub fn from_type<T: schemars::JsonSchema>() -> Self {
        let root = schemars::schema_for!(T);
        let mut schema_value = serde_json::to_value(&root).unwrap_or_default();

        // The `$schema` meta field is rejected by structured-output APIs.
        if let Value::Object(ref mut map) = schema_value {
            map.remove("$schema");
        }

        Self::new(<T as schemars::JsonSchema>::schema_name(), schema_value)
    }

    /// Returns the schema name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the JSON Schema definition.
    #[must_use]
    pub const fn schema(&self) -> &Value {
        &self.schema
    }

    /// Returns whether strict mode is enabled.
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    /// Converts this into a [`ResponseFormat`].
    #[must_use]
    pub fn to_response_format(&self) -> ResponseFormat {
        ResponseFormat::JsonSchema {
            json_schema: JsonSchemaSpec {
                name: self.name.clone(),
                schema: self.schema.clone(),
                strict: Some(self.strict),
            },
        }
    }
}

/// Normalise a JSON schema for strict structured outputs.
///
/// Every object schema (including those under `$defs`, `properties`, `items`
/// and `anyOf`) gets all of its properties listed in `required` and
/// `additionalProperties: false`. Optional fields stay optional through
/// their nullable type, not by being absent.
pub fn ensure_strict_schema(schema: &mut Value) {
    let Value::Object(map) = schema else {
        return;
    };

    let is_object = map.get("type").is_some_and(|t| match t {
        Value::String(s) => s == "object",
        Value::Array(types) => types.iter().any(|t| t == "object"),
        _ => false,
    }) || map.contains_key("properties");

    if is_object {
        let keys: Vec<Value> = map
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().map(Value::String).collect())
            .unwrap_or_default();
        map.insert("required".to_owned(), Value::Array(keys));
        map.insert("additionalProperties".to_owned(), Value::Bool(false));
    }

    for key in ["properties", "$defs", "definitions"] {
        if let Some(Value::Object(children)) = map.get_mut(key) {
            children.values_mut().for_each(ensure_strict_schema);
        }
    }
    for key in ["anyOf", "oneOf", "allOf"] {
        if let Some(Value::Array(variants)) = map.get_mut(key) {
            variants.iter_mut().for_each(ensure_strict_schema);
        }
    }
    if let Some(items) = map.get_mut("items") {
        ensure_strict_schema(items);
    }
    strip_unsupported_keywords(map);
}

fn strip_unsupported_keywords(map: &mut Map<String, Value>) {
    // Strict mode rejects defaults and numeric formats emitted by schemars.
    map.remove("default");
    if map
        .get("format")
        .and_then(Value::as_str)
        .is_some_and(|f| f.starts_with("uint") || f.starts_with("int"))
    {
        map.remove("format");
    }
}

/// A specialist agent: identity, model binding, tools and output contract.
#[derive(Clone)]
pub struct Agent {
    /// Agent name (used in tracing and error messages).
    pub name: String,
    /// System instructions.
    pub instructions: String,
    /// Model identifier.
    pub model: String,
    /// Provider used for this agent's calls.
    pub provider: Option<SharedChatProvider>,
    /// Tools the agent may call.
    pub tools: Vec<SharedTool>,
    /// Bound on reasoning steps.
    pub max_steps: usize,
    /// Required structure of the final answer.
    pub output_schema: Option<OutputSchema>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

impl Agent {
    /// Create a new agent with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: String::new(),
            model: String::new(),
            provider: None,
            tools: Vec::new(),
            max_steps: DEFAULT_MAX_STEPS,
            output_schema: None,
            temperature: None,
        }
    }

    /// Set the system instructions.
    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Set the model identifier.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the provider.
    #[must_use]
    pub fn provider(mut self, provider: SharedChatProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Add a tool.
    #[must_use]
    pub fn tool(mut self, tool: SharedTool) -> Self {
        self.tools.push(tool);
        self
    }

    /// Set the maximum number of reasoning steps.
    #[must_use]
    pub const fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Require the final answer to match a schema.
    #[must_use]
    pub fn output_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Tool definitions advertised to the model.
    #[must_use]
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Run this agent to completion on a single input message.
    ///
    /// # Errors
    ///
    /// See [`Runner::run`].
    pub async fn run(&self, input: Message) -> Result<RunResult> {
        Runner::run(self, input).await
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("has_provider", &self.provider.is_some())
            .field(
                "tools",
                &self.tools.iter().map(|t| t.name().to_owned()).collect::<Vec<_>>(),
            )
            .field("max_steps", &self.max_steps)
            .field("output_schema", &self.output_schema.as_ref().map(OutputSchema::name))
            .finish_non_exhaustive()
    }
}
