//! Model requests, responses and the [`ChatProvider`] seam.
//!
//! Every model call in a claim run goes through [`ChatProvider::chat`]: the
//! guardrail classifier, the three specialists and the vision tool. Tests
//! swap in [`MockProvider`](crate::llms::MockProvider).
//!
//! ```rust,ignore
//! let request = ChatRequest::new("gpt-4o-mini")
//!     .system(GUARDRAIL_INSTRUCTIONS)
//!     .user("Process claim CLM-1042")
//!     .temperature(0.0)
//!     .response_format(OutputSchema::from_type::<GuardrailVerdict>().to_response_format());
//! let verdict: GuardrailVerdict = provider.chat(&request).await?.parse()?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::message::{Message, ToolCall};
use crate::tool::ToolDefinition;
use crate::usage::Usage;

/// One chat completion call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model id. Empty means the provider's default.
    #[serde(default)]
    pub model: String,
    /// Conversation so far.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Tools the model may call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// Whether the model must, may or must not call tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Allow several tool calls in one turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
    /// Structured output constraint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    /// Empty request for `model`.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Request continuing an existing conversation.
    #[must_use]
    pub fn with_messages(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::new(model)
        }
    }

    /// Append a system message.
    #[must_use]
    pub fn system(self, content: impl Into<String>) -> Self {
        self.message(Message::system(content))
    }

    /// Append a user message.
    #[must_use]
    pub fn user(self, content: impl Into<String>) -> Self {
        self.message(Message::user(content))
    }

    /// Append any message.
    #[must_use]
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Set the temperature.
    #[must_use]
    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Offer tools.
    #[must_use]
    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Set the tool choice.
    #[must_use]
    pub const fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    /// Allow or forbid parallel tool calls.
    #[must_use]
    pub const fn parallel_tool_calls(mut self, enabled: bool) -> Self {
        self.parallel_tool_calls = Some(enabled);
        self
    }

    /// Constrain the output format.
    #[must_use]
    pub fn response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }
}

/// Tool-use policy for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides.
    #[default]
    Auto,
    /// At least one tool call.
    Required,
    /// No tool calls.
    None,
}

/// Output format constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Free text.
    Text,
    /// Any JSON object.
    JsonObject,
    /// JSON conforming to a named schema.
    JsonSchema {
        /// The schema.
        json_schema: JsonSchemaSpec,
    },
}

impl ResponseFormat {
    /// Strict structured output for schema `name`.
    #[must_use]
    pub fn json_schema(name: impl Into<String>, schema: Value) -> Self {
        Self::JsonSchema {
            json_schema: JsonSchemaSpec {
                name: name.into(),
                schema,
                strict: Some(true),
            },
        }
    }

    /// The schema name, for structured formats.
    #[must_use]
    pub fn schema_name(&self) -> Option<&str> {
        match self {
            Self::JsonSchema { json_schema } => Some(&json_schema.name),
            Self::Text | Self::JsonObject => None,
        }
    }
}

/// A named JSON schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSchemaSpec {
    /// Name, e.g. `DamageAssessment`.
    pub name: String,
    /// JSON Schema document.
    pub schema: Value,
    /// Strict mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

/// Why generation ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Finished normally.
    #[default]
    Stop,
    /// Hit the token limit.
    Length,
    /// Wants tool results.
    ToolCalls,
    /// Filtered by the provider.
    ContentFilter,
}

impl StopReason {
    /// The output is incomplete.
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        matches!(self, Self::Length | Self::ContentFilter)
    }
}

/// Result of one chat completion call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Assistant message, possibly carrying tool calls.
    pub message: Message,
    /// Why generation ended.
    #[serde(default)]
    pub stop_reason: StopReason,
    /// Tokens spent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Model that answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Provider completion id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ChatResponse {
    /// Wrap an assistant message.
    #[must_use]
    pub fn new(message: Message) -> Self {
        Self {
            message,
            ..Self::default()
        }
    }

    /// Plain-text answer.
    #[must_use]
    pub fn from_text(content: impl Into<String>) -> Self {
        Self::new(Message::assistant(content))
    }

    /// Set the stop reason.
    #[must_use]
    pub const fn with_stop_reason(mut self, reason: StopReason) -> Self {
        self.stop_reason = reason;
        self
    }

    /// Set the usage.
    #[must_use]
    pub const fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Set the answering model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Text of the answer.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        self.message.text()
    }

    /// Decode the answer text as JSON.
    ///
    /// # Errors
    ///
    /// Fails when the answer is empty or does not decode into `T`.
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.text().unwrap_or_default())
    }

    /// Tool calls requested by the model.
    #[must_use]
    pub fn tool_calls(&self) -> Option<&[ToolCall]> {
        self.message.tool_calls.as_deref()
    }
}

/// A model backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Run one completion.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Short provider name for logs and errors.
    fn provider_name(&self) -> &'static str;

    /// Model used when a request leaves `model` empty.
    fn default_model(&self) -> &str;

    /// Accepts image content parts.
    fn supports_vision(&self) -> bool {
        false
    }
}

/// A provider shared by the guardrail, the specialists and the vision tool.
pub type SharedChatProvider = Arc<dyn ChatProvider>;
