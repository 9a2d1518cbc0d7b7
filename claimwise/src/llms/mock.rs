//! Scripted provider for tests and dry runs.
//!
//! [`MockProvider`] returns queued responses in order and records every
//! request it receives. Responses can also be routed by the name of the
//! structured output the request asks for, so one provider can serve the
//! guardrail, the specialists and the vision tool of a whole claim run
//! without depending on call order across them.
//!
//! # Example
//!
//! ```rust,ignore
//! use claimwise::llms::MockProvider;
//!
//! let provider = MockProvider::new()
//!     .on_schema("GuardrailVerdict", r#"{"is_in_domain": true, "reasoning": "claim"}"#)
//!     .on_schema("CostEstimate", r#"{"estimated_range": "$1,200 - $2,400"}"#);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::chat::{ChatProvider, ChatRequest, ChatResponse};
use crate::error::{LlmError, Result};
use crate::message::{Message, ToolCall};

type Scripted = std::result::Result<ChatResponse, LlmError>;

#[derive(Debug, Default)]
struct Script {
    default: VecDeque<Scripted>,
    by_schema: HashMap<String, VecDeque<Scripted>>,
    requests: Vec<ChatRequest>,
}

/// A provider that replays scripted responses.
#[derive(Debug)]
pub struct MockProvider {
    model: String,
    script: Mutex<Script>,
}

impl MockProvider {
    /// Create an empty mock provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_owned(),
            script: Mutex::default(),
        }
    }

    /// Set the model identifier reported by the provider.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Queue a response on the default queue.
    #[must_use]
    pub fn with_response(self, response: ChatResponse) -> Self {
        self.push(None, Ok(response));
        self
    }

    /// Queue a text response on the default queue.
    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_response(ChatResponse::from_text(text))
    }

    /// Queue an error on the default queue.
    #[must_use]
    pub fn with_error(self, error: LlmError) -> Self {
        self.push(None, Err(error));
        self
    }

    /// Queue a text response for requests constrained to `schema`.
    #[must_use]
    pub fn on_schema(self, schema: &str, text: impl Into<String>) -> Self {
        self.push(Some(schema), Ok(ChatResponse::from_text(text)));
        self
    }

    /// Queue a full response for requests constrained to `schema`.
    #[must_use]
    pub fn on_schema_response(self, schema: &str, response: ChatResponse) -> Self {
        self.push(Some(schema), Ok(response));
        self
    }

    /// Queue a single tool call for requests constrained to `schema`.
    #[must_use]
    pub fn on_schema_tool_call(self, schema: &str, call: ToolCall) -> Self {
        let response = ChatResponse::new(Message::assistant_tool_calls(vec![call]));
        self.push(Some(schema), Ok(response));
        self
    }

    /// Queue an error for requests constrained to `schema`.
    #[must_use]
    pub fn on_schema_error(self, schema: &str, error: LlmError) -> Self {
        self.push(Some(schema), Err(error));
        self
    }

    /// Every request received so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.lock().requests.clone()
    }

    /// Requests that asked for the given structured output.
    #[must_use]
    pub fn requests_for(&self, schema: &str) -> Vec<ChatRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| {
                r.response_format
                    .as_ref()
                    .and_then(|f| f.schema_name())
                    .is_some_and(|name| name == schema)
            })
            .cloned()
            .collect()
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn push(&self, schema: Option<&str>, response: Scripted) {
        let mut script = self.lock();
        match schema {
            Some(name) => script
                .by_schema
                .entry(name.to_owned())
                .or_default()
                .push_back(response),
            None => script.default.push_back(response),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let mut script = self.lock();
        script.requests.push(request.clone());

        let routed = request
            .response_format
            .as_ref()
            .and_then(|f| f.schema_name())
            .and_then(|name| script.by_schema.get_mut(name))
            .and_then(VecDeque::pop_front);

        let next = routed.or_else(|| script.default.pop_front());
        match next {
            Some(Ok(response)) => Ok(response.with_model(self.model.clone())),
            Some(Err(e)) => Err(e.into()),
            None => Err(LlmError::internal("mock provider has no scripted response left").into()),
        }
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn supports_vision(&self) -> bool {
        true
    }
}
