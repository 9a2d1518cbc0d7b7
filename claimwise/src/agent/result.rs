//! Agent run result types.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::chat::ChatResponse;
use crate::error::{Error, Result};
use crate::message::ToolCall;
use crate::usage::Usage;

/// What the runner does after classifying a model response.
#[derive(Debug, Clone)]
pub enum NextStep {
    /// The model produced its final answer.
    FinalOutput {
        /// The answer, parsed as JSON when the agent has an output schema.
        output: Value,
    },
    /// The model asked for tool calls.
    ToolCalls {
        /// Calls in the order the model emitted them.
        calls: Vec<ToolCallRequest>,
    },
}

/// A tool call as requested by the model, with parsed arguments.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    /// Call identifier.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Parsed arguments.
    pub arguments: Value,
}

impl From<&ToolCall> for ToolCallRequest {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            name: call.function.name.clone(),
            arguments: call.arguments_value(),
        }
    }
}

/// Record of one executed tool call.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Call identifier.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Arguments the tool was called with.
    pub arguments: Value,
    /// Serialized result or error text sent back to the model.
    pub result: String,
    /// Whether the call succeeded.
    pub success: bool,
}

/// One reasoning step of a run.
#[derive(Debug, Clone)]
pub struct StepInfo {
    /// 1-based step number.
    pub step: usize,
    /// The model response for this step.
    pub response: ChatResponse,
    /// Tool calls executed in this step.
    pub tool_calls: Vec<ToolCallRecord>,
}

/// The result of a completed agent run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Final output of the agent.
    pub output: Value,
    /// Tokens spent across every step.
    pub usage: Usage,
    /// Number of steps taken.
    pub steps: usize,
    /// Per-step history.
    pub step_history: Vec<StepInfo>,
    /// Name of the agent that produced the output.
    pub agent_name: String,
    /// Name of the output schema, if the agent declared one.
    pub schema: Option<String>,
}

impl RunResult {
    /// Deserialize the output into its declared type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaViolation`] when the output does not match `T`
    /// (missing or unknown fields, wrong types).
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.output.clone()).map_err(|e| {
            Error::schema_violation(
                self.schema.as_deref().unwrap_or(&self.agent_name),
                e.to_string(),
            )
        })
    }

    /// Every tool call made during the run, in order.
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallRecord> {
        self.step_history.iter().flat_map(|s| s.tool_calls.iter())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Estimate {
        estimated_range: String,
    }

    fn result(output: Value) -> RunResult {
        RunResult {
            output,
            usage: Usage::zero(),
            steps: 1,
            step_history: Vec::new(),
            agent_name: "cost_estimator".into(),
            schema: Some("CostEstimate".into()),
        }
    }

    #[test]
    fn parse_conforming_output() {
        let parsed: Estimate = result(json!({"estimated_range": "$1 - $2"}))
            .parse()
            .unwrap();
        assert_eq!(parsed.estimated_range, "$1 - $2");
    }

    #[test]
    fn parse_rejects_unknown_fields_as_schema_violation() {
        let err = result(json!({"estimated_range": "$1 - $2", "note": "x"}))
            .parse::<Estimate>()
            .unwrap_err();
        match err {
            Error::SchemaViolation { schema, .. } => assert_eq!(schema, "CostEstimate"),
            other => panic!("expected SchemaViolation, got {other:?}"),
        }
    }

    #[test]
    fn tool_call_request_parses_arguments() {
        let call = ToolCall::function("c1", "web_search", r#"{"query":"shops"}"#);
        let req = ToolCallRequest::from(&call);
        assert_eq!(req.name, "web_search");
        assert_eq!(req.arguments["query"], "shops");
    }
}
