//! Runner, the agent execution engine.
//!
//! The [`Runner`] drives an [`Agent`] through its reasoning loop:
//!
//! 1. Build messages from instructions + the input message
//! 2. Call the model with available tools and the output schema
//! 3. Classify the response into a [`NextStep`]
//! 4. Execute tool calls and append their results
//! 5. Loop back to step 2
//!
//! The loop terminates when the model produces a final output, an error
//! occurs, or the maximum step count is exceeded. With an output schema the
//! final output must be JSON; anything else is a schema violation.

use serde_json::Value;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::chat::{ChatProvider, ChatRequest, ChatResponse, ToolChoice};
use crate::context::RunContext;
use crate::error::{Error, Result, ToolError};
use crate::message::Message;
use crate::tool::{SharedTool, ToolDefinition};

use super::config::Agent;
use super::result::{NextStep, RunResult, StepInfo, ToolCallRecord, ToolCallRequest};

/// Per-run mutable state.
struct RunState<'a> {
    agent: &'a Agent,
    provider: &'a dyn ChatProvider,
    context: RunContext,
    messages: Vec<Message>,
    step_history: Vec<StepInfo>,
    definitions: Vec<ToolDefinition>,
}

impl<'a> RunState<'a> {
    fn init(agent: &'a Agent, input: Message) -> Result<Self> {
        let provider = agent.provider.as_deref().ok_or_else(|| {
            Error::agent(format!(
                "Agent '{}' has no provider configured. Call .provider() before running.",
                agent.name
            ))
        })?;

        let mut messages = Vec::with_capacity(2);
        if !agent.instructions.is_empty() {
            messages.push(Message::system(&agent.instructions));
        }
        messages.push(input);

        let definitions = agent.tool_definitions();
        let tool_names: Vec<&str> = definitions.iter().map(ToolDefinition::name).collect();
        tracing::Span::current().record("agent.tools", tracing::field::debug(&tool_names));

        Ok(Self {
            agent,
            provider,
            context: RunContext::new().with_agent_name(&agent.name),
            messages,
            step_history: Vec::new(),
            definitions,
        })
    }

    fn build_request(&self) -> ChatRequest {
        let mut request = ChatRequest::with_messages(&self.agent.model, self.messages.clone());
        if !self.definitions.is_empty() {
            request = request
                .tools(self.definitions.clone())
                .tool_choice(ToolChoice::Auto)
                .parallel_tool_calls(true);
        }
        if let Some(ref schema) = self.agent.output_schema {
            request = request.response_format(schema.to_response_format());
        }
        if let Some(temperature) = self.agent.temperature {
            request = request.temperature(temperature);
        }
        request
    }

    fn accumulate_usage(&mut self, response: &ChatResponse) {
        if let Some(usage) = response.usage {
            self.context.add_usage(usage);
        }
    }

    fn finish(&mut self, step: usize, response: ChatResponse, output: Value) -> RunResult {
        self.messages.push(response.message.clone());
        self.step_history.push(StepInfo {
            step,
            response,
            tool_calls: Vec::new(),
        });

        tracing::Span::current().record("agent.result_steps", step);
        info!(
            agent = %self.agent.name,
            steps = step,
            input_tokens = self.context.usage().input_tokens,
            output_tokens = self.context.usage().output_tokens,
            "Agent run completed",
        );

        RunResult {
            output,
            usage: *self.context.usage(),
            steps: step,
            step_history: std::mem::take(&mut self.step_history),
            agent_name: self.agent.name.clone(),
            schema: self
                .agent
                .output_schema
                .as_ref()
                .map(|s| s.name().to_owned()),
        }
    }
}

/// Stateless execution engine that drives an [`Agent`] through its reasoning loop.
///
/// All per-run state lives inside the run, so `run` can be called
/// concurrently for different claims sharing the same agents.
#[derive(Debug, Clone, Copy)]
pub struct Runner;

impl Runner {
    /// Execute an agent run to completion.
    ///
    /// # Errors
    ///
    /// - [`Error::Agent`] if no provider is configured on the agent
    /// - [`Error::MaxSteps`] if the step limit is exceeded
    /// - [`Error::SchemaViolation`] if a structured output is not JSON, or a
    ///   tool reports a fatal schema violation
    /// - provider errors, propagated unchanged
    pub async fn run(agent: &Agent, input: Message) -> Result<RunResult> {
        let span = info_span!(
            "agent",
            agent.name = %agent.name,
            agent.model = %agent.model,
            gen_ai.system = "claimwise",
            agent.max_steps = agent.max_steps,
            agent.tools = tracing::field::Empty,
            agent.result_steps = tracing::field::Empty,
            error = tracing::field::Empty,
        );
        Self::run_inner(agent, input).instrument(span).await
    }

    async fn run_inner(agent: &Agent, input: Message) -> Result<RunResult> {
        let mut state = RunState::init(agent, input)?;

        for step in 1..=agent.max_steps {
            state.context.advance_step();
            debug!(agent = %agent.name, step = state.context.step(), "Starting step");

            let request = state.build_request();
            let response = state.provider.chat(&request).await.map_err(|e| {
                error!(error = %e, agent = %agent.name, step, "LLM call failed");
                tracing::Span::current().record("error", tracing::field::display(&e));
                e
            })?;
            state.accumulate_usage(&response);

            match Self::classify_response(agent, &response)? {
                NextStep::FinalOutput { output } => {
                    return Ok(state.finish(step, response, output));
                }
                NextStep::ToolCalls { calls } => {
                    state.messages.push(response.message.clone());
                    let records =
                        Self::execute_tool_calls(&calls, &agent.tools, &mut state.messages)
                            .await?;
                    state.step_history.push(StepInfo {
                        step,
                        response,
                        tool_calls: records,
                    });
                }
            }
        }

        let err = Error::max_steps(agent.max_steps);
        error!(error = %err, agent = %agent.name, max_steps = agent.max_steps, "Max steps exceeded");
        tracing::Span::current().record("error", tracing::field::display(&err));
        Err(err)
    }

    /// Classify a model response into a [`NextStep`].
    ///
    /// Structured outputs are parsed as JSON with no fallback: prose,
    /// markdown fences or an empty answer are all schema violations.
    fn classify_response(agent: &Agent, response: &ChatResponse) -> Result<NextStep> {
        if let Some(tool_calls) = response.tool_calls() {
            let calls: Vec<ToolCallRequest> =
                tool_calls.iter().map(ToolCallRequest::from).collect();
            if !calls.is_empty() {
                return Ok(NextStep::ToolCalls { calls });
            }
        }

        let Some(schema) = agent.output_schema.as_ref() else {
            let output = response.text().map_or(Value::Null, Value::String);
            return Ok(NextStep::FinalOutput { output });
        };

        let text = response.text().unwrap_or_default();
        if text.trim().is_empty() {
            return Err(Error::schema_violation(
                schema.name(),
                format!("agent '{}' returned no output", agent.name),
            ));
        }
        let output = serde_json::from_str(&text).map_err(|e| {
            Error::schema_violation(
                schema.name(),
                format!("agent '{}' returned non-JSON output: {e}", agent.name),
            )
        })?;
        Ok(NextStep::FinalOutput { output })
    }

    /// Execute tool calls concurrently and append results to messages in the
    /// original call order.
    ///
    /// Non-fatal tool errors become tool messages so the model can react; a
    /// fatal error aborts the run.
    async fn execute_tool_calls(
        calls: &[ToolCallRequest],
        tools: &[SharedTool],
        messages: &mut Vec<Message>,
    ) -> Result<Vec<ToolCallRecord>> {
        let futs = calls.iter().map(|call| Self::execute_single_tool(call, tools));
        let outcomes = futures::future::join_all(futs).await;

        let mut records = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            records.push(outcome?);
        }
        for record in &records {
            messages.push(Message::tool(&record.id, &record.result));
        }
        Ok(records)
    }

    async fn execute_single_tool(
        call: &ToolCallRequest,
        tools: &[SharedTool],
    ) -> std::result::Result<ToolCallRecord, ToolError> {
        let tool_span = info_span!(
            "tool",
            tool.name = %call.name,
            tool.id = %call.id,
            tool.success = tracing::field::Empty,
            error = tracing::field::Empty,
        );

        async {
            let (result, success) = match tools.iter().find(|t| t.name() == call.name) {
                Some(tool) => match tool.call_json(call.arguments.clone()).await {
                    Ok(value) => (
                        serde_json::to_string(&value).unwrap_or_else(|_| value.to_string()),
                        true,
                    ),
                    Err(e) if e.is_fatal() => {
                        error!(tool = %call.name, error = %e, "Tool failed fatally");
                        tracing::Span::current().record("error", tracing::field::display(&e));
                        return Err(e);
                    }
                    Err(e) => {
                        warn!(tool = %call.name, error = %e, "Tool execution failed");
                        (format!("Tool error: {e}"), false)
                    }
                },
                None => {
                    warn!(tool = %call.name, "Tool not found");
                    (format!("Tool '{}' not found", call.name), false)
                }
            };

            let current = tracing::Span::current();
            current.record("tool.success", success);
            if !success {
                current.record("error", result.as_str());
            }

            Ok(ToolCallRecord {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone(),
                result,
                success,
            })
        }
        .instrument(tool_span)
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::agent::OutputSchema;
    use crate::llms::mock::MockProvider;
    use crate::message::ToolCall;
    use crate::tool::Tool;
    use crate::usage::Usage;

    #[derive(Debug, Deserialize, JsonSchema)]
    #[serde(deny_unknown_fields)]
    struct Answer {
        value: String,
    }

    #[derive(Default)]
    struct Counter {
        calls: AtomicUsize,
        fatal: bool,
    }

    #[derive(Deserialize)]
    struct NoArgs {}

    #[async_trait]
    impl Tool for Counter {
        const NAME: &'static str = "counter";
        type Args = NoArgs;
        type Output = usize;
        type Error = ToolError;

        fn description(&self) -> String {
            "Count invocations".into()
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn call(&self, _args: NoArgs) -> std::result::Result<usize, ToolError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fatal {
                return Err(ToolError::schema_violation("DamageAssessment", "bad"));
            }
            Ok(n)
        }
    }

    fn structured_agent(provider: Arc<MockProvider>) -> Agent {
        Agent::new("tester")
            .instructions("Answer in JSON.")
            .model("mock")
            .provider(provider)
            .output_schema(OutputSchema::from_type::<Answer>())
    }

    fn counter_call(id: &str) -> ChatResponse {
        ChatResponse::new(Message::assistant_tool_calls(vec![ToolCall::function(
            id, "counter", "{}",
        )]))
    }

    mod final_output {
        use super::*;

        #[tokio::test]
        async fn structured_output_is_parsed() {
            let provider = Arc::new(MockProvider::new().with_text(r#"{"value": "ok"}"#));
            let agent = structured_agent(provider.clone());

            let result = Runner::run(&agent, Message::user("go")).await.unwrap();
            let answer: Answer = result.parse().unwrap();
            assert_eq!(answer.value, "ok");
            assert_eq!(result.steps, 1);
            assert_eq!(result.schema.as_deref(), Some("Answer"));

            let request = &provider.requests()[0];
            assert_eq!(
                request.response_format.as_ref().and_then(|f| f.schema_name()),
                Some("Answer")
            );
            assert_eq!(request.messages.len(), 2);
        }

        #[tokio::test]
        async fn prose_is_a_schema_violation() {
            let provider = Arc::new(MockProvider::new().with_text("Here is the answer: ok"));
            let err = Runner::run(&structured_agent(provider), Message::user("go"))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::SchemaViolation { .. }));
        }

        #[tokio::test]
        async fn fenced_json_is_a_schema_violation() {
            let provider =
                Arc::new(MockProvider::new().with_text("```json\n{\"value\": \"ok\"}\n```"));
            let err = Runner::run(&structured_agent(provider), Message::user("go"))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::SchemaViolation { .. }));
        }

        #[tokio::test]
        async fn plain_agent_returns_text() {
            let provider = Arc::new(MockProvider::new().with_text("hello"));
            let agent = Agent::new("plain").model("mock").provider(provider);
            let result = agent.run(Message::user("hi")).await.unwrap();
            assert_eq!(result.output, "hello");
        }

        #[tokio::test]
        async fn missing_provider_is_an_agent_error() {
            let err = Runner::run(&Agent::new("orphan"), Message::user("hi"))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Agent(_)));
        }
    }

    mod tools {
        use super::*;

        #[tokio::test]
        async fn tool_results_feed_the_next_step() {
            let counter = Arc::new(Counter::default());
            let provider = Arc::new(
                MockProvider::new()
                    .with_response(counter_call("c1"))
                    .with_text(r#"{"value": "done"}"#),
            );
            let agent = structured_agent(provider.clone()).tool(counter.clone());

            let result = agent.run(Message::user("go")).await.unwrap();
            assert_eq!(result.steps, 2);
            assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
            let records: Vec<_> = result.tool_calls().collect();
            assert_eq!(records.len(), 1);
            assert!(records[0].success);

            let second = &provider.requests()[1];
            let last = second.messages.last().unwrap();
            assert_eq!(last.tool_call_id.as_deref(), Some("c1"));
            assert_eq!(last.text().as_deref(), Some("1"));
        }

        #[tokio::test]
        async fn unknown_tool_is_reported_to_the_model() {
            let provider = Arc::new(
                MockProvider::new()
                    .with_response(ChatResponse::new(Message::assistant_tool_calls(vec![
                        ToolCall::function("c1", "missing", "{}"),
                    ])))
                    .with_text(r#"{"value": "recovered"}"#),
            );
            let result = structured_agent(provider)
                .run(Message::user("go"))
                .await
                .unwrap();
            let record = result.tool_calls().next().unwrap();
            assert!(!record.success);
            assert!(record.result.contains("not found"));
        }

        #[tokio::test]
        async fn fatal_tool_error_aborts_the_run() {
            let counter = Arc::new(Counter {
                fatal: true,
                ..Counter::default()
            });
            let provider = Arc::new(
                MockProvider::new()
                    .with_response(counter_call("c1"))
                    .with_text(r#"{"value": "never"}"#),
            );
            let agent = structured_agent(provider.clone()).tool(counter);

            let err = agent.run(Message::user("go")).await.unwrap_err();
            match err {
                Error::SchemaViolation { schema, .. } => assert_eq!(schema, "DamageAssessment"),
                other => panic!("expected SchemaViolation, got {other:?}"),
            }
            assert_eq!(provider.call_count(), 1);
        }

        #[tokio::test]
        async fn max_steps_is_enforced() {
            let counter = Arc::new(Counter::default());
            let provider = Arc::new(
                MockProvider::new()
                    .with_response(counter_call("c1"))
                    .with_response(counter_call("c2")),
            );
            let agent = structured_agent(provider).tool(counter).max_steps(2);

            let err = agent.run(Message::user("go")).await.unwrap_err();
            assert!(matches!(err, Error::MaxSteps { max_steps: 2 }));
        }
    }

    mod usage {
        use super::*;

        #[tokio::test]
        async fn usage_accumulates_across_steps() {
            let counter = Arc::new(Counter::default());
            let provider = Arc::new(
                MockProvider::new()
                    .with_response(counter_call("c1").with_usage(Usage::new(10, 2)))
                    .with_response(
                        ChatResponse::from_text(r#"{"value": "x"}"#).with_usage(Usage::new(20, 3)),
                    ),
            );
            let agent = structured_agent(provider).tool(counter);
            let result = agent.run(Message::user("go")).await.unwrap();
            assert_eq!(result.usage, Usage::new(30, 5));
        }
    }
}
