//! Unified error types for the claim pipeline.
//!
//! This module provides the error hierarchy covering:
//! - LLM provider errors (authentication, rate limiting, etc.)
//! - Tool execution errors
//! - Agent runtime errors
//! - Pipeline contract errors (schema violations, missing stage outputs,
//!   illegal hand-offs)
//! - External collaborator errors (content store, document generation)
//!
//! A guardrail rejection is deliberately *not* an error: it is reported as
//! [`RunOutcome::Rejected`](crate::pipeline::RunOutcome::Rejected).

use std::fmt;

use crate::pipeline::Stage;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the claim pipeline.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// LLM provider error.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool execution error.
    #[error("Tool error: {0}")]
    Tool(ToolError),

    /// Agent runtime error.
    #[error("Agent error: {0}")]
    Agent(String),

    /// Maximum steps reached during agent execution.
    #[error("Maximum steps ({max_steps}) reached without final answer")]
    MaxSteps {
        /// The maximum number of steps configured.
        max_steps: usize,
    },

    /// A structured output did not conform to its declared schema.
    #[error("Schema violation in {schema}: {message}")]
    SchemaViolation {
        /// Name of the schema that was violated.
        schema: String,
        /// What was wrong with the output.
        message: String,
    },

    /// The merge step was reached without the output of a required stage.
    #[error("Missing output of stage {0} at merge")]
    MissingDependency(Stage),

    /// An event arrived that the hand-off table does not allow.
    #[error("Invalid hand-off: {event} is not accepted in stage {from}")]
    InvalidTransition {
        /// Stage the machine was in.
        from: Stage,
        /// Name of the rejected event.
        event: &'static str,
    },

    /// The final report broke the end-to-end pipeline contract.
    #[error("Pipeline contract violated: {0}")]
    ContractViolation(String),

    /// Content store or record source failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Document generation failure.
    #[error("Document generation error: {0}")]
    DocGen(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create an agent error with a message.
    #[must_use]
    pub fn agent(msg: impl Into<String>) -> Self {
        Self::Agent(msg.into())
    }

    /// Create a max steps error.
    #[must_use]
    pub const fn max_steps(max_steps: usize) -> Self {
        Self::MaxSteps { max_steps }
    }

    /// Create a schema violation for the named schema.
    #[must_use]
    pub fn schema_violation(schema: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            schema: schema.into(),
            message: message.into(),
        }
    }

    /// Create a storage error.
    #[must_use]
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a document generation error.
    #[must_use]
    pub fn docgen(msg: impl Into<String>) -> Self {
        Self::DocGen(msg.into())
    }

    /// Returns `true` if the failure came from an external service call
    /// (model provider, HTTP, web search, storage or document generation).
    #[must_use]
    pub const fn is_external(&self) -> bool {
        matches!(
            self,
            Self::Llm(_)
                | Self::Http(_)
                | Self::Storage(_)
                | Self::DocGen(_)
                | Self::Tool(ToolError::Service { .. })
        )
    }

    /// Returns `true` if a model call failed in a way that may succeed
    /// later. Informational; nothing in the pipeline retries.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Llm(err) | Self::Tool(ToolError::Llm(err)) => err.is_retryable(),
            _ => false,
        }
    }
}

impl From<ToolError> for Error {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::SchemaViolation { schema, message } => {
                Self::SchemaViolation { schema, message }
            }
            ToolError::Llm(err) => Self::Llm(err),
            other => Self::Tool(other),
        }
    }
}

/// Error type for LLM provider operations.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LlmError {
    /// The error kind.
    pub kind: LlmErrorKind,
    /// The provider name (e.g., "openai").
    pub provider: Option<String>,
    /// Additional error message.
    pub message: String,
    /// Optional error code from the provider.
    pub code: Option<String>,
}

/// Categories of LLM errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum LlmErrorKind {
    /// Authentication or authorization failure.
    Auth,
    /// Rate limit exceeded.
    RateLimited,
    /// Context length exceeded.
    ContextExceeded,
    /// Response format error.
    ResponseFormat,
    /// Network or connection error.
    Network,
    /// HTTP status error.
    HttpStatus,
    /// Provider-specific error.
    Provider,
    /// Internal error.
    Internal,
}

impl LlmError {
    const fn bare(kind: LlmErrorKind, message: String) -> Self {
        Self {
            kind,
            provider: None,
            message,
            code: None,
        }
    }

    /// Create an authentication error.
    #[must_use]
    pub fn auth(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            ..Self::bare(LlmErrorKind::Auth, message.into())
        }
    }

    /// Create a rate limit error.
    #[must_use]
    pub fn rate_limited(provider: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            ..Self::bare(
                LlmErrorKind::RateLimited,
                "Rate limit exceeded. Please retry after some time.".into(),
            )
        }
    }

    /// Create a context exceeded error.
    #[must_use]
    pub fn context_exceeded(message: impl Into<String>) -> Self {
        Self::bare(LlmErrorKind::ContextExceeded, message.into())
    }

    /// Create a response format error.
    #[must_use]
    pub fn response_format(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::bare(
            LlmErrorKind::ResponseFormat,
            format!("Expected {}, got {}", expected.into(), got.into()),
        )
    }

    /// Create a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::bare(LlmErrorKind::Network, message.into())
    }

    /// Create an HTTP status error.
    #[must_use]
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            code: Some(status.to_string()),
            ..Self::bare(
                LlmErrorKind::HttpStatus,
                format!("HTTP {status}: {}", body.into()),
            )
        }
    }

    /// Create a provider error with an error code.
    #[must_use]
    pub fn provider_code(
        provider: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: LlmErrorKind::Provider,
            provider: Some(provider.into()),
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::bare(LlmErrorKind::Internal, message.into())
    }

    /// Check if this error is transient.
    ///
    /// The pipeline never retries; this only classifies the failure for
    /// logging and for callers that wrap the pipeline in their own policy.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind, LlmErrorKind::RateLimited | LlmErrorKind::Network)
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{provider}] ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(code) = &self.code {
            write!(f, " (code: {code})")?;
        }
        Ok(())
    }
}

impl std::error::Error for LlmError {}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network("Request timed out")
        } else if err.is_connect() {
            Self::network(format!("Connection failed: {err}"))
        } else {
            Self::network(err.to_string())
        }
    }
}

/// Error type for tool execution failures.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ToolError {
    /// Error during tool execution.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Invalid arguments provided to the tool.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Tool not found.
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// The tool's upstream service returned output that breaks its schema.
    ///
    /// Fatal: the runner aborts the agent run instead of reporting the
    /// failure back to the model.
    #[error("Schema violation in {schema}: {message}")]
    SchemaViolation {
        /// Name of the schema that was violated.
        schema: String,
        /// What was wrong with the output.
        message: String,
    },

    /// A model call made by the tool failed. Fatal.
    #[error("LLM error: {0}")]
    Llm(LlmError),

    /// The tool's external service could not be reached or answered with
    /// an error. Fatal.
    #[error("{service} failed: {message}")]
    Service {
        /// Name of the service.
        service: String,
        /// Failure description.
        message: String,
    },
}

impl ToolError {
    /// Create an execution error.
    #[must_use]
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create an invalid arguments error.
    #[must_use]
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create a schema violation error.
    #[must_use]
    pub fn schema_violation(schema: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            schema: schema.into(),
            message: message.into(),
        }
    }

    /// Create an external service failure.
    #[must_use]
    pub fn service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this error must abort the agent run.
    ///
    /// Fatal errors are never handed back to the model, which would
    /// otherwise be free to call the tool again.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SchemaViolation { .. } | Self::Llm(_) | Self::Service { .. }
        )
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidArguments(err.to_string())
    }
}

impl From<Error> for ToolError {
    fn from(err: Error) -> Self {
        match err {
            Error::SchemaViolation { schema, message } => Self::SchemaViolation { schema, message },
            Error::Llm(inner) => Self::Llm(inner),
            Error::Tool(inner) => inner,
            other => Self::Execution(other.to_string()),
        }
    }
}
