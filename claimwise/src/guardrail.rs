//! Screening that runs before any specialist sees a claim.
//!
//! A check yields a [`GuardrailOutput`]; its `tripwire_triggered` flag is the
//! only thing the pipeline branches on. The orchestrator runs guardrails sequentially in
//! the `GUARDRAIL` stage; a triggered tripwire moves the run to `REJECTED`
//! without a single specialist, vision, search or document call.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use claimwise::prelude::*;
//!
//! struct KeywordFilter;
//!
//! #[async_trait::async_trait]
//! impl InputGuardrailCheck for KeywordFilter {
//!     async fn check(
//!         &self,
//!         _context: &RunContext,
//!         _agent_name: &str,
//!         input: &[Message],
//!     ) -> Result<GuardrailOutput> {
//!         let text = input.iter().filter_map(Message::text).collect::<String>();
//!         if text.contains("claim") {
//!             Ok(GuardrailOutput::pass())
//!         } else {
//!             Ok(GuardrailOutput::tripwire("not an insurance request"))
//!         }
//!     }
//! }
//!
//! let guardrail = InputGuardrail::new("keyword-filter", KeywordFilter);
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::RunContext;
use crate::error::Result;
use crate::message::Message;

/// Verdict of one screening check.
#[derive(Debug, Clone)]
pub struct GuardrailOutput {
    /// The input must not reach a specialist.
    pub tripwire_triggered: bool,

    /// Structured information about the check (for the claim guardrail, the
    /// serialized [`GuardrailVerdict`](crate::claim::GuardrailVerdict)).
    pub output_info: Value,
}

impl GuardrailOutput {
    /// Let the input through.
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            tripwire_triggered: false,
            output_info: Value::Null,
        }
    }

    /// Stop the input, recording why.
    #[must_use]
    pub fn tripwire(info: impl Into<Value>) -> Self {
        Self {
            tripwire_triggered: true,
            output_info: info.into(),
        }
    }

    /// Let the input through, recording why.
    #[must_use]
    pub fn pass_with_info(info: impl Into<Value>) -> Self {
        Self {
            tripwire_triggered: false,
            output_info: info.into(),
        }
    }

    /// Returns `true` if the tripwire was triggered.
    #[must_use]
    pub const fn is_triggered(&self) -> bool {
        self.tripwire_triggered
    }
}

/// Screening logic behind an [`InputGuardrail`].
#[async_trait]
pub trait InputGuardrailCheck: Send + Sync {
    /// Screen `input`, addressed to `agent_name`.
    async fn check(
        &self,
        context: &RunContext,
        agent_name: &str,
        input: &[Message],
    ) -> Result<GuardrailOutput>;
}

/// A check with a name for logs and results.
#[derive(Clone)]
pub struct InputGuardrail {
    name: String,
    check: Arc<dyn InputGuardrailCheck>,
}

impl InputGuardrail {
    /// Name a check.
    #[must_use]
    pub fn new(name: impl Into<String>, check: impl InputGuardrailCheck + 'static) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Guardrail name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Screen `input` once.
    ///
    /// # Errors
    ///
    /// Propagates any failure of the underlying check (for an LLM-backed
    /// check, the classification call itself).
    pub async fn run(
        &self,
        context: &RunContext,
        agent_name: &str,
        input: &[Message],
    ) -> Result<InputGuardrailResult> {
        let output = self.check.check(context, agent_name, input).await?;
        Ok(InputGuardrailResult {
            guardrail_name: self.name.clone(),
            output,
        })
    }
}

impl std::fmt::Debug for InputGuardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputGuardrail")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// What [`InputGuardrail::run`] found.
#[derive(Debug, Clone)]
pub struct InputGuardrailResult {
    /// Which guardrail ran.
    pub guardrail_name: String,

    /// Its verdict.
    pub output: GuardrailOutput,
}

impl InputGuardrailResult {
    /// Returns `true` if the tripwire was triggered.
    #[must_use]
    pub const fn is_triggered(&self) -> bool {
        self.output.tripwire_triggered
    }
}
