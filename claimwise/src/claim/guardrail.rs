//! The claim domain classifier run in the `GUARDRAIL` stage.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::agent::OutputSchema;
use crate::chat::{ChatRequest, SharedChatProvider};
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::guardrail::{GuardrailOutput, InputGuardrail, InputGuardrailCheck};
use crate::message::Message;

use super::schemas::{GuardrailVerdict, StructuredOutput};

/// Name under which the classifier is registered.
pub const CLAIM_GUARDRAIL_NAME: &str = "claim_domain";

const GUARDRAIL_INSTRUCTIONS: &str = "\
You screen requests sent to an auto insurance claims pipeline. A request is \
in domain when it asks to process, assess or report on a vehicle insurance \
claim: vehicle damage, repair costs, repair shops, the policy holder or the \
claim data. Anything else is out of domain.

Answer with the JSON object only: `is_in_domain` and a one-sentence \
`reasoning`.";

/// LLM classifier that emits a [`GuardrailVerdict`].
///
/// The tripwire triggers when the verdict is out of domain. The serialized
/// verdict is returned as the guardrail's `output_info`.
#[derive(Clone)]
pub struct ClaimDomainGuardrail {
    provider: SharedChatProvider,
    model: String,
}

impl ClaimDomainGuardrail {
    /// Create a classifier calling `model` through `provider`.
    #[must_use]
    pub fn new(provider: SharedChatProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Wrap the classifier into a named [`InputGuardrail`].
    #[must_use]
    pub fn into_guardrail(self) -> InputGuardrail {
        InputGuardrail::new(CLAIM_GUARDRAIL_NAME, self)
    }

    /// Classify the input and return the typed verdict.
    ///
    /// # Errors
    ///
    /// Propagates the classification call failure; returns
    /// [`Error::SchemaViolation`] when the answer is not a verdict.
    pub async fn classify(&self, input: &[Message]) -> Result<GuardrailVerdict> {
        let schema = OutputSchema::from_type::<GuardrailVerdict>();
        let mut messages = Vec::with_capacity(input.len() + 1);
        messages.push(Message::system(GUARDRAIL_INSTRUCTIONS));
        messages.extend_from_slice(input);

        let request = ChatRequest::with_messages(self.model.as_str(), messages)
            .temperature(0.0)
            .response_format(schema.to_response_format());
        let response = self.provider.chat(&request).await?;

        let text = response.text().unwrap_or_default();
        let verdict: GuardrailVerdict = serde_json::from_str(&text)
            .map_err(|e| Error::schema_violation(GuardrailVerdict::SCHEMA, e.to_string()))?;
        verdict.validate()?;
        Ok(verdict)
    }
}

impl std::fmt::Debug for ClaimDomainGuardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimDomainGuardrail")
            .field("provider", &self.provider.provider_name())
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl InputGuardrailCheck for ClaimDomainGuardrail {
    async fn check(
        &self,
        context: &RunContext,
        agent_name: &str,
        input: &[Message],
    ) -> Result<GuardrailOutput> {
        let verdict = self.classify(input).await?;
        let info = serde_json::to_value(&verdict)?;
        if verdict.is_in_domain {
            debug!(agent = agent_name, claim = ?context.claim_number(), "Request is in domain");
            Ok(GuardrailOutput::pass_with_info(info))
        } else {
            warn!(
                agent = agent_name,
                claim = ?context.claim_number(),
                reasoning = %verdict.reasoning,
                "Request is out of domain"
            );
            Ok(GuardrailOutput::tripwire(info))
        }
    }
}
