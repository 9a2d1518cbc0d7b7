//! What a guardrail check or agent run knows about where it is.

use crate::usage::Usage;

/// Run-scoped state: which agent, which claim, how far along, at what cost.
///
/// ```rust
/// use claimwise::context::RunContext;
///
/// let ctx = RunContext::new()
///     .with_agent_name("claim_orchestrator")
///     .with_claim_number("CLM-1042");
///
/// assert_eq!(ctx.claim_number(), Some("CLM-1042"));
/// assert_eq!(ctx.step(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    agent_name: Option<String>,
    claim_number: Option<String>,
    /// 0 before the first model call, then 1-based.
    step: usize,
    usage: Usage,
}

impl RunContext {
    /// Empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the running agent.
    #[must_use]
    pub fn with_agent_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = Some(name.into());
        self
    }

    /// Attach the claim being processed.
    #[must_use]
    pub fn with_claim_number(mut self, claim_number: impl Into<String>) -> Self {
        self.claim_number = Some(claim_number.into());
        self
    }

    /// The running agent.
    #[must_use]
    pub fn agent_name(&self) -> Option<&str> {
        self.agent_name.as_deref()
    }

    /// The claim being processed.
    #[must_use]
    pub fn claim_number(&self) -> Option<&str> {
        self.claim_number.as_deref()
    }

    /// Model calls made so far.
    #[must_use]
    pub const fn step(&self) -> usize {
        self.step
    }

    /// Tokens spent so far.
    #[must_use]
    pub const fn usage(&self) -> &Usage {
        &self.usage
    }

    /// Count one more model call.
    pub const fn advance_step(&mut self) {
        self.step += 1;
    }

    /// Add the usage of one model call.
    pub fn add_usage(&mut self, usage: Usage) {
        self.usage += usage;
    }
}
