//! Tokens spent by a claim run.
//!
//! `Usage` deserializes both the OpenAI field names (`prompt_tokens`,
//! `completion_tokens`) and the provider-neutral ones, so a claim run can
//! report the tokens spent across every agent and tool call it made.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Tokens spent by one model call, or summed over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens.
    #[serde(default, alias = "prompt_tokens")]
    pub input_tokens: u32,

    /// Completion tokens.
    #[serde(default, alias = "completion_tokens")]
    pub output_tokens: u32,

    /// Prompt plus completion, as reported.
    #[serde(default)]
    pub total_tokens: u32,
}

impl Usage {
    /// Usage with the total derived.
    #[must_use]
    pub const fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
        }
    }

    /// Nothing spent.
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    /// No tokens recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total_tokens == 0 && self.input_tokens == 0 && self.output_tokens == 0
    }
}

impl Add for Usage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            input_tokens: self.input_tokens.saturating_add(rhs.input_tokens),
            output_tokens: self.output_tokens.saturating_add(rhs.output_tokens),
            total_tokens: self.total_tokens.saturating_add(rhs.total_tokens),
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn new_computes_total() {
        let usage = Usage::new(100, 50);
        assert_eq!(usage.total_tokens, 150);
        assert!(!usage.is_empty());
        assert!(Usage::zero().is_empty());
    }

    #[test]
    fn add_assign_accumulates() {
        let mut total = Usage::zero();
        total += Usage::new(10, 5);
        total += Usage::new(20, 10);
        assert_eq!(total, Usage::new(30, 15));
    }

    #[test]
    fn deserializes_openai_names() {
        let usage: Usage = serde_json::from_str(
            r#"{"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}"#,
        )
        .unwrap();
        assert_eq!(usage, Usage::new(12, 3));
    }
}
