//! Claim run stages and the hand-off state machine.
//!
//! A run moves through a fixed, linear chain:
//!
//! ```text
//! GUARDRAIL ─in_domain──▶ IMAGE_ANALYSIS ─damage_assessed──▶ COST_ESTIMATION
//!     │                                                          │
//! out_of_domain                                            cost_estimated
//!     ▼                                                          ▼
//! REJECTED              DONE ◀──merged── MERGE ◀──shops_found── SHOP_SEARCH
//! ```
//!
//! Stages hand off by emitting a [`StageEvent`]. The [`HandoffMachine`] looks
//! the event up in its transition table; an event that has no entry for the
//! current stage is an [`Error::InvalidTransition`], and the terminal stages
//! accept nothing.

use std::fmt;

use serde::Serialize;

use crate::claim::{CostEstimate, DamageAssessment, GuardrailVerdict, InsuranceReport, RepairShopSet};
use crate::error::{Error, Result};

/// One state of a claim run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    /// Domain screening of the request.
    Guardrail,
    /// Image analyst at work.
    ImageAnalysis,
    /// Cost estimator at work.
    CostEstimation,
    /// Repair shop finder at work.
    ShopSearch,
    /// Typed merge of all outputs.
    Merge,
    /// Report produced.
    Done,
    /// Request was out of domain.
    Rejected,
}

impl Stage {
    /// Returns the stage identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guardrail => "GUARDRAIL",
            Self::ImageAnalysis => "IMAGE_ANALYSIS",
            Self::CostEstimation => "COST_ESTIMATION",
            Self::ShopSearch => "SHOP_SEARCH",
            Self::Merge => "MERGE",
            Self::Done => "DONE",
            Self::Rejected => "REJECTED",
        }
    }

    /// Returns `true` for `DONE` and `REJECTED`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Rejected)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completion event of a stage, carrying the stage's validated output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    /// The guardrail classified the request.
    Verdict(GuardrailVerdict),
    /// The image analyst produced a damage assessment.
    DamageAssessed(DamageAssessment),
    /// The cost estimator produced an estimate.
    CostEstimated(CostEstimate),
    /// The repair shop finder produced a shop set.
    ShopsFound(RepairShopSet),
    /// The merge produced the report.
    Merged(Box<InsuranceReport>),
}

impl StageEvent {
    /// Event key used in the transition table.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Verdict(verdict) if verdict.is_in_domain => "in_domain",
            Self::Verdict(_) => "out_of_domain",
            Self::DamageAssessed(_) => "damage_assessed",
            Self::CostEstimated(_) => "cost_estimated",
            Self::ShopsFound(_) => "shops_found",
            Self::Merged(_) => "merged",
        }
    }
}

/// `(from, event, to)` entries; anything absent is illegal.
const TRANSITIONS: [(Stage, &str, Stage); 6] = [
    (Stage::Guardrail, "in_domain", Stage::ImageAnalysis),
    (Stage::Guardrail, "out_of_domain", Stage::Rejected),
    (Stage::ImageAnalysis, "damage_assessed", Stage::CostEstimation),
    (Stage::CostEstimation, "cost_estimated", Stage::ShopSearch),
    (Stage::ShopSearch, "shops_found", Stage::Merge),
    (Stage::Merge, "merged", Stage::Done),
];

/// Look up the successor of `from` on `event`.
#[must_use]
pub fn next_stage(from: Stage, event: &str) -> Option<Stage> {
    TRANSITIONS
        .iter()
        .find(|(f, e, _)| *f == from && *e == event)
        .map(|(_, _, to)| *to)
}

/// The hand-off state machine of one claim run.
#[derive(Debug, Clone)]
pub struct HandoffMachine {
    current: Stage,
    trace: Vec<Stage>,
}

impl HandoffMachine {
    /// Start a run at `GUARDRAIL`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: Stage::Guardrail,
            trace: vec![Stage::Guardrail],
        }
    }

    /// The current stage.
    #[must_use]
    pub const fn current(&self) -> Stage {
        self.current
    }

    /// Every stage visited so far, starting with `GUARDRAIL`.
    #[must_use]
    pub fn trace(&self) -> &[Stage] {
        &self.trace
    }

    /// Consume the machine and return its trace.
    #[must_use]
    pub fn into_trace(self) -> Vec<Stage> {
        self.trace
    }

    /// Returns `true` once the run reached `DONE` or `REJECTED`.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.current.is_terminal()
    }

    /// Apply a completion event and move to the next stage.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if the table has no entry for the
    /// current stage and this event. The machine is left unchanged.
    pub fn apply(&mut self, event: &StageEvent) -> Result<Stage> {
        let name = event.name();
        let next = next_stage(self.current, name).ok_or(Error::InvalidTransition {
            from: self.current,
            event: name,
        })?;
        self.current = next;
        self.trace.push(next);
        Ok(next)
    }
}

impl Default for HandoffMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn verdict(in_domain: bool) -> StageEvent {
        StageEvent::Verdict(GuardrailVerdict {
            is_in_domain: in_domain,
            reasoning: "r".into(),
        })
    }

    fn damage() -> StageEvent {
        StageEvent::DamageAssessed(DamageAssessment {
            description: "dent".into(),
            affected_parts: vec!["door".into()],
        })
    }

    fn cost() -> StageEvent {
        StageEvent::CostEstimated(CostEstimate {
            estimated_range: "$1 - $2".into(),
        })
    }

    mod stage {
        use super::*;

        #[test]
        fn display_uses_identifiers() {
            assert_eq!(Stage::ImageAnalysis.to_string(), "IMAGE_ANALYSIS");
            assert_eq!(Stage::Rejected.to_string(), "REJECTED");
            assert_eq!(serde_json::to_value(Stage::ShopSearch).unwrap(), "SHOP_SEARCH");
        }

        #[test]
        fn only_done_and_rejected_are_terminal() {
            assert!(Stage::Done.is_terminal());
            assert!(Stage::Rejected.is_terminal());
            assert!(!Stage::Merge.is_terminal());
        }
    }

    mod table {
        use super::*;

        #[test]
        fn chain_is_linear() {
            assert_eq!(next_stage(Stage::Guardrail, "in_domain"), Some(Stage::ImageAnalysis));
            assert_eq!(next_stage(Stage::Guardrail, "out_of_domain"), Some(Stage::Rejected));
            assert_eq!(next_stage(Stage::Merge, "merged"), Some(Stage::Done));
            assert_eq!(next_stage(Stage::ImageAnalysis, "cost_estimated"), None);
        }

        #[test]
        fn terminal_stages_have_no_exits() {
            for (from, _, _) in TRANSITIONS {
                assert!(!from.is_terminal());
            }
        }

        #[test]
        fn no_stage_is_entered_twice() {
            let mut targets: Vec<Stage> = TRANSITIONS.iter().map(|(_, _, to)| *to).collect();
            let len = targets.len();
            targets.sort_by_key(|stage| stage.as_str());
            targets.dedup();
            assert_eq!(targets.len(), len);
        }
    }

    mod machine {
        use super::*;

        #[test]
        fn in_domain_run_reaches_merge() {
            let mut machine = HandoffMachine::new();
            machine.apply(&verdict(true)).unwrap();
            machine.apply(&damage()).unwrap();
            machine.apply(&cost()).unwrap();
            machine
                .apply(&StageEvent::ShopsFound(RepairShopSet::default()))
                .unwrap();
            assert_eq!(machine.current(), Stage::Merge);
            assert_eq!(
                machine.trace(),
                [
                    Stage::Guardrail,
                    Stage::ImageAnalysis,
                    Stage::CostEstimation,
                    Stage::ShopSearch,
                    Stage::Merge
                ]
            );
            assert!(!machine.is_finished());
        }

        #[test]
        fn out_of_domain_is_terminal() {
            let mut machine = HandoffMachine::new();
            assert_eq!(machine.apply(&verdict(false)).unwrap(), Stage::Rejected);
            assert!(machine.is_finished());
            let err = machine.apply(&damage()).unwrap_err();
            match err {
                Error::InvalidTransition { from, event } => {
                    assert_eq!(from, Stage::Rejected);
                    assert_eq!(event, "damage_assessed");
                }
                other => panic!("expected InvalidTransition, got {other:?}"),
            }
        }

        #[test]
        fn skipping_a_stage_is_rejected_and_leaves_state() {
            let mut machine = HandoffMachine::new();
            machine.apply(&verdict(true)).unwrap();
            assert!(machine.apply(&cost()).is_err());
            assert_eq!(machine.current(), Stage::ImageAnalysis);
            assert_eq!(machine.trace().len(), 2);
        }

        #[test]
        fn agents_cannot_be_re_entered() {
            let mut machine = HandoffMachine::new();
            machine.apply(&verdict(true)).unwrap();
            machine.apply(&damage()).unwrap();
            assert!(machine.apply(&damage()).is_err());
            assert!(machine.apply(&verdict(true)).is_err());
        }
    }
}
