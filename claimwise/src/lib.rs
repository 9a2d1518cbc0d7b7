//! Claimwise - guardrailed multi-agent processing of auto insurance claims.
//!
//! One claim runs through a fixed hand-off chain: a guardrail screens the
//! request, an image analyst describes the damage from the claim photos, a
//! cost estimator prices the repair, a repair shop finder looks up nearby
//! shops, and a typed merge combines everything with the raw claim into one
//! [`InsuranceReport`](claim::InsuranceReport).
//!
//! - [`agent`], [`chat`], [`tool`], [`guardrail`]: the agent runtime
//! - [`llms`]: chat providers (`OpenAI`, scripted mock)
//! - [`claim`]: structured outputs, records, the report and the specialists
//! - [`pipeline`]: the hand-off state machine, orchestrator and driver
//! - [`storage`], [`docgen`]: the external collaborators

pub mod agent;
pub mod chat;
pub mod claim;
pub mod context;
pub mod docgen;
pub mod error;
pub mod guardrail;
pub mod llms;
pub mod message;
pub mod pipeline;
pub mod prelude;
pub mod storage;
pub mod tool;
pub mod usage;

pub use error::{Error, LlmError, Result, ToolError};
