//! Orchestration of one claim run and the driver around it.
//!
//! - [`stage`]: the stages, their completion events and the hand-off machine
//! - [`Orchestrator`]: runs the guardrail and the three specialists in order
//!   and merges their outputs
//! - [`ClaimPipeline`]: loads inputs, runs the orchestrator, enforces the
//!   report contract and hands the report to document generation

mod driver;
mod orchestrator;
pub mod stage;

pub use driver::{ClaimPipeline, ClaimRequest, DEFAULT_CONCURRENCY};
pub use orchestrator::{ClaimRun, Orchestrator, Rejection, RunOutcome, StageOutputs};
pub use stage::{HandoffMachine, Stage, StageEvent};
