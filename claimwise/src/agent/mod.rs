//! Agent runtime: configuration, results and the execution loop.
//!
//! - [`Agent`]: a self-contained specialist with its own provider
//! - [`OutputSchema`]: the strict JSON schema an agent's answer must satisfy
//! - [`Runner`]: the stateless engine that drives an agent to its final output
//! - [`RunResult`]: the output plus usage and step history

mod config;
mod result;
mod runner;

pub use config::{Agent, DEFAULT_MAX_STEPS, OutputSchema, ensure_strict_schema};
pub use result::{NextStep, RunResult, StepInfo, ToolCallRecord, ToolCallRequest};
pub use runner::Runner;
