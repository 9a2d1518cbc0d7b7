//! The insurance claim domain.
//!
//! Structured outputs, the externally supplied records, the report and its
//! typed merge, and the agents and tools that produce each part.

mod agents;
mod guardrail;
mod records;
mod report;
mod schemas;
pub mod search;
mod task;
pub mod vision;

pub use agents::{CostEstimator, ImageAnalyst, RepairShopFinder, Specialist};
pub use guardrail::{CLAIM_GUARDRAIL_NAME, ClaimDomainGuardrail};
pub use records::{ClaimFields, CustomerRecord, RawClaim};
pub use report::{InsuranceReport, ReportMerge, default_report_date};
pub use schemas::{
    CostEstimate, DamageAssessment, GuardrailVerdict, RepairShopSet, ShopRecord, StructuredOutput,
};
pub use search::WebSearchTool;
pub use task::{ClaimTask, Photo};
pub use vision::VisionDamageTool;
