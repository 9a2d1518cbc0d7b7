//! Prelude module for convenient imports.
//!
//! # Usage
//!
//! ```rust,ignore
//! use claimwise::prelude::*;
//! ```

pub use crate::agent::{
    Agent, NextStep, OutputSchema, RunResult, Runner, StepInfo, ToolCallRecord, ToolCallRequest,
};
pub use crate::chat::{
    ChatProvider, ChatRequest, ChatResponse, ResponseFormat, SharedChatProvider, StopReason,
    ToolChoice,
};
pub use crate::claim::{
    ClaimDomainGuardrail, ClaimFields, ClaimTask, CostEstimate, CostEstimator, CustomerRecord,
    DamageAssessment, GuardrailVerdict, ImageAnalyst, InsuranceReport, Photo, RawClaim,
    RepairShopFinder, RepairShopSet, ReportMerge, ShopRecord, Specialist, StructuredOutput, VisionDamageTool,
    WebSearchTool,
};
pub use crate::context::RunContext;
pub use crate::docgen::{BatchHandle, DocGenRequest, DocGenTarget, DocumentGenerator, OutputFormat};
pub use crate::error::{Error, LlmError, Result, ToolError};
pub use crate::guardrail::{GuardrailOutput, InputGuardrail, InputGuardrailCheck};
pub use crate::llms::{MockProvider, OpenAI, OpenAIConfig};
pub use crate::message::{Content, ContentPart, ImageDetail, Message, Role, ToolCall};
pub use crate::pipeline::{
    ClaimPipeline, ClaimRequest, ClaimRun, Orchestrator, RunOutcome, Stage, StageEvent,
};
pub use crate::storage::{BoxClient, ContentStore, LocalStore, RecordSource};
pub use crate::tool::{DynTool, SharedTool, Tool, ToolDefinition, ToolResult};
pub use crate::usage::Usage;
