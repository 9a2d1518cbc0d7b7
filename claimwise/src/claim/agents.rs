//! The three specialist agents.
//!
//! A [`Specialist`] is an [`Agent`] bound to one stage and one structured
//! output. Its prompt is built from the [`ClaimTask`] and the outputs of the
//! stages before it; the orchestrator validates the answer before it accepts
//! the hand-off.

use std::borrow::Cow;
use std::sync::Arc;

use crate::agent::{Agent, OutputSchema};
use crate::chat::SharedChatProvider;
use crate::error::Result;
use crate::tool::Tool;
use crate::pipeline::{Stage, StageOutputs};

use super::schemas::{CostEstimate, DamageAssessment, RepairShopSet, StructuredOutput};
use super::search::WebSearchTool;
use super::task::ClaimTask;
use super::vision::VisionDamageTool;

/// Contract shared by every specialist.
pub trait Specialist: Send + Sync {
    /// Stage this specialist works in.
    const STAGE: Stage;

    /// Structured output the specialist must produce.
    type Output: StructuredOutput + Send;

    /// The configured agent.
    fn agent(&self) -> &Agent;

    /// The agent that runs `task`. Specialists whose tools depend on the
    /// task override this; the rest run [`agent`](Self::agent) as is.
    fn agent_for(&self, _task: &ClaimTask) -> Cow<'_, Agent> {
        Cow::Borrowed(self.agent())
    }

    /// Build the stage prompt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingDependency`](crate::Error::MissingDependency)
    /// when an upstream output the prompt needs is absent.
    fn prompt(&self, task: &ClaimTask, upstream: &StageOutputs) -> Result<String>;
}

fn specialist_agent<T: StructuredOutput>(
    name: &str,
    instructions: &str,
    provider: SharedChatProvider,
    model: &str,
) -> Agent {
    Agent::new(name)
        .instructions(instructions)
        .model(model)
        .provider(provider)
        .temperature(0.2)
        .output_schema(OutputSchema::from_type::<T>())
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

const IMAGE_ANALYST_INSTRUCTIONS: &str = "\
You are the image analyst of an auto insurance claims team. Call the \
`assess_vehicle_damage` tool exactly once with the label of every damage \
photo listed in the request (`photo_1`, `photo_2`, ...) and the vehicle \
year, make and model. Answer with the assessment \
the tool returns, unchanged, as the JSON object only.";

/// Describes the damage from the claim photos via the vision tool.
#[derive(Debug, Clone)]
pub struct ImageAnalyst {
    agent: Agent,
    vision: VisionDamageTool,
}

impl ImageAnalyst {
    /// Agent name.
    pub const NAME: &'static str = "image_analyst";

    /// Create the analyst.
    #[must_use]
    pub fn new(provider: SharedChatProvider, model: &str, vision: VisionDamageTool) -> Self {
        let agent = specialist_agent::<DamageAssessment>(
            Self::NAME,
            IMAGE_ANALYST_INSTRUCTIONS,
            provider,
            model,
        )
        .tool(Arc::new(vision.clone()));
        Self { agent, vision }
    }

    /// Set the reasoning step bound.
    #[must_use]
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.agent = self.agent.max_steps(max_steps);
        self
    }
}

impl Specialist for ImageAnalyst {
    const STAGE: Stage = Stage::ImageAnalysis;
    type Output = DamageAssessment;

    fn agent(&self) -> &Agent {
        &self.agent
    }

    /// The agent with a vision tool bound to this task's photos.
    fn agent_for(&self, task: &ClaimTask) -> Cow<'_, Agent> {
        let mut agent = self.agent.clone();
        agent
            .tools
            .retain(|tool| tool.name() != <VisionDamageTool as Tool>::NAME);
        Cow::Owned(agent.tool(Arc::new(self.vision.bind(task.photos()))))
    }

    fn prompt(&self, task: &ClaimTask, _upstream: &StageOutputs) -> Result<String> {
        Ok(format!(
            "{}\n\nAssess the vehicle damage shown in the damage photos.",
            task.describe()
        ))
    }
}

const COST_ESTIMATOR_INSTRUCTIONS: &str = "\
You are the repair cost estimator of an auto insurance claims team. From the \
vehicle and the damage assessment, estimate the total repair cost in US \
dollars including parts, paint and labor. Give the range as `$X - $Y`. \
Answer with the JSON object only.";

/// Estimates the repair cost from the damage assessment.
#[derive(Debug, Clone)]
pub struct CostEstimator {
    agent: Agent,
}

impl CostEstimator {
    /// Agent name.
    pub const NAME: &'static str = "cost_estimator";

    /// Create the estimator.
    #[must_use]
    pub fn new(provider: SharedChatProvider, model: &str) -> Self {
        Self {
            agent: specialist_agent::<CostEstimate>(
                Self::NAME,
                COST_ESTIMATOR_INSTRUCTIONS,
                provider,
                model,
            ),
        }
    }

    /// Set the reasoning step bound.
    #[must_use]
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.agent = self.agent.max_steps(max_steps);
        self
    }
}

impl Specialist for CostEstimator {
    const STAGE: Stage = Stage::CostEstimation;
    type Output = CostEstimate;

    fn agent(&self) -> &Agent {
        &self.agent
    }

    fn prompt(&self, task: &ClaimTask, upstream: &StageOutputs) -> Result<String> {
        let damage = upstream.damage()?;
        Ok(format!(
            "{}\n\nDamage assessment:\n{}\n\nEstimate the repair cost for the {}.",
            task.describe(),
            to_json(damage),
            task.customer().vehicle_identity()
        ))
    }
}

const SHOP_FINDER_INSTRUCTIONS: &str = "\
You find repair shops for an auto insurance claims team. Use the \
`web_search` tool to find up to three reputable collision repair shops near \
the customer's address that can repair the vehicle. Fill `slot_1`, `slot_2` \
and `slot_3` in order of preference with each shop's name, street address and \
phone number; set a slot to null when you cannot find a shop with all three. \
Answer with the JSON object only.";

/// Finds up to three repair shops near the customer.
#[derive(Debug, Clone)]
pub struct RepairShopFinder {
    agent: Agent,
}

impl RepairShopFinder {
    /// Agent name.
    pub const NAME: &'static str = "repair_shop_finder";

    /// Create the finder with its search tool.
    #[must_use]
    pub fn new(provider: SharedChatProvider, model: &str, search: WebSearchTool) -> Self {
        Self::with_search_tool(provider, model, Arc::new(search))
    }

    /// Create the finder with any tool registered as `web_search`.
    #[must_use]
    pub fn with_search_tool(
        provider: SharedChatProvider,
        model: &str,
        search: crate::tool::SharedTool,
    ) -> Self {
        let agent = specialist_agent::<RepairShopSet>(
            Self::NAME,
            SHOP_FINDER_INSTRUCTIONS,
            provider,
            model,
        )
        .tool(search);
        Self { agent }
    }

    /// Set the reasoning step bound.
    #[must_use]
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.agent = self.agent.max_steps(max_steps);
        self
    }
}

impl Specialist for RepairShopFinder {
    const STAGE: Stage = Stage::ShopSearch;
    type Output = RepairShopSet;

    fn agent(&self) -> &Agent {
        &self.agent
    }

    fn prompt(&self, task: &ClaimTask, upstream: &StageOutputs) -> Result<String> {
        let damage = upstream.damage()?;
        let cost = upstream.cost()?;
        let customer = task.customer();
        Ok(format!(
            "{}\n\nDamage: {}\nDamaged parts: {}\nEstimated repair cost: {}\n\n\
             Find repair shops near {} for the {}.",
            task.describe(),
            damage.description,
            damage.affected_parts.join(", "),
            cost.estimated_range,
            customer.customer_address,
            customer.vehicle_identity()
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::claim::{CustomerRecord, Photo, RawClaim};
    use crate::error::Error;
    use crate::llms::MockProvider;

    fn provider() -> SharedChatProvider {
        Arc::new(MockProvider::new())
    }

    fn task() -> ClaimTask {
        let customer: CustomerRecord = serde_json::from_value(json!({
            "customer_name": "Jane Doe",
            "customer_address": "123 Main St, Springfield, IL 62704",
            "customer_policy_number": "POL-1",
            "customer_vehicle_year": 2023,
            "customer_vehicle_make": "Honda",
            "customer_vehicle_model": "Civic"
        }))
        .unwrap();
        let raw = RawClaim::from_value(json!({"claim_number": "CLM-9"})).unwrap();
        ClaimTask::new(
            customer,
            raw,
            vec![Photo::new("photos/1.jpg", "data:image/jpeg;base64,/9j/AAAA")],
        )
    }

    fn with_damage() -> StageOutputs {
        let mut outputs = StageOutputs::default();
        outputs.damage = Some(DamageAssessment {
            description: "Front bumper crushed".into(),
            affected_parts: vec!["front bumper".into(), "radiator".into()],
        });
        outputs
    }

    mod image_analyst {
        use super::*;

        #[test]
        fn carries_vision_tool_and_schema() {
            let vision = VisionDamageTool::new(provider(), "gpt-4o");
            let analyst = ImageAnalyst::new(provider(), "gpt-4o", vision).max_steps(4);
            let agent = analyst.agent();
            assert_eq!(agent.name, ImageAnalyst::NAME);
            assert_eq!(agent.max_steps, 4);
            assert_eq!(agent.tool_definitions()[0].name(), "assess_vehicle_damage");
            assert_eq!(
                agent.output_schema.as_ref().unwrap().name(),
                "DamageAssessment"
            );
        }

        #[test]
        fn prompt_lists_photo_labels_not_urls() {
            let vision = VisionDamageTool::new(provider(), "gpt-4o");
            let analyst = ImageAnalyst::new(provider(), "gpt-4o", vision);
            let prompt = analyst.prompt(&task(), &StageOutputs::default()).unwrap();
            assert!(prompt.contains("photo_1 (photos/1.jpg)"));
            assert!(!prompt.contains("data:"));
            assert!(prompt.contains("2023 Honda Civic"));
        }

        #[test]
        fn agent_for_swaps_in_one_bound_vision_tool() {
            let vision = VisionDamageTool::new(provider(), "gpt-4o");
            let analyst = ImageAnalyst::new(provider(), "gpt-4o", vision);
            let agent = analyst.agent_for(&task());
            assert!(matches!(agent, Cow::Owned(_)));
            assert_eq!(agent.tools.len(), 1);
            assert_eq!(agent.tools[0].name(), "assess_vehicle_damage");
        }
    }

    mod cost_estimator {
        use super::*;

        #[test]
        fn prompt_needs_damage() {
            let estimator = CostEstimator::new(provider(), "gpt-4o");
            let err = estimator
                .prompt(&task(), &StageOutputs::default())
                .unwrap_err();
            assert!(matches!(err, Error::MissingDependency(Stage::ImageAnalysis)));
        }

        #[test]
        fn prompt_embeds_damage() {
            let estimator = CostEstimator::new(provider(), "gpt-4o");
            let prompt = estimator.prompt(&task(), &with_damage()).unwrap();
            assert!(prompt.contains("\"damaged_parts_list\""));
            assert!(prompt.contains("radiator"));
            assert!(estimator.agent().tools.is_empty());
            assert!(matches!(estimator.agent_for(&task()), Cow::Borrowed(_)));
        }
    }

    mod shop_finder {
        use super::*;
        use std::time::Duration;

        #[test]
        fn prompt_needs_cost() {
            let search = WebSearchTool::new(Duration::from_secs(5)).unwrap();
            let finder = RepairShopFinder::new(provider(), "gpt-4o", search);
            let err = finder.prompt(&task(), &with_damage()).unwrap_err();
            assert!(matches!(err, Error::MissingDependency(Stage::CostEstimation)));
        }

        #[test]
        fn prompt_embeds_address_and_estimate() {
            let search = WebSearchTool::new(Duration::from_secs(5)).unwrap();
            let finder = RepairShopFinder::new(provider(), "gpt-4o", search);
            let mut outputs = with_damage();
            outputs.cost = Some(CostEstimate {
                estimated_range: "$1,200 - $2,400".into(),
            });
            let prompt = finder.prompt(&task(), &outputs).unwrap();
            assert!(prompt.contains("near 123 Main St, Springfield, IL 62704"));
            assert!(prompt.contains("$1,200 - $2,400"));
            assert!(prompt.contains("front bumper, radiator"));
            assert_eq!(finder.agent().tool_definitions()[0].name(), "web_search");
        }
    }
}
