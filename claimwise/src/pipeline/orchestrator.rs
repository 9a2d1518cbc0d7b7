//! The orchestrator: drives one claim through the hand-off machine.

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::claim::{
    ClaimTask, CostEstimate, CostEstimator, DamageAssessment, GuardrailVerdict, ImageAnalyst,
    InsuranceReport, RepairShopFinder, RepairShopSet, ReportMerge, Specialist, StructuredOutput,
};
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::guardrail::InputGuardrail;
use crate::message::Message;
use crate::usage::Usage;

use super::stage::{HandoffMachine, Stage, StageEvent};

/// Name the guardrail sees as its addressee.
const ORCHESTRATOR_NAME: &str = "claim_orchestrator";

/// Outputs accepted so far in one run. Each stage owns its slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageOutputs {
    /// Guardrail verdict.
    pub verdict: Option<GuardrailVerdict>,
    /// Image analyst output.
    pub damage: Option<DamageAssessment>,
    /// Cost estimator output.
    pub cost: Option<CostEstimate>,
    /// Repair shop finder output.
    pub shops: Option<RepairShopSet>,
    /// Merged report.
    pub report: Option<InsuranceReport>,
}

impl StageOutputs {
    /// The damage assessment.
    ///
    /// # Errors
    ///
    /// [`Error::MissingDependency`] naming `IMAGE_ANALYSIS` if absent.
    pub fn damage(&self) -> Result<&DamageAssessment> {
        self.damage
            .as_ref()
            .ok_or(Error::MissingDependency(Stage::ImageAnalysis))
    }

    /// The cost estimate.
    ///
    /// # Errors
    ///
    /// [`Error::MissingDependency`] naming `COST_ESTIMATION` if absent.
    pub fn cost(&self) -> Result<&CostEstimate> {
        self.cost
            .as_ref()
            .ok_or(Error::MissingDependency(Stage::CostEstimation))
    }

    /// The repair shop set.
    ///
    /// # Errors
    ///
    /// [`Error::MissingDependency`] naming `SHOP_SEARCH` if absent.
    pub fn shops(&self) -> Result<&RepairShopSet> {
        self.shops
            .as_ref()
            .ok_or(Error::MissingDependency(Stage::ShopSearch))
    }

    /// Store the payload of an accepted hand-off.
    pub fn absorb(&mut self, event: StageEvent) {
        match event {
            StageEvent::Verdict(verdict) => self.verdict = Some(verdict),
            StageEvent::DamageAssessed(damage) => self.damage = Some(damage),
            StageEvent::CostEstimated(cost) => self.cost = Some(cost),
            StageEvent::ShopsFound(shops) => self.shops = Some(shops),
            StageEvent::Merged(report) => self.report = Some(*report),
        }
    }
}

/// A run that reached `DONE`.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimRun {
    /// The merged report.
    pub report: InsuranceReport,
    /// Stages visited, `GUARDRAIL` through `DONE`.
    pub trace: Vec<Stage>,
    /// Tokens spent by the three specialists.
    pub usage: Usage,
    /// Document generation job, when one was submitted.
    pub document: Option<crate::docgen::BatchHandle>,
}

/// A run stopped by the guardrail.
#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    /// Why the request was rejected.
    pub verdict: GuardrailVerdict,
    /// `[GUARDRAIL, REJECTED]`.
    pub trace: Vec<Stage>,
}

/// How a claim run ended. A rejection is an outcome, not an error.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Report produced.
    Completed(Box<ClaimRun>),
    /// Out-of-domain request.
    Rejected(Rejection),
}

impl RunOutcome {
    /// Returns `true` for a rejected run.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// The report of a completed run.
    #[must_use]
    pub fn report(&self) -> Option<&InsuranceReport> {
        match self {
            Self::Completed(run) => Some(&run.report),
            Self::Rejected(_) => None,
        }
    }

    /// The final stage.
    #[must_use]
    pub const fn final_stage(&self) -> Stage {
        match self {
            Self::Completed(_) => Stage::Done,
            Self::Rejected(_) => Stage::Rejected,
        }
    }

    /// Stages visited.
    #[must_use]
    pub fn trace(&self) -> &[Stage] {
        match self {
            Self::Completed(run) => &run.trace,
            Self::Rejected(rejection) => &rejection.trace,
        }
    }
}

/// Owns the guardrail and the three specialists and sequences them.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    guardrail: InputGuardrail,
    image_analyst: ImageAnalyst,
    cost_estimator: CostEstimator,
    shop_finder: RepairShopFinder,
    today: Option<NaiveDate>,
}

impl Orchestrator {
    /// Assemble an orchestrator.
    #[must_use]
    pub const fn new(
        guardrail: InputGuardrail,
        image_analyst: ImageAnalyst,
        cost_estimator: CostEstimator,
        shop_finder: RepairShopFinder,
    ) -> Self {
        Self {
            guardrail,
            image_analyst,
            cost_estimator,
            shop_finder,
            today: None,
        }
    }

    /// Pin the date used for the report-date default fill.
    #[must_use]
    pub const fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Run one claim from `GUARDRAIL` to `DONE` or `REJECTED`.
    ///
    /// Stages run strictly one after another; each stage's output is
    /// validated before its completion event is applied.
    ///
    /// # Errors
    ///
    /// - [`Error::SchemaViolation`] when a specialist answer does not conform
    /// - [`Error::MissingDependency`] when a stage runs without its inputs
    /// - [`Error::InvalidTransition`] on an out-of-order hand-off
    /// - any external failure of the guardrail, a specialist or a tool
    pub async fn run(&self, task: &ClaimTask) -> Result<RunOutcome> {
        let mut machine = HandoffMachine::new();
        let mut outputs = StageOutputs::default();
        let mut usage = Usage::zero();

        while !machine.is_finished() {
            let stage = machine.current();
            let span = info_span!("stage", stage = %stage);
            let (event, spent) = self
                .run_stage(stage, task, &outputs)
                .instrument(span)
                .await?;
            usage += spent;

            let next = machine.apply(&event)?;
            info!(from = %stage, to = %next, event = event.name(), "Hand-off");
            outputs.absorb(event);
        }

        let trace = machine.into_trace();
        if let Some(report) = outputs.report {
            Ok(RunOutcome::Completed(Box::new(ClaimRun {
                report,
                trace,
                usage,
                document: None,
            })))
        } else {
            let verdict = outputs
                .verdict
                .ok_or(Error::MissingDependency(Stage::Guardrail))?;
            Ok(RunOutcome::Rejected(Rejection { verdict, trace }))
        }
    }

    async fn run_stage(
        &self,
        stage: Stage,
        task: &ClaimTask,
        outputs: &StageOutputs,
    ) -> Result<(StageEvent, Usage)> {
        debug!("Stage started");
        match stage {
            Stage::Guardrail => {
                let verdict = self.screen(task).await?;
                Ok((StageEvent::Verdict(verdict), Usage::zero()))
            }
            Stage::ImageAnalysis => {
                let (damage, spent) = run_specialist(&self.image_analyst, task, outputs).await?;
                Ok((StageEvent::DamageAssessed(damage), spent))
            }
            Stage::CostEstimation => {
                let (cost, spent) = run_specialist(&self.cost_estimator, task, outputs).await?;
                Ok((StageEvent::CostEstimated(cost), spent))
            }
            Stage::ShopSearch => {
                let (shops, spent) = run_specialist(&self.shop_finder, task, outputs).await?;
                if shops.is_empty() {
                    warn!("No repair shops found");
                }
                Ok((StageEvent::ShopsFound(shops), spent))
            }
            Stage::Merge => {
                let report = self.merge(task, outputs)?;
                Ok((StageEvent::Merged(Box::new(report)), Usage::zero()))
            }
            Stage::Done | Stage::Rejected => Err(Error::InvalidTransition {
                from: stage,
                event: "run",
            }),
        }
    }

    async fn screen(&self, task: &ClaimTask) -> Result<GuardrailVerdict> {
        let context = RunContext::new()
            .with_agent_name(ORCHESTRATOR_NAME)
            .with_claim_number(task.claim_number());
        let input = [Message::user(task.describe())];
        let result = self.guardrail.run(&context, ORCHESTRATOR_NAME, &input).await?;

        // Non-classifier guardrails report free-form info; synthesise a verdict.
        let verdict = serde_json::from_value::<GuardrailVerdict>(result.output.output_info.clone())
            .unwrap_or_else(|_| GuardrailVerdict {
                is_in_domain: !result.is_triggered(),
                reasoning: match &result.output.output_info {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Null => result.guardrail_name.clone(),
                    other => other.to_string(),
                },
            });
        if verdict.is_in_domain == result.is_triggered() {
            return Err(Error::agent(format!(
                "guardrail '{}' returned a verdict that contradicts its tripwire",
                result.guardrail_name
            )));
        }
        Ok(verdict)
    }

    fn merge(&self, task: &ClaimTask, outputs: &StageOutputs) -> Result<InsuranceReport> {
        let damage = outputs.damage()?;
        let cost = outputs.cost()?;
        let shops = outputs.shops()?;
        let report = ReportMerge::new(task.raw_claim(), task.customer())?.merge(
            damage,
            cost,
            shops,
            self.today(),
        );
        Ok(report)
    }
}

async fn run_specialist<S: Specialist>(
    specialist: &S,
    task: &ClaimTask,
    upstream: &StageOutputs,
) -> Result<(S::Output, Usage)> {
    let prompt = specialist.prompt(task, upstream)?;
    let result = specialist.agent_for(task).run(Message::user(prompt)).await?;
    let output: S::Output = result.parse()?;
    output.validate()?;
    debug!(agent = %result.agent_name, steps = result.steps, "Specialist output accepted");
    Ok((output, result.usage))
}
