//! End-to-end claim runs over scripted models and a temporary claim store.

#![allow(clippy::unwrap_used, clippy::panic, clippy::clone_on_ref_ptr)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use assert_fs::TempDir;
use assert_fs::prelude::*;
use async_trait::async_trait;
use chrono::NaiveDate;
use claimwise::prelude::*;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

const CUSTOMER: &str = r#"{
    "customer_name": "Jane Doe",
    "customer_email": "jane@example.com",
    "customer_phone": "(217) 555-0100",
    "customer_address": "123 Main St, Springfield, IL 62704",
    "customer_policy_number": "POL-2023-001",
    "customer_vehicle_year": 2023,
    "customer_vehicle_make": "Honda",
    "customer_vehicle_model": "Civic",
    "customer_vehicle_vin": "2HGFE2F59PH000001",
    "customer_license_plate": "IL ABC123"
}"#;

const VERDICT_IN: &str = r#"{"is_in_domain": true, "reasoning": "Vehicle damage claim."}"#;
const VERDICT_OUT: &str = r#"{"is_in_domain": false, "reasoning": "Asks for a recipe."}"#;
const DAMAGE: &str = r#"{"description": "Front-end collision: bumper cover cracked, hood buckled, left headlamp broken.", "damaged_parts_list": ["front bumper cover", "hood", "left headlamp", "front crash absorber"]}"#;
const COST: &str = r#"{"estimated_range": "$3,200 – $4,800"}"#;
const SHOPS: &str = r#"{
    "slot_1": {"name": "Springfield Collision Center", "address": "400 Elm St, Springfield, IL 62704", "phone": "(217) 555-0101"},
    "slot_2": {"name": "Capitol Auto Body", "address": "88 Oak Ave, Springfield, IL 62702", "phone": "(217) 555-0102"},
    "slot_3": null
}"#;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

/// Route pipeline logs to the test output; `RUST_LOG=claimwise=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Search tool that counts its calls.
#[derive(Default)]
struct CountingSearch {
    calls: AtomicUsize,
}

#[async_trait]
impl Tool for CountingSearch {
    const NAME: &'static str = "web_search";
    type Args = Value;
    type Output = String;
    type Error = ToolError;

    fn description(&self) -> String {
        "Search the web.".into()
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"query": {"type": "string"}}, "required": ["query"]})
    }

    async fn call(&self, _args: Value) -> std::result::Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("## Search Results\n\n[Springfield Collision Center](https://scc.example)\n400 Elm St, (217) 555-0101\n".into())
    }
}

/// Document generator that records its jobs.
#[derive(Default)]
struct Recorder {
    jobs: std::sync::Mutex<Vec<DocGenRequest>>,
}

#[async_trait]
impl DocumentGenerator for Recorder {
    async fn submit(&self, request: &DocGenRequest) -> Result<BatchHandle> {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.push(request.clone());
        Ok(BatchHandle {
            id: format!("batch-{}", jobs.len()),
        })
    }
}

struct Harness {
    _dir: TempDir,
    mock: Arc<MockProvider>,
    search: Arc<CountingSearch>,
    documents: Arc<Recorder>,
    pipeline: ClaimPipeline,
}

fn harness(mock: MockProvider, claim: &Value) -> Harness {
    init_tracing();
    let dir = TempDir::new().unwrap();
    dir.child("customers/jane-doe.json").write_str(CUSTOMER).unwrap();
    dir.child("claims/clm-2026-0042.json")
        .write_str(&claim.to_string())
        .unwrap();
    let mut jpeg = vec![0xFF, 0xD8, 0xFF];
    jpeg.resize(256 * 1024, 0xA5);
    dir.child("photos/front.jpg").write_binary(&jpeg).unwrap();
    dir.child("photos/left.jpg").write_binary(&[0xFF, 0xD8, 0xFE]).unwrap();

    let mock = Arc::new(mock);
    let provider: SharedChatProvider = mock.clone();
    let search = Arc::new(CountingSearch::default());
    let documents = Arc::new(Recorder::default());

    let orchestrator = Orchestrator::new(
        ClaimDomainGuardrail::new(provider.clone(), "gpt-4o-mini").into_guardrail(),
        ImageAnalyst::new(
            provider.clone(),
            "gpt-4o",
            VisionDamageTool::new(provider.clone(), "gpt-4o"),
        ),
        CostEstimator::new(provider.clone(), "gpt-4o"),
        RepairShopFinder::with_search_tool(provider, "gpt-4o", search.clone()),
    )
    .with_today(today());

    let store = Arc::new(LocalStore::new(dir.path()));
    let pipeline = ClaimPipeline::new(orchestrator, store.clone(), store)
        .with_document_generator(
            documents.clone(),
            DocGenTarget {
                template_id: "tpl-adjuster-report".into(),
                folder_id: "fld-reports".into(),
                output_format: OutputFormat::Pdf,
            },
        );

    Harness {
        _dir: dir,
        mock,
        search,
        documents,
        pipeline,
    }
}

fn request() -> ClaimRequest {
    ClaimRequest {
        claim_id: "claims/clm-2026-0042".into(),
        customer_id: "customers/jane-doe".into(),
        image_ids: vec!["photos/front.jpg".into(), "photos/left.jpg".into()],
    }
}

fn claim(report_date: &str) -> Value {
    json!({
        "claim_number": "CLM-2026-0042",
        "report_date": report_date,
        "adjuster_name": "Sam Carter",
        "date_of_loss": "2026-10-12",
        "time_of_loss": "17:40",
        "location_of_loss": "Monroe St & 5th St, Springfield, IL",
        "police_report_number": "SPD-26-11873",
        "vehicles_involved": 2,
        "injuries_reported": 0,
        "witnesses": "One pedestrian",
        "incident_description": "Rear-ended a stopped vehicle at a red light."
    })
}

fn vision_call() -> ToolCall {
    ToolCall::function(
        "call_vision",
        "assess_vehicle_damage",
        r#"{"photos": ["photo_1", "photo_2"], "vehicle_year": 2023, "vehicle_make": "Honda", "vehicle_model": "Civic"}"#,
    )
}

fn search_call() -> ToolCall {
    ToolCall::function(
        "call_search",
        "web_search",
        r#"{"query": "collision repair shop near 123 Main St Springfield IL 62704"}"#,
    )
}

/// One complete in-domain run: the analyst calls the vision tool, the shop
/// finder calls the search tool.
fn script_run(mock: MockProvider) -> MockProvider {
    mock.on_schema("GuardrailVerdict", VERDICT_IN)
        .on_schema_tool_call("DamageAssessment", vision_call())
        .on_schema("DamageAssessment", DAMAGE)
        .on_schema("DamageAssessment", DAMAGE)
        .on_schema("CostEstimate", COST)
        .on_schema_tool_call("RepairShopSet", search_call())
        .on_schema("RepairShopSet", SHOPS)
}

fn completed(outcome: RunOutcome) -> ClaimRun {
    match outcome {
        RunOutcome::Completed(run) => *run,
        RunOutcome::Rejected(rejection) => panic!("unexpected rejection: {rejection:?}"),
    }
}

#[tokio::test]
async fn honda_civic_claim_produces_a_full_report() {
    let h = harness(script_run(MockProvider::new()), &claim("2026-10-17"));
    let run = completed(h.pipeline.process_insurance_claim(&request()).await.unwrap());
    let report = &run.report;

    assert_eq!(report.claim_number, "CLM-2026-0042");
    assert!(!report.claim.damage_description.trim().is_empty());
    assert!(!report.claim.affected_parts.is_empty());
    let (low, high) = CostEstimate {
        estimated_range: report.claim.estimated_repair_cost.clone(),
    }
    .bounds()
    .unwrap();
    assert!(low <= high);
    let first = report.repair_shops.shops().next().unwrap();
    assert!(!first.name.is_empty() && !first.address.is_empty() && !first.phone.is_empty());

    assert_eq!(report.customer.vehicle_identity(), "2023 Honda Civic");
    assert_eq!(report.claim.adjuster_name, "Sam Carter");
    assert_eq!(report.claim.vehicles_involved, 2);
    assert_eq!(
        run.trace,
        [
            Stage::Guardrail,
            Stage::ImageAnalysis,
            Stage::CostEstimation,
            Stage::ShopSearch,
            Stage::Merge,
            Stage::Done
        ]
    );
    assert_eq!(h.search.calls.load(Ordering::SeqCst), 1);
    assert_eq!(run.document.unwrap().id, "batch-1");
}

#[tokio::test]
async fn photos_reach_only_the_vision_call_as_data_urls() {
    let h = harness(script_run(MockProvider::new()), &claim("2026-10-17"));
    h.pipeline.process_insurance_claim(&request()).await.unwrap();

    let guard = &h.mock.requests_for("GuardrailVerdict")[0];
    let text = guard.messages.last().unwrap().text().unwrap();
    assert!(text.contains("123 Main St, Springfield, IL 62704"));
    assert!(text.contains("2023 Honda Civic"));
    assert!(text.contains("- photo_1 (photos/front.jpg)"));
    assert!(text.contains("- photo_2 (photos/left.jpg)"));
    assert!(text.contains("CLM-2026-0042"));
    assert!(text.len() < 4096);

    // analyst step 1, vision call, analyst step 2
    let damage_requests = h.mock.requests_for("DamageAssessment");
    assert_eq!(damage_requests.len(), 3);
    let urls = damage_requests[1].messages[1].image_urls();
    assert_eq!(urls.len(), 2);
    assert!(urls.iter().all(|url| url.starts_with("data:image/jpeg;base64,")));
    assert!(urls[0].len() > 256 * 1024);
}

#[tokio::test]
async fn no_text_or_tool_arguments_carry_photo_data() {
    let h = harness(script_run(MockProvider::new()), &claim("2026-10-17"));
    h.pipeline.process_insurance_claim(&request()).await.unwrap();

    let requests = h.mock.requests();
    assert_eq!(requests.len(), 7);
    for request in &requests {
        for message in &request.messages {
            if let Some(text) = message.text() {
                assert!(!text.contains("data:"), "photo data in {:?} text", message.role);
            }
            for call in message.tool_calls.iter().flatten() {
                assert!(!call.arguments_value().to_string().contains("data:"));
            }
        }
    }
}

#[tokio::test]
async fn out_of_domain_request_makes_no_specialist_calls() {
    let mock = MockProvider::new()
        .on_schema("GuardrailVerdict", VERDICT_OUT)
        .on_schema("DamageAssessment", DAMAGE)
        .on_schema("CostEstimate", COST)
        .on_schema("RepairShopSet", SHOPS);
    let h = harness(mock, &claim(""));
    let outcome = h.pipeline.process_insurance_claim(&request()).await.unwrap();

    assert!(outcome.is_rejected());
    assert_eq!(outcome.final_stage(), Stage::Rejected);
    assert_eq!(outcome.trace(), [Stage::Guardrail, Stage::Rejected]);
    assert_eq!(h.mock.call_count(), 1);
    assert!(h.mock.requests_for("DamageAssessment").is_empty());
    assert_eq!(h.search.calls.load(Ordering::SeqCst), 0);
    assert!(h.documents.jobs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn vision_output_without_parts_list_fails_the_run() {
    let mock = MockProvider::new()
        .on_schema("GuardrailVerdict", VERDICT_IN)
        .on_schema_tool_call("DamageAssessment", vision_call())
        .on_schema(
            "DamageAssessment",
            r#"{"description": "Front-end collision."}"#,
        )
        .on_schema("DamageAssessment", DAMAGE)
        .on_schema("CostEstimate", COST);
    let h = harness(mock, &claim(""));
    let err = h
        .pipeline
        .process_insurance_claim(&request())
        .await
        .unwrap_err();

    match err {
        Error::SchemaViolation { schema, message } => {
            assert_eq!(schema, "DamageAssessment");
            assert!(message.contains("damaged_parts_list"));
        }
        other => panic!("expected SchemaViolation, got {other:?}"),
    }
    assert!(h.mock.requests_for("CostEstimate").is_empty());
    assert!(h.documents.jobs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn prose_answer_from_a_specialist_is_a_schema_violation() {
    let mock = MockProvider::new()
        .on_schema("GuardrailVerdict", VERDICT_IN)
        .on_schema("DamageAssessment", DAMAGE)
        .on_schema("CostEstimate", "Roughly $3,000 to $5,000.");
    let h = harness(mock, &claim(""));
    let err = h
        .pipeline
        .process_insurance_claim(&request())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SchemaViolation { .. }));
    assert!(h.mock.requests_for("RepairShopSet").is_empty());
}

#[tokio::test]
async fn service_failure_propagates_without_retry() {
    let mock = MockProvider::new()
        .on_schema("GuardrailVerdict", VERDICT_IN)
        .on_schema("DamageAssessment", DAMAGE)
        .on_schema_error("CostEstimate", LlmError::http_status(503, "unavailable"))
        .on_schema("CostEstimate", COST);
    let h = harness(mock, &claim(""));
    let err = h
        .pipeline
        .process_insurance_claim(&request())
        .await
        .unwrap_err();
    assert!(err.is_external());
    assert_eq!(h.mock.requests_for("CostEstimate").len(), 1);
}

#[tokio::test]
async fn two_runs_on_identical_inputs_both_validate() {
    let h = harness(
        script_run(script_run(MockProvider::new())),
        &claim("2026-10-17"),
    );
    let first = completed(h.pipeline.process_insurance_claim(&request()).await.unwrap());
    let second = completed(h.pipeline.process_insurance_claim(&request()).await.unwrap());

    for run in [&first, &second] {
        run.report.validate("CLM-2026-0042").unwrap();
        assert!(!run.report.claim.affected_parts.is_empty());
    }
    assert_eq!(h.documents.jobs.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn blank_report_date_is_filled_with_today() {
    let h = harness(script_run(MockProvider::new()), &claim("   "));
    let run = completed(h.pipeline.process_insurance_claim(&request()).await.unwrap());
    assert_eq!(run.report.claim.report_date, "2026-10-18");
}

#[tokio::test]
async fn supplied_report_date_is_preserved() {
    let h = harness(script_run(MockProvider::new()), &claim("2026-10-17"));
    let run = completed(h.pipeline.process_insurance_claim(&request()).await.unwrap());
    assert_eq!(run.report.claim.report_date, "2026-10-17");
}

#[tokio::test]
async fn document_payload_flattens_affected_parts() {
    let h = harness(script_run(MockProvider::new()), &claim(""));
    h.pipeline.process_insurance_claim(&request()).await.unwrap();
    let jobs = h.documents.jobs.lock().unwrap();
    assert_eq!(jobs[0].file_name, "claim-CLM-2026-0042");
    assert_eq!(
        jobs[0].payload.as_map()["claim"]["affected_parts"],
        "front bumper cover, hood, left headlamp, front crash absorber"
    );
}
