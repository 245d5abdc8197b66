//! End-to-end runs of the analysis pipeline against in-memory gateways

use std::sync::Arc;

use lease_analysis::pipeline::{mode_step, STEP_CONTENT_CHECK};
use lease_analysis::test_support::ScriptedModel;
use lease_analysis::{
    AnalysisConfig, AnalysisError, AnalysisPipeline, ChatScope, ConversationalResponder,
    Intent, MemoryPersistence, MemoryStorage, PersistenceGateway, PipelineInput,
    ProgressChannel, Stage, UploadedFile,
};
use lease_types::{AnalysisMode, ErrorKind, ProgressEvent, ProgressStatus};
use pretty_assertions::assert_eq;
use serde_json::json;

const EXTRACT: &str = "Extract all of the text";
const STANDARD_TASK: &str = "Task: Standard clause extraction";
const LEGAL_TASK: &str = "Task: Legal risk flagging";

fn solar_lease() -> String {
    "SOLAR GROUND LEASE. Lessee may install photovoltaic equipment on the Premises and \
     shall pay Lessor annual rent of $1,200 per acre, escalating 2% each year. "
        .repeat(4)
}

struct Harness {
    pipeline: AnalysisPipeline,
    persistence: Arc<MemoryPersistence>,
    storage: Arc<MemoryStorage>,
    model: Arc<ScriptedModel>,
}

fn harness(model: ScriptedModel) -> Harness {
    let model = Arc::new(model);
    let persistence = Arc::new(MemoryPersistence::new());
    let storage = Arc::new(MemoryStorage::new());
    let pipeline = AnalysisPipeline::new(
        model.clone(),
        storage.clone(),
        persistence.clone(),
        Arc::new(ProgressChannel::default()),
        AnalysisConfig::default(),
    );
    Harness {
        pipeline,
        persistence,
        storage,
        model,
    }
}

fn solar_input(session: &str, modes: &[&str]) -> PipelineInput {
    PipelineInput {
        session_id: Some(session.to_string()),
        owner_id: "owner-7".to_string(),
        file: Some(UploadedFile {
            file_name: "solar-lease.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: b"%PDF-1.7 solar lease".to_vec(),
        }),
        lease_type: "solar".to_string(),
        modes: modes.iter().map(|m| m.to_string()).collect(),
    }
}

fn trace(events: &[ProgressEvent]) -> Vec<(String, ProgressStatus)> {
    events.iter().map(|e| (e.step.clone(), e.status)).collect()
}

fn step(name: &str, status: ProgressStatus) -> (String, ProgressStatus) {
    (name.to_string(), status)
}

#[tokio::test]
async fn test_solar_standard_and_legal_event_order() {
    let h = harness(
        ScriptedModel::new()
            .when(EXTRACT, solar_lease())
            .when(STANDARD_TASK, r#"{"summary": "Solar ground lease", "clauses": []}"#)
            .when(
                LEGAL_TASK,
                "```json\n{\"risks\": [{\"title\": \"Uncapped indemnity\", \"severity\": \"high\"}]}\n```",
            ),
    );

    let output = h
        .pipeline
        .run(solar_input("solar-1", &["standard", "legal"]))
        .await
        .unwrap();

    let events = h.pipeline.progress().drain("solar-1");
    use ProgressStatus::{Active, Completed};
    assert_eq!(
        trace(&events),
        vec![
            step("Validating file...", Active),
            step("Validating file...", Completed),
            step("Uploading document...", Active),
            step("Uploading document...", Completed),
            step("Extracting text...", Active),
            step("Extracting text...", Completed),
            step("Running standard analysis...", Active),
            step("Running standard analysis...", Completed),
            step("Running legal analysis...", Active),
            step("Running legal analysis...", Completed),
            step("Saving results...", Active),
            step("Saving results...", Completed),
        ]
    );

    let last = events.last().unwrap();
    assert!(last.terminal);
    assert_eq!(events.iter().filter(|e| e.terminal).count(), 1);
    let details = last.details.as_ref().unwrap();
    assert_eq!(details["documentId"], json!(output.document_id));
    assert_eq!(details["modes"], json!(["standard", "legal"]));

    assert_eq!(output.results.modes().collect::<Vec<_>>(), vec!["standard", "legal"]);
    assert_eq!(
        output.results.success(AnalysisMode::Legal).unwrap()["risks"][0]["severity"],
        "high"
    );
    assert_eq!(h.storage.len().await, 1);
    assert_eq!(h.model.inline_calls(), 1);
}

#[tokio::test]
async fn test_failed_mode_is_isolated() {
    let h = harness(
        ScriptedModel::new()
            .when(EXTRACT, solar_lease())
            .when_fails(LEGAL_TASK, "model overloaded")
            .otherwise(r#"{"summary": "ok"}"#),
    );

    let output = h
        .pipeline
        .run(solar_input("solar-2", &["standard", "legal"]))
        .await
        .unwrap();

    assert_eq!(output.results.len(), 2);
    assert!(output.results.get("standard").unwrap().is_success());
    let envelope = output.results.get("legal").unwrap().as_error().unwrap();
    assert!(envelope.error);
    assert_eq!(envelope.kind, ErrorKind::ModeAnalysisError);
    assert_eq!(envelope.mode.as_deref(), Some("legal"));

    let events = h.pipeline.progress().drain("solar-2");
    let legal: Vec<_> = events
        .iter()
        .filter(|e| e.step == mode_step(AnalysisMode::Legal))
        .map(|e| e.status)
        .collect();
    assert_eq!(legal, vec![ProgressStatus::Active, ProgressStatus::Error]);
    assert!(events.last().unwrap().terminal);
    assert_eq!(events.last().unwrap().status, ProgressStatus::Completed);

    let stored = h.persistence.get_document(&output.document_id).await.unwrap();
    assert_eq!(stored.results, output.results);
}

#[tokio::test]
async fn test_every_requested_mode_has_a_result() {
    let h = harness(
        ScriptedModel::new()
            .when(EXTRACT, solar_lease())
            .when_fails("Task: Renewal", "timeout")
            .otherwise("Plain prose, not JSON."),
    );
    let requested = ["standard", "parsing", "redlining", "obligations", "renewal", "legal"];

    let output = h
        .pipeline
        .run(solar_input("solar-3", &requested))
        .await
        .unwrap();

    assert_eq!(output.results.modes().collect::<Vec<_>>(), requested.to_vec());
    assert_eq!(output.results.failures().count(), 1);
    assert_eq!(
        output.results.success(AnalysisMode::Parsing),
        Some(&json!("Plain prose, not JSON."))
    );
}

#[tokio::test]
async fn test_short_text_stops_before_analysis() {
    let h = harness(
        ScriptedModel::new()
            .when(EXTRACT, "Page 1 of 1")
            .otherwise(r#"{"summary": "should not run"}"#),
    );

    let failure = h
        .pipeline
        .run(solar_input("solar-4", &["standard"]))
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::ContentCheck);
    assert_eq!(failure.envelope.kind, ErrorKind::InsufficientContentError);
    assert!(matches!(
        failure.error,
        AnalysisError::InsufficientContent { length: 11, minimum: 100 }
    ));

    let events = h.pipeline.progress().drain("solar-4");
    assert!(events.iter().all(|e| !e.step.starts_with("Running")));
    let last = events.last().unwrap();
    assert_eq!(last.step, STEP_CONTENT_CHECK);
    assert_eq!(last.status, ProgressStatus::Error);
    assert!(last.terminal);
    assert_eq!(h.model.calls(), 1);
    assert_eq!(h.persistence.document_count().await, 0);
}

#[tokio::test]
async fn test_summarize_five_documents() {
    let h = harness(
        ScriptedModel::new()
            .when(EXTRACT, solar_lease())
            .when(
                "Task: Obligation tracking",
                r#"{"obligations": [{"party": "Lessee", "description": "Pay rent"}]}"#,
            )
            .when("LEASE TEXT:", r#"{"summary": "ok"}"#)
            .otherwise("Your portfolio holds five solar and wind leases."),
    );

    let mut documents = Vec::new();
    for (i, lease_type) in ["solar", "wind", "solar", "ground", "wind"].iter().enumerate() {
        let mut input = solar_input(&format!("portfolio-{}", i), &["standard", "obligations"]);
        input.lease_type = lease_type.to_string();
        let output = h.pipeline.run(input).await.unwrap();
        documents.push(h.persistence.get_document(&output.document_id).await.unwrap());
    }

    let scope = ChatScope::from_documents(&documents, 500).unwrap();
    let ChatScope::Portfolio(portfolio) = &scope else {
        panic!("expected portfolio scope");
    };
    assert_eq!(portfolio.total_documents, 5);
    assert_eq!(portfolio.lease_types, vec!["ground", "solar", "wind"]);
    assert_eq!(portfolio.total_obligations, Some(5));

    let responder = ConversationalResponder::new(h.model.clone(), 10);
    let reply = responder
        .respond(&scope, "Summarize my documents", &[])
        .await
        .unwrap();

    assert_eq!(reply.intent, Some(Intent::PortfolioSummary));
    assert_eq!(reply.content, "Your portfolio holds five solar and wind leases.");
    let prompt = h.model.prompts().pop().unwrap();
    assert!(prompt.contains("Total Documents: 5"));
    assert!(prompt.contains("portfolio analyst"));
}
