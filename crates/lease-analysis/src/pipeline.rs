//! Upload-and-analyze orchestration
//!
//! One run moves through `Validating → Uploading → Extracting →
//! Analyzing(mode…) → Persisting`. Every stage publishes an `active` event on
//! entry and a `completed` or `error` event on exit. A failed mode is stored
//! as an error envelope and the run continues; a fatal failure publishes a
//! terminal error event and stops the run.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use lease_types::{
    AnalysisMode, AnalysisResults, DocumentRecord, ErrorEnvelope, ModePayload, ProgressEvent,
    ProgressStatus,
};
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::gateway::{GenerativeModel, PersistenceGateway, StorageGateway};
use crate::modes::ModeRunner;
use crate::progress::ProgressChannel;
use crate::text::{is_allowed_mime_type, ModelTextExtractor, TextExtractor};

pub const STEP_VALIDATING: &str = "Validating file...";
pub const STEP_UPLOADING: &str = "Uploading document...";
pub const STEP_EXTRACTING: &str = "Extracting text...";
pub const STEP_CONTENT_CHECK: &str = "Checking extracted content...";
pub const STEP_PERSISTING: &str = "Saving results...";

/// Substituted for the document text when extraction fails. The run then
/// stops at the content gate.
pub const EXTRACTION_FAILED_TEXT: &str = "[text extraction failed]";

/// Step name published while a mode runs
pub fn mode_step(mode: AnalysisMode) -> String {
    format!("Running {} analysis...", mode)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validating,
    Uploading,
    Extracting,
    ContentCheck,
    Analyzing,
    Persisting,
    /// Chat turns; not part of an upload run
    Responding,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validating => "validating",
            Stage::Uploading => "uploading",
            Stage::Extracting => "extracting",
            Stage::ContentCheck => "content_check",
            Stage::Analyzing => "analyzing",
            Stage::Persisting => "persisting",
            Stage::Responding => "responding",
        }
    }

    /// Step name for stages with a fixed label
    fn step(&self) -> &'static str {
        match self {
            Stage::Validating => STEP_VALIDATING,
            Stage::Uploading => STEP_UPLOADING,
            Stage::Extracting => STEP_EXTRACTING,
            Stage::ContentCheck => STEP_CONTENT_CHECK,
            Stage::Analyzing => "Running analysis...",
            Stage::Persisting => STEP_PERSISTING,
            Stage::Responding => "Generating response...",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineInput {
    /// Generated when absent
    pub session_id: Option<String>,
    /// Opaque caller id; documents are scoped by it
    pub owner_id: String,
    pub file: Option<UploadedFile>,
    pub lease_type: String,
    /// Requested mode names, in order
    pub modes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    pub document_id: String,
    pub session_id: String,
    pub results: AnalysisResults,
}

/// A run that stopped at a fatal stage
#[derive(Debug, Error)]
#[error("session {session_id} failed while {stage}: {error}")]
pub struct PipelineFailure {
    pub session_id: String,
    pub stage: Stage,
    pub error: AnalysisError,
    pub envelope: ErrorEnvelope,
}

struct ValidatedInput {
    owner_id: String,
    file: UploadedFile,
    lease_type: String,
    modes: Vec<AnalysisMode>,
}

pub struct AnalysisPipeline {
    storage: Arc<dyn StorageGateway>,
    persistence: Arc<dyn PersistenceGateway>,
    extractor: Arc<dyn TextExtractor>,
    runner: ModeRunner,
    progress: Arc<ProgressChannel>,
    config: AnalysisConfig,
}

impl AnalysisPipeline {
    /// Build a pipeline that extracts text with the model itself
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        storage: Arc<dyn StorageGateway>,
        persistence: Arc<dyn PersistenceGateway>,
        progress: Arc<ProgressChannel>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            storage,
            persistence,
            extractor: Arc::new(ModelTextExtractor::new(Arc::clone(&model))),
            runner: ModeRunner::new(model, config.analysis_char_budget),
            progress,
            config,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn progress(&self) -> &Arc<ProgressChannel> {
        &self.progress
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn new_session_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Run on the runtime, detached from the caller. Dropping the handle does
    /// not cancel the run.
    pub fn spawn(
        self: &Arc<Self>,
        input: PipelineInput,
    ) -> JoinHandle<Result<PipelineOutput, PipelineFailure>> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move { pipeline.run(input).await })
    }

    pub async fn run(&self, mut input: PipelineInput) -> Result<PipelineOutput, PipelineFailure> {
        let session_id = input
            .session_id
            .take()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(Self::new_session_id);

        let span = info_span!("session", session_id = %session_id);
        self.run_session(session_id, input).instrument(span).await
    }

    async fn run_session(
        &self,
        session_id: String,
        input: PipelineInput,
    ) -> Result<PipelineOutput, PipelineFailure> {
        let started = Instant::now();

        // Another run owns (or owned) this session; its queue is not ours to
        // publish into
        if !self.progress.claim(&session_id) {
            let error = AnalysisError::SessionAlreadyUsed(session_id.clone());
            warn!(error = %error, "Rejected run for a session that is already in use");
            let envelope = self
                .envelope_for(&error)
                .with_stage(Stage::Validating.as_str());
            return Err(PipelineFailure {
                session_id,
                stage: Stage::Validating,
                error,
                envelope,
            });
        }

        // Validating
        self.enter(&session_id, Stage::Validating);
        let input = match self.validate(&session_id, input).await {
            Ok(input) => input,
            Err(e) => return Err(self.fail(&session_id, Stage::Validating, e)),
        };
        self.complete(&session_id, Stage::Validating, None);

        // Uploading
        self.enter(&session_id, Stage::Uploading);
        let path = storage_path(&input.owner_id, &session_id, &input.file.file_name);
        let location = match self
            .storage
            .upload(&path, &input.file.bytes, &input.file.content_type)
            .await
        {
            Ok(location) => location,
            Err(e) => {
                let err = AnalysisError::upstream(Stage::Uploading, e);
                return Err(self.fail(&session_id, Stage::Uploading, err));
            }
        };
        self.complete(
            &session_id,
            Stage::Uploading,
            Some(json!({ "location": location })),
        );

        // Extracting
        self.enter(&session_id, Stage::Extracting);
        let mut extraction_failed = false;
        let text = match self
            .extractor
            .extract(&input.file.bytes, &input.file.content_type)
            .await
        {
            Ok(text) => {
                let characters = text.chars().count();
                self.complete(
                    &session_id,
                    Stage::Extracting,
                    Some(json!({ "characters": characters })),
                );
                text
            }
            Err(e) => {
                warn!(error = %e, "Text extraction failed, continuing to content check");
                let envelope =
                    AnalysisError::upstream(Stage::Extracting, &e).to_envelope();
                self.progress.publish(
                    &session_id,
                    STEP_EXTRACTING,
                    ProgressStatus::Error,
                    serde_json::to_value(&envelope).ok(),
                );
                extraction_failed = true;
                EXTRACTION_FAILED_TEXT.to_string()
            }
        };

        // Content gate publishes only when it fails. Failed extraction never
        // passes, whatever the threshold.
        let length = if extraction_failed {
            0
        } else {
            text.trim().chars().count()
        };
        if extraction_failed || length < self.config.min_content_chars {
            let err = AnalysisError::InsufficientContent {
                length,
                minimum: self.config.min_content_chars,
            };
            return Err(self.fail(&session_id, Stage::ContentCheck, err));
        }

        // Analyzing
        let mut results = AnalysisResults::new();
        for mode in &input.modes {
            let step = mode_step(*mode);
            info!(%mode, "Running analysis mode");
            self.progress
                .publish(&session_id, &step, ProgressStatus::Active, None);

            match self.runner.run(*mode, &text, &input.lease_type).await {
                Ok(payload) => {
                    results.insert(mode.as_str(), ModePayload::Success(payload));
                    self.progress
                        .publish(&session_id, &step, ProgressStatus::Completed, None);
                }
                Err(e) => {
                    warn!(%mode, error = %e, "Analysis mode failed, continuing");
                    let envelope = self.envelope_for(&e);
                    self.progress.publish(
                        &session_id,
                        &step,
                        ProgressStatus::Error,
                        serde_json::to_value(&envelope).ok(),
                    );
                    results.insert(mode.as_str(), ModePayload::Failed(envelope));
                }
            }
        }

        // Persisting
        self.enter(&session_id, Stage::Persisting);
        let record = DocumentRecord {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: input.owner_id,
            session_id: session_id.clone(),
            file_name: input.file.file_name,
            content_type: input.file.content_type,
            storage_location: location,
            document_hash: hex::encode(Sha256::digest(&input.file.bytes)),
            lease_type: input.lease_type,
            modes: input.modes.iter().map(|m| m.as_str().to_string()).collect(),
            extracted_text: text,
            results,
            created_at: Utc::now(),
        };

        let saved = match self.persistence.save_document(record).await {
            Ok(saved) => saved,
            Err(e) => {
                let err = AnalysisError::upstream(Stage::Persisting, e);
                return Err(self.fail(&session_id, Stage::Persisting, err));
            }
        };

        let failed_modes: Vec<&str> = saved.results.failures().map(|r| r.mode.as_str()).collect();
        let event = ProgressEvent::new(STEP_PERSISTING, ProgressStatus::Completed)
            .with_details(json!({
                "documentId": saved.id,
                "modes": saved.modes,
                "failedModes": failed_modes,
            }))
            .terminal();
        self.progress.publish_event(&session_id, event);

        info!(
            document_id = %saved.id,
            modes = saved.modes.len(),
            failed = failed_modes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analysis complete"
        );

        Ok(PipelineOutput {
            document_id: saved.id,
            session_id,
            results: saved.results,
        })
    }

    async fn validate(
        &self,
        session_id: &str,
        input: PipelineInput,
    ) -> Result<ValidatedInput, AnalysisError> {
        let file = match input.file {
            Some(file) if !file.bytes.is_empty() => file,
            _ => return Err(AnalysisError::MissingFile),
        };

        if !is_allowed_mime_type(&file.content_type) {
            return Err(AnalysisError::UnsupportedFileType(file.content_type));
        }

        if file.bytes.len() > self.config.max_file_bytes {
            return Err(AnalysisError::FileTooLarge {
                size: file.bytes.len(),
                limit: self.config.max_file_bytes,
            });
        }

        let modes = parse_modes(&input.modes)?;

        let existing = self
            .persistence
            .find_document_by_session(session_id)
            .await
            .map_err(|e| AnalysisError::upstream(Stage::Validating, e))?;
        if existing.is_some() {
            return Err(AnalysisError::SessionAlreadyUsed(session_id.to_string()));
        }

        let lease_type = match input.lease_type.trim() {
            "" => "general".to_string(),
            tag => tag.to_lowercase(),
        };

        let content_type = file
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        Ok(ValidatedInput {
            owner_id: input.owner_id,
            file: UploadedFile {
                content_type,
                ..file
            },
            lease_type,
            modes,
        })
    }

    fn enter(&self, session_id: &str, stage: Stage) {
        info!(stage = %stage, "Stage started");
        self.progress
            .publish(session_id, stage.step(), ProgressStatus::Active, None);
    }

    fn complete(&self, session_id: &str, stage: Stage, details: Option<serde_json::Value>) {
        info!(stage = %stage, "Stage completed");
        self.progress
            .publish(session_id, stage.step(), ProgressStatus::Completed, details);
    }

    fn envelope_for(&self, err: &AnalysisError) -> ErrorEnvelope {
        let envelope = err.to_envelope();
        if self.config.expose_error_detail {
            envelope.with_detail(format!("{:?}", err))
        } else {
            envelope
        }
    }

    /// Publish the terminal error event and build the failure
    fn fail(&self, session_id: &str, stage: Stage, error: AnalysisError) -> PipelineFailure {
        let mut envelope = self.envelope_for(&error);
        if envelope.stage.is_none() {
            envelope = envelope.with_stage(stage.as_str());
        }

        error!(stage = %stage, error = %error, "Analysis failed");

        let mut event = ProgressEvent::new(stage.step(), ProgressStatus::Error).terminal();
        event.details = serde_json::to_value(&envelope).ok();
        self.progress.publish_event(session_id, event);

        PipelineFailure {
            session_id: session_id.to_string(),
            stage,
            error,
            envelope,
        }
    }
}

/// Parse requested mode names, keeping the first occurrence of duplicates
pub fn parse_modes(requested: &[String]) -> Result<Vec<AnalysisMode>, AnalysisError> {
    let names: Vec<&str> = requested
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .collect();
    if names.is_empty() {
        return Err(AnalysisError::NoModes);
    }

    let mut seen = HashSet::new();
    let mut modes = Vec::with_capacity(names.len());
    for name in names {
        let mode: AnalysisMode = name
            .parse()
            .map_err(|e: lease_types::UnknownMode| AnalysisError::UnknownMode(e.0))?;
        if seen.insert(mode) {
            modes.push(mode);
        }
    }
    Ok(modes)
}

/// Storage key `{owner}/{session}/{file}` with unsafe characters replaced
pub fn storage_path(owner_id: &str, session_id: &str, file_name: &str) -> String {
    format!(
        "{}/{}/{}",
        sanitize_segment(owner_id, "anonymous"),
        sanitize_segment(session_id, "session"),
        sanitize_segment(file_name, "document")
    )
}

fn sanitize_segment(raw: &str, fallback: &str) -> String {
    // Keep only the final path component of whatever the client sent
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryPersistence, MemoryStorage};
    use crate::test_support::ScriptedModel;
    use pretty_assertions::assert_eq;

    fn lease_text() -> String {
        "The Lessee shall pay annual rent of $1,200 per acre. ".repeat(10)
    }

    fn pdf(bytes: &[u8]) -> Option<UploadedFile> {
        Some(UploadedFile {
            file_name: "lease.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: bytes.to_vec(),
        })
    }

    fn pipeline(model: ScriptedModel) -> (AnalysisPipeline, Arc<MemoryPersistence>) {
        let persistence = Arc::new(MemoryPersistence::new());
        let pipeline = AnalysisPipeline::new(
            Arc::new(model),
            Arc::new(MemoryStorage::new()),
            persistence.clone(),
            Arc::new(ProgressChannel::default()),
            AnalysisConfig::default(),
        );
        (pipeline, persistence)
    }

    fn input(session: &str, modes: &[&str]) -> PipelineInput {
        PipelineInput {
            session_id: Some(session.to_string()),
            owner_id: "user-1".to_string(),
            file: pdf(b"%PDF-1.7 bytes"),
            lease_type: "solar".to_string(),
            modes: modes.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_modes_collapses_duplicates() {
        let requested = vec![
            "legal".to_string(),
            " Standard ".to_string(),
            "legal".to_string(),
        ];
        assert_eq!(
            parse_modes(&requested).unwrap(),
            vec![AnalysisMode::Legal, AnalysisMode::Standard]
        );
    }

    #[test]
    fn test_parse_modes_errors() {
        assert!(matches!(parse_modes(&[]), Err(AnalysisError::NoModes)));
        assert!(matches!(
            parse_modes(&["  ".to_string()]),
            Err(AnalysisError::NoModes)
        ));
        assert!(matches!(
            parse_modes(&["standard".to_string(), "astrology".to_string()]),
            Err(AnalysisError::UnknownMode(ref m)) if m == "astrology"
        ));
    }

    #[test]
    fn test_storage_path_sanitizes_file_name() {
        assert_eq!(
            storage_path("user-1", "abc", "../../etc/My Lease (v2).pdf"),
            "user-1/abc/My_Lease__v2_.pdf"
        );
        assert_eq!(storage_path("", "abc", ".."), "anonymous/abc/document");
    }

    #[tokio::test]
    async fn test_oversize_file_fails_validation_only() {
        let (pipeline, _) = pipeline(ScriptedModel::new());
        let pipeline = AnalysisPipeline {
            config: AnalysisConfig {
                max_file_bytes: 4,
                ..AnalysisConfig::default()
            },
            ..pipeline
        };

        let failure = pipeline.run(input("s-big", &["standard"])).await.unwrap_err();
        assert_eq!(failure.stage, Stage::Validating);
        assert!(matches!(failure.error, AnalysisError::FileTooLarge { limit: 4, .. }));

        let events = pipeline.progress().drain("s-big");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, ProgressStatus::Active);
        assert_eq!(events[1].status, ProgressStatus::Error);
        assert!(events[1].terminal);
        assert_eq!(events[1].details.as_ref().unwrap()["kind"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unsupported_type_is_rejected() {
        let (pipeline, _) = pipeline(ScriptedModel::new());
        let mut request = input("s-png", &["standard"]);
        request.file = Some(UploadedFile {
            file_name: "photo.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        });

        let failure = pipeline.run(request).await.unwrap_err();
        assert!(matches!(failure.error, AnalysisError::UnsupportedFileType(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_rejected() {
        let (pipeline, _) = pipeline(ScriptedModel::new());
        let mut request = input("s-none", &["standard"]);
        request.file = None;

        let failure = pipeline.run(request).await.unwrap_err();
        assert!(matches!(failure.error, AnalysisError::MissingFile));
    }

    #[tokio::test]
    async fn test_session_id_is_single_use() {
        let model = ScriptedModel::new()
            .when("Extract all of the text", lease_text())
            .otherwise("{\"summary\": \"ok\"}");
        let (pipeline, persistence) = pipeline(model);

        pipeline.run(input("s-once", &["standard"])).await.unwrap();
        let failure = pipeline
            .run(input("s-once", &["standard"]))
            .await
            .unwrap_err();

        assert!(matches!(failure.error, AnalysisError::SessionAlreadyUsed(_)));
        assert_eq!(persistence.document_count().await, 1);
    }

    #[tokio::test]
    async fn test_generates_session_id_when_absent() {
        let model = ScriptedModel::new()
            .when("Extract all of the text", lease_text())
            .otherwise("{}");
        let (pipeline, _) = pipeline(model);
        let mut request = input("", &["standard"]);
        request.session_id = None;

        let output = pipeline.run(request).await.unwrap();
        assert_eq!(output.session_id.len(), 36);
        assert!(!pipeline.progress().drain(&output.session_id).is_empty());
    }

    #[tokio::test]
    async fn test_persisted_record_carries_hash_and_location() {
        let model = ScriptedModel::new()
            .when("Extract all of the text", lease_text())
            .otherwise("{\"summary\": \"ok\"}");
        let (pipeline, persistence) = pipeline(model);

        let output = pipeline
            .run(input("s-rec", &["standard"]))
            .await
            .unwrap();
        let record = persistence.get_document(&output.document_id).await.unwrap();

        assert_eq!(record.owner_id, "user-1");
        assert_eq!(record.storage_location, "memory://user-1/s-rec/lease.pdf");
        assert_eq!(
            record.document_hash,
            hex::encode(Sha256::digest(b"%PDF-1.7 bytes"))
        );
        assert_eq!(record.modes, vec!["standard".to_string()]);
    }

    #[tokio::test]
    async fn test_reuse_after_failed_run_is_rejected() {
        let model = ScriptedModel::new().when("Extract all of the text", "Page 1 of 1");
        let (pipeline, _) = pipeline(model);

        let first = pipeline.run(input("s-retry", &["standard"])).await.unwrap_err();
        assert_eq!(first.stage, Stage::ContentCheck);
        pipeline.progress().drain("s-retry");

        let second = pipeline
            .run(input("s-retry", &["standard"]))
            .await
            .unwrap_err();
        assert!(matches!(second.error, AnalysisError::SessionAlreadyUsed(_)));
        assert_eq!(second.envelope.stage.as_deref(), Some("validating"));
        assert!(pipeline.progress().drain("s-retry").is_empty());

        // A disposed session stays unusable too
        pipeline.progress().dispose("s-retry");
        let third = pipeline
            .run(input("s-retry", &["standard"]))
            .await
            .unwrap_err();
        assert!(matches!(third.error, AnalysisError::SessionAlreadyUsed(_)));
    }

    #[tokio::test]
    async fn test_concurrent_runs_share_no_session() {
        let model = ScriptedModel::new()
            .when("Extract all of the text", lease_text())
            .otherwise("{\"summary\": \"ok\"}");
        let (pipeline, persistence) = pipeline(model);
        let pipeline = Arc::new(pipeline);

        let first = pipeline.spawn(input("s-dup", &["standard"]));
        let second = pipeline.spawn(input("s-dup", &["standard"]));
        let outcomes = [first.await.unwrap(), second.await.unwrap()];

        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
        let rejected = outcomes.iter().find_map(|o| o.as_ref().err()).unwrap();
        assert!(matches!(rejected.error, AnalysisError::SessionAlreadyUsed(_)));

        let events = pipeline.progress().drain("s-dup");
        assert_eq!(events.iter().filter(|e| e.terminal).count(), 1);
        assert_eq!(persistence.document_count().await, 1);
    }

    #[tokio::test]
    async fn test_failed_extraction_fails_gate_at_any_threshold() {
        let model = ScriptedModel::new().when_fails("Extract all of the text", "unreadable");
        let (pipeline, _) = pipeline(model);
        let pipeline = AnalysisPipeline {
            config: AnalysisConfig {
                min_content_chars: 1,
                ..AnalysisConfig::default()
            },
            ..pipeline
        };

        let failure = pipeline
            .run(input("s-low", &["standard"]))
            .await
            .unwrap_err();
        assert_eq!(failure.stage, Stage::ContentCheck);
        assert!(matches!(
            failure.error,
            AnalysisError::InsufficientContent { length: 0, minimum: 1 }
        ));
        let events = pipeline.progress().drain("s-low");
        assert!(!events.iter().any(|e| e.step.starts_with("Running")));
    }

    #[tokio::test]
    async fn test_failed_extraction_stops_at_content_gate() {
        let model = ScriptedModel::new().when_fails("Extract all of the text", "unreadable");
        let (pipeline, persistence) = pipeline(model);

        let failure = pipeline
            .run(input("s-bad", &["standard"]))
            .await
            .unwrap_err();
        assert_eq!(failure.stage, Stage::ContentCheck);
        assert!(matches!(
            failure.error,
            AnalysisError::InsufficientContent { minimum: 100, .. }
        ));

        let events = pipeline.progress().drain("s-bad");
        let extracting: Vec<_> = events
            .iter()
            .filter(|e| e.step == STEP_EXTRACTING)
            .map(|e| e.status)
            .collect();
        assert_eq!(
            extracting,
            vec![ProgressStatus::Active, ProgressStatus::Error]
        );
        assert_eq!(events.last().unwrap().step, STEP_CONTENT_CHECK);
        assert_eq!(persistence.document_count().await, 0);
    }
}
