//! HTTP handlers for the lease API

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use lease_analysis::{
    AnalysisError, AnalysisPipeline, ChatScope, ExtractionSource, PersistenceGateway,
    PipelineInput, UploadedFile,
};
use lease_types::{AnalysisMode, ChatTurn, DocumentRecord};
use serde_json::Value;

use crate::error::ApiError;
use crate::identity::CallerId;
use crate::models::*;
use crate::state::{AppState, SharedState};

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "lease-api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Reserve a session id so a client can open the progress stream before
/// uploading
pub async fn create_session() -> Json<SessionResponse> {
    Json(SessionResponse {
        session_id: AnalysisPipeline::new_session_id(),
    })
}

/// Split a `modes` form value on commas
pub fn split_modes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|mode| !mode.is_empty())
        .map(str::to_string)
        .collect()
}

/// Fallback when the client sent no usable part content type
pub fn guess_content_type(file_name: &str) -> Option<&'static str> {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".pdf") {
        Some(lease_analysis::text::MIME_PDF)
    } else if lower.ends_with(".docx") {
        Some(lease_analysis::text::MIME_DOCX)
    } else if lower.ends_with(".doc") {
        Some(lease_analysis::text::MIME_DOC)
    } else {
        None
    }
}

fn multipart_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::UploadTooLarge { limit }
    } else {
        ApiError::InvalidRequest(format!("Invalid multipart body: {}", err))
    }
}

/// Upload a lease and run the requested analysis modes
pub async fn analyze(
    State(state): State<SharedState>,
    caller: CallerId,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let limit = state.config.max_file_bytes;
    let mut input = PipelineInput {
        owner_id: caller.0,
        ..PipelineInput::default()
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("document").to_string();
                let declared = field
                    .content_type()
                    .map(str::to_string)
                    .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");
                let content_type = declared
                    .or_else(|| guess_content_type(&file_name).map(str::to_string))
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
                input.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "leaseType" => {
                input.lease_type = field.text().await.map_err(|e| multipart_error(e, limit))?;
            }
            "modes" => {
                let raw = field.text().await.map_err(|e| multipart_error(e, limit))?;
                input.modes.extend(split_modes(&raw));
            }
            "sessionId" => {
                let raw = field.text().await.map_err(|e| multipart_error(e, limit))?;
                input.session_id = Some(raw);
            }
            other => tracing::debug!("Ignoring multipart field {}", other),
        }
    }

    // Detached so a client disconnect does not cancel the run
    let output = state
        .pipeline
        .spawn(input)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("analysis task failed: {}", e)))??;

    tracing::info!(
        "Analyzed document {} for session {} ({} modes)",
        output.document_id,
        output.session_id,
        output.results.len()
    );

    Ok(Json(AnalyzeResponse {
        success: true,
        document_id: output.document_id,
        session_id: output.session_id,
        results: output.results,
    }))
}

/// Load a document, hiding documents that belong to someone else
async fn owned_document(
    state: &AppState,
    caller: &CallerId,
    id: &str,
) -> Result<DocumentRecord, ApiError> {
    let document = state.persistence.get_document(id).await?;
    if document.owner_id != caller.0 {
        return Err(ApiError::NotFound(format!("document {}", id)));
    }
    Ok(document)
}

pub async fn get_document(
    State(state): State<SharedState>,
    caller: CallerId,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let document = owned_document(&state, &caller, &id).await?;
    Ok(Json(DocumentResponse {
        success: true,
        document,
    }))
}

pub async fn get_obligations(
    State(state): State<SharedState>,
    caller: CallerId,
    Path(id): Path<String>,
) -> Result<Json<ObligationsResponse>, ApiError> {
    owned_document(&state, &caller, &id).await?;
    let obligations = state.persistence.get_obligations(&id).await?;
    Ok(Json(ObligationsResponse {
        success: true,
        document_id: id,
        source: None,
        obligations,
    }))
}

/// Analysis text obligations are extracted from when the client sends none
fn obligation_source_text(document: &DocumentRecord) -> String {
    [AnalysisMode::Obligations, AnalysisMode::Standard]
        .iter()
        .find_map(|mode| document.results.success(*mode))
        .map(|payload| match payload {
            Value::String(text) => text.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_default(),
        })
        .unwrap_or_else(|| document.extracted_text.clone())
}

/// Extract structured obligations for a document and store them
pub async fn extract_obligations(
    State(state): State<SharedState>,
    caller: CallerId,
    Path(id): Path<String>,
    body: Option<Json<ExtractObligationsRequest>>,
) -> Result<Json<ObligationsResponse>, ApiError> {
    let document = owned_document(&state, &caller, &id).await?;
    let request = body.map(|Json(req)| req).unwrap_or_default();

    let text = request
        .text
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| obligation_source_text(&document));

    let outcome = state.obligations.extract(Some(&id), &text).await;
    if outcome.source != ExtractionSource::PriorRecords {
        state.persistence.save_obligations(&id, &outcome.records).await?;
    }

    tracing::info!(
        "Extracted {} obligations for document {} ({:?})",
        outcome.records.len(),
        id,
        outcome.source
    );

    Ok(Json(ObligationsResponse {
        success: true,
        document_id: id,
        source: Some(outcome.source),
        obligations: outcome.records,
    }))
}

/// Conversations are stored per caller
fn conversation_key(caller: &CallerId, conversation_id: &str) -> String {
    format!("{}:{}", caller.0, conversation_id)
}

pub async fn chat(
    State(state): State<SharedState>,
    caller: CallerId,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if req.message.trim().is_empty() {
        return Err(AnalysisError::EmptyMessage.into());
    }

    let mut document_ids: Vec<String> = Vec::with_capacity(req.document_ids.len());
    for id in req.document_ids {
        if !document_ids.contains(&id) {
            document_ids.push(id);
        }
    }

    let mut documents = Vec::with_capacity(document_ids.len());
    for id in &document_ids {
        documents.push(owned_document(&state, &caller, id).await?);
    }

    let scope = ChatScope::from_documents(&documents, state.config.excerpt_chars)
        .ok_or_else(|| ApiError::InvalidRequest("documentIds must not be empty".to_string()))?;

    let conversation_id = req
        .conversation_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let key = conversation_key(&caller, &conversation_id);

    let history = state.persistence.list_chat_turns(&key).await?;
    let reply = state.responder.respond(&scope, &req.message, &history).await?;

    // Only a successful exchange is written to history
    state
        .persistence
        .append_chat_turns(
            &key,
            &[
                ChatTurn::user(req.message.trim()),
                ChatTurn::assistant(reply.content.clone()),
            ],
        )
        .await?;

    Ok(Json(ChatResponse {
        success: true,
        conversation_id,
        reply: reply.content,
        intent: reply.intent,
    }))
}

pub async fn get_conversation(
    State(state): State<SharedState>,
    caller: CallerId,
    Path(conversation_id): Path<String>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let turns = state
        .persistence
        .list_chat_turns(&conversation_key(&caller, &conversation_id))
        .await?;
    Ok(Json(ConversationResponse {
        success: true,
        conversation_id,
        turns,
    }))
}
