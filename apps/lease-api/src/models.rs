//! Request and response bodies for the lease API

use lease_analysis::{ExtractionSource, Intent};
use lease_types::{AnalysisResults, ChatTurn, DocumentRecord, ObligationRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub success: bool,
    pub document_id: String,
    pub session_id: String,
    pub results: AnalysisResults,
}

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub success: bool,
    pub document: DocumentRecord,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractObligationsRequest {
    /// Analysis text to extract from; defaults to the document's stored results
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObligationsResponse {
    pub success: bool,
    pub document_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ExtractionSource>,
    pub obligations: Vec<ObligationRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub document_ids: Vec<String>,
    pub message: String,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub success: bool,
    pub conversation_id: String,
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub success: bool,
    pub conversation_id: String,
    pub turns: Vec<ChatTurn>,
}
