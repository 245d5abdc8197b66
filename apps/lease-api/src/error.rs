//! Error types for the lease API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use lease_analysis::{AnalysisError, PersistError, PipelineFailure};
use lease_types::{ErrorEnvelope, ErrorKind};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Pipeline(#[from] PipelineFailure),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upload exceeds the {limit} byte limit")]
    UploadTooLarge { limit: usize },

    #[error("Missing X-User-Id header")]
    MissingCaller,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(PersistError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<PersistError> for ApiError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::NotFound(what) => ApiError::NotFound(what),
            other => ApiError::Persistence(other),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub kind: ErrorKind,
    pub error: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    fn from_envelope(envelope: &ErrorEnvelope) -> Self {
        Self {
            success: false,
            kind: envelope.kind,
            error: envelope.message.clone(),
            timestamp: envelope.timestamp,
            stage: envelope.stage.clone(),
            retryable: envelope.kind == ErrorKind::UpstreamServiceError,
            detail: envelope.detail.clone(),
        }
    }

    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::from_envelope(&ErrorEnvelope::new(kind, message))
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
        ErrorKind::InsufficientContentError => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::UpstreamServiceError => StatusCode::BAD_GATEWAY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::ModeAnalysisError | ErrorKind::ParseRepairExhausted | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn analysis_status(err: &AnalysisError) -> StatusCode {
    match err {
        AnalysisError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        other => status_for(other.kind()),
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Analysis(e) => analysis_status(e),
            ApiError::Pipeline(failure) => analysis_status(&failure.error),
            ApiError::InvalidRequest(_) | ApiError::MissingCaller => StatusCode::BAD_REQUEST,
            ApiError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Persistence(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Analysis(e) => ErrorResponse::from_envelope(&e.to_envelope()),
            ApiError::Pipeline(failure) => ErrorResponse::from_envelope(&failure.envelope),
            ApiError::InvalidRequest(msg) => ErrorResponse::new(ErrorKind::ValidationError, msg.clone()),
            ApiError::MissingCaller | ApiError::UploadTooLarge { .. } => {
                ErrorResponse::new(ErrorKind::ValidationError, self.to_string())
            }
            ApiError::NotFound(what) => {
                ErrorResponse::new(ErrorKind::NotFound, format!("Not found: {}", what))
            }
            ApiError::Persistence(e) => {
                tracing::error!("Persistence error: {}", e);
                ErrorResponse::new(ErrorKind::UpstreamServiceError, "Database unavailable")
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                ErrorResponse::new(ErrorKind::Internal, "Internal error")
            }
        };

        (status, Json(body)).into_response()
    }
}
