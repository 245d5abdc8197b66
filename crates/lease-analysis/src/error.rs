//! Error types for the analysis core

use lease_types::{ErrorEnvelope, ErrorKind};
use thiserror::Error;

use crate::pipeline::Stage;

/// Failure of the generative model backend
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model API key is not configured")]
    MissingApiKey,

    #[error("Model network error: {0}")]
    Network(String),

    #[error("Model API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Model returned no text")]
    EmptyResponse,

    #[error("Failed to parse model response: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage rejected the request: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Persistence backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure turning an uploaded file into plain text
#[derive(Debug, Error)]
pub enum TextExtractionError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("PDF text extraction failed: {0}")]
    Pdf(String),

    #[error("Local extraction does not support {0}")]
    Unsupported(String),
}

/// Errors surfaced by the pipeline, extraction and chat operations
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("No file provided")]
    MissingFile,

    #[error("Unsupported file type: {0}. Allowed: PDF, DOCX, DOC")]
    UnsupportedFileType(String),

    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge { size: usize, limit: usize },

    #[error("At least one analysis mode is required")]
    NoModes,

    #[error("Unknown analysis mode: {0}")]
    UnknownMode(String),

    #[error("Session {0} has already been used")]
    SessionAlreadyUsed(String),

    #[error("Message must not be empty")]
    EmptyMessage,

    #[error("{stage} failed: {message}")]
    Upstream { stage: Stage, message: String },

    #[error("Insufficient content: extracted {length} characters, at least {minimum} required")]
    InsufficientContent { length: usize, minimum: usize },

    #[error("Analysis mode '{mode}' failed: {message}")]
    ModeAnalysis { mode: String, message: String },

    #[error("Could not coerce model output to schema: {0}")]
    ParseRepairExhausted(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl AnalysisError {
    pub fn upstream(stage: Stage, err: impl std::fmt::Display) -> Self {
        AnalysisError::Upstream {
            stage,
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::MissingFile
            | AnalysisError::UnsupportedFileType(_)
            | AnalysisError::FileTooLarge { .. }
            | AnalysisError::NoModes
            | AnalysisError::UnknownMode(_)
            | AnalysisError::SessionAlreadyUsed(_)
            | AnalysisError::EmptyMessage => ErrorKind::ValidationError,
            AnalysisError::Upstream { .. } => ErrorKind::UpstreamServiceError,
            AnalysisError::InsufficientContent { .. } => ErrorKind::InsufficientContentError,
            AnalysisError::ModeAnalysis { .. } => ErrorKind::ModeAnalysisError,
            AnalysisError::ParseRepairExhausted(_) => ErrorKind::ParseRepairExhausted,
            AnalysisError::NotFound(_) => ErrorKind::NotFound,
        }
    }

    /// Upstream failures are worth retrying; bad input is not
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalysisError::Upstream { .. })
    }

    pub fn to_envelope(&self) -> ErrorEnvelope {
        let envelope = ErrorEnvelope::new(self.kind(), self.to_string());
        match self {
            AnalysisError::Upstream { stage, .. } => envelope.with_stage(stage.as_str()),
            AnalysisError::ModeAnalysis { mode, .. } => envelope.with_mode(mode.clone()),
            _ => envelope,
        }
    }
}
