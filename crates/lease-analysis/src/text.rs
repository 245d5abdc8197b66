//! Text extraction from uploaded lease files

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TextExtractionError;
use crate::gateway::{GenerativeModel, InlineData};
use crate::prompts::TEXT_EXTRACTION_PROMPT;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_DOC: &str = "application/msword";

/// Upload types the pipeline accepts
pub const ALLOWED_MIME_TYPES: [&str; 3] = [MIME_PDF, MIME_DOCX, MIME_DOC];

pub fn is_allowed_mime_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    ALLOWED_MIME_TYPES.contains(&essence.as_str())
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8], content_type: &str)
        -> Result<String, TextExtractionError>;
}

/// Asks the generative model to transcribe the file
pub struct ModelTextExtractor {
    model: Arc<dyn GenerativeModel>,
}

impl ModelTextExtractor {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl TextExtractor for ModelTextExtractor {
    async fn extract(
        &self,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, TextExtractionError> {
        let file = InlineData::new(content_type, bytes.to_vec());
        let text = self.model.generate(TEXT_EXTRACTION_PROMPT, Some(&file)).await?;
        Ok(text.trim().to_string())
    }
}

/// Local extraction with `pdf-extract`; PDFs only
#[derive(Debug, Default)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(
        &self,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, TextExtractionError> {
        if !content_type.eq_ignore_ascii_case(MIME_PDF) {
            return Err(TextExtractionError::Unsupported(content_type.to_string()));
        }

        let data = bytes.to_vec();
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
            .await
            .map_err(|e| TextExtractionError::Pdf(format!("extraction task failed: {}", e)))?
            .map_err(|e| TextExtractionError::Pdf(e.to_string()))?;

        Ok(text.trim().to_string())
    }
}
