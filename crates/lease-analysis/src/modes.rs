//! Runs a single analysis mode against extracted lease text

use std::sync::Arc;

use lease_types::AnalysisMode;
use tracing::debug;

use crate::error::AnalysisError;
use crate::gateway::GenerativeModel;
use crate::json::parse_loose;
use crate::prompts::mode_prompt;

/// First `max_chars` characters of `text`, cut on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub struct ModeRunner {
    model: Arc<dyn GenerativeModel>,
    char_budget: usize,
}

impl ModeRunner {
    pub fn new(model: Arc<dyn GenerativeModel>, char_budget: usize) -> Self {
        Self { model, char_budget }
    }

    /// Run one mode. The payload is the model's JSON when it produced any,
    /// otherwise its raw text as a JSON string.
    pub async fn run(
        &self,
        mode: AnalysisMode,
        text: &str,
        lease_type: &str,
    ) -> Result<serde_json::Value, AnalysisError> {
        let excerpt = truncate_chars(text, self.char_budget);
        let prompt = mode_prompt(mode, lease_type, excerpt);

        let raw = self
            .model
            .generate(&prompt, None)
            .await
            .map_err(|e| AnalysisError::ModeAnalysis {
                mode: mode.to_string(),
                message: e.to_string(),
            })?;

        match parse_loose(&raw) {
            Some(value) => Ok(value),
            None => {
                debug!(%mode, "Mode output was not JSON, storing raw text");
                Ok(serde_json::Value::String(raw.trim().to_string()))
            }
        }
    }
}
