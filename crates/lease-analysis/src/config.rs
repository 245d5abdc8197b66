//! Pipeline limits and tunables
//!
//! Defaults match the production service; every value can be overridden
//! through `LEASE_*` environment variables.

use std::time::Duration;

use anyhow::{anyhow, Result};

/// 50 MiB upload ceiling
pub const DEFAULT_MAX_FILE_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_MIN_CONTENT_CHARS: usize = 100;
pub const DEFAULT_ANALYSIS_CHAR_BUDGET: usize = 8000;
pub const DEFAULT_EXCERPT_CHARS: usize = 500;
pub const DEFAULT_MAX_HISTORY_TURNS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Largest accepted upload in bytes
    pub max_file_bytes: usize,
    /// Extracted text shorter than this fails the content gate
    pub min_content_chars: usize,
    /// Characters of extracted text sent to each analysis mode
    pub analysis_char_budget: usize,
    /// Characters of each document shown in chat context
    pub excerpt_chars: usize,
    /// Prior chat turns replayed to the model
    pub max_history_turns: usize,
    /// How often the progress transport drains a session
    pub progress_poll_interval: Duration,
    /// Idle progress queues older than this are swept
    pub session_ttl: Duration,
    /// Include internal error detail in envelopes (non-production only)
    pub expose_error_detail: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            min_content_chars: DEFAULT_MIN_CONTENT_CHARS,
            analysis_char_budget: DEFAULT_ANALYSIS_CHAR_BUDGET,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            max_history_turns: DEFAULT_MAX_HISTORY_TURNS,
            progress_poll_interval: Duration::from_millis(100),
            session_ttl: Duration::from_secs(600),
            expose_error_detail: false,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from environment variables
    ///
    /// Recognized variables:
    /// - LEASE_MAX_FILE_BYTES
    /// - LEASE_MIN_CONTENT_CHARS
    /// - LEASE_ANALYSIS_CHAR_BUDGET
    /// - LEASE_EXCERPT_CHARS
    /// - LEASE_MAX_HISTORY_TURNS
    /// - LEASE_PROGRESS_POLL_MS
    /// - LEASE_SESSION_TTL_SECS
    /// - LEASE_EXPOSE_ERROR_DETAIL ("true"/"1")
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            max_file_bytes: env_number("LEASE_MAX_FILE_BYTES")?.unwrap_or(defaults.max_file_bytes),
            min_content_chars: env_number("LEASE_MIN_CONTENT_CHARS")?
                .unwrap_or(defaults.min_content_chars),
            analysis_char_budget: env_number("LEASE_ANALYSIS_CHAR_BUDGET")?
                .unwrap_or(defaults.analysis_char_budget),
            excerpt_chars: env_number("LEASE_EXCERPT_CHARS")?.unwrap_or(defaults.excerpt_chars),
            max_history_turns: env_number("LEASE_MAX_HISTORY_TURNS")?
                .unwrap_or(defaults.max_history_turns),
            progress_poll_interval: env_number("LEASE_PROGRESS_POLL_MS")?
                .map(|ms| Duration::from_millis(ms as u64))
                .unwrap_or(defaults.progress_poll_interval),
            session_ttl: env_number("LEASE_SESSION_TTL_SECS")?
                .map(|secs| Duration::from_secs(secs as u64))
                .unwrap_or(defaults.session_ttl),
            expose_error_detail: std::env::var("LEASE_EXPOSE_ERROR_DETAIL")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.expose_error_detail),
        })
    }

    pub fn with_error_detail(mut self, expose: bool) -> Self {
        self.expose_error_detail = expose;
        self
    }
}

fn env_number(name: &str) -> Result<Option<usize>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| anyhow!("Invalid value for {}: {} ({})", name, raw, e)),
        Err(_) => Ok(None),
    }
}
