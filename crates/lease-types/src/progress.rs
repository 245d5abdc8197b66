//! Progress events published while a document moves through the pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a single pipeline step as seen by a progress subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Pending,
    Active,
    Completed,
    Error,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::Pending => "pending",
            ProgressStatus::Active => "active",
            ProgressStatus::Completed => "completed",
            ProgressStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable progress record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub step: String,
    pub status: ProgressStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    /// Set on the last event of a run (final save, or a fatal error)
    #[serde(default, skip_serializing_if = "is_false")]
    pub terminal: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ProgressEvent {
    pub fn new(step: impl Into<String>, status: ProgressStatus) -> Self {
        Self {
            step: step.into(),
            status,
            details: None,
            timestamp: Utc::now(),
            terminal: false,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}
