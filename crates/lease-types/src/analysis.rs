//! Analysis modes, per-mode results and the error envelope stored in place of
//! a failed mode's result

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Registry of analysis modes a caller may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Standard,
    Parsing,
    Redlining,
    Obligations,
    Renewal,
    Legal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown analysis mode: {0}")]
pub struct UnknownMode(pub String);

impl AnalysisMode {
    pub const ALL: [AnalysisMode; 6] = [
        AnalysisMode::Standard,
        AnalysisMode::Parsing,
        AnalysisMode::Redlining,
        AnalysisMode::Obligations,
        AnalysisMode::Renewal,
        AnalysisMode::Legal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Standard => "standard",
            AnalysisMode::Parsing => "parsing",
            AnalysisMode::Redlining => "redlining",
            AnalysisMode::Obligations => "obligations",
            AnalysisMode::Renewal => "renewal",
            AnalysisMode::Legal => "legal",
        }
    }

    /// Human-readable label used in prompts and context blocks
    pub fn label(&self) -> &'static str {
        match self {
            AnalysisMode::Standard => "Standard clause extraction",
            AnalysisMode::Parsing => "Clause parsing by phase",
            AnalysisMode::Redlining => "Redlining review",
            AnalysisMode::Obligations => "Obligation tracking",
            AnalysisMode::Renewal => "Renewal and timeline events",
            AnalysisMode::Legal => "Legal risk flagging",
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AnalysisMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        AnalysisMode::ALL
            .iter()
            .copied()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| UnknownMode(s.trim().to_string()))
    }
}

/// Stable, machine-checkable error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ValidationError,
    UpstreamServiceError,
    ModeAnalysisError,
    InsufficientContentError,
    ParseRepairExhausted,
    NotFound,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::UpstreamServiceError => "UPSTREAM_SERVICE_ERROR",
            ErrorKind::ModeAnalysisError => "MODE_ANALYSIS_ERROR",
            ErrorKind::InsufficientContentError => "INSUFFICIENT_CONTENT_ERROR",
            ErrorKind::ParseRepairExhausted => "PARSE_REPAIR_EXHAUSTED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error record stored in a failed mode's slot and attached to fatal
/// progress events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Always `true`; lets clients tell an envelope from a payload
    pub error: bool,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Internal detail, only populated outside production
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: true,
            kind,
            message: message.into(),
            stage: None,
            mode: None,
            timestamp: Utc::now(),
            detail: None,
        }
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Outcome of one analysis mode
#[derive(Debug, Clone, PartialEq)]
pub enum ModePayload {
    Success(serde_json::Value),
    Failed(ErrorEnvelope),
}

impl ModePayload {
    pub fn is_success(&self) -> bool {
        matches!(self, ModePayload::Success(_))
    }

    pub fn as_success(&self) -> Option<&serde_json::Value> {
        match self {
            ModePayload::Success(value) => Some(value),
            ModePayload::Failed(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorEnvelope> {
        match self {
            ModePayload::Success(_) => None,
            ModePayload::Failed(envelope) => Some(envelope),
        }
    }
}

impl Serialize for ModePayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ModePayload::Success(value) => value.serialize(serializer),
            ModePayload::Failed(envelope) => envelope.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ModePayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let looks_like_envelope = value.get("error").and_then(|e| e.as_bool()) == Some(true)
            && value.get("kind").is_some();

        if looks_like_envelope {
            if let Ok(envelope) = serde_json::from_value::<ErrorEnvelope>(value.clone()) {
                return Ok(ModePayload::Failed(envelope));
            }
        }
        Ok(ModePayload::Success(value))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisModeResult {
    pub mode: String,
    pub payload: ModePayload,
}

/// Per-mode results keyed by mode name, in requested order.
///
/// Serializes as a JSON object whose key order is the insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisResults {
    entries: Vec<AnalysisModeResult>,
}

impl AnalysisResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a mode's payload, replacing any previous slot wholesale
    pub fn insert(&mut self, mode: impl Into<String>, payload: ModePayload) {
        let mode = mode.into();
        match self.entries.iter_mut().find(|e| e.mode == mode) {
            Some(existing) => existing.payload = payload,
            None => self.entries.push(AnalysisModeResult { mode, payload }),
        }
    }

    pub fn get(&self, mode: &str) -> Option<&ModePayload> {
        self.entries
            .iter()
            .find(|e| e.mode == mode)
            .map(|e| &e.payload)
    }

    /// Successful payload for a mode, if the mode ran and succeeded
    pub fn success(&self, mode: AnalysisMode) -> Option<&serde_json::Value> {
        self.get(mode.as_str()).and_then(ModePayload::as_success)
    }

    pub fn modes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.mode.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnalysisModeResult> {
        self.entries.iter()
    }

    pub fn failures(&self) -> impl Iterator<Item = &AnalysisModeResult> {
        self.entries.iter().filter(|e| !e.payload.is_success())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for AnalysisResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.mode, &entry.payload)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AnalysisResults {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ResultsVisitor;

        impl<'de> Visitor<'de> for ResultsVisitor {
            type Value = AnalysisResults;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of analysis mode to result")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut results = AnalysisResults::new();
                while let Some((mode, payload)) = access.next_entry::<String, ModePayload>()? {
                    results.insert(mode, payload);
                }
                Ok(results)
            }
        }

        deserializer.deserialize_map(ResultsVisitor)
    }
}
