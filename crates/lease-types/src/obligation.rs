//! Obligation records produced by structured extraction

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Enforceability {
    Mandatory,
    Optional,
    Conditional,
}

impl Enforceability {
    pub const ALL: [Enforceability; 3] = [
        Enforceability::Mandatory,
        Enforceability::Optional,
        Enforceability::Conditional,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Enforceability::Mandatory => "Mandatory",
            Enforceability::Optional => "Optional",
            Enforceability::Conditional => "Conditional",
        }
    }

    /// Case-insensitive lookup
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.as_str().eq_ignore_ascii_case(value))
    }
}

/// Project phase an obligation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    General,
    Development,
    Construction,
    Operational,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::General,
        Phase::Development,
        Phase::Construction,
        Phase::Operational,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::General => "GENERAL",
            Phase::Development => "DEVELOPMENT",
            Phase::Construction => "CONSTRUCTION",
            Phase::Operational => "OPERATIONAL",
        }
    }

    /// Case-insensitive lookup
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(value))
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One contractual duty.
///
/// Every field except `consequence` is non-empty once a record leaves the
/// extraction service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObligationRecord {
    pub party: String,
    pub description: String,
    pub timeline: String,
    pub enforceability: Enforceability,
    pub phase: Phase,
    #[serde(default)]
    pub consequence: String,
    pub category: String,
}

pub const SENTINEL_CATEGORY: &str = "Information";
pub const SENTINEL_DESCRIPTION: &str = "No technical obligations found in the analyzed text.";

impl ObligationRecord {
    /// Placeholder returned when nothing usable could be extracted
    pub fn sentinel() -> Self {
        Self {
            party: "N/A".to_string(),
            description: SENTINEL_DESCRIPTION.to_string(),
            timeline: "N/A".to_string(),
            enforceability: Enforceability::Optional,
            phase: Phase::General,
            consequence: String::new(),
            category: SENTINEL_CATEGORY.to_string(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.category == SENTINEL_CATEGORY && self.description == SENTINEL_DESCRIPTION
    }

    /// True when all required fields carry text
    pub fn is_complete(&self) -> bool {
        [&self.party, &self.description, &self.timeline, &self.category]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}
