//! Intent classification for portfolio chat

use serde::Serialize;

/// Phrases that ask for an overview of the whole portfolio
pub const PORTFOLIO_SUMMARY_KEYWORDS: &[&str] = &[
    "summarize",
    "summarise",
    "summary",
    "overview",
    "compare all",
    "patterns",
    "across all",
    "portfolio",
    "all documents",
    "all leases",
    "all my leases",
    "big picture",
    "high level",
    "high-level",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    PortfolioSummary,
    ComparativeAnalysis,
}

pub trait IntentClassifier: Send + Sync {
    fn classify(&self, message: &str) -> Intent;
}

/// Case-insensitive substring match against a fixed vocabulary
#[derive(Debug, Clone)]
pub struct KeywordIntentClassifier {
    keywords: &'static [&'static str],
}

impl KeywordIntentClassifier {
    pub fn new() -> Self {
        Self {
            keywords: PORTFOLIO_SUMMARY_KEYWORDS,
        }
    }

    pub fn with_keywords(keywords: &'static [&'static str]) -> Self {
        Self { keywords }
    }
}

impl Default for KeywordIntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier for KeywordIntentClassifier {
    fn classify(&self, message: &str) -> Intent {
        let lower = message.to_lowercase();
        if self.keywords.iter().any(|keyword| lower.contains(keyword)) {
            Intent::PortfolioSummary
        } else {
            Intent::ComparativeAnalysis
        }
    }
}
