//! Structured extraction of obligation records from free-form analysis text
//!
//! The model is asked for a JSON array. Output that is not usable goes
//! through an ordered list of fallbacks (repair pass, prior records,
//! sentinel), so extraction always returns at least one record.

pub mod fallback;
pub mod validate;

use std::sync::Arc;

use lease_types::ObligationRecord;
use serde::Serialize;
use tracing::{info, warn};

use crate::gateway::{GenerativeModel, PersistenceGateway};
use crate::prompts::obligation_extraction_prompt;

pub use fallback::{FallbackReason, ObligationFallback, PriorRecords, RepairPass, Sentinel};
pub use validate::{parse_obligations, validate_record, Parsed};

/// Where the returned records came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    Parsed,
    Repaired,
    PriorRecords,
    Sentinel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionOutcome {
    pub records: Vec<ObligationRecord>,
    pub source: ExtractionSource,
}

impl ExtractionOutcome {
    pub fn new(records: Vec<ObligationRecord>, source: ExtractionSource) -> Self {
        Self { records, source }
    }

    pub fn sentinel() -> Self {
        Self::new(vec![ObligationRecord::sentinel()], ExtractionSource::Sentinel)
    }
}

pub struct ObligationExtractor {
    model: Arc<dyn GenerativeModel>,
    fallbacks: Vec<Box<dyn ObligationFallback>>,
}

impl ObligationExtractor {
    /// Repair pass, then sentinel
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        let fallbacks: Vec<Box<dyn ObligationFallback>> =
            vec![Box::new(RepairPass::new(Arc::clone(&model))), Box::new(Sentinel)];
        Self { model, fallbacks }
    }

    /// Repair pass, then records already stored for the document, then sentinel
    pub fn with_persistence(
        model: Arc<dyn GenerativeModel>,
        persistence: Arc<dyn PersistenceGateway>,
    ) -> Self {
        let fallbacks: Vec<Box<dyn ObligationFallback>> = vec![
            Box::new(RepairPass::new(Arc::clone(&model))),
            Box::new(PriorRecords::new(persistence)),
            Box::new(Sentinel),
        ];
        Self { model, fallbacks }
    }

    /// Replace the fallback chain. The sentinel is still used if every
    /// strategy declines.
    pub fn with_fallbacks(mut self, fallbacks: Vec<Box<dyn ObligationFallback>>) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    /// Records only; never empty
    pub async fn extract_obligations(&self, text: &str) -> Vec<ObligationRecord> {
        self.extract(None, text).await.records
    }

    pub async fn extract(&self, document_id: Option<&str>, text: &str) -> ExtractionOutcome {
        let reason = match self
            .model
            .generate(&obligation_extraction_prompt(text), None)
            .await
        {
            Ok(raw) => match parse_obligations(&raw) {
                Parsed::Valid(records) => {
                    info!(count = records.len(), "Extracted obligations");
                    return ExtractionOutcome::new(records, ExtractionSource::Parsed);
                }
                Parsed::Empty => FallbackReason::Empty,
                Parsed::Invalid { records, problems } => {
                    warn!(
                        problems = problems.len(),
                        valid = records.len(),
                        "Obligation output failed validation"
                    );
                    FallbackReason::Malformed {
                        raw,
                        problems,
                        salvaged: records,
                    }
                }
            },
            Err(e) => {
                warn!(error = %e, "Obligation extraction call failed");
                FallbackReason::ModelUnavailable(e.to_string())
            }
        };

        for fallback in &self.fallbacks {
            if let Some(outcome) = fallback.attempt(document_id, &reason).await {
                if !outcome.records.is_empty() {
                    info!(
                        strategy = fallback.name(),
                        count = outcome.records.len(),
                        "Obligation fallback succeeded"
                    );
                    return outcome;
                }
            }
        }

        ExtractionOutcome::sentinel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryPersistence;
    use crate::test_support::ScriptedModel;
    use lease_types::{Enforceability, Phase};
    use pretty_assertions::assert_eq;

    const VALID: &str = r#"[{"party": "Lessee", "description": "Pay annual rent", "timeline": "Annually",
        "enforceability": "Mandatory", "phase": "OPERATIONAL", "category": "Payment"}]"#;

    #[tokio::test]
    async fn test_valid_output_needs_one_call() {
        let model = Arc::new(ScriptedModel::new().respond_with(VALID));
        let extractor = ObligationExtractor::new(model.clone());

        let outcome = extractor.extract(None, "analysis").await;
        assert_eq!(outcome.source, ExtractionSource::Parsed);
        assert_eq!(outcome.records[0].phase, Phase::Operational);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_fenced_output_with_commentary_needs_no_repair() {
        let fenced = format!(
            "Here are the obligations I found:\n```json\n{}\n```\nLet me know if you need more detail.",
            VALID
        );
        let model = Arc::new(ScriptedModel::new().respond_with(fenced));
        let extractor = ObligationExtractor::new(model.clone());

        let outcome = extractor.extract(None, "analysis").await;
        assert_eq!(outcome.source, ExtractionSource::Parsed);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].party, "Lessee");
        assert_eq!(model.calls(), 1);
        assert!(!model.prompts()[0].contains("OUTPUT TO FIX:"));
    }

    #[tokio::test]
    async fn test_invalid_output_is_repaired() {
        let model = Arc::new(
            ScriptedModel::new()
                .respond_with(r#"[{"party": "Lessee", "enforceability": "Mandatory"}]"#)
                .respond_with(VALID),
        );
        let extractor = ObligationExtractor::new(model.clone());

        let outcome = extractor.extract(None, "analysis").await;
        assert_eq!(outcome.source, ExtractionSource::Repaired);
        assert_eq!(model.calls(), 2);
        assert!(model.prompts()[1].contains("OUTPUT TO FIX:"));
    }

    #[tokio::test]
    async fn test_empty_array_skips_repair() {
        let model = Arc::new(ScriptedModel::new().respond_with("[]"));
        let extractor = ObligationExtractor::new(model.clone());

        let records = extractor.extract_obligations("analysis").await;
        assert_eq!(records, vec![ObligationRecord::sentinel()]);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_model_failure_falls_back_to_prior_records() {
        let persistence = Arc::new(MemoryPersistence::new());
        let prior = ObligationRecord {
            party: "Lessor".to_string(),
            description: "Repair the access road".to_string(),
            timeline: "Within 30 days of notice".to_string(),
            enforceability: Enforceability::Conditional,
            phase: Phase::Construction,
            consequence: String::new(),
            category: "Maintenance".to_string(),
        };
        persistence
            .save_obligations("doc-9", std::slice::from_ref(&prior))
            .await
            .unwrap();

        let model = Arc::new(ScriptedModel::new().fail_with("503"));
        let extractor = ObligationExtractor::with_persistence(model.clone(), persistence);

        let outcome = extractor.extract(Some("doc-9"), "analysis").await;
        assert_eq!(outcome.source, ExtractionSource::PriorRecords);
        assert_eq!(outcome.records, vec![prior]);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_chain_still_returns_sentinel() {
        let model = Arc::new(ScriptedModel::new().respond_with("nothing useful"));
        let extractor = ObligationExtractor::new(model).with_fallbacks(Vec::new());

        let outcome = extractor.extract(None, "analysis").await;
        assert_eq!(outcome, ExtractionOutcome::sentinel());
    }
}
