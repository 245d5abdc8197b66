//! Ordered recovery strategies tried when the first extraction attempt does
//! not yield valid records

use std::sync::Arc;

use async_trait::async_trait;
use lease_types::ObligationRecord;
use tracing::{debug, warn};

use super::validate::{parse_obligations, Parsed};
use super::{ExtractionOutcome, ExtractionSource};
use crate::error::AnalysisError;
use crate::gateway::{GenerativeModel, PersistenceGateway};
use crate::prompts::obligation_repair_prompt;

/// Why the first attempt did not produce records
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// Output was unparseable or had invalid elements
    Malformed {
        raw: String,
        problems: Vec<String>,
        /// Elements of the first attempt that did validate
        salvaged: Vec<ObligationRecord>,
    },
    /// The model answered with an empty array
    Empty,
    /// The model call itself failed
    ModelUnavailable(String),
}

#[async_trait]
pub trait ObligationFallback: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` passes control to the next strategy
    async fn attempt(
        &self,
        document_id: Option<&str>,
        reason: &FallbackReason,
    ) -> Option<ExtractionOutcome>;
}

/// One model call asking for the malformed output to be fixed
pub struct RepairPass {
    model: Arc<dyn GenerativeModel>,
}

impl RepairPass {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl ObligationFallback for RepairPass {
    fn name(&self) -> &'static str {
        "repair"
    }

    async fn attempt(
        &self,
        _document_id: Option<&str>,
        reason: &FallbackReason,
    ) -> Option<ExtractionOutcome> {
        let FallbackReason::Malformed {
            raw,
            problems,
            salvaged,
        } = reason
        else {
            return None;
        };

        let repaired = match self
            .model
            .generate(&obligation_repair_prompt(raw, problems), None)
            .await
        {
            Ok(output) => match parse_obligations(&output) {
                Parsed::Valid(records) => records,
                Parsed::Invalid { records, problems } => {
                    debug!(dropped = problems.len(), "Dropping records still invalid after repair");
                    records
                }
                Parsed::Empty => Vec::new(),
            },
            Err(e) => {
                warn!(error = %e, "Repair call failed");
                Vec::new()
            }
        };

        if !repaired.is_empty() {
            return Some(ExtractionOutcome::new(repaired, ExtractionSource::Repaired));
        }

        let exhausted = AnalysisError::ParseRepairExhausted(problems.join("; "));
        warn!(error = %exhausted, salvaged = salvaged.len(), "Repair produced no records");

        // Valid elements from the first attempt beat prior records or the sentinel
        (!salvaged.is_empty())
            .then(|| ExtractionOutcome::new(salvaged.clone(), ExtractionSource::Parsed))
    }
}

/// Obligations previously persisted for the same document
pub struct PriorRecords {
    persistence: Arc<dyn PersistenceGateway>,
}

impl PriorRecords {
    pub fn new(persistence: Arc<dyn PersistenceGateway>) -> Self {
        Self { persistence }
    }
}

#[async_trait]
impl ObligationFallback for PriorRecords {
    fn name(&self) -> &'static str {
        "prior_records"
    }

    async fn attempt(
        &self,
        document_id: Option<&str>,
        _reason: &FallbackReason,
    ) -> Option<ExtractionOutcome> {
        let document_id = document_id?;
        match self.persistence.get_obligations(document_id).await {
            Ok(records) if !records.is_empty() => Some(ExtractionOutcome::new(
                records,
                ExtractionSource::PriorRecords,
            )),
            Ok(_) => None,
            Err(e) => {
                warn!(document_id, error = %e, "Could not load prior obligations");
                None
            }
        }
    }
}

/// Always succeeds with the single placeholder record
pub struct Sentinel;

#[async_trait]
impl ObligationFallback for Sentinel {
    fn name(&self) -> &'static str {
        "sentinel"
    }

    async fn attempt(
        &self,
        _document_id: Option<&str>,
        _reason: &FallbackReason,
    ) -> Option<ExtractionOutcome> {
        Some(ExtractionOutcome::sentinel())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryPersistence;
    use crate::test_support::ScriptedModel;
    use lease_types::{Enforceability, Phase};

    fn malformed(salvaged: Vec<ObligationRecord>) -> FallbackReason {
        FallbackReason::Malformed {
            raw: "[{\"party\": \"Lessee\"}]".to_string(),
            problems: vec!["item 0: missing description".to_string()],
            salvaged,
        }
    }

    fn record(description: &str) -> ObligationRecord {
        ObligationRecord {
            party: "Lessee".to_string(),
            description: description.to_string(),
            timeline: "Annually".to_string(),
            enforceability: Enforceability::Mandatory,
            phase: Phase::Operational,
            consequence: String::new(),
            category: "Payment".to_string(),
        }
    }

    #[tokio::test]
    async fn test_repair_only_handles_malformed_output() {
        let model = Arc::new(ScriptedModel::new().otherwise("[]"));
        let repair = RepairPass::new(model.clone());

        assert!(repair.attempt(None, &FallbackReason::Empty).await.is_none());
        assert!(repair
            .attempt(None, &FallbackReason::ModelUnavailable("down".into()))
            .await
            .is_none());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_repair_sends_problems_to_model() {
        let model = Arc::new(ScriptedModel::new().respond_with(
            r#"[{"party": "Lessee", "description": "Pay rent", "enforceability": "Mandatory"}]"#,
        ));
        let repair = RepairPass::new(model.clone());

        let outcome = repair.attempt(None, &malformed(vec![])).await.unwrap();
        assert_eq!(outcome.source, ExtractionSource::Repaired);
        assert_eq!(outcome.records[0].description, "Pay rent");
        assert!(model.prompts()[0].contains("item 0: missing description"));
    }

    #[tokio::test]
    async fn test_failed_repair_keeps_salvaged_records() {
        let model = Arc::new(ScriptedModel::new().fail_with("overloaded"));
        let repair = RepairPass::new(model);

        let outcome = repair
            .attempt(None, &malformed(vec![record("Pay rent")]))
            .await
            .unwrap();
        assert_eq!(outcome.source, ExtractionSource::Parsed);
        assert_eq!(outcome.records.len(), 1);

        let model = Arc::new(ScriptedModel::new().respond_with("still not json"));
        assert!(RepairPass::new(model)
            .attempt(None, &malformed(vec![]))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_prior_records_need_a_document() {
        let persistence = Arc::new(MemoryPersistence::new());
        persistence
            .save_obligations("doc-1", &[record("Maintain insurance")])
            .await
            .unwrap();
        let prior = PriorRecords::new(persistence);

        assert!(prior.attempt(None, &FallbackReason::Empty).await.is_none());
        assert!(prior
            .attempt(Some("doc-2"), &FallbackReason::Empty)
            .await
            .is_none());

        let outcome = prior
            .attempt(Some("doc-1"), &FallbackReason::Empty)
            .await
            .unwrap();
        assert_eq!(outcome.source, ExtractionSource::PriorRecords);
        assert_eq!(outcome.records[0].description, "Maintain insurance");
    }
}
