//! Chat context assembled from analyzed documents
//!
//! Statistics are derived from the stored mode payloads. A statistic whose
//! source mode is missing or failed is `None` and left out of the rendered
//! block.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use lease_types::{AnalysisMode, DocumentRecord, Phase};
use serde::Serialize;
use serde_json::Value;

use crate::modes::truncate_chars;

/// Key items listed per category in rendered context
pub const TOP_ITEMS: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiskCounts {
    /// High and critical
    pub high: usize,
    pub medium: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentContext {
    pub document_id: String,
    pub file_name: String,
    pub lease_type: String,
    /// Modes with a successful result, in requested order
    pub modes: Vec<String>,
    pub excerpt: String,
    pub clause_counts: Option<BTreeMap<Phase, usize>>,
    pub risk_counts: Option<RiskCounts>,
    pub obligation_count: Option<usize>,
    pub timeline_event_count: Option<usize>,
    pub top_risks: Vec<String>,
    pub top_obligations: Vec<String>,
    pub top_renewal_events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioContext {
    pub total_documents: usize,
    /// Sorted, distinct
    pub lease_types: Vec<String>,
    /// Sorted, distinct
    pub modes: Vec<String>,
    pub total_clauses: Option<usize>,
    pub risk_counts: Option<RiskCounts>,
    pub total_obligations: Option<usize>,
    pub total_timeline_events: Option<usize>,
    pub documents: Vec<DocumentContext>,
}

fn array<'a>(value: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    value.get(key)?.as_array()
}

fn text<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn clause_counts(doc: &DocumentRecord) -> Option<BTreeMap<Phase, usize>> {
    let clauses = doc
        .results
        .success(AnalysisMode::Parsing)
        .and_then(|v| array(v, "clauses"))
        .or_else(|| {
            doc.results
                .success(AnalysisMode::Standard)
                .and_then(|v| array(v, "clauses"))
        })?;

    let mut counts = BTreeMap::new();
    for clause in clauses {
        let phase = text(clause, "phase")
            .and_then(Phase::parse)
            .unwrap_or(Phase::General);
        *counts.entry(phase).or_insert(0) += 1;
    }
    Some(counts)
}

fn risk_counts(doc: &DocumentRecord) -> Option<RiskCounts> {
    let legal = doc
        .results
        .success(AnalysisMode::Legal)
        .and_then(|v| array(v, "risks"))
        .map(|risks| risks.iter().filter_map(|r| text(r, "severity")).collect::<Vec<_>>());
    let redlines = doc
        .results
        .success(AnalysisMode::Redlining)
        .and_then(|v| array(v, "redlines"))
        .map(|items| items.iter().filter_map(|r| text(r, "risk_level")).collect::<Vec<_>>());

    if legal.is_none() && redlines.is_none() {
        return None;
    }

    let mut counts = RiskCounts::default();
    for level in legal.into_iter().chain(redlines).flatten() {
        match level.to_lowercase().as_str() {
            "high" | "critical" => counts.high += 1,
            "medium" => counts.medium += 1,
            _ => {}
        }
    }
    Some(counts)
}

fn obligation_count(doc: &DocumentRecord) -> Option<usize> {
    doc.results
        .success(AnalysisMode::Obligations)
        .and_then(|v| array(v, "obligations"))
        .map(Vec::len)
}

fn timeline_event_count(doc: &DocumentRecord) -> Option<usize> {
    let renewal = doc.results.success(AnalysisMode::Renewal)?;
    let timeline = array(renewal, "timeline").map(Vec::len);
    let events = array(renewal, "renewal_events").map(Vec::len);
    match (timeline, events) {
        (None, None) => None,
        (t, e) => Some(t.unwrap_or(0) + e.unwrap_or(0)),
    }
}

fn top_risks(doc: &DocumentRecord) -> Vec<String> {
    let legal = doc
        .results
        .success(AnalysisMode::Legal)
        .and_then(|v| array(v, "risks"))
        .into_iter()
        .flatten()
        .filter_map(|risk| {
            let title = text(risk, "title").or_else(|| text(risk, "description"))?;
            Some(match text(risk, "severity") {
                Some(severity) => format!("{} ({})", title, severity),
                None => title.to_string(),
            })
        });
    let redlines = doc
        .results
        .success(AnalysisMode::Redlining)
        .and_then(|v| array(v, "redlines"))
        .into_iter()
        .flatten()
        .filter_map(|redline| {
            let issue = text(redline, "issue")?;
            let clause = text(redline, "clause").unwrap_or("Clause");
            Some(match text(redline, "risk_level") {
                Some(level) => format!("{}: {} ({})", clause, issue, level),
                None => format!("{}: {}", clause, issue),
            })
        });

    legal.chain(redlines).take(TOP_ITEMS).collect()
}

fn top_obligations(doc: &DocumentRecord) -> Vec<String> {
    doc.results
        .success(AnalysisMode::Obligations)
        .and_then(|v| array(v, "obligations"))
        .into_iter()
        .flatten()
        .filter_map(|item| {
            let description = text(item, "description")?;
            Some(match text(item, "party") {
                Some(party) => format!("{}: {}", party, description),
                None => description.to_string(),
            })
        })
        .take(TOP_ITEMS)
        .collect()
}

fn top_renewal_events(doc: &DocumentRecord) -> Vec<String> {
    let Some(renewal) = doc.results.success(AnalysisMode::Renewal) else {
        return Vec::new();
    };
    ["renewal_events", "timeline"]
        .iter()
        .filter_map(|key| array(renewal, key))
        .flatten()
        .filter_map(|item| {
            let event = text(item, "event")?;
            Some(match text(item, "date") {
                Some(date) => format!("{} - {}", event, date),
                None => event.to_string(),
            })
        })
        .take(TOP_ITEMS)
        .collect()
}

pub fn build_document_context(doc: &DocumentRecord, excerpt_chars: usize) -> DocumentContext {
    DocumentContext {
        document_id: doc.id.clone(),
        file_name: doc.file_name.clone(),
        lease_type: doc.lease_type.clone(),
        modes: doc
            .results
            .iter()
            .filter(|r| r.payload.is_success())
            .map(|r| r.mode.clone())
            .collect(),
        excerpt: truncate_chars(doc.extracted_text.trim(), excerpt_chars).to_string(),
        clause_counts: clause_counts(doc),
        risk_counts: risk_counts(doc),
        obligation_count: obligation_count(doc),
        timeline_event_count: timeline_event_count(doc),
        top_risks: top_risks(doc),
        top_obligations: top_obligations(doc),
        top_renewal_events: top_renewal_events(doc),
    }
}

/// Sum of the values that are present; `None` when none are
fn sum_present(values: impl Iterator<Item = Option<usize>>) -> Option<usize> {
    values.flatten().fold(None, |acc, n| Some(acc.unwrap_or(0) + n))
}

pub fn build_portfolio_context(docs: &[DocumentRecord], excerpt_chars: usize) -> PortfolioContext {
    let documents: Vec<DocumentContext> = docs
        .iter()
        .map(|doc| build_document_context(doc, excerpt_chars))
        .collect();

    let lease_types: BTreeSet<String> = documents.iter().map(|d| d.lease_type.clone()).collect();
    let modes: BTreeSet<String> = documents
        .iter()
        .flat_map(|d| d.modes.iter().cloned())
        .collect();

    let risk_counts = documents
        .iter()
        .filter_map(|d| d.risk_counts)
        .fold(None, |acc: Option<RiskCounts>, r| {
            let acc = acc.unwrap_or_default();
            Some(RiskCounts {
                high: acc.high + r.high,
                medium: acc.medium + r.medium,
            })
        });

    PortfolioContext {
        total_documents: documents.len(),
        lease_types: lease_types.into_iter().collect(),
        modes: modes.into_iter().collect(),
        total_clauses: sum_present(
            documents
                .iter()
                .map(|d| d.clause_counts.as_ref().map(|c| c.values().sum())),
        ),
        risk_counts,
        total_obligations: sum_present(documents.iter().map(|d| d.obligation_count)),
        total_timeline_events: sum_present(documents.iter().map(|d| d.timeline_event_count)),
        documents,
    }
}

fn write_list(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "{}:", heading);
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
}

impl DocumentContext {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Document: {} ({} lease)", self.file_name, self.lease_type);
        if !self.modes.is_empty() {
            let _ = writeln!(out, "Analysis Modes: {}", self.modes.join(", "));
        }
        if let Some(counts) = &self.clause_counts {
            let by_phase: Vec<String> = counts
                .iter()
                .map(|(phase, n)| format!("{} {}", phase, n))
                .collect();
            let _ = writeln!(out, "Clauses by Phase: {}", by_phase.join(", "));
        }
        if let Some(risks) = &self.risk_counts {
            let _ = writeln!(
                out,
                "Risks: {} high/critical, {} medium",
                risks.high, risks.medium
            );
        }
        if let Some(n) = self.obligation_count {
            let _ = writeln!(out, "Obligations: {}", n);
        }
        if let Some(n) = self.timeline_event_count {
            let _ = writeln!(out, "Timeline Events: {}", n);
        }
        write_list(&mut out, "Key Risks", &self.top_risks);
        write_list(&mut out, "Key Obligations", &self.top_obligations);
        write_list(&mut out, "Renewal Events", &self.top_renewal_events);
        let _ = writeln!(out, "Excerpt:\n{}", self.excerpt);
        out
    }
}

impl PortfolioContext {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Total Documents: {}", self.total_documents);
        let _ = writeln!(out, "Lease Types: {}", self.lease_types.join(", "));
        let _ = writeln!(out, "Analysis Modes: {}", self.modes.join(", "));
        if let Some(n) = self.total_clauses {
            let _ = writeln!(out, "Total Clauses: {}", n);
        }
        if let Some(risks) = &self.risk_counts {
            let _ = writeln!(out, "High/Critical Risks: {}", risks.high);
            let _ = writeln!(out, "Medium Risks: {}", risks.medium);
        }
        if let Some(n) = self.total_obligations {
            let _ = writeln!(out, "Total Obligations: {}", n);
        }
        if let Some(n) = self.total_timeline_events {
            let _ = writeln!(out, "Timeline Events: {}", n);
        }

        for (index, document) in self.documents.iter().enumerate() {
            let _ = write!(out, "\n--- Document {} ---\n{}", index + 1, document.render());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lease_types::{AnalysisResults, ErrorEnvelope, ErrorKind, ModePayload};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn document(results: AnalysisResults) -> DocumentRecord {
        DocumentRecord {
            id: "doc-1".to_string(),
            owner_id: "user-1".to_string(),
            session_id: "s1".to_string(),
            file_name: "farm.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            storage_location: "memory://user-1/s1/farm.pdf".to_string(),
            document_hash: "00".to_string(),
            lease_type: "solar".to_string(),
            modes: results.modes().map(str::to_string).collect(),
            extracted_text: "  SOLAR GROUND LEASE. ".repeat(50),
            results,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_statistics_from_mode_payloads() {
        let mut results = AnalysisResults::new();
        results.insert(
            "parsing",
            ModePayload::Success(json!({"clauses": [
                {"phase": "development"}, {"phase": "OPERATIONAL"}, {"phase": "Operational"}, {}
            ]})),
        );
        results.insert(
            "legal",
            ModePayload::Success(json!({"risks": [
                {"title": "Uncapped indemnity", "severity": "Critical"},
                {"title": "Vague access rights", "severity": "medium"},
                {"title": "Typo", "severity": "low"}
            ]})),
        );
        results.insert(
            "redlining",
            ModePayload::Success(json!({"redlines": [
                {"clause": "4.2", "issue": "One-sided termination", "risk_level": "high"}
            ]})),
        );
        results.insert(
            "renewal",
            ModePayload::Success(json!({
                "renewal_events": [{"event": "First extension", "date": "2045-01-01"}],
                "timeline": [{"event": "Rent escalation"}, {"event": "COD deadline"}]
            })),
        );

        let context = build_document_context(&document(results), 500);

        let clauses = context.clause_counts.clone().unwrap();
        assert_eq!(clauses.get(&Phase::Operational), Some(&2));
        assert_eq!(clauses.get(&Phase::Development), Some(&1));
        assert_eq!(clauses.get(&Phase::General), Some(&1));
        assert_eq!(context.risk_counts, Some(RiskCounts { high: 2, medium: 1 }));
        assert_eq!(context.timeline_event_count, Some(3));
        assert_eq!(context.obligation_count, None);
        assert_eq!(
            context.top_risks,
            vec![
                "Uncapped indemnity (Critical)".to_string(),
                "Vague access rights (medium)".to_string(),
                "Typo (low)".to_string(),
            ]
        );
        assert_eq!(
            context.top_renewal_events[0],
            "First extension - 2045-01-01"
        );
        assert_eq!(context.excerpt.chars().count(), 500);
        assert!(context.excerpt.starts_with("SOLAR"));
    }

    #[test]
    fn test_failed_modes_are_omitted() {
        let mut results = AnalysisResults::new();
        results.insert(
            "obligations",
            ModePayload::Failed(ErrorEnvelope::new(ErrorKind::ModeAnalysisError, "timeout")),
        );
        results.insert("standard", ModePayload::Success(json!("prose answer")));

        let context = build_document_context(&document(results), 100);
        assert_eq!(context.obligation_count, None);
        assert_eq!(context.clause_counts, None);
        assert_eq!(context.modes, vec!["standard".to_string()]);

        let rendered = context.render();
        assert!(!rendered.contains("Obligations:"));
        assert!(!rendered.contains("Clauses by Phase"));
    }

    #[test]
    fn test_standard_clauses_used_without_parsing() {
        let mut results = AnalysisResults::new();
        results.insert(
            "standard",
            ModePayload::Success(json!({"summary": "s", "clauses": [{"title": "Rent", "phase": "GENERAL"}]})),
        );
        let context = build_document_context(&document(results), 100);
        assert_eq!(
            context.clause_counts,
            Some(BTreeMap::from([(Phase::General, 1)]))
        );
    }

    #[test]
    fn test_portfolio_rollup() {
        let mut first = AnalysisResults::new();
        first.insert("obligations", ModePayload::Success(json!({"obligations": [{}, {}]})));
        let mut second = AnalysisResults::new();
        second.insert("obligations", ModePayload::Success(json!({"obligations": [{}]})));
        second.insert("legal", ModePayload::Success(json!({"risks": []})));

        let mut wind = document(second);
        wind.lease_type = "wind".to_string();
        let portfolio = build_portfolio_context(&[document(first), wind], 500);

        assert_eq!(portfolio.total_documents, 2);
        assert_eq!(portfolio.lease_types, vec!["solar", "wind"]);
        assert_eq!(portfolio.modes, vec!["legal", "obligations"]);
        assert_eq!(portfolio.total_obligations, Some(3));
        assert_eq!(portfolio.risk_counts, Some(RiskCounts::default()));
        assert_eq!(portfolio.total_clauses, None);

        let rendered = portfolio.render();
        assert!(rendered.starts_with("Total Documents: 2\n"));
        assert!(rendered.contains("Lease Types: solar, wind"));
        assert!(rendered.contains("--- Document 2 ---"));
        assert!(!rendered.contains("Total Clauses"));
    }
}
