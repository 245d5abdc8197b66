//! Coercion of raw model output into obligation records

use lease_types::{Enforceability, ObligationRecord, Phase};
use serde_json::{Map, Value};

use crate::json::{isolate_array, strip_code_fences};

pub const DEFAULT_TIMELINE: &str = "Not specified";
pub const DEFAULT_CATEGORY: &str = "General";

/// Result of parsing one model response
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// Every element validated
    Valid(Vec<ObligationRecord>),
    /// The model answered `[]`
    Empty,
    /// Not parseable, or some elements failed validation. `records` holds
    /// the elements that did validate.
    Invalid {
        records: Vec<ObligationRecord>,
        problems: Vec<String>,
    },
}

pub fn parse_obligations(raw: &str) -> Parsed {
    let cleaned = strip_code_fences(raw);
    let Some(slice) = isolate_array(&cleaned) else {
        return Parsed::Invalid {
            records: Vec::new(),
            problems: vec!["no JSON array found in output".to_string()],
        };
    };

    let items = match serde_json::from_str::<Value>(slice) {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            return Parsed::Invalid {
                records: Vec::new(),
                problems: vec!["top-level value is not an array".to_string()],
            }
        }
        Err(e) => {
            return Parsed::Invalid {
                records: Vec::new(),
                problems: vec![format!("invalid JSON: {}", e)],
            }
        }
    };

    if items.is_empty() {
        return Parsed::Empty;
    }

    let mut records = Vec::with_capacity(items.len());
    let mut problems = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match validate_record(item) {
            Ok(record) => records.push(record),
            Err(problem) => problems.push(format!("item {}: {}", index, problem)),
        }
    }

    if problems.is_empty() {
        Parsed::Valid(records)
    } else {
        Parsed::Invalid { records, problems }
    }
}

/// Validate one element, filling defaults for optional fields
pub fn validate_record(item: &Value) -> Result<ObligationRecord, String> {
    let obj = item
        .as_object()
        .ok_or_else(|| "expected an object".to_string())?;

    let party = text_field(obj, "party").ok_or("missing party")?;
    let description = text_field(obj, "description").ok_or("missing description")?;

    let enforceability = match text_field(obj, "enforceability") {
        Some(value) => Enforceability::parse(&value)
            .ok_or_else(|| format!("unrecognised enforceability '{}'", value))?,
        None => return Err("missing enforceability".to_string()),
    };

    let phase = match text_field(obj, "phase") {
        Some(value) => {
            Phase::parse(&value).ok_or_else(|| format!("unrecognised phase '{}'", value))?
        }
        None => Phase::General,
    };

    Ok(ObligationRecord {
        party,
        description,
        timeline: text_field(obj, "timeline").unwrap_or_else(|| DEFAULT_TIMELINE.to_string()),
        enforceability,
        phase,
        consequence: text_field(obj, "consequence").unwrap_or_default(),
        category: text_field(obj, "category").unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
    })
}

/// Trimmed, non-empty string value. Numbers are accepted as text.
fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    let text = match obj.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
