//! Cleanup of model output that is supposed to be JSON
//!
//! Models wrap JSON in Markdown fences and add conversational preamble or
//! trailing commentary despite instructions. These helpers peel that off.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Opening fence with optional language tag, or a closing fence
    static ref CODE_FENCE: Regex = Regex::new(r"(?m)^\s*```[A-Za-z0-9_-]*\s*$").unwrap();
}

/// Remove Markdown code-fence lines, keeping what was inside them
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").trim().to_string()
}

/// Slice from the first `[` to the last `]`
pub fn isolate_array(text: &str) -> Option<&str> {
    isolate_between(text, '[', ']')
}

/// Slice from the first `{` to the last `}`
pub fn isolate_object(text: &str) -> Option<&str> {
    isolate_between(text, '{', '}')
}

fn isolate_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Best-effort parse of a model response into a JSON value.
///
/// Tries the fence-stripped text as-is, then the outermost object, then the
/// outermost array. Returns `None` when none of them parse.
pub fn parse_loose(text: &str) -> Option<serde_json::Value> {
    let cleaned = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&cleaned) {
        return Some(value);
    }

    let object = isolate_object(&cleaned).and_then(|s| serde_json::from_str(s).ok());
    let array = isolate_array(&cleaned).and_then(|s| serde_json::from_str(s).ok());

    // Prefer whichever construct starts first so `[{...}]` stays an array
    match (object, array) {
        (Some(o), Some(a)) => {
            let object_start = cleaned.find('{').unwrap_or(usize::MAX);
            let array_start = cleaned.find('[').unwrap_or(usize::MAX);
            Some(if array_start < object_start { a } else { o })
        }
        (Some(o), None) => Some(o),
        (None, Some(a)) => Some(a),
        (None, None) => None,
    }
}
