//! Prompt text sent to the generative model

use lease_types::AnalysisMode;

/// Instruction used when asking the model to transcribe an uploaded file
pub const TEXT_EXTRACTION_PROMPT: &str = "Extract all of the text from this lease document. \
Preserve section numbering, headings and paragraph breaks. Return only the document text, \
with no commentary, summary or Markdown formatting.";

/// Mode-specific instructions and the JSON shape each mode must return
fn mode_instructions(mode: AnalysisMode) -> &'static str {
    match mode {
        AnalysisMode::Standard => {
            r#"Identify the key clauses of this lease (parties, premises, term, rent, escalation,
assignment, insurance, indemnity, termination, default) and summarize each.

Respond with JSON in exactly this shape:
{
  "summary": "<two or three sentence overview>",
  "clauses": [
    { "title": "<clause name>", "phase": "GENERAL|DEVELOPMENT|CONSTRUCTION|OPERATIONAL", "text": "<summary of the clause>" }
  ],
  "key_terms": { "<term>": "<value>" }
}"#
        }
        AnalysisMode::Parsing => {
            r#"Split this lease into its individual clauses and assign each clause to the project
phase it governs: GENERAL, DEVELOPMENT, CONSTRUCTION or OPERATIONAL.

Respond with JSON in exactly this shape:
{
  "clauses": [
    { "section": "<section number or heading>", "phase": "GENERAL|DEVELOPMENT|CONSTRUCTION|OPERATIONAL", "category": "<short category>", "text": "<clause text, abbreviated if long>" }
  ]
}"#
        }
        AnalysisMode::Redlining => {
            r#"Review this lease from the tenant's perspective and propose redlines for unfavorable
or ambiguous language.

Respond with JSON in exactly this shape:
{
  "redlines": [
    { "clause": "<clause reference>", "issue": "<what is wrong>", "suggestion": "<proposed replacement language>", "risk_level": "critical|high|medium|low" }
  ]
}"#
        }
        AnalysisMode::Obligations => {
            r#"List every obligation imposed on any party by this lease.

Respond with JSON in exactly this shape:
{
  "obligations": [
    { "party": "<who owes the duty>", "description": "<the duty>", "timeline": "<when or how often>", "enforceability": "Mandatory|Optional|Conditional", "phase": "GENERAL|DEVELOPMENT|CONSTRUCTION|OPERATIONAL", "consequence": "<consequence of breach, if stated>", "category": "<short category>" }
  ]
}"#
        }
        AnalysisMode::Renewal => {
            r#"Identify renewal options, extension rights, expiration, notice deadlines, rent
escalation dates and any other dated events in this lease.

Respond with JSON in exactly this shape:
{
  "renewal_events": [
    { "event": "<renewal or extension right>", "date": "<date or trigger>", "notice_period": "<required notice>" }
  ],
  "timeline": [
    { "event": "<dated event>", "date": "<date or trigger>" }
  ]
}"#
        }
        AnalysisMode::Legal => {
            r#"Flag legal risks in this lease: one-sided indemnities, uncapped liability, unusual
termination rights, missing protections, compliance exposure.

Respond with JSON in exactly this shape:
{
  "risks": [
    { "title": "<short risk name>", "severity": "critical|high|medium|low", "description": "<why it matters>", "clause": "<clause reference>" }
  ]
}"#
        }
    }
}

/// Full prompt for one analysis mode
pub fn mode_prompt(mode: AnalysisMode, lease_type: &str, text: &str) -> String {
    format!(
        "You are an expert commercial lease analyst reviewing a {lease_type} lease.\n\
         Task: {label}.\n\n\
         {instructions}\n\n\
         Respond only with valid JSON. Do not include Markdown fences or commentary.\n\n\
         LEASE TEXT:\n{text}",
        lease_type = lease_type,
        label = mode.label(),
        instructions = mode_instructions(mode),
        text = text,
    )
}

/// JSON schema description shared by the extraction and repair prompts
pub const OBLIGATION_SCHEMA: &str = r#"[
  {
    "party": "string, required - who owes the duty",
    "description": "string, required - the duty itself",
    "timeline": "string, required - when or how often",
    "enforceability": "one of: Mandatory, Optional, Conditional",
    "phase": "one of: GENERAL, DEVELOPMENT, CONSTRUCTION, OPERATIONAL",
    "consequence": "string, optional - consequence of non-performance",
    "category": "string, required - short category such as Payment, Maintenance, Insurance"
  }
]"#;

pub fn obligation_extraction_prompt(analysis_text: &str) -> String {
    format!(
        "Convert the following lease analysis into a list of obligation records.\n\n\
         Return ONLY a JSON array matching this schema. No explanation, no Markdown, no code fences.\n\
         {schema}\n\n\
         If the text contains no obligations, return [].\n\n\
         ANALYSIS:\n{text}",
        schema = OBLIGATION_SCHEMA,
        text = analysis_text,
    )
}

pub fn obligation_repair_prompt(malformed: &str, problems: &[String]) -> String {
    let problem_list = if problems.is_empty() {
        "- output was not valid JSON".to_string()
    } else {
        problems
            .iter()
            .map(|p| format!("- {}", p))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "The following output was supposed to be a JSON array matching this schema:\n\
         {schema}\n\n\
         It has these problems:\n{problems}\n\n\
         Fix the output so it is a valid JSON array that matches the schema exactly. \
         Keep the original content; fill missing required fields from context where possible. \
         Return ONLY the corrected JSON array.\n\n\
         OUTPUT TO FIX:\n{malformed}",
        schema = OBLIGATION_SCHEMA,
        problems = problem_list,
        malformed = malformed,
    )
}

pub const DOCUMENT_ASSISTANT_PROMPT: &str = "You are a lease analysis assistant. Answer the \
user's question using the document context below. Cite the relevant clause or analysis \
section when you can. If the context does not contain the answer, say so plainly.";

pub const PORTFOLIO_SUMMARY_PROMPT: &str = "You are a lease portfolio analyst. Produce a \
comprehensive summary of the user's lease portfolio from the context below: overall \
composition, lease types, the most significant risks and obligations, upcoming renewal \
events, and patterns that recur across documents. Use headings and bullet points.";

pub const COMPARATIVE_ANALYSIS_PROMPT: &str = "You are a lease portfolio analyst. Answer the \
user's question by comparing the documents in the context below. Call out where documents \
agree, where they differ, and which document each point comes from. If the context does not \
contain the answer, say so plainly.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_prompt_includes_lease_type_and_text() {
        let prompt = mode_prompt(AnalysisMode::Legal, "solar", "Tenant shall indemnify...");
        assert!(prompt.contains("solar lease"));
        assert!(prompt.contains("Legal risk flagging"));
        assert!(prompt.contains("\"risks\""));
        assert!(prompt.ends_with("Tenant shall indemnify..."));
    }

    #[test]
    fn test_repair_prompt_lists_problems() {
        let prompt = obligation_repair_prompt(
            "[{\"party\": \"Tenant\"}]",
            &["record 0: missing description".to_string()],
        );
        assert!(prompt.contains("- record 0: missing description"));
        assert!(prompt.contains("OUTPUT TO FIX:\n[{\"party\": \"Tenant\"}]"));
    }
}
