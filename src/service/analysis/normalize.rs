//! Cleanup and validation of raw model responses
//!
//! Model output is never trusted: every mode is validated here, whether or not
//! the provider was asked to enforce a schema.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::model::{
    AnalysisRequest, AnalysisResult, CLAUSE_FINDING_FIELDS, ClauseFinding, ExplanationResult,
    RewriteResult,
};
use crate::service::analysis::error::ParseError;
use crate::service::analysis::modes::ModeSpec;
use crate::service::analysis::schema::ARRAY_ENVELOPE_KEY;

const EXPLANATION_FIELDS: [&str; 2] = ["short_title", "explanation"];
const REWRITE_FIELDS: [&str; 2] = ["suggested_clause", "explanation"];

/// Opening code fence, optionally tagged (```json, ``` json)
static OPENING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[ \t]*[A-Za-z0-9_-]*").expect("valid fence pattern"));

/// Outcome of a structural check on a model response
#[derive(Debug, Default)]
pub struct ShapeReport {
    /// Problems that make the response unusable
    pub errors: Vec<String>,
    /// Oddities that are tolerated
    pub warnings: Vec<String>,
}

impl ShapeReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    fn into_result(self) -> Result<(), ParseError> {
        for warning in &self.warnings {
            tracing::debug!(warning = %warning, "Tolerated issue in model response");
        }

        if self.is_valid() {
            Ok(())
        } else {
            Err(ParseError::SchemaViolation(self.errors.join("; ")))
        }
    }
}

/// Remove surrounding code-fence markers and whitespace
///
/// Text without fences only loses its surrounding whitespace.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(fence) = OPENING_FENCE.find(text) {
        text = &text[fence.end()..];
    }
    if let Some(inner) = text.strip_suffix("```") {
        text = inner;
    }

    text.trim()
}

/// Parse raw model text as JSON after fence stripping
pub fn parse_json(raw: &str) -> Result<Value, ParseError> {
    serde_json::from_str(strip_code_fences(raw)).map_err(|e| ParseError::Malformed {
        raw: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Turn raw model text into the result type of `spec`'s mode
pub fn normalize(
    spec: &ModeSpec,
    raw: &str,
    request: &AnalysisRequest,
) -> Result<AnalysisResult, ParseError> {
    let value = parse_json(raw)?;
    (spec.normalize)(value, request)
}

/// Validate a red-flags response and check its snippets against the contract
pub fn normalize_red_flags(
    value: Value,
    request: &AnalysisRequest,
) -> Result<AnalysisResult, ParseError> {
    let value = unwrap_array_envelope(value);
    let Value::Array(items) = value else {
        return Err(ParseError::SchemaViolation(format!(
            "expected a JSON array of findings, got {}",
            json_kind(&value)
        )));
    };

    let mut report = ShapeReport::default();
    for (i, item) in items.iter().enumerate() {
        validate_finding(i + 1, item, &mut report);
    }
    report.into_result()?;

    let findings: Vec<ClauseFinding> = serde_json::from_value(Value::Array(items))
        .map_err(|e| ParseError::SchemaViolation(e.to_string()))?;

    verify_snippets(&findings, request.text.as_deref().unwrap_or_default())?;

    Ok(AnalysisResult::RedFlags(findings))
}

/// Validate an explain-clause response
pub fn normalize_explanation(
    value: Value,
    _request: &AnalysisRequest,
) -> Result<AnalysisResult, ParseError> {
    validate_object(&value, &EXPLANATION_FIELDS).into_result()?;

    let explanation: ExplanationResult = serde_json::from_value(value)
        .map_err(|e| ParseError::SchemaViolation(e.to_string()))?;

    Ok(AnalysisResult::ExplainClause(explanation))
}

/// Validate a suggest-rewrite response
pub fn normalize_rewrite(
    value: Value,
    request: &AnalysisRequest,
) -> Result<AnalysisResult, ParseError> {
    validate_object(&value, &REWRITE_FIELDS).into_result()?;

    let rewrite: RewriteResult = serde_json::from_value(value)
        .map_err(|e| ParseError::SchemaViolation(e.to_string()))?;

    if let Some(original) = request.clause_text.as_deref()
        && rewrite.suggested_clause.trim() == original.trim()
    {
        return Err(ParseError::SchemaViolation(
            "suggested_clause repeats the original clause unchanged".to_string(),
        ));
    }

    Ok(AnalysisResult::SuggestRewrite(rewrite))
}

/// Check that every finding is anchored to literal contract text
pub fn verify_snippets(findings: &[ClauseFinding], contract: &str) -> Result<(), ParseError> {
    for (i, finding) in findings.iter().enumerate() {
        let anchors = [
            ("start_snippet", &finding.start_snippet),
            ("end_snippet", &finding.end_snippet),
        ];

        for (field, snippet) in anchors {
            if !contract.contains(snippet.as_str()) {
                return Err(ParseError::UnverifiableSnippet {
                    finding: i + 1,
                    field,
                    snippet: snippet.clone(),
                });
            }
        }

        if !contract.contains(finding.clause_text.as_str()) {
            tracing::debug!(
                finding = i + 1,
                clause_label = %finding.clause_label,
                "clause_text is not verbatim contract text"
            );
        }
    }

    Ok(())
}

/// `{ "findings": [...] }` becomes `[...]`; anything else is returned as is
fn unwrap_array_envelope(value: Value) -> Value {
    if let Value::Object(fields) = &value
        && fields.len() == 1
        && let Some(inner @ Value::Array(_)) = fields.get(ARRAY_ENVELOPE_KEY)
    {
        return inner.clone();
    }
    value
}

fn validate_finding(n: usize, item: &Value, report: &mut ShapeReport) {
    let Some(fields) = item.as_object() else {
        report.add_error(format!(
            "finding {n} must be an object, got {}",
            json_kind(item)
        ));
        return;
    };

    for field in CLAUSE_FINDING_FIELDS {
        if let Err(problem) = check_string_field(fields, field) {
            report.add_error(format!("finding {n}: {problem}"));
        }
    }

    if let Some(level) = fields.get("risk_level").and_then(Value::as_str)
        && !level.trim().is_empty()
        && !matches!(level, "RED" | "YELLOW")
    {
        report.add_error(format!(
            "finding {n}: risk_level must be RED or YELLOW, got '{level}'"
        ));
    }

    for key in fields.keys() {
        if !CLAUSE_FINDING_FIELDS.contains(&key.as_str()) {
            report.add_warning(format!("finding {n} has unexpected field `{key}`"));
        }
    }
}

fn validate_object(value: &Value, required: &[&str]) -> ShapeReport {
    let mut report = ShapeReport::default();

    let Some(fields) = value.as_object() else {
        report.add_error(format!("expected a JSON object, got {}", json_kind(value)));
        return report;
    };

    for field in required {
        if let Err(problem) = check_string_field(fields, field) {
            report.add_error(problem);
        }
    }

    for key in fields.keys() {
        if !required.contains(&key.as_str()) {
            report.add_error(format!("unexpected field `{key}`"));
        }
    }

    report
}

fn check_string_field(fields: &Map<String, Value>, field: &str) -> Result<(), String> {
    match fields.get(field) {
        None => Err(format!("missing field `{field}`")),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(format!("field `{field}` must not be empty"))
        }
        Some(Value::String(_)) => Ok(()),
        Some(other) => Err(format!(
            "field `{field}` must be a string, got {}",
            json_kind(other)
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModeTag, RiskLevel, RiskTolerance};
    use crate::service::analysis::modes::spec_for;
    use serde_json::json;

    const CONTRACT: &str = "1. Term. This Agreement renews automatically for successive one-year terms unless terminated.\n\
        2. Liability. Customer's liability under this Agreement shall be unlimited in all circumstances.\n\
        3. Payment. Fees are due within thirty days of invoice.";

    fn red_flags_request(text: &str) -> AnalysisRequest {
        AnalysisRequest {
            mode: ModeTag::RedFlags,
            text: Some(text.to_string()),
            clause_text: None,
            role: Some("Customer".to_string()),
            risk: RiskTolerance::Balanced,
        }
    }

    fn clause_request(mode: ModeTag, clause: &str) -> AnalysisRequest {
        AnalysisRequest {
            mode,
            text: None,
            clause_text: Some(clause.to_string()),
            role: None,
            risk: RiskTolerance::Balanced,
        }
    }

    fn finding(start: &str, end: &str) -> Value {
        json!({
            "clause_label": "Limitation of Liability",
            "risk_level": "RED",
            "start_snippet": start,
            "end_snippet": end,
            "clause_text": "Customer's liability under this Agreement shall be unlimited in all circumstances.",
            "risk_reason": "Customer carries uncapped exposure.",
            "suggested_fix": "Cap liability at fees paid in the prior twelve months."
        })
    }

    fn run(mode: ModeTag, raw: &str, request: &AnalysisRequest) -> Result<AnalysisResult, ParseError> {
        normalize(spec_for(mode).unwrap(), raw, request)
    }

    #[test]
    fn test_strip_is_identity_on_unfenced_text() {
        let text = r#"[{"a":"b"}]"#;
        assert_eq!(strip_code_fences(text), text);
        assert_eq!(strip_code_fences(strip_code_fences(text)), text);
    }

    #[test]
    fn test_strip_removes_tagged_and_untagged_fences() {
        assert_eq!(strip_code_fences("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fences("  ```\n{\"a\": 1}\n```  \n"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("``` json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        // Truncated response: opening fence only
        assert_eq!(strip_code_fences("```json\n[1, 2"), "[1, 2");
    }

    #[test]
    fn test_empty_response_is_malformed() {
        for raw in ["", "  \n\t", "```json\n```"] {
            let result = run(ModeTag::ExplainClause, raw, &clause_request(ModeTag::ExplainClause, "x"));
            assert!(matches!(result, Err(ParseError::Malformed { .. })), "{raw:?}");
        }
    }

    #[test]
    fn test_fenced_findings_equal_unfenced_findings() {
        let findings = json!([finding("Customer's liability under", "unlimited in all circumstances.")]);
        let plain = findings.to_string();
        let fenced = format!("```json\n{plain}\n```");
        let request = red_flags_request(CONTRACT);

        let from_fenced = run(ModeTag::RedFlags, &fenced, &request).unwrap();
        let from_plain = run(ModeTag::RedFlags, &plain, &request).unwrap();
        assert_eq!(from_fenced, from_plain);

        let direct: Vec<ClauseFinding> = serde_json::from_value(findings).unwrap();
        assert_eq!(from_fenced, AnalysisResult::RedFlags(direct));
    }

    #[test]
    fn test_truncated_json_is_malformed() {
        let raw = r#"[{"clause_label": "Term", "risk_level": "RED", "start_snip"#;
        let result = run(ModeTag::RedFlags, raw, &red_flags_request(CONTRACT));

        match result {
            Err(ParseError::Malformed { raw: kept, .. }) => assert_eq!(kept, raw),
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_prose_response_is_malformed() {
        let raw = "Here are the risky clauses I found: none.";
        let result = run(ModeTag::ExplainClause, raw, &clause_request(ModeTag::ExplainClause, "x"));
        assert!(matches!(result, Err(ParseError::Malformed { .. })));
    }

    #[test]
    fn test_empty_findings_array_is_valid() {
        let result = run(ModeTag::RedFlags, "[]", &red_flags_request(CONTRACT)).unwrap();
        assert_eq!(result, AnalysisResult::RedFlags(vec![]));
    }

    #[test]
    fn test_enveloped_findings_are_unwrapped() {
        let raw = json!({ "findings": [finding("1. Term. This Agreement", "one-year terms unless terminated.")] })
            .to_string();
        let result = run(ModeTag::RedFlags, &raw, &red_flags_request(CONTRACT)).unwrap();

        let AnalysisResult::RedFlags(findings) = result else {
            panic!("expected red flags");
        };
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].risk_level, RiskLevel::Red);
    }

    #[test]
    fn test_envelope_with_other_key_is_violation() {
        for raw in [r#"{"error": []}"#, r#"{"results": [{"clause_label": "Term"}]}"#] {
            let result = run(ModeTag::RedFlags, raw, &red_flags_request(CONTRACT));
            assert!(
                matches!(&result, Err(ParseError::SchemaViolation(msg)) if msg.contains("expected a JSON array")),
                "{raw}: {result:?}"
            );
        }
    }

    #[test]
    fn test_object_instead_of_array_is_violation() {
        let raw = json!({ "clause_label": "Term", "risk_level": "RED" }).to_string();
        let result = run(ModeTag::RedFlags, &raw, &red_flags_request(CONTRACT));
        assert!(matches!(result, Err(ParseError::SchemaViolation(msg)) if msg.contains("expected a JSON array")));
    }

    #[test]
    fn test_missing_field_names_finding_and_field() {
        let mut item = finding("Customer's liability under", "unlimited in all circumstances.");
        item.as_object_mut().unwrap().remove("suggested_fix");
        let raw = json!([item]).to_string();

        let result = run(ModeTag::RedFlags, &raw, &red_flags_request(CONTRACT));
        match result {
            Err(ParseError::SchemaViolation(msg)) => {
                assert!(msg.contains("finding 1"), "{msg}");
                assert!(msg.contains("suggested_fix"), "{msg}");
            }
            other => panic!("expected SchemaViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_risk_level_is_not_coerced() {
        let mut item = finding("Customer's liability under", "unlimited in all circumstances.");
        item["risk_level"] = json!("red");
        let raw = json!([item]).to_string();

        let result = run(ModeTag::RedFlags, &raw, &red_flags_request(CONTRACT));
        assert!(matches!(result, Err(ParseError::SchemaViolation(msg)) if msg.contains("RED or YELLOW")));
    }

    #[test]
    fn test_empty_and_non_string_fields_rejected() {
        let mut empty = finding("Customer's liability under", "unlimited in all circumstances.");
        empty["risk_reason"] = json!("   ");
        let mut numeric = finding("Customer's liability under", "unlimited in all circumstances.");
        numeric["clause_label"] = json!(2);
        let raw = json!([empty, numeric]).to_string();

        match run(ModeTag::RedFlags, &raw, &red_flags_request(CONTRACT)) {
            Err(ParseError::SchemaViolation(msg)) => {
                assert!(msg.contains("finding 1: field `risk_reason` must not be empty"), "{msg}");
                assert!(msg.contains("finding 2: field `clause_label` must be a string, got number"), "{msg}");
            }
            other => panic!("expected SchemaViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_paraphrased_snippet_is_unverifiable() {
        let raw = json!([finding("The customer's liability under", "unlimited in all circumstances.")])
            .to_string();

        match run(ModeTag::RedFlags, &raw, &red_flags_request(CONTRACT)) {
            Err(ParseError::UnverifiableSnippet { finding, field, snippet }) => {
                assert_eq!(finding, 1);
                assert_eq!(field, "start_snippet");
                assert_eq!(snippet, "The customer's liability under");
            }
            other => panic!("expected UnverifiableSnippet, got {:?}", other),
        }
    }

    #[test]
    fn test_snippets_anchor_inserted_clauses_in_synthetic_contracts() {
        let inserted = [
            "Supplier may terminate this Agreement at any time without cause or notice.",
            "Customer hereby assigns to Supplier all intellectual property it owns or later develops.",
            "Customer shall not engage in any business anywhere in the world for ten years.",
        ];
        let filler = [
            "The parties agree to cooperate in good faith.",
            "Notices shall be given in writing to the addresses above.",
            "This Agreement is governed by the laws of Delaware.",
            "Headings are for convenience only.",
        ];

        for seed in 0..24usize {
            // Place each inserted clause at a different offset for every seed
            let mut clauses: Vec<&str> = filler.to_vec();
            for (k, clause) in inserted.iter().enumerate() {
                let at = (seed + k * 3) % (clauses.len() + 1);
                clauses.insert(at, clause);
            }
            let contract = clauses
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{}. {}", i + 1, c))
                .collect::<Vec<_>>()
                .join("\n");

            let model_output: Vec<Value> = inserted
                .iter()
                .map(|clause| {
                    let words: Vec<&str> = clause.split_whitespace().collect();
                    let take = 4 + seed % 3;
                    json!({
                        "clause_label": "Inserted",
                        "risk_level": if seed % 2 == 0 { "RED" } else { "YELLOW" },
                        "start_snippet": words[..take].join(" "),
                        "end_snippet": words[words.len() - take..].join(" "),
                        "clause_text": clause,
                        "risk_reason": "Non-market term.",
                        "suggested_fix": "Delete it."
                    })
                })
                .collect();

            let raw = Value::Array(model_output).to_string();
            let result = run(ModeTag::RedFlags, &raw, &red_flags_request(&contract))
                .unwrap_or_else(|e| panic!("seed {seed}: {e}"));

            let AnalysisResult::RedFlags(findings) = result else {
                panic!("expected red flags");
            };
            assert_eq!(findings.len(), inserted.len());
            for f in &findings {
                assert!(contract.contains(&f.start_snippet));
                assert!(contract.contains(&f.end_snippet));
                assert!(matches!(f.risk_level, RiskLevel::Red | RiskLevel::Yellow));
            }
        }
    }

    #[test]
    fn test_explanation_requires_exact_keys() {
        let request = clause_request(ModeTag::ExplainClause, "Either party may terminate with 24 hours notice.");

        let ok = json!({ "short_title": "Short-notice termination", "explanation": "Either side can walk away within a day." });
        let result = run(ModeTag::ExplainClause, &ok.to_string(), &request).unwrap();
        assert!(matches!(result, AnalysisResult::ExplainClause(ref e) if e.short_title == "Short-notice termination"));

        let extra = json!({ "short_title": "T", "explanation": "E", "risk": "high" });
        let result = run(ModeTag::ExplainClause, &extra.to_string(), &request);
        assert!(matches!(result, Err(ParseError::SchemaViolation(msg)) if msg.contains("unexpected field `risk`")));

        let missing = json!({ "short_title": "T" });
        let result = run(ModeTag::ExplainClause, &missing.to_string(), &request);
        assert!(matches!(result, Err(ParseError::SchemaViolation(msg)) if msg.contains("missing field `explanation`")));
    }

    #[test]
    fn test_array_for_object_mode_is_violation() {
        let request = clause_request(ModeTag::ExplainClause, "Clause.");
        let result = run(ModeTag::ExplainClause, "[]", &request);
        assert!(matches!(result, Err(ParseError::SchemaViolation(msg)) if msg.contains("expected a JSON object, got array")));
    }

    #[test]
    fn test_unchanged_rewrite_rejected() {
        let request = clause_request(ModeTag::SuggestRewrite, "Vendor may terminate at will.");

        let same = json!({ "suggested_clause": " Vendor may terminate at will. ", "explanation": "No change needed." });
        let result = run(ModeTag::SuggestRewrite, &same.to_string(), &request);
        assert!(matches!(result, Err(ParseError::SchemaViolation(msg)) if msg.contains("unchanged")));

        let changed = json!({
            "suggested_clause": "Either party may terminate for convenience on sixty days' written notice.",
            "explanation": "Makes termination mutual and adds a notice period."
        });
        let result = run(ModeTag::SuggestRewrite, &format!("```json\n{changed}\n```"), &request).unwrap();
        assert!(matches!(result, AnalysisResult::SuggestRewrite(ref r) if r.suggested_clause != "Vendor may terminate at will."));
    }
}
