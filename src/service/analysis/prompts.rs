//! Prompts for contract analysis

use serde_json::Value;

use crate::model::{AnalysisRequest, ModeTag, RiskTolerance};
use crate::service::analysis::modes::{ModeSpec, Persona};
use crate::service::analysis::schema::schema_for;

/// Substantive risks every mode is told to watch for
pub const RISK_CATEGORIES: [&str; 8] = [
    "One-way indemnity: only one party indemnifies the other, or the indemnity has no cap",
    "Unlimited liability: no cap on damages, or the cap excludes the obligations that matter",
    "Excessive non-compete: restrictions that are too broad in scope, territory or duration",
    "Unilateral termination: one party may terminate at will or on very short notice",
    "Silent auto-renewal: the term renews automatically without a reasonable notice window",
    "Unusual IP assignment: ownership of pre-existing or unrelated intellectual property is transferred",
    "Overbroad confidentiality: obligations with no exceptions, no time limit or one-sided scope",
    "Data-ownership ambiguity: unclear who owns, may use or must delete data exchanged under the contract",
];

/// Format rules shared by every mode
pub const OUTPUT_RULES: &str = r#"Respond with the JSON value only.
Do not wrap it in markdown or code fences.
Do not add any commentary before or after it."#;

pub const RED_FLAGS_TASK: &str = r#"Review the contract below and identify every clause that creates legal or commercial risk for the party you represent.

- Mark a clause RED when it is seriously unfavorable, unusual or one-sided.
- Mark a clause YELLOW when it deserves negotiation or a closer look.
- Skip clauses that are standard and balanced.
- Base every finding on the contract text only. Do not invent clauses."#;

pub const RED_FLAGS_OUTPUT: &str = r#"Return a JSON array. Each element is an object with exactly these string fields:
- clause_label: short name of the clause, e.g. "Limitation of Liability"
- risk_level: "RED" or "YELLOW"
- start_snippet: the first 5 to 12 words of the clause, copied exactly from the contract
- end_snippet: the last 5 to 12 words of the clause, copied exactly from the contract
- clause_text: the full clause as it appears in the contract
- risk_reason: one or two sentences on why the clause is risky for the party you represent
- suggested_fix: a concrete change that would reduce the risk

start_snippet and end_snippet MUST appear character for character in the contract.
Do not paraphrase them, fix typos or change punctuation or capitalization.
Return an empty array if no clause is risky."#;

pub const EXPLAIN_TASK: &str = r#"Explain the contract clause below in plain language for a business reader who is not a lawyer.

- Say what the clause actually does in practice.
- Point out any practical risk it carries for the reader's business.
- Do not give a rewrite and do not quote the clause back in full."#;

pub const EXPLAIN_OUTPUT: &str = r#"Return a JSON object with exactly these string fields:
- short_title: a title of at most eight words naming what the clause does
- explanation: two to four sentences explaining the clause and its practical effect"#;

pub const REWRITE_TASK: &str = r#"Rewrite the contract clause below so that it better protects the party you represent while staying reasonable enough for the other side to accept.

- Keep the clause's purpose and defined terms.
- Fix the risks that matter; do not rewrite for style alone.
- The rewritten clause must differ from the original."#;

pub const REWRITE_OUTPUT: &str = r#"Return a JSON object with exactly these string fields:
- suggested_clause: the full rewritten clause, ready to paste into the contract
- explanation: what changed and why the new wording is better for the party you represent"#;

/// A rendered instruction plus the schema the provider should enforce, if any
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSpec {
    pub mode: ModeTag,
    pub instruction: String,
    pub schema: Option<Value>,
}

/// Persona statement for a mode; `role` only applies to counsel personas
pub fn persona(persona: Persona, role: Option<&str>) -> String {
    match persona {
        Persona::Counsel { default_role } => format!(
            "You are experienced commercial contracts counsel representing {}. \
             You read contracts carefully and judge them by current market practice.",
            role.unwrap_or(default_role)
        ),
        Persona::Explainer => "You are an experienced commercial contracts lawyer explaining \
             contract language to a business reader who is not a lawyer. \
             You are neutral and do not take either party's side."
            .to_string(),
    }
}

/// Strictness sentence for a risk tolerance
pub fn risk_modifier(risk: RiskTolerance) -> &'static str {
    match risk {
        RiskTolerance::Conservative => {
            "Risk tolerance is conservative: flag anything materially unfavorable, even when it is common in the market."
        }
        RiskTolerance::Aggressive => {
            "Risk tolerance is aggressive: only flag extreme, clearly non-market risks and accept terms that are merely unfavorable but customary."
        }
        RiskTolerance::Balanced => {
            "Risk tolerance is balanced: use balanced, market-standard judgment when deciding what matters."
        }
    }
}

/// Render the full instruction for a mode
///
/// The payload is appended whole at the very end so snippets quoted by the
/// model can be matched against it afterwards.
pub fn build_prompt(spec: &ModeSpec, request: &AnalysisRequest, payload: &str) -> PromptSpec {
    let categories = RISK_CATEGORIES
        .iter()
        .enumerate()
        .map(|(i, category)| format!("{}. {}", i + 1, category))
        .collect::<Vec<_>>()
        .join("\n");

    let mut instruction = format!(
        r#"{persona}

{task}

{risk_modifier}

Pay particular attention to these risk categories:
{categories}

## Output Format

{output_contract}

{output_rules}

## {payload_heading}

"#,
        persona = persona(spec.persona, request.role.as_deref()),
        task = spec.task,
        risk_modifier = risk_modifier(request.risk),
        categories = categories,
        output_contract = spec.output_contract,
        output_rules = OUTPUT_RULES,
        payload_heading = spec.payload_heading,
    );
    instruction.push_str(payload);

    PromptSpec {
        mode: spec.tag,
        instruction,
        schema: schema_for(spec.tag),
    }
}
