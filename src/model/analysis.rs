//! Request and result models for contract analysis

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Analysis behavior selected per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModeTag {
    /// Detect risky clauses in a whole contract
    RedFlags,
    /// Explain a single clause in plain language
    ExplainClause,
    /// Propose a negotiated rewrite of a single clause
    SuggestRewrite,
}

impl ModeTag {
    pub const ALL: [ModeTag; 3] = [
        ModeTag::RedFlags,
        ModeTag::ExplainClause,
        ModeTag::SuggestRewrite,
    ];

    /// Wire name of the mode, as sent in the request body
    pub fn as_str(&self) -> &'static str {
        match self {
            ModeTag::RedFlags => "red_flags",
            ModeTag::ExplainClause => "explain_clause",
            ModeTag::SuggestRewrite => "suggest_rewrite",
        }
    }
}

impl fmt::Display for ModeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown mode: {0}")]
pub struct UnknownMode(pub String);

impl FromStr for ModeTag {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModeTag::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

/// Caller-supplied strictness dial for flagging and rewriting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Conservative,
    #[default]
    Balanced,
    Aggressive,
}

impl RiskTolerance {
    /// Parse a tolerance leniently: case-insensitive, anything unrecognized is `Balanced`
    pub fn from_lenient(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("conservative") => RiskTolerance::Conservative,
            Some("aggressive") => RiskTolerance::Aggressive,
            _ => RiskTolerance::Balanced,
        }
    }
}

/// Raw request body for `POST /api/analyze`
///
/// Every field is optional on the wire; which ones are required depends on the mode.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AnalyzeRequestBody {
    /// One of `red_flags`, `explain_clause`, `suggest_rewrite`
    pub mode: Option<String>,
    /// Full contract text (required for `red_flags`)
    pub text: Option<String>,
    /// Single clause text (required for `explain_clause` and `suggest_rewrite`)
    pub clause_text: Option<String>,
    /// Party the analysis is performed for, e.g. "Customer"
    pub role: Option<String>,
    /// `conservative`, `balanced` (default) or `aggressive`
    pub risk: Option<String>,
}

/// Validated analysis request with a recognized mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub mode: ModeTag,
    pub text: Option<String>,
    pub clause_text: Option<String>,
    pub role: Option<String>,
    pub risk: RiskTolerance,
}

impl AnalysisRequest {
    /// Build a typed request from the wire body once the mode is known
    ///
    /// Payload fields are kept byte-for-byte so snippets can be matched against them later.
    pub fn from_body(mode: ModeTag, body: AnalyzeRequestBody) -> Self {
        let role = body
            .role
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        Self {
            mode,
            text: body.text,
            clause_text: body.clause_text,
            role,
            risk: RiskTolerance::from_lenient(body.risk.as_deref()),
        }
    }
}

/// Severity of a flagged clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Red,
    Yellow,
}

/// One structured risk assessment for a single contract clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ToSchema)]
#[schemars(deny_unknown_fields)]
pub struct ClauseFinding {
    /// Short name of the clause, e.g. "Limitation of Liability"
    pub clause_label: String,
    /// RED for seriously unfavorable or unusual terms, YELLOW for terms worth negotiating
    pub risk_level: RiskLevel,
    /// First words of the clause, copied verbatim from the contract
    pub start_snippet: String,
    /// Last words of the clause, copied verbatim from the contract
    pub end_snippet: String,
    /// Full text of the clause
    pub clause_text: String,
    /// Why the clause is risky for the represented party
    pub risk_reason: String,
    /// Concrete change that would reduce the risk
    pub suggested_fix: String,
}

/// Field names of [`ClauseFinding`], in declaration order
pub const CLAUSE_FINDING_FIELDS: [&str; 7] = [
    "clause_label",
    "risk_level",
    "start_snippet",
    "end_snippet",
    "clause_text",
    "risk_reason",
    "suggested_fix",
];

/// Plain-language explanation of a clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExplanationResult {
    pub short_title: String,
    pub explanation: String,
}

/// Negotiated rewrite of a clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RewriteResult {
    pub suggested_clause: String,
    pub explanation: String,
}

/// Result of one analysis call, keyed by mode
///
/// Serializes to the bare payload: an array for red flags, an object otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum AnalysisResult {
    RedFlags(Vec<ClauseFinding>),
    ExplainClause(ExplanationResult),
    SuggestRewrite(RewriteResult),
}
