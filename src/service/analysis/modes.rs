//! Dispatch table for analysis modes
//!
//! Each mode is one [`ModeSpec`] entry: the request field it needs, how its
//! prompt reads, whether it binds a schema, and how its response is validated.

use serde_json::Value;

use crate::model::{AnalysisRequest, AnalysisResult, ModeTag};
use crate::service::analysis::error::ParseError;
use crate::service::analysis::normalize::{
    normalize_explanation, normalize_red_flags, normalize_rewrite,
};
use crate::service::analysis::prompts::{
    EXPLAIN_OUTPUT, EXPLAIN_TASK, RED_FLAGS_OUTPUT, RED_FLAGS_TASK, REWRITE_OUTPUT, REWRITE_TASK,
};
use crate::service::analysis::schema::red_flags_schema;

/// Party the persona represents when the request names none
pub const DEFAULT_ROLE: &str = "the party receiving this contract";

/// Voice the instruction is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persona {
    /// Counsel for the request's `role`, or `default_role` when none is given
    Counsel { default_role: &'static str },
    /// Plain-language explainer for a non-lawyer; the request's role is ignored
    Explainer,
}

/// Request field a mode reads its payload from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadField {
    Text,
    ClauseText,
}

impl PayloadField {
    pub fn name(self) -> &'static str {
        match self {
            PayloadField::Text => "text",
            PayloadField::ClauseText => "clause_text",
        }
    }

    /// Payload from the request; blank counts as missing
    pub fn read(self, request: &AnalysisRequest) -> Option<&str> {
        let value = match self {
            PayloadField::Text => request.text.as_deref(),
            PayloadField::ClauseText => request.clause_text.as_deref(),
        };
        value.filter(|v| !v.trim().is_empty())
    }
}

pub type Normalizer = fn(Value, &AnalysisRequest) -> Result<AnalysisResult, ParseError>;

/// Everything the router needs to serve one mode
pub struct ModeSpec {
    pub tag: ModeTag,
    pub payload: PayloadField,
    pub payload_heading: &'static str,
    pub persona: Persona,
    pub task: &'static str,
    pub output_contract: &'static str,
    /// Provider-enforced schema; `None` means the prose contract is the only hint
    pub schema: Option<fn() -> Value>,
    pub normalize: Normalizer,
}

pub static MODES: [ModeSpec; 3] = [
    ModeSpec {
        tag: ModeTag::RedFlags,
        payload: PayloadField::Text,
        payload_heading: "Contract",
        persona: Persona::Counsel {
            default_role: DEFAULT_ROLE,
        },
        task: RED_FLAGS_TASK,
        output_contract: RED_FLAGS_OUTPUT,
        schema: Some(red_flags_schema),
        normalize: normalize_red_flags,
    },
    ModeSpec {
        tag: ModeTag::ExplainClause,
        payload: PayloadField::ClauseText,
        payload_heading: "Clause",
        persona: Persona::Explainer,
        task: EXPLAIN_TASK,
        output_contract: EXPLAIN_OUTPUT,
        schema: None,
        normalize: normalize_explanation,
    },
    ModeSpec {
        tag: ModeTag::SuggestRewrite,
        payload: PayloadField::ClauseText,
        payload_heading: "Clause",
        persona: Persona::Counsel {
            default_role: DEFAULT_ROLE,
        },
        task: REWRITE_TASK,
        output_contract: REWRITE_OUTPUT,
        schema: None,
        normalize: normalize_rewrite,
    },
];

/// Table entry for a mode
pub fn spec_for(mode: ModeTag) -> Option<&'static ModeSpec> {
    MODES.iter().find(|spec| spec.tag == mode)
}
