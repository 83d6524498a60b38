//! Error types for contract analysis

use thiserror::Error;

use crate::service::llm::GatewayError;

/// Why a model response could not be turned into a result
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Not JSON, even after fence stripping
    #[error("Model response is not valid JSON: {reason}")]
    Malformed { raw: String, reason: String },

    /// JSON, but not the shape the mode requires
    #[error("Model response does not match the expected shape: {0}")]
    SchemaViolation(String),

    /// A finding anchor that cannot be located in the contract
    #[error("Finding {finding} {field} does not appear verbatim in the contract: '{snippet}'")]
    UnverifiableSnippet {
        finding: usize,
        field: &'static str,
        snippet: String,
    },
}

/// Error type for one analysis call
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnalysisError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Unsupported mode")]
    UnsupportedMode { requested: Option<String> },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Provider(#[from] GatewayError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl AnalysisError {
    /// Request errors are the caller's fault and never reach the model
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            AnalysisError::Unauthorized
                | AnalysisError::UnsupportedMode { .. }
                | AnalysisError::MissingField(_)
                | AnalysisError::InvalidRequest(_)
        )
    }
}
