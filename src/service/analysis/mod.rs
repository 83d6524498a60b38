//! Contract analysis service using LLM
//!
//! Routes a request to its mode, renders the mode's prompt, calls the model
//! exactly once and validates what comes back.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::model::{AnalysisRequest, AnalysisResult, AnalyzeRequestBody, ModeTag};
use crate::service::auth::SharedSecret;
use crate::service::llm::ModelGateway;

pub mod error;
pub mod modes;
pub mod normalize;
pub mod prompts;
pub mod schema;

pub use error::{AnalysisError, ParseError};
pub use prompts::PromptSpec;

use modes::spec_for;
use normalize::normalize;
use prompts::build_prompt;

/// Mode-routed analysis orchestrator
///
/// Stateless between calls; one instance is shared by all request handlers.
pub struct AnalysisService {
    gateway: Arc<dyn ModelGateway>,
    secret: SharedSecret,
}

impl AnalysisService {
    pub fn new(gateway: Arc<dyn ModelGateway>, secret: SharedSecret) -> Self {
        tracing::info!(model = %gateway.model(), "Contract analysis service initialized");
        Self { gateway, secret }
    }

    /// Authorize, parse and analyze one raw request body
    ///
    /// The credential is checked before the body is read at all.
    pub async fn handle(
        &self,
        raw_body: &[u8],
        auth_token: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        if !self.secret.is_authorized(auth_token) {
            tracing::warn!(
                token_present = auth_token.is_some(),
                "Rejected analysis request with invalid credential"
            );
            return Err(AnalysisError::Unauthorized);
        }

        let request = parse_request(raw_body)?;
        self.analyze(&request).await
    }

    /// Analyze an already-authorized request
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let spec = spec_for(request.mode).ok_or_else(|| AnalysisError::UnsupportedMode {
            requested: Some(request.mode.to_string()),
        })?;

        let payload = spec
            .payload
            .read(request)
            .ok_or(AnalysisError::MissingField(spec.payload.name()))?;

        let prompt = build_prompt(spec, request, payload);
        let start_time = Instant::now();

        tracing::debug!(
            mode = %request.mode,
            risk = ?request.risk,
            role_given = request.role.is_some(),
            payload_length = payload.len(),
            "Dispatching contract analysis"
        );

        let raw = self.gateway.invoke(&prompt).await?;

        let result = normalize(spec, &raw, request).inspect_err(|e| {
            tracing::warn!(
                mode = %request.mode,
                model = %self.gateway.model(),
                response_length = raw.len(),
                error = %e,
                "Model response rejected"
            );
        })?;

        let item_count = match &result {
            AnalysisResult::RedFlags(findings) => findings.len(),
            AnalysisResult::ExplainClause(_) | AnalysisResult::SuggestRewrite(_) => 1,
        };

        tracing::info!(
            mode = %request.mode,
            elapsed_ms = start_time.elapsed().as_millis(),
            item_count = item_count,
            "Contract analysis complete"
        );

        Ok(result)
    }
}

/// Parse a raw body into a request with a recognized mode
///
/// A missing, non-string or unknown `mode` is `UnsupportedMode`; a body that is
/// not JSON, or has mistyped payload fields, is `InvalidRequest`.
pub fn parse_request(raw_body: &[u8]) -> Result<AnalysisRequest, AnalysisError> {
    let value: Value = serde_json::from_slice(raw_body)
        .map_err(|e| AnalysisError::InvalidRequest(e.to_string()))?;

    let requested = value.get("mode").and_then(Value::as_str);
    let mode = requested
        .and_then(|name| name.parse::<ModeTag>().ok())
        .ok_or_else(|| AnalysisError::UnsupportedMode {
            requested: requested.map(str::to_string),
        })?;

    let body: AnalyzeRequestBody = serde_json::from_value(value)
        .map_err(|e| AnalysisError::InvalidRequest(e.to_string()))?;

    Ok(AnalysisRequest::from_body(mode, body))
}
