//! Shared LLM client and the model gateway capability
//!
//! The analysis service only sees [`ModelGateway`]; provider SDK details stay in
//! the adapters below.

use std::time::Instant;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;
use serde_json::{Value, json};

use crate::service::analysis::PromptSpec;
use crate::service::analysis::schema::object_rooted;

/// Environment variable for the analysis model (overrides the config file)
const ENV_ANALYSIS_MODEL: &str = "ANALYSIS_MODEL";

/// Default model for contract analysis
const DEFAULT_MODEL: &str = openai::GPT_4O_MINI;

/// Low temperature keeps snippets close to the source text
const TEMPERATURE: f64 = 0.2;

/// Failure of the outbound model call
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("Failed to create LLM client: {0}")]
    ClientInit(String),

    #[error("LLM request failed: {0}")]
    RequestFailed(String),

    #[error("LLM request timed out after {0} seconds")]
    Timeout(u64),
}

/// Capability wrapping one call to an external model
///
/// Passes the instruction and optional schema through and returns raw text.
/// Implementations never parse the response.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn invoke(&self, prompt: &PromptSpec) -> Result<String, GatewayError>;

    /// Model identifier, for logging
    fn model(&self) -> &str;
}

/// Shared LLM client wrapper
#[derive(Clone)]
pub struct LlmClient {
    client: openai::Client,
}

impl LlmClient {
    /// Create a new LLM client with the provided API key
    pub fn new(api_key: &str) -> Result<Self, GatewayError> {
        let client = openai::Client::new(api_key);

        Ok(Self { client })
    }

    /// Get a reference to the underlying OpenAI client
    pub fn openai_client(&self) -> &openai::Client {
        &self.client
    }
}

/// [`ModelGateway`] backed by OpenAI through rig
pub struct OpenAiGateway {
    llm_client: LlmClient,
    model: String,
}

impl OpenAiGateway {
    /// Creates a new OpenAI gateway
    ///
    /// ANALYSIS_MODEL env var wins over `configured_model`; both fall back to gpt-4o-mini.
    pub fn new(llm_client: LlmClient, configured_model: Option<String>) -> Self {
        let model = std::env::var(ENV_ANALYSIS_MODEL)
            .ok()
            .or(configured_model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        tracing::info!(model = %model, "OpenAI model gateway initialized");

        Self { llm_client, model }
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    async fn invoke(&self, prompt: &PromptSpec) -> Result<String, GatewayError> {
        let start_time = Instant::now();
        let prompt_length = prompt.instruction.len();

        tracing::debug!(
            mode = %prompt.mode,
            model = %self.model,
            schema_enforced = prompt.schema.is_some(),
            "Initiating OpenAI API call for contract analysis"
        );

        let mut builder = self
            .llm_client
            .openai_client()
            .agent(&self.model)
            .temperature(TEMPERATURE);

        if let Some(schema) = &prompt.schema {
            builder = builder.additional_params(structured_output(prompt.mode.as_str(), schema));
        }

        let agent = builder.build();

        match agent.prompt(prompt.instruction.as_str()).await {
            Ok(text) => {
                tracing::info!(
                    mode = %prompt.mode,
                    model = %self.model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    prompt_length = prompt_length,
                    response_length = text.len(),
                    "OpenAI API call for contract analysis completed successfully"
                );
                Ok(text)
            }
            Err(e) => {
                tracing::error!(
                    mode = %prompt.mode,
                    model = %self.model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    prompt_length = prompt_length,
                    error = %e,
                    "OpenAI API call for contract analysis failed"
                );
                Err(GatewayError::RequestFailed(e.to_string()))
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Request parameters binding a strict JSON schema to the reply
///
/// rig's OpenAI agents speak the Responses API, which takes the schema under
/// `text.format` rather than the chat-completions `response_format`.
pub fn structured_output(name: &str, schema: &Value) -> Value {
    json!({
        "text": {
            "format": {
                "type": "json_schema",
                "name": name,
                "strict": true,
                "schema": object_rooted(schema)
            }
        }
    })
}
