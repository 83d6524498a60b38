//! Application state and service initialization
//!
//! This module centralizes service initialization and dependency injection.

use std::sync::Arc;

use crate::model::Config;
use crate::model::config::AnalysisConfig;
use crate::service::analysis::AnalysisService;
use crate::service::auth::SharedSecret;
use crate::service::llm::{LlmClient, ModelGateway, OpenAiGateway};

/// Environment variable holding the shared secret clients must send
const ENV_ADDON_SECRET: &str = "ADDON_SECRET";

/// Environment variable holding the OpenAI API key
const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Application state containing all services and shared resources
pub struct AppState {
    /// Mode-routed analysis orchestrator
    pub analysis_service: Arc<AnalysisService>,
    /// Timeout and body limits applied by the HTTP layer
    pub analysis_config: AnalysisConfig,
}

impl AppState {
    /// Initialize all services and build application state
    ///
    /// Requires ADDON_SECRET and OPENAI_API_KEY.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let secret = std::env::var(ENV_ADDON_SECRET)
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(AppError::MissingConfig(ENV_ADDON_SECRET))?;

        let api_key = std::env::var(ENV_OPENAI_API_KEY)
            .map_err(|_| AppError::MissingConfig(ENV_OPENAI_API_KEY))?;

        let llm_client =
            LlmClient::new(&api_key).map_err(|_| AppError::InvalidConfig("Invalid OPENAI_API_KEY"))?;

        let gateway: Arc<dyn ModelGateway> = Arc::new(OpenAiGateway::new(
            llm_client,
            config.analysis.model.clone(),
        ));

        Ok(Self::with_gateway(gateway, SharedSecret::new(secret), config.analysis))
    }

    /// Build application state around an existing gateway
    pub fn with_gateway(
        gateway: Arc<dyn ModelGateway>,
        secret: SharedSecret,
        analysis_config: AnalysisConfig,
    ) -> Self {
        Self {
            analysis_service: Arc::new(AnalysisService::new(gateway, secret)),
            analysis_config,
        }
    }
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingConfig(&'static str),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),
}
