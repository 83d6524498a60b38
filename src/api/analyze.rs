//! REST API endpoint for contract analysis

use actix_web::{HttpRequest, HttpResponse, http::StatusCode, post, web};

use crate::api::error::{ApiError, ErrorResponse};
use crate::model::AnalysisResult;
use crate::model::config::AnalysisConfig;
use crate::service::analysis::{AnalysisError, AnalysisService};
use crate::service::llm::GatewayError;

/// Header carrying the shared secret
pub const SECRET_HEADER: &str = "X-ADDON-SECRET";

/// Analyze contract text in one of three modes
///
/// `red_flags` returns an array of findings, `explain_clause` an explanation
/// object, `suggest_rewrite` a rewrite object.
#[utoipa::path(
    post,
    path = "/api/analyze",
    request_body = crate::model::AnalyzeRequestBody,
    params(
        ("X-ADDON-SECRET" = String, Header, description = "Shared secret")
    ),
    responses(
        (status = 200, description = "Analysis completed", body = AnalysisResult),
        (status = 400, description = "Unsupported mode or missing field", body = ErrorResponse),
        (status = 401, description = "Missing or wrong credential", body = ErrorResponse),
        (status = 413, description = "Request body over the configured limit", body = ErrorResponse),
        (status = 500, description = "Model call failed or returned unusable output", body = ErrorResponse)
    ),
    tag = "analysis"
)]
#[post("/api/analyze")]
pub async fn analyze(
    req: HttpRequest,
    body: Result<web::Bytes, actix_web::Error>,
    service: web::Data<AnalysisService>,
    config: web::Data<AnalysisConfig>,
) -> Result<HttpResponse, ApiError> {
    let body = body.map_err(|e| {
        if e.as_response_error().status_code() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(config.max_body_bytes)
        } else {
            ApiError::BadRequest(format!("Failed to read request body: {}", e))
        }
    })?;

    let token = req
        .headers()
        .get(SECRET_HEADER)
        .and_then(|value| value.to_str().ok());

    let result = tokio::time::timeout(config.request_timeout(), service.handle(&body, token))
        .await
        .map_err(|_| {
            AnalysisError::Provider(GatewayError::Timeout(config.request_timeout_secs))
        })??;

    Ok(HttpResponse::Ok().json(result))
}

/// Body size limit for the analyze endpoint
pub fn payload_config(config: &AnalysisConfig) -> web::PayloadConfig {
    web::PayloadConfig::new(config.max_body_bytes)
}

/// Configure analysis routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(analyze);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::{App, test};
    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::service::analysis::PromptSpec;
    use crate::service::auth::SharedSecret;
    use crate::service::llm::ModelGateway;
    use crate::service::llm::testing::StubGateway;

    const SECRET: &str = "addon-secret";

    async fn call(gateway: Arc<dyn ModelGateway>, secret: Option<&str>, body: Value) -> (StatusCode, Value) {
        call_with_config(gateway, AnalysisConfig::default(), secret, body).await
    }

    async fn call_with_config(
        gateway: Arc<dyn ModelGateway>,
        config: AnalysisConfig,
        secret: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        let service = AnalysisService::new(gateway, SharedSecret::new(SECRET));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .app_data(payload_config(&config))
                .app_data(web::Data::new(config))
                .configure(configure),
        )
        .await;

        let mut request = test::TestRequest::post()
            .uri("/api/analyze")
            .set_payload(body.to_string());
        if let Some(secret) = secret {
            request = request.insert_header((SECRET_HEADER, secret));
        }

        let response = test::call_service(&app, request.to_request()).await;
        let status = response.status();
        let json: Value = test::read_body_json(response).await;
        (status, json)
    }

    #[actix_web::test]
    async fn test_wrong_secret_is_401() {
        let gateway = Arc::new(StubGateway::replying("{}"));
        let (status, body) = call(gateway, Some("nope"), json!({ "mode": "red_flags", "text": "x" })).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");
        assert!(body["request_id"].is_string());
    }

    #[actix_web::test]
    async fn test_unknown_mode_is_400() {
        let gateway = Arc::new(StubGateway::replying("{}"));
        let (status, body) = call(gateway, Some(SECRET), json!({ "mode": "summarize" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unsupported mode");
    }

    #[actix_web::test]
    async fn test_explain_clause_is_200() {
        let gateway = Arc::new(StubGateway::replying(
            "```json\n{\"short_title\": \"Short-notice termination\", \"explanation\": \"Either party can end the contract with a day's notice.\"}\n```",
        ));
        let (status, body) = call(
            gateway,
            Some(SECRET),
            json!({ "mode": "explain_clause", "clause_text": "Either party may terminate with 24 hours notice." }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(!body["short_title"].as_str().unwrap().is_empty());
        assert!(!body["explanation"].as_str().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_red_flags_returns_bare_array() {
        let contract = "1. Liability. Customer's liability shall be unlimited.";
        let gateway = Arc::new(StubGateway::replying(
            json!([{
                "clause_label": "Liability",
                "risk_level": "RED",
                "start_snippet": "Customer's liability",
                "end_snippet": "shall be unlimited.",
                "clause_text": "Customer's liability shall be unlimited.",
                "risk_reason": "Uncapped exposure.",
                "suggested_fix": "Add a cap."
            }])
            .to_string(),
        ));
        let (status, body) = call(gateway, Some(SECRET), json!({ "mode": "red_flags", "text": contract })).await;

        assert_eq!(status, StatusCode::OK);
        let findings = body.as_array().unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0]["risk_level"], "RED");
    }

    #[actix_web::test]
    async fn test_malformed_model_output_is_500() {
        let gateway = Arc::new(StubGateway::replying("[{\"clause_label\": \"Term\""));
        let (status, body) = call(gateway, Some(SECRET), json!({ "mode": "red_flags", "text": "Term." })).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("not valid JSON"));
        assert!(body.get("clause_label").is_none());
    }

    #[actix_web::test]
    async fn test_missing_field_is_400() {
        let gateway = Arc::new(StubGateway::replying("{}"));
        let (status, body) = call(gateway, Some(SECRET), json!({ "mode": "suggest_rewrite", "role": "Customer" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required field: clause_text");
    }

    #[actix_web::test]
    async fn test_oversized_body_is_413_json() {
        let gateway = Arc::new(StubGateway::replying("{}"));
        let config = AnalysisConfig {
            max_body_bytes: 64,
            ..Default::default()
        };
        let (status, body) = call_with_config(
            gateway.clone(),
            config,
            Some(SECRET),
            json!({ "mode": "red_flags", "text": "The Supplier shall indemnify the Customer. ".repeat(10) }),
        )
        .await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"], "Request body exceeds 64 bytes");
        assert!(body["request_id"].is_string());
        assert!(gateway.prompts().is_empty());
    }

    struct SlowGateway;

    #[async_trait]
    impl ModelGateway for SlowGateway {
        async fn invoke(&self, _prompt: &PromptSpec) -> Result<String, GatewayError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("{}".to_string())
        }

        fn model(&self) -> &str {
            "slow"
        }
    }

    #[actix_web::test]
    async fn test_slow_model_times_out_as_500() {
        let config = AnalysisConfig {
            request_timeout_secs: 0,
            ..Default::default()
        };
        let (status, body) = call_with_config(
            Arc::new(SlowGateway),
            config,
            Some(SECRET),
            json!({ "mode": "explain_clause", "clause_text": "Clause." }),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("timed out"));
    }
}
