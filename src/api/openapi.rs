//! OpenAPI specification endpoints

use actix_web::{HttpResponse, Responder, get};
use utoipa::OpenApi;

use crate::api::error::ErrorResponse;
use crate::api::health::HealthStatus;
use crate::model::{
    AnalysisResult, AnalyzeRequestBody, ClauseFinding, ExplanationResult, ModeTag, RewriteResult,
    RiskLevel, RiskTolerance,
};

#[derive(OpenApi)]
#[openapi(
    paths(crate::api::analyze::analyze, crate::api::health::liveness),
    components(schemas(
        AnalyzeRequestBody,
        AnalysisResult,
        ClauseFinding,
        ExplanationResult,
        RewriteResult,
        ModeTag,
        RiskLevel,
        RiskTolerance,
        ErrorResponse,
        HealthStatus
    )),
    tags(
        (name = "analysis", description = "Contract clause analysis"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
#[get("/openapi.json")]
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

/// Serve OpenAPI YAML specification
#[get("/openapi.yaml")]
pub async fn openapi_yaml() -> impl Responder {
    match ApiDoc::openapi().to_yaml() {
        Ok(yaml) => HttpResponse::Ok().content_type("text/yaml").body(yaml),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render OpenAPI YAML");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Configure OpenAPI routes
pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(openapi_json).service(openapi_yaml);
}
