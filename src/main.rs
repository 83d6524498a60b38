use actix_web::{App, HttpServer, web};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod app;
mod model;
mod service;

use app::AppState;
use model::Config;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (ignore if missing)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let bind_addr = config.bind_addr();

    let state = AppState::new(config).map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize application");
        std::io::Error::other(e)
    })?;

    let analysis_service = web::Data::from(state.analysis_service);
    let analysis_config = web::Data::new(state.analysis_config);

    tracing::info!(
        request_timeout_secs = analysis_config.request_timeout_secs,
        max_body_bytes = analysis_config.max_body_bytes,
        "Starting contract analysis server on {}",
        bind_addr
    );

    HttpServer::new(move || {
        App::new()
            .app_data(analysis_service.clone())
            .app_data(analysis_config.clone())
            .app_data(api::analyze::payload_config(&analysis_config))
            .configure(api::analyze::configure)
            .configure(api::health::configure)
            .configure(api::openapi::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await
}
