use anyhow::Result;
use axum::{http::StatusCode, response::Json, routing::get, Router};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

use termcop_core::ReviewOrchestrator;
use termcop_server::azdo::AzureDevOpsClient;
use termcop_server::config::Config;
use termcop_server::webhook::check_pr_router;
use termcop_server::AppState;

async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "termcop"
    })))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting company specific term check for pull requests");

    let config =
        Config::from_env().expect("Failed to load configuration from environment variables");

    if config.company_specific_terms.is_empty() {
        // Reviews will fail their status check until terms are added;
        // the server still starts so the hook endpoint stays reachable.
        tracing::warn!("COMPANY_SPECIFIC_TERMS is empty, every check will fail");
    }

    let client = AzureDevOpsClient::new(&config.organization, config.pat.clone());
    let orchestrator = ReviewOrchestrator::new(
        Arc::new(client),
        config.company_specific_terms.clone(),
        config.accepted_terms.clone(),
    );

    let state = Arc::new(AppState { orchestrator });

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(check_pr_router())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
