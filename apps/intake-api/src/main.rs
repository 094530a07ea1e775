//! Intake API server - filings, answers, and PDF generation
//!
//! Provides REST endpoints for:
//! - Filing creation and lookup
//! - Atomic answer-set saves (with calculated-field recompute)
//! - Field definition listing per form template
//! - Filled-PDF generation with fill diagnostics

use anyhow::Result;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

mod error;
mod handlers;
mod models;
mod state;
mod store;
#[cfg(test)]
mod tests;

use state::AppState;

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Filings
        .route("/api/filings", post(handlers::create_filing))
        .route("/api/filings/:id", get(handlers::get_filing))
        // Answers
        .route("/api/filings/:id/answers", get(handlers::get_answers))
        .route("/api/filings/:id/answers", put(handlers::save_answers))
        // Field definitions
        .route("/api/forms/:form_code/fields", get(handlers::list_fields))
        // PDF generation
        .route("/api/filings/:id/pdf", get(handlers::generate_pdf))
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("intake_api=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    info!("Initializing intake API...");
    let state = AppState::new().await?;
    let state = Arc::new(state);

    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3002);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting intake API on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
