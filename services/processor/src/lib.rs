pub mod config;
pub mod fetcher;
pub mod pipeline;
pub mod queue_processor;
pub mod summarizer;
pub mod transcript;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::json;
use shared::telemetry;
use shared::JobQueue;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<JobQueue>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(telemetry::middleware::trace_layer))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.queue.get_queue_stats().await {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": "parley-processor",
                "version": env!("CARGO_PKG_VERSION"),
                "queue": stats,
            })),
        ),
        Err(e) => {
            error!("Health check could not read queue stats: {:#}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "parley-processor",
                    "error": "Queue unavailable",
                })),
            )
        }
    }
}
