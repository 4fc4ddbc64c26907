pub mod chat;
pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod lifecycle;
pub mod platform;
pub mod signature;
pub mod voice_agent;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use shared::telemetry;
use shared::{AgentStore, MeetingStore};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use chat::FollowUpResponder;
use lifecycle::MeetingLifecycle;
use signature::WebhookVerifier;

#[derive(Clone)]
pub struct AppState {
    pub meetings: Arc<dyn MeetingStore>,
    pub agents: Arc<dyn AgentStore>,
    pub verifier: WebhookVerifier,
    pub lifecycle: Arc<MeetingLifecycle>,
    pub responder: Arc<FollowUpResponder>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/webhook", post(handlers::webhook))
        .route("/debug/meeting", get(handlers::debug_meeting))
        .route("/meetings/:id/cancel", post(handlers::cancel_meeting))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(telemetry::middleware::trace_layer))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
