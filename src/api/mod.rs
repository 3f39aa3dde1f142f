//! Thin HTTP surface delegating to the retrieval engine.

pub mod handlers;

use crate::engine::RetrievalEngine;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RetrievalEngine>,
}

impl AppState {
    pub fn new(engine: Arc<RetrievalEngine>) -> Self {
        Self { engine }
    }
}

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/live", get(handlers::health_check))
        .route("/health/ready", get(handlers::health_check))
        // Engine status
        .route("/api/v1/status", get(handlers::engine_status))
        // Ticket staging
        .route("/api/v1/tickets/upload", post(handlers::upload_tickets))
        // Semantic search
        .route("/api/v1/search", post(handlers::search))
        // Manual merge trigger
        .route("/api/v1/merge", post(handlers::trigger_merge))
        // Feedback
        .route("/api/v1/feedback", post(handlers::submit_feedback))
        .route(
            "/api/v1/feedback/:id/helpful",
            post(handlers::feedback_helpful),
        )
        .route("/api/v1/feedback/:id/used", post(handlers::feedback_used))
        // Add state
        .with_state(state)
        // Add middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new())
                .on_response(DefaultOnResponse::new()),
        )
        .layer(CorsLayer::permissive())
}
