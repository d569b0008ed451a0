//! API route definitions.

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get},
    Router,
};
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Create the application router.
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let api = Router::new()
        .route(
            "/sessions",
            get(handlers::list_sessions)
                .post(handlers::create_session)
                .delete(handlers::delete_all_sessions),
        )
        .route("/sessions/all", delete(handlers::delete_all_sessions))
        .route(
            "/sessions/{session_id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/images", get(handlers::list_images))
        .route("/containers", get(handlers::list_containers))
        .route("/containers/{container_id}", delete(handlers::delete_container));

    // Same routes at the root and under /api/v1
    Router::new()
        .route("/health", get(handlers::health))
        .merge(api.clone())
        .nest("/api/v1", api)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(trace_layer)
        .with_state(state)
}
