//! Router for the lease API

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::sse;
use crate::state::SharedState;

/// Room for multipart boundaries and the non-file form fields
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn router(state: SharedState) -> Router {
    let upload_limit = state.config.max_file_bytes + MULTIPART_OVERHEAD_BYTES;

    // CORS configuration for web clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Analysis
        .route("/api/sessions", post(handlers::create_session))
        .route(
            "/api/analyze",
            post(handlers::analyze).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/progress/:session_id", get(sse::progress))
        // Documents and obligations
        .route("/api/documents/:id", get(handlers::get_document))
        .route(
            "/api/documents/:id/obligations",
            get(handlers::get_obligations).post(handlers::extract_obligations),
        )
        // Chat
        .route("/api/chat", post(handlers::chat))
        .route("/api/chat/:conversation_id", get(handlers::get_conversation))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
