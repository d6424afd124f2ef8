//! Router assembly: REST API under `/api/v1`, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod admin;
pub mod conversations;
pub mod http;
pub mod identity;

/// Build the application router with:
/// - REST API under `/api/v1/...`
/// - CORS (allow any origin/method/headers); the auth proxy in front decides who gets here
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/health", get(http::http_health))
        .route("/register", post(http::http_post_register))
        .route(
            "/conversations",
            get(conversations::http_list_conversations).post(conversations::http_create_conversation),
        )
        .route(
            "/conversations/:id",
            get(conversations::http_get_conversation)
                .patch(conversations::http_patch_conversation)
                .delete(conversations::http_delete_conversation),
        )
        .route("/ai/chat", post(http::http_post_chat))
        .route(
            "/admin/ai-restrictions",
            get(admin::http_get_restrictions).post(admin::http_post_restrictions),
        )
        .route("/admin/usage-stats", get(admin::http_get_usage_stats))
        .route("/admin/daily-insights", get(admin::http_get_daily_insights))
        .route("/student/stats", get(http::http_get_student_stats))
        .route("/student/usage-stats", get(http::http_get_student_usage));

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
