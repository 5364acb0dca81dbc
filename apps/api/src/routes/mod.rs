pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::guidance::handlers as conversation;
use crate::profile::handlers as profile;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/health", get(health::health_handler))
        // Sessions
        .route("/api/v1/sessions", post(conversation::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(conversation::handle_get_session).delete(conversation::handle_end_session),
        )
        .route(
            "/api/v1/sessions/:id/profile",
            get(profile::handle_get_profile),
        )
        // Conversation turns
        .route(
            "/api/v1/sessions/:id/messages",
            post(conversation::handle_post_message),
        )
        .route(
            "/api/v1/sessions/:id/cancel",
            post(conversation::handle_cancel_turn),
        )
        // Profile tools
        .route("/api/v1/profile/classify", post(profile::handle_classify))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
