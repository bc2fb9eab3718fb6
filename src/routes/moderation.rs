use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Moderation Router Module
///
/// The moderation queue and the moderate transition. Only administrators and
/// moderators pass the policy check inside these operations.
pub fn moderation_routes() -> Router<AppState> {
    Router::new()
        // GET /posts/unmoderated
        // Posts waiting for a moderator.
        .route("/posts/unmoderated", get(handlers::get_unmoderated_posts))
        // POST /posts/{id}/moderate
        // One-way transition to moderated.
        .route("/posts/{id}/moderate", post(handlers::moderate_post))
}
