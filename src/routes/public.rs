use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without credentials: health, registration, the three login
/// routes and the read-only post views. Post reads go through the same visibility
/// rules as everything else, so anonymous callers only ever see moderated posts.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /signup
        // Author self-registration.
        .route("/signup", post(handlers::signup))
        // POST /login/{admin,author,moderator}
        // One login per identity space; each returns the actor and a bearer token.
        .route("/login/admin", post(handlers::login_admin))
        .route("/login/author", post(handlers::login_author))
        .route("/login/moderator", post(handlers::login_moderator))
        // GET /posts?category=&limit=&offset=
        // The public feed.
        .route("/posts", get(handlers::get_posts))
        // GET /posts/{id}
        // A single post, 404 when hidden from the caller.
        .route("/posts/{id}", get(handlers::get_post))
}
