use crate::{AppState, handlers, models::Role};
use axum::{
    Extension, Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Everything that needs a resolved `AuthUser`: post authoring, likes, comments,
/// categories and actor management. The layer above rejects anonymous requests
/// with 401; ownership and role checks happen in the services.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        .route("/me", get(handlers::get_me))
        // --- Posts ---
        // POST /posts
        .route("/posts", post(handlers::create_post))
        // GET /posts/manage
        // Own posts for authors, all posts for elevated actors.
        .route("/posts/manage", get(handlers::get_managed_posts))
        // PUT/DELETE /posts/{id}
        // Owner or elevated only. Delete removes the post's comments too.
        .route(
            "/posts/{id}",
            axum::routing::put(handlers::update_post).delete(handlers::delete_post),
        )
        // POST /posts/{id}/like
        .route("/posts/{id}/like", post(handlers::like_post))
        // --- Comments ---
        // GET/POST /comments?post={id}
        .route(
            "/comments",
            get(handlers::get_comments).post(handlers::add_comment),
        )
        // GET/DELETE /comments/{id}
        .route(
            "/comments/{id}",
            get(handlers::get_comment).delete(handlers::delete_comment),
        )
        // --- Categories ---
        .route(
            "/categories",
            get(handlers::get_categories).post(handlers::create_category),
        )
        .route(
            "/categories/{id}",
            get(handlers::get_category)
                .put(handlers::update_category)
                .delete(handlers::delete_category),
        )
        // --- Actors ---
        // One identity space per prefix; DELETE deactivates.
        .nest("/authors", actor_routes(Role::Author))
        .nest("/admins", actor_routes(Role::Administrator))
        .nest("/moderators", actor_routes(Role::Moderator))
}

/// actor_routes
///
/// CRUD over the actors of one role. The role travels to the handlers as an
/// `Extension`.
fn actor_routes(role: Role) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_actors).post(handlers::create_actor),
        )
        .route(
            "/{id}",
            get(handlers::get_actor)
                .put(handlers::update_actor)
                .delete(handlers::deactivate_actor),
        )
        .layer(Extension(role))
}
