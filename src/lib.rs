use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core services: identity, policy and the post lifecycle.
pub mod accounts;
pub mod auth;
pub mod categories;
pub mod lifecycle;
pub mod password;
pub mod policy;

// Persistence, models and shared plumbing.
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod seed;

// HTTP surface.
pub mod handlers;
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, moderation, public};

// --- Public Re-exports ---

pub use accounts::AccountService;
pub use auth::Authenticator;
pub use categories::CategoryService;
pub use config::AppConfig;
pub use error::AppError;
pub use lifecycle::PostLifecycle;
pub use password::{Argon2Hasher, HasherState};
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document aggregated from the `#[utoipa::path]` handlers and the
/// `ToSchema` models. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::signup, handlers::login_admin, handlers::login_author,
        handlers::login_moderator, handlers::get_posts, handlers::get_post,
        handlers::get_managed_posts, handlers::get_unmoderated_posts,
        handlers::create_post, handlers::update_post, handlers::delete_post,
        handlers::like_post, handlers::moderate_post, handlers::get_comments,
        handlers::add_comment, handlers::get_comment, handlers::delete_comment,
        handlers::get_categories, handlers::get_category, handlers::create_category,
        handlers::update_category, handlers::delete_category, handlers::list_actors,
        handlers::get_actor, handlers::create_actor, handlers::update_actor,
        handlers::deactivate_actor, handlers::get_me
    ),
    components(
        schemas(
            models::Role, models::ActorSummary, models::Post, models::Comment,
            models::Category, models::SignupRequest, models::LoginRequest,
            models::LoginResponse, models::CreateActorRequest, models::UpdateActorRequest,
            models::CreatePostRequest, models::UpdatePostRequest, models::LikeDirection,
            models::LikeRequest, models::LikeResponse, models::CreateCommentRequest,
            models::CategoryRequest,
        )
    ),
    tags(
        (name = "blog-portal", description = "Blog API with moderation")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container for the store, the secret hasher and the
/// configuration. Services are cheap views over it, built per request via `FromRef`.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub hasher: HasherState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for HasherState {
    fn from_ref(app_state: &AppState) -> HasherState {
        app_state.hasher.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for Authenticator {
    fn from_ref(app_state: &AppState) -> Authenticator {
        Authenticator::new(app_state.repo.clone(), app_state.hasher.clone())
    }
}

impl FromRef<AppState> for PostLifecycle {
    fn from_ref(app_state: &AppState) -> PostLifecycle {
        PostLifecycle::new(app_state.repo.clone(), app_state.config.allow_remoderation)
    }
}

impl FromRef<AppState> for AccountService {
    fn from_ref(app_state: &AppState) -> AccountService {
        AccountService::new(app_state.repo.clone(), app_state.hasher.clone())
    }
}

impl FromRef<AppState> for CategoryService {
    fn from_ref(app_state: &AppState) -> CategoryService {
        CategoryService::new(app_state.repo.clone())
    }
}

/// auth_middleware
///
/// Rejects requests on protected routes before the handler runs. The resolved
/// identity is stored in the request extensions so the handler's own `AuthUser`
/// extractor does not verify the credentials a second time.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// create_router
///
/// Assembles the route groups, the authentication layer and the observability stack.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        )
        .merge(
            moderation::moderation_routes()
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                // Every request gets an id, echoed back in the response.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Request span carrying method, uri and the `x-request-id`, so every log line of a
/// request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
