use crate::{
    AppState,
    accounts::AccountService,
    auth::{self, AuthUser, Authenticator, Credentials},
    categories::CategoryService,
    config::AppConfig,
    error::{AppError, Result},
    lifecycle::PostLifecycle,
    models::{
        ActorSummary, Category, CategoryRequest, Comment, CreateActorRequest,
        CreateCommentRequest, CreatePostRequest, LikeRequest, LikeResponse, LoginRequest,
        LoginResponse, Post, PostFilter, Role, SignupRequest, UpdateActorRequest,
        UpdatePostRequest,
    },
};
use axum::{
    Extension, Json,
    body::Bytes,
    extract::{FromRef, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;

// --- Filter Structs ---

/// CommentFilter
///
/// Query parameters of GET /comments.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct CommentFilter {
    /// Only comments on this post.
    pub post: Option<i64>,
}

// --- Session Handlers ---

/// signup
///
/// [Public Route] Registers a new, active author. The email becomes the login handle.
#[utoipa::path(
    post,
    path = "/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Author registered", body = ActorSummary),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn signup(
    State(accounts): State<AccountService>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse> {
    let actor = accounts.signup(payload).await?;
    Ok((StatusCode::CREATED, Json(ActorSummary::from(actor))))
}

/// login
///
/// Shared body of the three login routes. A JSON body wins; otherwise the role's
/// credential headers are used.
async fn login(state: &AppState, role: Role, headers: &HeaderMap, body: &Bytes) -> Result<LoginResponse> {
    let credentials = if body.iter().all(u8::is_ascii_whitespace) {
        auth::credentials_for_role(headers, role).ok_or(AppError::Unauthenticated)?
    } else {
        let req: LoginRequest = serde_json::from_slice(body)
            .map_err(|e| AppError::validation(format!("invalid login body: {}", e)))?;
        Credentials {
            role,
            handle: req.handle,
            secret: req.password,
        }
    };

    let actor = Authenticator::from_ref(state).verify(&credentials).await?;
    let config = AppConfig::from_ref(state);
    let token = auth::issue_token(&actor, &config)?;

    tracing::info!(actor_id = actor.id, role = %role, "login succeeded");
    Ok(LoginResponse {
        actor: ActorSummary::from(actor),
        token,
        token_type: "Bearer".to_string(),
        expires_in: config.token_ttl_secs,
    })
}

/// login_admin
///
/// [Public Route] Administrator login. Accepts `{username, password}` or the
/// `x-admin-username` / `x-admin-password` headers.
#[utoipa::path(
    post,
    path = "/login/admin",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Wrong secret or inactive"),
        (status = 404, description = "Unknown administrator")
    )
)]
pub async fn login_admin(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<LoginResponse>> {
    login(&state, Role::Administrator, &headers, &body).await.map(Json)
}

/// login_author
///
/// [Public Route] Author login by email.
#[utoipa::path(
    post,
    path = "/login/author",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Wrong secret or inactive"),
        (status = 404, description = "Unknown author")
    )
)]
pub async fn login_author(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<LoginResponse>> {
    login(&state, Role::Author, &headers, &body).await.map(Json)
}

/// login_moderator
///
/// [Public Route] Moderator login.
#[utoipa::path(
    post,
    path = "/login/moderator",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Wrong secret or inactive"),
        (status = 404, description = "Unknown moderator")
    )
)]
pub async fn login_moderator(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<LoginResponse>> {
    login(&state, Role::Moderator, &headers, &body).await.map(Json)
}

// --- Post Handlers ---

/// get_posts
///
/// [Public Route] The public feed. Anonymous callers and authors see moderated posts
/// only; administrators and moderators see everything.
#[utoipa::path(
    get,
    path = "/posts",
    params(PostFilter),
    responses((status = 200, description = "Visible posts", body = [Post]))
)]
pub async fn get_posts(
    user: Option<AuthUser>,
    State(posts): State<PostLifecycle>,
    Query(filter): Query<PostFilter>,
) -> Result<Json<Vec<Post>>> {
    posts.public_feed(user.as_ref(), &filter).await.map(Json)
}

/// get_post
///
/// [Public Route] A single post. Posts the caller may not see are reported as 404.
#[utoipa::path(
    get,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = Post),
        (status = 404, description = "Missing or hidden")
    )
)]
pub async fn get_post(
    user: Option<AuthUser>,
    State(posts): State<PostLifecycle>,
    Path(id): Path<i64>,
) -> Result<Json<Post>> {
    posts.get(user.as_ref(), id).await.map(Json)
}

/// get_managed_posts
///
/// [Authenticated Route] The management listing: an author's own posts, moderated
/// or not; every post for elevated actors.
#[utoipa::path(
    get,
    path = "/posts/manage",
    params(PostFilter),
    responses((status = 200, description = "Manageable posts", body = [Post]))
)]
pub async fn get_managed_posts(
    user: AuthUser,
    State(posts): State<PostLifecycle>,
    Query(filter): Query<PostFilter>,
) -> Result<Json<Vec<Post>>> {
    posts.managed_posts(&user, &filter).await.map(Json)
}

/// get_unmoderated_posts
///
/// [Moderation Route] The moderation queue.
#[utoipa::path(
    get,
    path = "/posts/unmoderated",
    params(PostFilter),
    responses(
        (status = 200, description = "Posts awaiting moderation", body = [Post]),
        (status = 403, description = "Not a moderator or administrator")
    )
)]
pub async fn get_unmoderated_posts(
    user: AuthUser,
    State(posts): State<PostLifecycle>,
    Query(filter): Query<PostFilter>,
) -> Result<Json<Vec<Post>>> {
    posts.moderation_queue(&user, &filter).await.map(Json)
}

/// create_post
///
/// [Authenticated Route] New posts always start unmoderated with zero likes.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = Post),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not allowed")
    )
)]
pub async fn create_post(
    user: AuthUser,
    State(posts): State<PostLifecycle>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse> {
    let post = posts.create(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// update_post
///
/// [Authenticated Route] Title and category of an owned post (any post for elevated
/// actors).
#[utoipa::path(
    put,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = Post),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_post(
    user: AuthUser,
    State(posts): State<PostLifecycle>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<Post>> {
    posts.update(&user, id, payload).await.map(Json)
}

/// delete_post
///
/// [Authenticated Route] Deletes the post together with its comments.
#[utoipa::path(
    delete,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    user: AuthUser,
    State(posts): State<PostLifecycle>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    posts.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// like_post
///
/// [Authenticated Route] `{"action": "like"}` increments, `{"action": "dislike"}`
/// decrements (never below zero). An empty body counts as a like.
#[utoipa::path(
    post,
    path = "/posts/{id}/like",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = LikeRequest,
    responses(
        (status = 200, description = "New like count", body = LikeResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn like_post(
    user: AuthUser,
    State(posts): State<PostLifecycle>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<LikeResponse>> {
    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        LikeRequest::default()
    } else {
        serde_json::from_slice::<LikeRequest>(&body)
            .map_err(|e| AppError::validation(format!("invalid like body: {}", e)))?
    };
    posts.like(&user, id, payload.action).await.map(Json)
}

/// moderate_post
///
/// [Moderation Route] Marks the post moderated and records the acting moderator.
#[utoipa::path(
    post,
    path = "/posts/{id}/moderate",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Moderated", body = Post),
        (status = 403, description = "Not a moderator or administrator"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Already moderated by someone else")
    )
)]
pub async fn moderate_post(
    user: AuthUser,
    State(posts): State<PostLifecycle>,
    Path(id): Path<i64>,
) -> Result<Json<Post>> {
    posts.moderate(&user, id).await.map(Json)
}

// --- Comment Handlers ---

/// get_comments
///
/// [Authenticated Route] Comments on visible posts, optionally for one post
/// (`?post={id}`).
#[utoipa::path(
    get,
    path = "/comments",
    params(CommentFilter),
    responses((status = 200, description = "Comments", body = [Comment]))
)]
pub async fn get_comments(
    user: AuthUser,
    State(posts): State<PostLifecycle>,
    Query(filter): Query<CommentFilter>,
) -> Result<Json<Vec<Comment>>> {
    posts.comments(&user, filter.post).await.map(Json)
}

/// add_comment
///
/// [Authenticated Route] Comments on a post the caller can see.
#[utoipa::path(
    post,
    path = "/comments",
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment Added", body = Comment),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Post missing or hidden")
    )
)]
pub async fn add_comment(
    user: AuthUser,
    State(posts): State<PostLifecycle>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse> {
    let comment = posts.add_comment(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    get,
    path = "/comments/{id}",
    params(("id" = i64, Path, description = "Comment ID")),
    responses((status = 200, description = "Found", body = Comment))
)]
pub async fn get_comment(
    user: AuthUser,
    State(posts): State<PostLifecycle>,
    Path(id): Path<i64>,
) -> Result<Json<Comment>> {
    posts.comment(&user, id).await.map(Json)
}

/// delete_comment
///
/// [Authenticated Route] Reserved to administrators and moderators.
#[utoipa::path(
    delete,
    path = "/comments/{id}",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    user: AuthUser,
    State(posts): State<PostLifecycle>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    posts.delete_comment(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Category Handlers ---

#[utoipa::path(
    get,
    path = "/categories",
    responses((status = 200, description = "Categories", body = [Category]))
)]
pub async fn get_categories(
    user: AuthUser,
    State(categories): State<CategoryService>,
) -> Result<Json<Vec<Category>>> {
    categories.list(&user).await.map(Json)
}

#[utoipa::path(
    get,
    path = "/categories/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    responses((status = 200, description = "Found", body = Category))
)]
pub async fn get_category(
    user: AuthUser,
    State(categories): State<CategoryService>,
    Path(id): Path<i64>,
) -> Result<Json<Category>> {
    categories.get(&user, id).await.map(Json)
}

/// create_category
///
/// [Authenticated Route] Administrators and moderators only.
#[utoipa::path(
    post,
    path = "/categories",
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 403, description = "Not allowed")
    )
)]
pub async fn create_category(
    user: AuthUser,
    State(categories): State<CategoryService>,
    Json(payload): Json<CategoryRequest>,
) -> Result<impl IntoResponse> {
    let category = categories.create(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    put,
    path = "/categories/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    request_body = CategoryRequest,
    responses((status = 200, description = "Updated", body = Category))
)]
pub async fn update_category(
    user: AuthUser,
    State(categories): State<CategoryService>,
    Path(id): Path<i64>,
    Json(payload): Json<CategoryRequest>,
) -> Result<Json<Category>> {
    categories.update(&user, id, payload).await.map(Json)
}

/// delete_category
///
/// [Authenticated Route] Posts of the category are kept and become uncategorized.
#[utoipa::path(
    delete,
    path = "/categories/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_category(
    user: AuthUser,
    State(categories): State<CategoryService>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    categories.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// get_me
///
/// [Authenticated Route] The actor behind the presented credentials or token.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current actor", body = ActorSummary),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_me(
    user: AuthUser,
    State(accounts): State<AccountService>,
) -> Result<Json<ActorSummary>> {
    Ok(Json(accounts.me(&user).await?.into()))
}

// --- Actor Handlers ---
//
// Mounted three times, under /authors, /admins and /moderators. The route supplies
// the role as an `Extension`, so one set of handlers serves all three identity
// spaces. Documented under /authors.

/// list_actors
///
/// [Authenticated Route] Actors of the route's role.
#[utoipa::path(
    get,
    path = "/authors",
    responses((status = 200, description = "Actors", body = [ActorSummary]))
)]
pub async fn list_actors(
    user: AuthUser,
    Extension(role): Extension<Role>,
    State(accounts): State<AccountService>,
) -> Result<Json<Vec<ActorSummary>>> {
    let actors = accounts.list(&user, role).await?;
    Ok(Json(actors.into_iter().map(ActorSummary::from).collect()))
}

#[utoipa::path(
    get,
    path = "/authors/{id}",
    params(("id" = i64, Path, description = "Actor ID")),
    responses(
        (status = 200, description = "Found", body = ActorSummary),
        (status = 404, description = "No such actor with this role")
    )
)]
pub async fn get_actor(
    user: AuthUser,
    Extension(role): Extension<Role>,
    State(accounts): State<AccountService>,
    Path(id): Path<i64>,
) -> Result<Json<ActorSummary>> {
    accounts.get(&user, role, id).await.map(|actor| Json(actor.into()))
}

/// create_actor
///
/// [Authenticated Route] Administrators and moderators create actors of the route's
/// role. The password is hashed before storage.
#[utoipa::path(
    post,
    path = "/authors",
    request_body = CreateActorRequest,
    responses(
        (status = 201, description = "Created", body = ActorSummary),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not allowed")
    )
)]
pub async fn create_actor(
    user: AuthUser,
    Extension(role): Extension<Role>,
    State(accounts): State<AccountService>,
    Json(payload): Json<CreateActorRequest>,
) -> Result<impl IntoResponse> {
    let actor = accounts.create(&user, role, payload).await?;
    Ok((StatusCode::CREATED, Json(ActorSummary::from(actor))))
}

/// update_actor
///
/// [Authenticated Route] Authors may edit their own name and password; elevated
/// actors may edit anyone, including the activation flag.
#[utoipa::path(
    put,
    path = "/authors/{id}",
    params(("id" = i64, Path, description = "Actor ID")),
    request_body = UpdateActorRequest,
    responses(
        (status = 200, description = "Updated", body = ActorSummary),
        (status = 403, description = "Not allowed")
    )
)]
pub async fn update_actor(
    user: AuthUser,
    Extension(role): Extension<Role>,
    State(accounts): State<AccountService>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateActorRequest>,
) -> Result<Json<ActorSummary>> {
    accounts
        .update(&user, role, id, payload)
        .await
        .map(|actor| Json(actor.into()))
}

/// deactivate_actor
///
/// [Authenticated Route] DELETE is a soft delete: the actor stays, inactive, and can
/// no longer log in.
#[utoipa::path(
    delete,
    path = "/authors/{id}",
    params(("id" = i64, Path, description = "Actor ID")),
    responses(
        (status = 204, description = "Deactivated"),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn deactivate_actor(
    user: AuthUser,
    Extension(role): Extension<Role>,
    State(accounts): State<AccountService>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    accounts.deactivate(&user, role, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
