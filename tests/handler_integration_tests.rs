mod common;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{FromRef, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use blog_portal::{
    AccountService, CategoryService, PostLifecycle, handlers,
    models::{
        ActorSummary, Category, CategoryRequest, Comment, CreateActorRequest,
        CreateCommentRequest, CreatePostRequest, LikeResponse, LoginResponse, Post, PostFilter,
        Role, SignupRequest,
    },
    repository::PostScope,
};
use common::{Fixture, PASSWORD, user};
use serde::de::DeserializeOwned;

// --- Helpers ---

async fn read_json<T: DeserializeOwned>(response: Response) -> T {
    let (_, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn status_and_json<T: DeserializeOwned>(response: impl IntoResponse) -> (StatusCode, T) {
    let response = response.into_response();
    let status = response.status();
    (status, read_json(response).await)
}

fn posts(fx: &Fixture) -> State<PostLifecycle> {
    State(PostLifecycle::from_ref(&fx.state))
}

fn accounts(fx: &Fixture) -> State<AccountService> {
    State(AccountService::from_ref(&fx.state))
}

fn categories(fx: &Fixture) -> State<CategoryService> {
    State(CategoryService::from_ref(&fx.state))
}

// --- Session ---

#[tokio::test]
async fn test_signup_returns_created_summary() {
    let fx = Fixture::new().await;
    let payload = SignupRequest {
        name: "Newbie".to_string(),
        email: "newbie@blog.test".to_string(),
        password: "abc123".to_string(),
        confirm_password: "abc123".to_string(),
    };

    let response = handlers::signup(accounts(&fx), Json(payload)).await.unwrap();
    let (status, summary): (_, ActorSummary) = status_and_json(response).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(summary.handle, "newbie@blog.test");
    assert_eq!(summary.role, Role::Author);
}

#[tokio::test]
async fn test_signup_mismatch_is_bad_request() {
    let fx = Fixture::new().await;
    let payload = SignupRequest {
        name: "Newbie".to_string(),
        email: "newbie@blog.test".to_string(),
        password: "abc123".to_string(),
        confirm_password: "xyz".to_string(),
    };

    let err = handlers::signup(accounts(&fx), Json(payload)).await.err().unwrap();
    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = read_json(response).await;
    assert_eq!(body["error"], "Passwords do not match");
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn test_login_with_json_body_returns_token() {
    let fx = Fixture::new().await;
    let body = Bytes::from(format!(
        r#"{{"username": "{}", "password": "{}"}}"#,
        fx.moderator.handle, PASSWORD
    ));

    let Json(login) = handlers::login_moderator(State(fx.state.clone()), HeaderMap::new(), body)
        .await
        .unwrap();

    assert_eq!(login.actor.id, fx.moderator.id);
    assert_eq!(login.token_type, "Bearer");
    assert_eq!(login.expires_in, fx.state.config.token_ttl_secs);
    assert!(!login.token.is_empty());
}

#[tokio::test]
async fn test_login_falls_back_to_role_headers() {
    let fx = Fixture::new().await;
    let mut headers = HeaderMap::new();
    headers.insert("x-author-email", HeaderValue::from_static("al@blog.test"));
    headers.insert("x-author-password", HeaderValue::from_static(PASSWORD));

    let Json(login): Json<LoginResponse> =
        handlers::login_author(State(fx.state.clone()), headers, Bytes::new())
            .await
            .unwrap();
    assert_eq!(login.actor.id, fx.author.id);
}

#[tokio::test]
async fn test_login_failures_map_to_statuses() {
    let fx = Fixture::new().await;

    let wrong = Bytes::from(r#"{"username": "ada", "password": "nope"}"#);
    let err = handlers::login_admin(State(fx.state.clone()), HeaderMap::new(), wrong)
        .await
        .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);

    let unknown = Bytes::from(r#"{"username": "ghost", "password": "whatever"}"#);
    let err = handlers::login_admin(State(fx.state.clone()), HeaderMap::new(), unknown)
        .await
        .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);

    let err = handlers::login_admin(State(fx.state.clone()), HeaderMap::new(), Bytes::new())
        .await
        .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);

    let garbage = Bytes::from("not json");
    let err = handlers::login_admin(State(fx.state.clone()), HeaderMap::new(), garbage)
        .await
        .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
}

// --- Posts ---

#[tokio::test]
async fn test_get_posts_anonymous_sees_only_moderated() {
    let fx = Fixture::new().await;
    fx.moderated_post_by(&fx.author, "Public").await;
    fx.post_by(&fx.author, "Draft").await;

    let Json(feed) = handlers::get_posts(None, posts(&fx), Query(PostFilter::default()))
        .await
        .unwrap();

    assert_eq!(feed.len(), 1);
    assert!(feed[0].moderated);
}

#[tokio::test]
async fn test_get_post_hidden_is_not_found() {
    let fx = Fixture::new().await;
    let draft = fx.post_by(&fx.author, "Draft").await;

    let err = handlers::get_post(None, posts(&fx), Path(draft.id)).await.unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_post_returns_created() {
    let fx = Fixture::new().await;
    let payload = CreatePostRequest {
        title: "Fresh".to_string(),
        ..CreatePostRequest::default()
    };

    let response = handlers::create_post(user(&fx.author), posts(&fx), Json(payload))
        .await
        .unwrap();
    let (status, post): (_, Post) = status_and_json(response).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post.author_id, fx.author.id);
    assert!(!post.moderated);
}

#[tokio::test]
async fn test_update_foreign_post_is_forbidden() {
    let fx = Fixture::new().await;
    let theirs = fx.moderated_post_by(&fx.other_author, "Theirs").await;

    let err = handlers::update_post(
        user(&fx.author),
        posts(&fx),
        Path(theirs.id),
        Json(Default::default()),
    )
    .await
    .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delete_post_returns_no_content() {
    let fx = Fixture::new().await;
    let own = fx.post_by(&fx.author, "Own").await;

    let status = handlers::delete_post(user(&fx.author), posts(&fx), Path(own.id))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(fx.repo().find_post(own.id, PostScope::All).await.unwrap().is_none());
}

#[tokio::test]
async fn test_like_accepts_empty_body_and_dislike_floors() {
    let fx = Fixture::new().await;
    let post = fx.moderated_post_by(&fx.author, "Likeable").await;

    let Json(liked): Json<LikeResponse> =
        handlers::like_post(user(&fx.other_author), posts(&fx), Path(post.id), Bytes::new())
            .await
            .unwrap();
    assert_eq!(liked.like_count, 1);
    assert!(liked.is_liked);

    for expected in [0, 0] {
        let body = Bytes::from(r#"{"action": "dislike"}"#);
        let Json(disliked) =
            handlers::like_post(user(&fx.other_author), posts(&fx), Path(post.id), body)
                .await
                .unwrap();
        assert_eq!(disliked.like_count, expected);
    }

    let bad = Bytes::from(r#"{"action": "love"}"#);
    let err = handlers::like_post(user(&fx.other_author), posts(&fx), Path(post.id), bad)
        .await
        .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_moderate_post_by_author_is_forbidden() {
    let fx = Fixture::new().await;
    let own = fx.post_by(&fx.author, "Own").await;

    let err = handlers::moderate_post(user(&fx.author), posts(&fx), Path(own.id))
        .await
        .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

    let Json(moderated) = handlers::moderate_post(user(&fx.moderator), posts(&fx), Path(own.id))
        .await
        .unwrap();
    assert!(moderated.moderated);
    assert_eq!(moderated.moderator_id, Some(fx.moderator.id));
}

#[tokio::test]
async fn test_unmoderated_queue_for_moderators() {
    let fx = Fixture::new().await;
    fx.post_by(&fx.author, "Waiting").await;

    let Json(queue) = handlers::get_unmoderated_posts(
        user(&fx.moderator),
        posts(&fx),
        Query(PostFilter::default()),
    )
    .await
    .unwrap();
    assert_eq!(queue.len(), 1);
}

// --- Comments ---

#[tokio::test]
async fn test_comment_round_trip_through_handlers() {
    let fx = Fixture::new().await;
    let post = fx.moderated_post_by(&fx.author, "Open").await;

    let response = handlers::add_comment(
        user(&fx.other_author),
        posts(&fx),
        Json(CreateCommentRequest {
            post_id: post.id,
            content: "Nice".to_string(),
        }),
    )
    .await
    .unwrap();
    let (status, comment): (_, Comment) = status_and_json(response).await;
    assert_eq!(status, StatusCode::CREATED);

    let Json(listed) = handlers::get_comments(
        user(&fx.author),
        posts(&fx),
        Query(handlers::CommentFilter { post: Some(post.id) }),
    )
    .await
    .unwrap();
    assert_eq!(listed.iter().map(|c| c.id).collect::<Vec<_>>(), vec![comment.id]);

    let err = handlers::delete_comment(user(&fx.other_author), posts(&fx), Path(comment.id))
        .await
        .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

    let status = handlers::delete_comment(user(&fx.admin), posts(&fx), Path(comment.id))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
}

// --- Categories ---

#[tokio::test]
async fn test_category_crud_and_detach_on_delete() {
    let fx = Fixture::new().await;

    let err = handlers::create_category(
        user(&fx.author),
        categories(&fx),
        Json(CategoryRequest {
            title: Some("Nope".to_string()),
        }),
    )
    .await
    .err()
    .unwrap();
    assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

    let response = handlers::create_category(
        user(&fx.admin),
        categories(&fx),
        Json(CategoryRequest {
            title: Some("Rust".to_string()),
        }),
    )
    .await
    .unwrap();
    let (status, category): (_, Category) = status_and_json(response).await;
    assert_eq!(status, StatusCode::CREATED);

    let filed = handlers::create_post(
        user(&fx.author),
        posts(&fx),
        Json(CreatePostRequest {
            title: "Filed".to_string(),
            category_id: Some(category.id),
            author_id: None,
        }),
    )
    .await
    .unwrap();
    let (_, filed): (StatusCode, Post) = status_and_json(filed).await;

    let Json(renamed) = handlers::update_category(
        user(&fx.moderator),
        categories(&fx),
        Path(category.id),
        Json(CategoryRequest {
            title: Some("Rustacean".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(renamed.title.as_deref(), Some("Rustacean"));

    let Json(all) = handlers::get_categories(user(&fx.author), categories(&fx))
        .await
        .unwrap();
    assert_eq!(all.len(), 1);

    let status = handlers::delete_category(user(&fx.admin), categories(&fx), Path(category.id))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let orphan = fx.repo().find_post(filed.id, PostScope::All).await.unwrap().unwrap();
    assert_eq!(orphan.category_id, None);
}

// --- Actors ---

#[tokio::test]
async fn test_actor_routes_respect_role_extension() {
    let fx = Fixture::new().await;

    let response = handlers::create_actor(
        user(&fx.admin),
        Extension(Role::Moderator),
        accounts(&fx),
        Json(CreateActorRequest {
            name: "Mod Two".to_string(),
            handle: "mod2".to_string(),
            password: "hunter22".to_string(),
            is_active: None,
        }),
    )
    .await
    .unwrap();
    let (status, created): (_, ActorSummary) = status_and_json(response).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created.role, Role::Moderator);

    let Json(moderators) =
        handlers::list_actors(user(&fx.admin), Extension(Role::Moderator), accounts(&fx))
            .await
            .unwrap();
    assert_eq!(moderators.len(), 2);

    let err = handlers::get_actor(
        user(&fx.admin),
        Extension(Role::Author),
        accounts(&fx),
        Path(created.id),
    )
    .await
    .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);

    let status = handlers::deactivate_actor(
        user(&fx.admin),
        Extension(Role::Moderator),
        accounts(&fx),
        Path(created.id),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let stored = fx.repo().find_actor(created.id).await.unwrap().unwrap();
    assert!(!stored.is_active);
}

#[tokio::test]
async fn test_actor_summary_never_exposes_password_hash() {
    let fx = Fixture::new().await;

    let Json(summary) = handlers::get_actor(
        user(&fx.author),
        Extension(Role::Author),
        accounts(&fx),
        Path(fx.author.id),
    )
    .await
    .unwrap();

    let json = serde_json::to_value(&summary).unwrap();
    assert!(json.get("password_hash").is_none());
    assert_eq!(json["handle"], fx.author.handle);
}
