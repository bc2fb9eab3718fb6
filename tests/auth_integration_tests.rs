mod common;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{Request, StatusCode, header, request::Parts},
};
use blog_portal::{
    auth::{
        self, AuthUser, Authenticator, Claims, Credentials, Presented, credentials_for_role,
        presented_credentials,
    },
    config::AppConfig,
    error::AppError,
    models::{ActorChanges, Role},
};
use common::{Fixture, PASSWORD};
use jsonwebtoken::{EncodingKey, Header, encode};

fn parts_with(headers: &[(&str, &str)]) -> Parts {
    let mut builder = Request::builder().uri("/posts");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(()).unwrap().into_parts().0
}

fn authenticator(fx: &Fixture) -> Authenticator {
    Authenticator::new(fx.state.repo.clone(), fx.state.hasher.clone())
}

// --- Header parsing ---

#[test]
fn test_role_headers_require_both_halves() {
    let parts = parts_with(&[("x-admin-username", "ada")]);
    assert!(credentials_for_role(&parts.headers, Role::Administrator).is_none());

    let parts = parts_with(&[("x-admin-username", "ada"), ("x-admin-password", "pw")]);
    let credentials = credentials_for_role(&parts.headers, Role::Administrator).unwrap();
    assert_eq!(credentials.handle, "ada");
    assert_eq!(credentials.secret, "pw");
    assert!(credentials_for_role(&parts.headers, Role::Moderator).is_none());
}

#[test]
fn test_bearer_token_takes_precedence_over_headers() {
    let parts = parts_with(&[
        ("x-author-email", "al@blog.test"),
        ("x-author-password", "pw"),
        ("authorization", "Bearer abc.def.ghi"),
    ]);

    match presented_credentials(&parts.headers) {
        Some(Presented::Bearer(token)) => assert_eq!(token, "abc.def.ghi"),
        other => panic!("expected a bearer token, got {:?}", other),
    }
}

#[test]
fn test_no_credentials_means_anonymous() {
    assert!(presented_credentials(&parts_with(&[]).headers).is_none());
}

// --- Authenticator ---

#[tokio::test]
async fn test_verify_distinguishes_failure_kinds() {
    let fx = Fixture::new().await;
    let auth = authenticator(&fx);

    let unknown = auth
        .verify(&Credentials {
            role: Role::Moderator,
            handle: "nobody".to_string(),
            secret: PASSWORD.to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(unknown, AppError::NotFound(_)));

    // A valid handle through the wrong role's identity space is unknown there.
    let wrong_space = auth
        .verify(&Credentials {
            role: Role::Moderator,
            handle: fx.admin.handle.clone(),
            secret: PASSWORD.to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(wrong_space, AppError::NotFound(_)));

    let bad_secret = auth
        .verify(&Credentials {
            role: Role::Administrator,
            handle: fx.admin.handle.clone(),
            secret: "wrong".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(bad_secret, AppError::InvalidCredentials));
    assert_eq!(bad_secret.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_inactive_moderator_with_correct_password_is_refused() {
    let fx = Fixture::new().await;
    let dormant = fx.actor("Dormant", "dormant", Role::Moderator, false).await;

    let err = authenticator(&fx)
        .authenticate(&Credentials {
            role: Role::Moderator,
            handle: dormant.handle.clone(),
            secret: PASSWORD.to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Inactive));
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

// --- Tokens ---

#[tokio::test]
async fn test_issued_token_resolves_to_the_actor() {
    let fx = Fixture::new().await;
    let config = AppConfig::default();

    let token = auth::issue_token(&fx.author, &config).unwrap();
    let claims = auth::decode_token(&token, &config).unwrap();
    assert_eq!(claims.sub, fx.author.id);
    assert_eq!(claims.role, Role::Author);

    let user = authenticator(&fx).resolve_token(&token, &config).await.unwrap();
    assert_eq!(user, AuthUser::from(&fx.author));
}

#[tokio::test]
async fn test_tokens_signed_with_another_secret_are_rejected() {
    let fx = Fixture::new().await;
    let other = AppConfig {
        jwt_secret: "a-completely-different-secret".to_string(),
        ..AppConfig::default()
    };

    let token = auth::issue_token(&fx.author, &other).unwrap();
    let err = auth::decode_token(&token, &AppConfig::default()).unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));
}

#[tokio::test]
async fn test_overflowing_token_lifetime_is_an_error() {
    let fx = Fixture::new().await;
    let config = AppConfig {
        token_ttl_secs: u64::MAX,
        ..AppConfig::default()
    };

    let err = auth::issue_token(&fx.author, &config).unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let config = AppConfig::default();
    let claims = Claims {
        sub: 1,
        role: Role::Author,
        iat: 1_000,
        exp: 2_000,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .unwrap();

    assert!(matches!(
        auth::decode_token(&token, &config),
        Err(AppError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn test_token_of_deactivated_actor_stops_working() {
    let fx = Fixture::new().await;
    let config = AppConfig::default();
    let token = auth::issue_token(&fx.moderator, &config).unwrap();

    fx.repo()
        .update_actor(
            fx.moderator.id,
            ActorChanges {
                is_active: Some(false),
                ..ActorChanges::default()
            },
        )
        .await
        .unwrap();

    let err = authenticator(&fx).resolve_token(&token, &config).await.unwrap_err();
    assert!(matches!(err, AppError::Inactive));
}

// --- Extractors ---

#[tokio::test]
async fn test_extractor_resolves_role_headers() {
    let fx = Fixture::new().await;
    let mut parts = parts_with(&[
        ("x-moderator-username", "mo"),
        ("x-moderator-password", PASSWORD),
    ]);

    let user = <AuthUser as FromRequestParts<_>>::from_request_parts(&mut parts, &fx.state)
        .await
        .unwrap();
    assert_eq!(user.id, fx.moderator.id);
    assert_eq!(user.role, Role::Moderator);
}

#[tokio::test]
async fn test_extractor_resolves_bearer_token() {
    let fx = Fixture::new().await;
    let token = auth::issue_token(&fx.admin, &fx.state.config).unwrap();
    let bearer = format!("Bearer {}", token);
    let mut parts = parts_with(&[(header::AUTHORIZATION.as_str(), bearer.as_str())]);

    let user = <AuthUser as FromRequestParts<_>>::from_request_parts(&mut parts, &fx.state)
        .await
        .unwrap();
    assert_eq!(user.id, fx.admin.id);
}

#[tokio::test]
async fn test_extractor_rejects_missing_credentials() {
    let fx = Fixture::new().await;
    let mut parts = parts_with(&[]);

    let err = <AuthUser as FromRequestParts<_>>::from_request_parts(&mut parts, &fx.state)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthenticated));
}

#[tokio::test]
async fn test_optional_extractor_is_anonymous_without_credentials() {
    let fx = Fixture::new().await;
    let mut parts = parts_with(&[]);

    let user =
        <AuthUser as OptionalFromRequestParts<_>>::from_request_parts(&mut parts, &fx.state)
            .await
            .unwrap();
    assert!(user.is_none());
}

#[tokio::test]
async fn test_optional_extractor_still_rejects_bad_credentials() {
    let fx = Fixture::new().await;
    let mut parts = parts_with(&[("x-author-email", "al@blog.test"), ("x-author-password", "nope")]);

    let err =
        <AuthUser as OptionalFromRequestParts<_>>::from_request_parts(&mut parts, &fx.state)
            .await
            .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));
}

#[tokio::test]
async fn test_extractor_reuses_identity_from_extensions() {
    let fx = Fixture::new().await;
    let mut parts = parts_with(&[]);
    parts.extensions.insert(AuthUser::from(&fx.author));

    let user = <AuthUser as FromRequestParts<_>>::from_request_parts(&mut parts, &fx.state)
        .await
        .unwrap();
    assert_eq!(user.id, fx.author.id);
}
