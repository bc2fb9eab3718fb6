use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{
    config::AppConfig,
    error::{AppError, Result},
    models::{Actor, Role},
    password::HasherState,
    repository::RepositoryState,
};

/// Claims
///
/// Payload of the bearer token minted at login. The token only names the actor; the
/// actor row is re-read on every request, so deactivation takes effect immediately.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the actor id.
    pub sub: i64,
    /// Role at issue time. Must still match the stored role.
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request: actor id plus role tag. It is the
/// sole input the access policy receives about the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub role: Role,
}

impl From<&Actor> for AuthUser {
    fn from(actor: &Actor) -> Self {
        Self {
            id: actor.id,
            role: actor.role,
        }
    }
}

/// Credentials
///
/// A handle/secret pair presented for one role's identity space.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub role: Role,
    pub handle: String,
    pub secret: String,
}

/// Presented
///
/// Whatever the request carried to prove who it is.
#[derive(Debug, Clone)]
pub enum Presented {
    Credentials(Credentials),
    Bearer(String),
}

// Per-role credential headers, tried in this order.
const CREDENTIAL_HEADERS: [(Role, &str, &str); 3] = [
    (Role::Administrator, "x-admin-username", "x-admin-password"),
    (Role::Author, "x-author-email", "x-author-password"),
    (Role::Moderator, "x-moderator-username", "x-moderator-password"),
];

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

/// credentials_for_role
///
/// Reads the credential header pair of one role. Both halves must be present.
pub fn credentials_for_role(headers: &HeaderMap, role: Role) -> Option<Credentials> {
    let (_, handle_header, secret_header) = CREDENTIAL_HEADERS
        .iter()
        .find(|(candidate, _, _)| *candidate == role)?;

    Some(Credentials {
        role,
        handle: header_str(headers, handle_header)?.to_string(),
        secret: header_str(headers, secret_header)?.to_string(),
    })
}

/// presented_credentials
///
/// A bearer token wins over credential headers; among credential headers the first
/// complete pair wins. `None` means the request is anonymous.
pub fn presented_credentials(headers: &HeaderMap) -> Option<Presented> {
    if let Some(token) = header_str(headers, header::AUTHORIZATION.as_str())
        .and_then(|value| value.strip_prefix("Bearer "))
    {
        return Some(Presented::Bearer(token.trim().to_string()));
    }

    CREDENTIAL_HEADERS
        .iter()
        .find_map(|(role, _, _)| credentials_for_role(headers, *role))
        .map(Presented::Credentials)
}

/// issue_token
///
/// Mints an HS256 bearer token for an authenticated actor.
pub fn issue_token(actor: &Actor, config: &AppConfig) -> Result<String> {
    let now = Utc::now().timestamp().max(0) as usize;
    let exp = usize::try_from(config.token_ttl_secs)
        .ok()
        .and_then(|ttl| now.checked_add(ttl))
        .ok_or_else(|| {
            AppError::Internal(format!("token lifetime {}s overflows", config.token_ttl_secs))
        })?;
    let claims = Claims {
        sub: actor.id,
        role: actor.role,
        iat: now,
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {}", e)))
}

/// decode_token
///
/// Validates signature and expiry. Every failure is an authentication failure.
pub fn decode_token(token: &str, config: &AppConfig) -> Result<Claims> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        match e.kind() {
            ErrorKind::ExpiredSignature => tracing::debug!("expired bearer token"),
            other => tracing::debug!("rejected bearer token: {:?}", other),
        }
        AppError::InvalidCredentials
    })
}

/// Authenticator
///
/// Validates presented credentials against the credential store. Read-only.
#[derive(Clone)]
pub struct Authenticator {
    repo: RepositoryState,
    hasher: HasherState,
}

impl Authenticator {
    pub fn new(repo: RepositoryState, hasher: HasherState) -> Self {
        Self { repo, hasher }
    }

    /// verify
    ///
    /// Looks the handle up inside the requested role's identity space, checks the secret
    /// and the activation flag, and returns the full actor row.
    pub async fn verify(&self, credentials: &Credentials) -> Result<Actor> {
        let actor = self
            .repo
            .find_actor_by_handle(&credentials.handle)
            .await?
            .filter(|actor| actor.role == credentials.role)
            .ok_or_else(|| AppError::not_found(format!("{} '{}'", credentials.role, credentials.handle)))?;

        if !self.hasher.verify(&credentials.secret, &actor.password_hash) {
            tracing::info!(actor_id = actor.id, role = %actor.role, "credential mismatch");
            return Err(AppError::InvalidCredentials);
        }

        if !actor.is_active {
            tracing::info!(actor_id = actor.id, role = %actor.role, "inactive actor refused");
            return Err(AppError::Inactive);
        }

        Ok(actor)
    }

    /// authenticate
    ///
    /// `verify`, reduced to the identity handed to the access policy.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<AuthUser> {
        self.verify(credentials).await.map(|actor| AuthUser::from(&actor))
    }

    /// resolve_token
    ///
    /// Turns a bearer token back into an identity, re-checking the stored actor.
    pub async fn resolve_token(&self, token: &str, config: &AppConfig) -> Result<AuthUser> {
        let claims = decode_token(token, config)?;

        let actor = self
            .repo
            .find_actor(claims.sub)
            .await?
            .filter(|actor| actor.role == claims.role)
            .ok_or(AppError::InvalidCredentials)?;

        if !actor.is_active {
            return Err(AppError::Inactive);
        }

        Ok(AuthUser::from(&actor))
    }

    /// resolve
    ///
    /// Resolves whatever the request presented into an identity.
    pub async fn resolve(&self, presented: &Presented, config: &AppConfig) -> Result<AuthUser> {
        match presented {
            Presented::Credentials(credentials) => self.authenticate(credentials).await,
            Presented::Bearer(token) => self.resolve_token(token, config).await,
        }
    }
}

/// resolve_parts
///
/// Shared body of both extractors. Requests without credentials resolve to `None`;
/// requests with bad credentials fail instead of silently becoming anonymous.
async fn resolve_parts<S>(parts: &Parts, state: &S) -> Result<Option<AuthUser>>
where
    S: Send + Sync,
    Authenticator: FromRef<S>,
    AppConfig: FromRef<S>,
{
    // Already resolved by the authentication layer.
    if let Some(user) = parts.extensions.get::<AuthUser>() {
        return Ok(Some(*user));
    }

    let Some(presented) = presented_credentials(&parts.headers) else {
        return Ok(None);
    };

    let authenticator = Authenticator::from_ref(state);
    let config = AppConfig::from_ref(state);

    authenticator.resolve(&presented, &config).await.map(Some)
}

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument on protected routes.
/// Rejection: 401 when nothing was presented, otherwise the authentication error.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Authenticator: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        resolve_parts(parts, state)
            .await?
            .ok_or(AppError::Unauthenticated)
    }
}

/// Optional AuthUser Extractor
///
/// `Option<AuthUser>` for routes that anonymous callers may use too.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Authenticator: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Option<Self>> {
        resolve_parts(parts, state).await
    }
}
