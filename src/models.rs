use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

// --- Field limits ---

pub const TITLE_MAX_LEN: usize = 50;
pub const COMMENT_MAX_LEN: usize = 50;
pub const NAME_MAX_LEN: usize = 50;
pub const HANDLE_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 6;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

// --- Roles ---

/// Role
///
/// The RBAC tag carried by every actor. Stored as lowercase text in `actors.role`
/// and fixed at creation time: no operation ever rewrites it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    Author,
    Moderator,
    Administrator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Author => "author",
            Role::Moderator => "moderator",
            Role::Administrator => "administrator",
        }
    }

    /// Administrators and moderators share the same, unrestricted privileges.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Moderator | Role::Administrator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "author" => Ok(Role::Author),
            "moderator" => Ok(Role::Moderator),
            "administrator" => Ok(Role::Administrator),
            _ => Err(UnknownRole(value)),
        }
    }
}

// --- Core Schemas (Mapped to Database) ---

/// Actor
///
/// A row of the unified `actors` table. It carries the password digest and is
/// therefore never serialized; responses go through `ActorSummary`.
#[derive(Debug, Clone, FromRow)]
pub struct Actor {
    pub id: i64,
    pub name: String,
    // Username for administrators/moderators, email for authors. Globally unique.
    pub handle: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_active: bool,
}

/// ActorSummary
///
/// Public projection of an actor returned by login and the actor CRUD endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct ActorSummary {
    pub id: i64,
    pub name: String,
    pub handle: String,
    pub role: Role,
    pub is_active: bool,
}

impl From<&Actor> for ActorSummary {
    fn from(actor: &Actor) -> Self {
        Self {
            id: actor.id,
            name: actor.name.clone(),
            handle: actor.handle.clone(),
            role: actor.role,
            is_active: actor.is_active,
        }
    }
}

impl From<Actor> for ActorSummary {
    fn from(actor: Actor) -> Self {
        ActorSummary::from(&actor)
    }
}

/// Post
///
/// A row of the `posts` table. `moderated` and `moderator_id` change together
/// (the table carries a CHECK constraint for it) and only through moderation;
/// `like_count` changes only through like/dislike and never drops below zero.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub category_id: Option<i64>,
    // Owning author, fixed at creation.
    pub author_id: i64,
    pub moderated: bool,
    pub moderator_id: Option<i64>,
    pub like_count: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Comment
///
/// A row of the `comments` table. Comments have no edit path.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub content: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Category
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub title: Option<String>,
}

// --- Request Payloads (Input Schemas) ---

/// SignupRequest
///
/// Public author registration (POST /signup). The handle of an author is its email.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// LoginRequest
///
/// Body form of the login call. `username` (admins, moderators) and `email`
/// (authors) are accepted as aliases of `handle`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct LoginRequest {
    #[serde(alias = "username", alias = "email")]
    pub handle: String,
    pub password: String,
}

/// LoginResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub actor: ActorSummary,
    /// Bearer token usable instead of replaying credential headers.
    pub token: String,
    pub token_type: String,
    /// Token lifetime in seconds.
    pub expires_in: u64,
}

/// CreateActorRequest
///
/// Used by elevated actors on POST /authors, /admins and /moderators.
/// The role comes from the route, never from the payload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateActorRequest {
    pub name: String,
    pub handle: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// UpdateActorRequest
///
/// Partial update. A new `password` is re-hashed before it reaches the store.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateActorRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// CreatePostRequest
///
/// `author_id` is only meaningful for elevated actors creating a post on behalf of
/// an author; an author's post is always owned by that author.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<i64>,
}

/// UpdatePostRequest
///
/// An absent `category_id` keeps the category; an explicit `null` clears it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    #[schema(value_type = Option<i64>)]
    pub category_id: Option<Option<i64>>,
}

/// Distinguishes a field sent as `null` (`Some(None)`) from a missing one (`None`).
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// LikeDirection
///
/// `increment`/`decrement` are accepted as synonyms of `like`/`dislike`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum LikeDirection {
    #[default]
    #[serde(alias = "increment")]
    Like,
    #[serde(alias = "decrement")]
    Dislike,
}

/// LikeRequest
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct LikeRequest {
    #[serde(default)]
    pub action: LikeDirection,
}

/// LikeResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LikeResponse {
    pub post_id: i64,
    pub like_count: i64,
    pub is_liked: bool,
}

/// CreateCommentRequest
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct CreateCommentRequest {
    #[serde(alias = "post")]
    pub post_id: i64,
    pub content: String,
}

/// CategoryRequest
///
/// Body of both create and update on /categories.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CategoryRequest {
    #[serde(default)]
    pub title: Option<String>,
}

/// PostFilter
///
/// Query parameters shared by the post listings.
#[derive(Debug, Clone, Deserialize, IntoParams, Default)]
pub struct PostFilter {
    /// Only posts in this category.
    pub category: Option<i64>,
    /// Page size, defaults to 50 and is capped at 100.
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PostFilter {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

// --- Persistence Inputs ---

/// NewActor
///
/// Everything the store needs to insert an actor; the secret is already hashed.
#[derive(Debug, Clone)]
pub struct NewActor {
    pub name: String,
    pub handle: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

/// ActorChanges
///
/// Partial update applied with COALESCE semantics: `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ActorChanges {
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: i64,
    pub title: String,
    pub category_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    /// `Some(None)` clears the category.
    pub category_id: Option<Option<i64>>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub author_id: i64,
    pub content: String,
}
