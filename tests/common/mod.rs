#![allow(dead_code)]

use blog_portal::{
    AppState,
    auth::AuthUser,
    config::AppConfig,
    models::{Actor, NewActor, NewPost, Post, Role},
    password::{Argon2Hasher, HasherState},
    repository::{MemoryRepository, RepositoryState},
};
use std::sync::Arc;

pub const PASSWORD: &str = "secret-pass";

/// Fixture
///
/// An in-memory application with one actor per role plus a second author.
pub struct Fixture {
    pub state: AppState,
    pub admin: Actor,
    pub moderator: Actor,
    pub author: Actor,
    pub other_author: Actor,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::default()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let repo = Arc::new(MemoryRepository::new()) as RepositoryState;
        let hasher = Arc::new(Argon2Hasher::low_cost()) as HasherState;

        let admin = insert_actor(&repo, &hasher, "Ada", "ada", Role::Administrator, true).await;
        let moderator = insert_actor(&repo, &hasher, "Mo", "mo", Role::Moderator, true).await;
        let author = insert_actor(&repo, &hasher, "Al", "al@blog.test", Role::Author, true).await;
        let other_author =
            insert_actor(&repo, &hasher, "Bea", "bea@blog.test", Role::Author, true).await;

        Self {
            state: AppState {
                repo,
                hasher,
                config,
            },
            admin,
            moderator,
            author,
            other_author,
        }
    }

    pub fn repo(&self) -> &RepositoryState {
        &self.state.repo
    }

    /// Inserts a post straight into the store, bypassing policy.
    pub async fn post_by(&self, author: &Actor, title: &str) -> Post {
        self.state
            .repo
            .create_post(NewPost {
                author_id: author.id,
                title: title.to_string(),
                category_id: None,
            })
            .await
            .unwrap()
    }

    /// Inserts a post and moderates it with the fixture moderator.
    pub async fn moderated_post_by(&self, author: &Actor, title: &str) -> Post {
        let post = self.post_by(author, title).await;
        self.state
            .repo
            .moderate_post(post.id, self.moderator.id, true)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn actor(&self, name: &str, handle: &str, role: Role, is_active: bool) -> Actor {
        insert_actor(&self.state.repo, &self.state.hasher, name, handle, role, is_active).await
    }
}

pub fn user(actor: &Actor) -> AuthUser {
    AuthUser::from(actor)
}

async fn insert_actor(
    repo: &RepositoryState,
    hasher: &HasherState,
    name: &str,
    handle: &str,
    role: Role,
    is_active: bool,
) -> Actor {
    repo.create_actor(NewActor {
        name: name.to_string(),
        handle: handle.to_string(),
        password_hash: hasher.hash(PASSWORD).unwrap(),
        role,
        is_active,
    })
    .await
    .unwrap()
}
