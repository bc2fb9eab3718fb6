//! Post lifecycle.
//!
//! A post is created unmoderated and moves to moderated exactly once; there is no way
//! back. Moderation fields and the like counter are only ever written by the dedicated
//! transitions below, and each transition asks the access policy first.

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::{
        COMMENT_MAX_LEN, Comment, CreateCommentRequest, CreatePostRequest, LikeDirection,
        LikeResponse, NewComment, NewPost, Post, PostChanges, PostFilter, Role, TITLE_MAX_LEN,
        UpdatePostRequest,
    },
    policy::{self, Action, Resource, Target},
    repository::{PostScope, RepositoryState},
};

/// PostLifecycle
///
/// Owns every post (and dependent comment) transition.
#[derive(Clone)]
pub struct PostLifecycle {
    repo: RepositoryState,
    allow_remoderation: bool,
}

/// Visibility for reading one post or its comments.
fn detail_scope(actor: Option<&AuthUser>) -> PostScope {
    match actor {
        Some(user) if user.role.is_elevated() => PostScope::All,
        Some(user) => PostScope::ModeratedOrOwnedBy(user.id),
        None => PostScope::Moderated,
    }
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::validation("title must not be empty"));
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(AppError::validation(format!(
            "title must be at most {} characters",
            TITLE_MAX_LEN
        )));
    }
    Ok(title.to_string())
}

impl PostLifecycle {
    pub fn new(repo: RepositoryState, allow_remoderation: bool) -> Self {
        Self {
            repo,
            allow_remoderation,
        }
    }

    async fn ensure_category(&self, category_id: Option<i64>) -> Result<()> {
        if let Some(id) = category_id {
            if self.repo.find_category(id).await?.is_none() {
                return Err(AppError::validation(format!("unknown category {}", id)));
            }
        }
        Ok(())
    }

    /// Loads a post regardless of visibility, for mutations that check policy themselves.
    async fn load(&self, id: i64) -> Result<Post> {
        self.repo
            .find_post(id, PostScope::All)
            .await?
            .ok_or_else(|| AppError::not_found(format!("post {}", id)))
    }

    // --- Reads ---

    /// public_feed
    ///
    /// The public listing: administrators and moderators see every post, everybody
    /// else only moderated ones.
    pub async fn public_feed(&self, actor: Option<&AuthUser>, filter: &PostFilter) -> Result<Vec<Post>> {
        let scope = match actor {
            Some(user) if user.role.is_elevated() => PostScope::All,
            _ => PostScope::Moderated,
        };
        self.repo.list_posts(scope, filter).await
    }

    /// managed_posts
    ///
    /// The management listing: elevated actors see every post, authors exactly
    /// their own, moderated or not.
    pub async fn managed_posts(&self, actor: &AuthUser, filter: &PostFilter) -> Result<Vec<Post>> {
        let scope = if actor.role.is_elevated() {
            PostScope::All
        } else {
            PostScope::OwnedBy(actor.id)
        };
        self.repo.list_posts(scope, filter).await
    }

    /// moderation_queue
    ///
    /// Unmoderated posts, for whoever may moderate.
    pub async fn moderation_queue(&self, actor: &AuthUser, filter: &PostFilter) -> Result<Vec<Post>> {
        policy::require(Some(actor), Action::Moderate, &Target::kind(Resource::Post))?;
        self.repo.list_posts(PostScope::Unmoderated, filter).await
    }

    /// get
    ///
    /// A post the caller is allowed to see. Hidden posts are reported as missing.
    pub async fn get(&self, actor: Option<&AuthUser>, id: i64) -> Result<Post> {
        let post = self
            .repo
            .find_post(id, detail_scope(actor))
            .await?
            .ok_or_else(|| AppError::not_found(format!("post {}", id)))?;

        policy::require(actor, Action::Read, &Target::post(&post))?;
        Ok(post)
    }

    // --- Transitions ---

    /// create
    ///
    /// Always starts unmoderated with zero likes and no moderator. Authors own what
    /// they create; elevated actors must name the owning author.
    pub async fn create(&self, actor: &AuthUser, req: CreatePostRequest) -> Result<Post> {
        policy::require(Some(actor), Action::Create, &Target::kind(Resource::Post))?;

        let title = validate_title(&req.title)?;

        let author_id = if actor.role == Role::Author {
            match req.author_id {
                Some(other) if other != actor.id => {
                    return Err(AppError::forbidden("authors can only create their own posts"));
                }
                _ => actor.id,
            }
        } else {
            let author_id = req
                .author_id
                .ok_or_else(|| AppError::validation("author_id is required"))?;
            match self.repo.find_actor(author_id).await? {
                Some(owner) if owner.role == Role::Author => author_id,
                _ => return Err(AppError::validation(format!("unknown author {}", author_id))),
            }
        };

        self.ensure_category(req.category_id).await?;

        let post = self
            .repo
            .create_post(NewPost {
                author_id,
                title,
                category_id: req.category_id,
            })
            .await?;

        tracing::info!(post_id = post.id, author_id, created_by = actor.id, "post created");
        Ok(post)
    }

    /// update
    ///
    /// Title and category only; ownership and moderation state are untouched.
    pub async fn update(&self, actor: &AuthUser, id: i64, req: UpdatePostRequest) -> Result<Post> {
        let post = self.load(id).await?;
        policy::require(Some(actor), Action::Update, &Target::post(&post))?;

        let title = req.title.as_deref().map(validate_title).transpose()?;
        self.ensure_category(req.category_id.flatten()).await?;

        self.repo
            .update_post(
                id,
                PostChanges {
                    title,
                    category_id: req.category_id,
                },
            )
            .await?
            .ok_or_else(|| AppError::not_found(format!("post {}", id)))
    }

    /// moderate
    ///
    /// One-way transition to moderated, recording the acting moderator. Moderating an
    /// already moderated post again is governed by `allow_remoderation`: when allowed the
    /// moderator reference is overwritten, otherwise only the same moderator may repeat
    /// it (as a no-op) and anyone else gets `Conflict`.
    pub async fn moderate(&self, actor: &AuthUser, id: i64) -> Result<Post> {
        let post = self.load(id).await?;
        policy::require(Some(actor), Action::Moderate, &Target::post(&post))?;

        let moderated = self
            .repo
            .moderate_post(id, actor.id, self.allow_remoderation)
            .await?;

        let Some(post) = moderated else {
            // Gone between the load and the update.
            if self.repo.find_post(id, PostScope::All).await?.is_none() {
                return Err(AppError::not_found(format!("post {}", id)));
            }
            return Err(AppError::Conflict(format!(
                "post {} is already moderated by another moderator",
                id
            )));
        };

        tracing::info!(post_id = id, moderator_id = actor.id, "post moderated");
        Ok(post)
    }

    /// like
    ///
    /// Increment or decrement the like counter. Decrementing at zero is a no-op.
    pub async fn like(&self, actor: &AuthUser, id: i64, direction: LikeDirection) -> Result<LikeResponse> {
        let post = self
            .repo
            .find_post(id, detail_scope(Some(actor)))
            .await?
            .ok_or_else(|| AppError::not_found(format!("post {}", id)))?;
        policy::require(Some(actor), Action::Like, &Target::post(&post))?;

        let post = self
            .repo
            .adjust_likes(id, direction)
            .await?
            .ok_or_else(|| AppError::not_found(format!("post {}", id)))?;

        Ok(LikeResponse {
            post_id: post.id,
            like_count: post.like_count,
            is_liked: direction == LikeDirection::Like,
        })
    }

    /// delete
    ///
    /// Removes the post and, explicitly, every comment on it.
    pub async fn delete(&self, actor: &AuthUser, id: i64) -> Result<()> {
        let post = self.load(id).await?;
        policy::require(Some(actor), Action::Delete, &Target::post(&post))?;

        if !self.repo.delete_post(id).await? {
            return Err(AppError::not_found(format!("post {}", id)));
        }
        tracing::info!(post_id = id, deleted_by = actor.id, "post deleted");
        Ok(())
    }

    // --- Comments ---

    /// add_comment
    ///
    /// The parent post must be visible to the commenter.
    pub async fn add_comment(&self, actor: &AuthUser, req: CreateCommentRequest) -> Result<Comment> {
        policy::require(Some(actor), Action::Create, &Target::kind(Resource::Comment))?;

        let content = req.content.trim();
        if content.is_empty() {
            return Err(AppError::validation("content must not be empty"));
        }
        if content.chars().count() > COMMENT_MAX_LEN {
            return Err(AppError::validation(format!(
                "content must be at most {} characters",
                COMMENT_MAX_LEN
            )));
        }

        let post = self.get(Some(actor), req.post_id).await?;

        self.repo
            .create_comment(NewComment {
                post_id: post.id,
                author_id: actor.id,
                content: content.to_string(),
            })
            .await
    }

    /// comments
    ///
    /// Comments on posts visible to the caller, optionally narrowed to one post.
    pub async fn comments(&self, actor: &AuthUser, post_id: Option<i64>) -> Result<Vec<Comment>> {
        policy::require(Some(actor), Action::Read, &Target::kind(Resource::Comment))?;

        if let Some(id) = post_id {
            // Surfaces a hidden or missing post as 404 rather than an empty list.
            self.get(Some(actor), id).await?;
        }
        self.repo.list_comments(post_id, detail_scope(Some(actor))).await
    }

    pub async fn comment(&self, actor: &AuthUser, id: i64) -> Result<Comment> {
        let comment = self
            .repo
            .find_comment(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("comment {}", id)))?;

        // Visible only through a visible parent.
        self.get(Some(actor), comment.post_id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) | AppError::Forbidden(_) => {
                    AppError::not_found(format!("comment {}", id))
                }
                other => other,
            })?;
        policy::require(Some(actor), Action::Read, &Target::comment(&comment))?;
        Ok(comment)
    }

    pub async fn delete_comment(&self, actor: &AuthUser, id: i64) -> Result<()> {
        let comment = self
            .repo
            .find_comment(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("comment {}", id)))?;
        policy::require(Some(actor), Action::Delete, &Target::comment(&comment))?;

        if !self.repo.delete_comment(id).await? {
            return Err(AppError::not_found(format!("comment {}", id)));
        }
        Ok(())
    }
}
