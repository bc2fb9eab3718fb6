use crate::{
    error::{AppError, Result},
    models::{
        Actor, ActorChanges, Category, Comment, LikeDirection, NewActor, NewComment, NewPost,
        Post, PostChanges, PostFilter, Role,
    },
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::Mutex;

/// PostScope
///
/// The row-level visibility a post query runs under. Callers pick the scope from the
/// actor's role; the repository only applies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostScope {
    /// Every post (administrators, moderators).
    All,
    /// Posts approved for public visibility.
    Moderated,
    /// The moderation queue.
    Unmoderated,
    /// Posts owned by one author.
    OwnedBy(i64),
    /// Public posts plus the author's own unmoderated ones.
    ModeratedOrOwnedBy(i64),
}

impl PostScope {
    /// admits
    ///
    /// In-process evaluation of the same predicate the SQL implementation pushes down.
    pub fn admits(&self, post: &Post) -> bool {
        match *self {
            PostScope::All => true,
            PostScope::Moderated => post.moderated,
            PostScope::Unmoderated => !post.moderated,
            PostScope::OwnedBy(author_id) => post.author_id == author_id,
            PostScope::ModeratedOrOwnedBy(author_id) => {
                post.moderated || post.author_id == author_id
            }
        }
    }
}

/// Repository Trait
///
/// The abstract contract for all persistence operations, so services and handlers never
/// know whether Postgres or the in-memory store sits behind them.
///
/// Every mutation that must be atomic (likes, moderation, cascades) is a single
/// method here, so implementations can make it one statement or one transaction.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Actors (Credential Store) ---
    /// Fails with `Validation` when the handle is already taken.
    async fn create_actor(&self, actor: NewActor) -> Result<Actor>;
    async fn find_actor(&self, id: i64) -> Result<Option<Actor>>;
    async fn find_actor_by_handle(&self, handle: &str) -> Result<Option<Actor>>;
    async fn list_actors(&self, role: Role) -> Result<Vec<Actor>>;
    async fn update_actor(&self, id: i64, changes: ActorChanges) -> Result<Option<Actor>>;

    // --- Categories ---
    async fn create_category(&self, title: Option<String>) -> Result<Category>;
    async fn find_category(&self, id: i64) -> Result<Option<Category>>;
    async fn list_categories(&self) -> Result<Vec<Category>>;
    async fn update_category(&self, id: i64, title: Option<String>) -> Result<Option<Category>>;
    /// Detaches the category's posts and deletes it, in one transaction.
    async fn delete_category(&self, id: i64) -> Result<bool>;

    // --- Posts ---
    async fn create_post(&self, post: NewPost) -> Result<Post>;
    async fn find_post(&self, id: i64, scope: PostScope) -> Result<Option<Post>>;
    async fn list_posts(&self, scope: PostScope, filter: &PostFilter) -> Result<Vec<Post>>;
    async fn update_post(&self, id: i64, changes: PostChanges) -> Result<Option<Post>>;
    /// Sets `moderated = true` and the moderator reference atomically. When `overwrite`
    /// is false, a post already moderated by someone else is left untouched and `None`
    /// is returned.
    async fn moderate_post(&self, id: i64, moderator_id: i64, overwrite: bool)
    -> Result<Option<Post>>;
    /// Atomic increment, or decrement floored at zero.
    async fn adjust_likes(&self, id: i64, direction: LikeDirection) -> Result<Option<Post>>;
    /// Deletes the post's comments, then the post, in one transaction.
    async fn delete_post(&self, id: i64) -> Result<bool>;

    // --- Comments ---
    async fn create_comment(&self, comment: NewComment) -> Result<Comment>;
    async fn find_comment(&self, id: i64) -> Result<Option<Comment>>;
    /// Comments whose parent post is admitted by `scope`, optionally for one post.
    async fn list_comments(&self, post_id: Option<i64>, scope: PostScope) -> Result<Vec<Comment>>;
    async fn delete_comment(&self, id: i64) -> Result<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const ACTOR_COLUMNS: &str = "id, name, handle, password_hash, role, is_active";
const POST_COLUMNS: &str =
    "p.id, p.title, p.category_id, p.author_id, p.moderated, p.moderator_id, p.like_count, p.created_at";
const COMMENT_COLUMNS: &str = "c.id, c.post_id, c.author_id, c.content, c.created_at";

/// PostgresRepository
///
/// The concrete implementation backed by PostgreSQL. Queries are checked at runtime and
/// every value is bound, never interpolated.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations under `./migrations`.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// push_scope
///
/// Appends the visibility predicate for the `posts p` alias.
fn push_scope(builder: &mut QueryBuilder<'_, sqlx::Postgres>, scope: PostScope) {
    match scope {
        PostScope::All => {}
        PostScope::Moderated => {
            builder.push(" AND p.moderated = TRUE");
        }
        PostScope::Unmoderated => {
            builder.push(" AND p.moderated = FALSE");
        }
        PostScope::OwnedBy(author_id) => {
            builder.push(" AND p.author_id = ");
            builder.push_bind(author_id);
        }
        PostScope::ModeratedOrOwnedBy(author_id) => {
            builder.push(" AND (p.moderated = TRUE OR p.author_id = ");
            builder.push_bind(author_id);
            builder.push(")");
        }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// create_actor
    ///
    /// A unique violation on `handle` becomes a validation error rather than a 500.
    async fn create_actor(&self, actor: NewActor) -> Result<Actor> {
        let sql = format!(
            "INSERT INTO actors (name, handle, password_hash, role, is_active) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ACTOR_COLUMNS}"
        );
        sqlx::query_as::<_, Actor>(&sql)
            .bind(&actor.name)
            .bind(&actor.handle)
            .bind(&actor.password_hash)
            .bind(actor.role.as_str())
            .bind(actor.is_active)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db) = &e {
                    if db.is_unique_violation() {
                        return AppError::validation("handle already used");
                    }
                }
                tracing::error!("create_actor error: {:?}", e);
                AppError::from(e)
            })
    }

    async fn find_actor(&self, id: i64) -> Result<Option<Actor>> {
        let sql = format!("SELECT {ACTOR_COLUMNS} FROM actors WHERE id = $1");
        Ok(sqlx::query_as::<_, Actor>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_actor_by_handle(&self, handle: &str) -> Result<Option<Actor>> {
        let sql = format!("SELECT {ACTOR_COLUMNS} FROM actors WHERE handle = $1");
        Ok(sqlx::query_as::<_, Actor>(&sql)
            .bind(handle)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_actors(&self, role: Role) -> Result<Vec<Actor>> {
        let sql = format!("SELECT {ACTOR_COLUMNS} FROM actors WHERE role = $1 ORDER BY id");
        Ok(sqlx::query_as::<_, Actor>(&sql)
            .bind(role.as_str())
            .fetch_all(&self.pool)
            .await?)
    }

    /// update_actor
    ///
    /// COALESCE keeps every column whose change is `None`. The role column is never
    /// part of an update.
    async fn update_actor(&self, id: i64, changes: ActorChanges) -> Result<Option<Actor>> {
        let sql = format!(
            "UPDATE actors \
             SET name = COALESCE($2, name), \
                 password_hash = COALESCE($3, password_hash), \
                 is_active = COALESCE($4, is_active) \
             WHERE id = $1 RETURNING {ACTOR_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Actor>(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.password_hash)
            .bind(changes.is_active)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_category(&self, title: Option<String>) -> Result<Category> {
        Ok(sqlx::query_as::<_, Category>(
            "INSERT INTO categories (title) VALUES ($1) RETURNING id, title",
        )
        .bind(title)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_category(&self, id: i64) -> Result<Option<Category>> {
        Ok(
            sqlx::query_as::<_, Category>("SELECT id, title FROM categories WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(
            sqlx::query_as::<_, Category>("SELECT id, title FROM categories ORDER BY id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn update_category(&self, id: i64, title: Option<String>) -> Result<Option<Category>> {
        Ok(sqlx::query_as::<_, Category>(
            "UPDATE categories SET title = $2 WHERE id = $1 RETURNING id, title",
        )
        .bind(id)
        .bind(title)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_category(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE posts SET category_id = NULL WHERE category_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }

    /// create_post
    ///
    /// New posts always start unmoderated with zero likes; the column defaults do it.
    async fn create_post(&self, post: NewPost) -> Result<Post> {
        let sql = format!(
            "INSERT INTO posts AS p (title, category_id, author_id) \
             VALUES ($1, $2, $3) RETURNING {POST_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Post>(&sql)
            .bind(&post.title)
            .bind(post.category_id)
            .bind(post.author_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn find_post(&self, id: i64, scope: PostScope) -> Result<Option<Post>> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = "));
        builder.push_bind(id);
        push_scope(&mut builder, scope);

        Ok(builder
            .build_query_as::<Post>()
            .fetch_optional(&self.pool)
            .await?)
    }

    /// list_posts
    ///
    /// Visibility scope first, then the caller's filters, newest first.
    async fn list_posts(&self, scope: PostScope, filter: &PostFilter) -> Result<Vec<Post>> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts p WHERE TRUE"));
        push_scope(&mut builder, scope);

        if let Some(category) = filter.category {
            builder.push(" AND p.category_id = ");
            builder.push_bind(category);
        }

        builder.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ");
        builder.push_bind(filter.limit());
        builder.push(" OFFSET ");
        builder.push_bind(filter.offset());

        builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("list_posts error: {:?}", e);
                AppError::from(e)
            })
    }

    async fn update_post(&self, id: i64, changes: PostChanges) -> Result<Option<Post>> {
        let sql = format!(
            "UPDATE posts AS p \
             SET title = COALESCE($2, p.title), \
                 category_id = CASE WHEN $3 THEN $4 ELSE p.category_id END \
             WHERE p.id = $1 RETURNING {POST_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .bind(changes.title)
            .bind(changes.category_id.is_some())
            .bind(changes.category_id.flatten())
            .fetch_optional(&self.pool)
            .await?)
    }

    /// moderate_post
    ///
    /// The re-moderation guard is part of the UPDATE's WHERE clause, so two moderators
    /// racing on the same post cannot both win when overwriting is disabled.
    async fn moderate_post(
        &self,
        id: i64,
        moderator_id: i64,
        overwrite: bool,
    ) -> Result<Option<Post>> {
        let sql = format!(
            "UPDATE posts AS p \
             SET moderated = TRUE, moderator_id = $2 \
             WHERE p.id = $1 AND ($3 OR p.moderated = FALSE OR p.moderator_id = $2) \
             RETURNING {POST_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .bind(moderator_id)
            .bind(overwrite)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// adjust_likes
    ///
    /// A single UPDATE per call: concurrent likes never lose an increment, and
    /// GREATEST keeps the counter from going negative.
    async fn adjust_likes(&self, id: i64, direction: LikeDirection) -> Result<Option<Post>> {
        let assignment = match direction {
            LikeDirection::Like => "like_count = p.like_count + 1",
            LikeDirection::Dislike => "like_count = GREATEST(p.like_count - 1, 0)",
        };
        let sql = format!(
            "UPDATE posts AS p SET {assignment} WHERE p.id = $1 RETURNING {POST_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// delete_post
    ///
    /// Explicit cascade: comments first, then the post, inside one transaction.
    async fn delete_post(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let comments = sqlx::query("DELETE FROM comments WHERE post_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let deleted = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        tracing::debug!(post_id = id, comments, "post deleted");
        Ok(deleted > 0)
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment> {
        let sql = format!(
            "INSERT INTO comments AS c (post_id, author_id, content) \
             VALUES ($1, $2, $3) RETURNING {COMMENT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Comment>(&sql)
            .bind(comment.post_id)
            .bind(comment.author_id)
            .bind(&comment.content)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn find_comment(&self, id: i64) -> Result<Option<Comment>> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments c WHERE c.id = $1");
        Ok(sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// list_comments
    ///
    /// Joins the parent post so the post visibility scope also hides its comments.
    async fn list_comments(&self, post_id: Option<i64>, scope: PostScope) -> Result<Vec<Comment>> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(format!(
            "SELECT {COMMENT_COLUMNS} FROM comments c JOIN posts p ON p.id = c.post_id WHERE TRUE"
        ));
        if let Some(post_id) = post_id {
            builder.push(" AND c.post_id = ");
            builder.push_bind(post_id);
        }
        push_scope(&mut builder, scope);
        builder.push(" ORDER BY c.created_at ASC, c.id ASC");

        Ok(builder
            .build_query_as::<Comment>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn delete_comment(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// --- In-Memory Implementation ---

#[derive(Default)]
struct Tables {
    next_id: i64,
    actors: BTreeMap<i64, Actor>,
    categories: BTreeMap<i64, Category>,
    posts: BTreeMap<i64, Post>,
    comments: BTreeMap<i64, Comment>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// MemoryRepository
///
/// A `Repository` held entirely in process, used by the test suites and for running the
/// API without a database. One async mutex guards all tables, so every method is
/// atomic with respect to every other.
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_actor(&self, actor: NewActor) -> Result<Actor> {
        let mut tables = self.tables.lock().await;
        if tables.actors.values().any(|a| a.handle == actor.handle) {
            return Err(AppError::validation("handle already used"));
        }
        let id = tables.next_id();
        let row = Actor {
            id,
            name: actor.name,
            handle: actor.handle,
            password_hash: actor.password_hash,
            role: actor.role,
            is_active: actor.is_active,
        };
        tables.actors.insert(id, row.clone());
        Ok(row)
    }

    async fn find_actor(&self, id: i64) -> Result<Option<Actor>> {
        Ok(self.tables.lock().await.actors.get(&id).cloned())
    }

    async fn find_actor_by_handle(&self, handle: &str) -> Result<Option<Actor>> {
        let tables = self.tables.lock().await;
        Ok(tables.actors.values().find(|a| a.handle == handle).cloned())
    }

    async fn list_actors(&self, role: Role) -> Result<Vec<Actor>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .actors
            .values()
            .filter(|a| a.role == role)
            .cloned()
            .collect())
    }

    async fn update_actor(&self, id: i64, changes: ActorChanges) -> Result<Option<Actor>> {
        let mut tables = self.tables.lock().await;
        let Some(actor) = tables.actors.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            actor.name = name;
        }
        if let Some(hash) = changes.password_hash {
            actor.password_hash = hash;
        }
        if let Some(active) = changes.is_active {
            actor.is_active = active;
        }
        Ok(Some(actor.clone()))
    }

    async fn create_category(&self, title: Option<String>) -> Result<Category> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        let category = Category { id, title };
        tables.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn find_category(&self, id: i64) -> Result<Option<Category>> {
        Ok(self.tables.lock().await.categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.tables.lock().await.categories.values().cloned().collect())
    }

    async fn update_category(&self, id: i64, title: Option<String>) -> Result<Option<Category>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.categories.get_mut(&id).map(|category| {
            category.title = title;
            category.clone()
        }))
    }

    async fn delete_category(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        for post in tables.posts.values_mut() {
            if post.category_id == Some(id) {
                post.category_id = None;
            }
        }
        Ok(tables.categories.remove(&id).is_some())
    }

    async fn create_post(&self, post: NewPost) -> Result<Post> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        let row = Post {
            id,
            title: post.title,
            category_id: post.category_id,
            author_id: post.author_id,
            moderated: false,
            moderator_id: None,
            like_count: 0,
            created_at: Utc::now(),
        };
        tables.posts.insert(id, row.clone());
        Ok(row)
    }

    async fn find_post(&self, id: i64, scope: PostScope) -> Result<Option<Post>> {
        let tables = self.tables.lock().await;
        Ok(tables.posts.get(&id).filter(|p| scope.admits(p)).cloned())
    }

    async fn list_posts(&self, scope: PostScope, filter: &PostFilter) -> Result<Vec<Post>> {
        let tables = self.tables.lock().await;
        let mut posts: Vec<Post> = tables
            .posts
            .values()
            .filter(|p| scope.admits(p))
            .filter(|p| filter.category.is_none_or(|c| p.category_id == Some(c)))
            .cloned()
            .collect();
        posts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        Ok(posts
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit() as usize)
            .collect())
    }

    async fn update_post(&self, id: i64, changes: PostChanges) -> Result<Option<Post>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.posts.get_mut(&id).map(|post| {
            if let Some(title) = changes.title {
                post.title = title;
            }
            if let Some(category_id) = changes.category_id {
                post.category_id = category_id;
            }
            post.clone()
        }))
    }

    async fn moderate_post(
        &self,
        id: i64,
        moderator_id: i64,
        overwrite: bool,
    ) -> Result<Option<Post>> {
        let mut tables = self.tables.lock().await;
        let Some(post) = tables.posts.get_mut(&id) else {
            return Ok(None);
        };
        if !overwrite && post.moderated && post.moderator_id != Some(moderator_id) {
            return Ok(None);
        }
        post.moderated = true;
        post.moderator_id = Some(moderator_id);
        Ok(Some(post.clone()))
    }

    async fn adjust_likes(&self, id: i64, direction: LikeDirection) -> Result<Option<Post>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.posts.get_mut(&id).map(|post| {
            post.like_count = match direction {
                LikeDirection::Like => post.like_count + 1,
                LikeDirection::Dislike => (post.like_count - 1).max(0),
            };
            post.clone()
        }))
    }

    async fn delete_post(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        tables.comments.retain(|_, c| c.post_id != id);
        Ok(tables.posts.remove(&id).is_some())
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        let row = Comment {
            id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            content: comment.content,
            created_at: Utc::now(),
        };
        tables.comments.insert(id, row.clone());
        Ok(row)
    }

    async fn find_comment(&self, id: i64) -> Result<Option<Comment>> {
        Ok(self.tables.lock().await.comments.get(&id).cloned())
    }

    async fn list_comments(&self, post_id: Option<i64>, scope: PostScope) -> Result<Vec<Comment>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .comments
            .values()
            .filter(|c| post_id.is_none_or(|id| c.post_id == id))
            .filter(|c| tables.posts.get(&c.post_id).is_some_and(|p| scope.admits(p)))
            .cloned()
            .collect())
    }

    async fn delete_comment(&self, id: i64) -> Result<bool> {
        Ok(self.tables.lock().await.comments.remove(&id).is_some())
    }
}
