use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::{Category, CategoryRequest, TITLE_MAX_LEN},
    policy::{self, Action, Resource, Target},
    repository::RepositoryState,
};

/// CategoryService
///
/// Readable by every authenticated actor, writable by elevated ones.
#[derive(Clone)]
pub struct CategoryService {
    repo: RepositoryState,
}

// Categories may be untitled; a blank title is stored as NULL.
fn normalize_title(title: Option<String>) -> Result<Option<String>> {
    let Some(title) = title else {
        return Ok(None);
    };
    let title = title.trim();
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(AppError::validation(format!(
            "title must be at most {} characters",
            TITLE_MAX_LEN
        )));
    }
    Ok((!title.is_empty()).then(|| title.to_string()))
}

impl CategoryService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    pub async fn create(&self, actor: &AuthUser, req: CategoryRequest) -> Result<Category> {
        policy::require(Some(actor), Action::Create, &Target::kind(Resource::Category))?;
        let category = self.repo.create_category(normalize_title(req.title)?).await?;
        tracing::info!(category_id = category.id, created_by = actor.id, "category created");
        Ok(category)
    }

    pub async fn list(&self, actor: &AuthUser) -> Result<Vec<Category>> {
        policy::require(Some(actor), Action::Read, &Target::kind(Resource::Category))?;
        self.repo.list_categories().await
    }

    pub async fn get(&self, actor: &AuthUser, id: i64) -> Result<Category> {
        policy::require(Some(actor), Action::Read, &Target::kind(Resource::Category))?;
        self.repo
            .find_category(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("category {}", id)))
    }

    pub async fn update(&self, actor: &AuthUser, id: i64, req: CategoryRequest) -> Result<Category> {
        policy::require(Some(actor), Action::Update, &Target::kind(Resource::Category))?;
        self.repo
            .update_category(id, normalize_title(req.title)?)
            .await?
            .ok_or_else(|| AppError::not_found(format!("category {}", id)))
    }

    /// delete
    ///
    /// Posts in the category survive, uncategorized.
    pub async fn delete(&self, actor: &AuthUser, id: i64) -> Result<()> {
        policy::require(Some(actor), Action::Delete, &Target::kind(Resource::Category))?;
        if !self.repo.delete_category(id).await? {
            return Err(AppError::not_found(format!("category {}", id)));
        }
        tracing::info!(category_id = id, deleted_by = actor.id, "category deleted");
        Ok(())
    }
}
