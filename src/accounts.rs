use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::{
        Actor, ActorChanges, CreateActorRequest, HANDLE_MAX_LEN, NAME_MAX_LEN, NewActor,
        PASSWORD_MIN_LEN, Role, SignupRequest, UpdateActorRequest,
    },
    password::HasherState,
    policy::{self, Action, Resource, Target},
    repository::RepositoryState,
};

/// AccountService
///
/// Registration and CRUD over the credential store. Roles are fixed by the route an
/// actor is created through, and actors are deactivated instead of deleted.
#[derive(Clone)]
pub struct AccountService {
    repo: RepositoryState,
    hasher: HasherState,
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name must not be empty"));
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(AppError::validation(format!(
            "name must be at most {} characters",
            NAME_MAX_LEN
        )));
    }
    Ok(name.to_string())
}

fn validate_handle(handle: &str, role: Role) -> Result<String> {
    let handle = handle.trim();
    if handle.is_empty() {
        return Err(AppError::validation("handle must not be empty"));
    }
    if handle.chars().count() > HANDLE_MAX_LEN {
        return Err(AppError::validation(format!(
            "handle must be at most {} characters",
            HANDLE_MAX_LEN
        )));
    }
    // Authors sign in with their email address.
    if role == Role::Author && !handle.contains('@') {
        return Err(AppError::validation("Enter a valid email address"));
    }
    Ok(handle.to_string())
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {} characters",
            PASSWORD_MIN_LEN
        )));
    }
    Ok(())
}

impl AccountService {
    pub fn new(repo: RepositoryState, hasher: HasherState) -> Self {
        Self { repo, hasher }
    }

    /// Loads an actor through the identity space of `role`.
    async fn load(&self, role: Role, id: i64) -> Result<Actor> {
        self.repo
            .find_actor(id)
            .await?
            .filter(|actor| actor.role == role)
            .ok_or_else(|| AppError::not_found(format!("{} {}", role, id)))
    }

    /// The caller's own record, whatever its role.
    pub async fn me(&self, caller: &AuthUser) -> Result<Actor> {
        self.load(caller.role, caller.id).await
    }

    /// signup
    ///
    /// Public author registration.
    pub async fn signup(&self, req: SignupRequest) -> Result<Actor> {
        if req.password != req.confirm_password {
            return Err(AppError::validation("Passwords do not match"));
        }
        validate_password(&req.password)?;
        let name = validate_name(&req.name)?;
        let email = validate_handle(&req.email, Role::Author)?;

        if self.repo.find_actor_by_handle(&email).await?.is_some() {
            return Err(AppError::validation("Email is already in use"));
        }

        let actor = self
            .repo
            .create_actor(NewActor {
                name,
                handle: email,
                password_hash: self.hasher.hash(&req.password)?,
                role: Role::Author,
                is_active: true,
            })
            .await?;

        tracing::info!(actor_id = actor.id, "author signed up");
        Ok(actor)
    }

    /// create
    ///
    /// Creates an actor of `role` on behalf of an elevated caller.
    pub async fn create(&self, caller: &AuthUser, role: Role, req: CreateActorRequest) -> Result<Actor> {
        policy::require(Some(caller), Action::Create, &Target::kind(Resource::Actor))?;

        let name = validate_name(&req.name)?;
        let handle = validate_handle(&req.handle, role)?;
        validate_password(&req.password)?;

        let actor = self
            .repo
            .create_actor(NewActor {
                name,
                handle,
                password_hash: self.hasher.hash(&req.password)?,
                role,
                is_active: req.is_active.unwrap_or(true),
            })
            .await?;

        tracing::info!(actor_id = actor.id, role = %role, created_by = caller.id, "actor created");
        Ok(actor)
    }

    pub async fn list(&self, caller: &AuthUser, role: Role) -> Result<Vec<Actor>> {
        policy::require(Some(caller), Action::Read, &Target::kind(Resource::Actor))?;
        self.repo.list_actors(role).await
    }

    pub async fn get(&self, caller: &AuthUser, role: Role, id: i64) -> Result<Actor> {
        let actor = self.load(role, id).await?;
        policy::require(Some(caller), Action::Read, &Target::actor(&actor))?;
        Ok(actor)
    }

    /// update
    ///
    /// Name and credential changes. The activation flag is reserved to elevated callers;
    /// the role can never change.
    pub async fn update(
        &self,
        caller: &AuthUser,
        role: Role,
        id: i64,
        req: UpdateActorRequest,
    ) -> Result<Actor> {
        let actor = self.load(role, id).await?;
        policy::require(Some(caller), Action::Update, &Target::actor(&actor))?;

        if req.is_active.is_some() && !caller.role.is_elevated() {
            return Err(AppError::forbidden("only administrators and moderators may change activation"));
        }

        let name = req.name.as_deref().map(validate_name).transpose()?;
        let password_hash = match req.password.as_deref() {
            Some(password) => {
                validate_password(password)?;
                Some(self.hasher.hash(password)?)
            }
            None => None,
        };

        self.repo
            .update_actor(
                id,
                ActorChanges {
                    name,
                    password_hash,
                    is_active: req.is_active,
                },
            )
            .await?
            .ok_or_else(|| AppError::not_found(format!("{} {}", role, id)))
    }

    /// deactivate
    ///
    /// The DELETE of the actor resources: a soft delete that only clears `is_active`.
    pub async fn deactivate(&self, caller: &AuthUser, role: Role, id: i64) -> Result<Actor> {
        let actor = self.load(role, id).await?;
        policy::require(Some(caller), Action::Delete, &Target::actor(&actor))?;

        let actor = self
            .repo
            .update_actor(
                id,
                ActorChanges {
                    is_active: Some(false),
                    ..ActorChanges::default()
                },
            )
            .await?
            .ok_or_else(|| AppError::not_found(format!("{} {}", role, id)))?;

        tracing::info!(actor_id = id, role = %role, deactivated_by = caller.id, "actor deactivated");
        Ok(actor)
    }
}
