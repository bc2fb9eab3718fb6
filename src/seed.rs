use crate::{
    config::AppConfig,
    error::Result,
    models::{NewActor, Role},
    password::SecretHasher,
    repository::Repository,
};

/// SeedReport
///
/// What a seed run changed. Running the seed twice yields `admin_created == false` the
/// second time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedReport {
    pub admin_created: bool,
}

/// run
///
/// Explicit, idempotent start-up bootstrap. Called once from `main` after migrations,
/// never as a side effect of a migration.
///
/// Guarantees the configured administrator exists. An existing actor holding the
/// handle is left alone, whatever its role.
pub async fn run(
    repo: &dyn Repository,
    hasher: &dyn SecretHasher,
    config: &AppConfig,
) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    let Some(admin) = &config.bootstrap_admin else {
        tracing::debug!("no bootstrap administrator configured");
        return Ok(report);
    };

    if let Some(existing) = repo.find_actor_by_handle(&admin.username).await? {
        if existing.role != Role::Administrator {
            tracing::warn!(
                handle = %admin.username,
                role = %existing.role,
                "bootstrap handle is held by a non-administrator; skipping"
            );
        }
        return Ok(report);
    }

    let created = repo
        .create_actor(NewActor {
            name: admin.name.clone(),
            handle: admin.username.clone(),
            password_hash: hasher.hash(&admin.password)?,
            role: Role::Administrator,
            is_active: true,
        })
        .await?;

    tracing::info!(actor_id = created.id, handle = %created.handle, "bootstrap administrator created");
    report.admin_created = true;
    Ok(report)
}
