use uuid::Uuid;

use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;

pub(crate) async fn ensure_superuser(state: &AppState) -> anyhow::Result<()> {
    let username = state.settings().admin().first_superuser_username.clone();
    let password = state.settings().admin().first_superuser_password.clone();

    if password.is_empty() {
        tracing::warn!("FIRST_SUPERUSER_PASSWORD not set; skipping superuser bootstrap");
        return Ok(());
    }

    if repositories::users::find_by_username(state.db(), &username).await?.is_some() {
        return Ok(());
    }

    let hashed_password = security::hash_password(&password)
        .map_err(|err| anyhow::anyhow!("failed to hash superuser password: {err}"))?;
    let now = primitive_now_utc();

    repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            username: &username,
            hashed_password: &hashed_password,
            full_name: "Platform Admin",
            role: UserRole::Admin,
            is_active: true,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;

    tracing::info!(username = %username, "Created default superuser");
    Ok(())
}
