use uuid::Uuid;

use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;

pub(crate) async fn ensure_superuser(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_superuser_password.is_empty() {
        tracing::warn!("FIRST_SUPERUSER_PASSWORD not configured; skipping superuser creation");
        return Ok(());
    }

    let username = &admin.first_superuser_username;
    let profile = repositories::profiles::find_by_username(state.db(), username).await?;

    let now = primitive_now_utc();

    if let Some(profile) = profile {
        let mut needs_update = false;
        let verified =
            security::verify_password(&admin.first_superuser_password, &profile.hashed_password)
                .unwrap_or(false);

        let hashed_password = if verified {
            profile.hashed_password.clone()
        } else {
            needs_update = true;
            security::hash_password(&admin.first_superuser_password)?
        };

        if !profile.is_admin {
            needs_update = true;
        }

        if needs_update {
            sqlx::query(
                "UPDATE profiles
                 SET hashed_password = $1,
                     is_admin = TRUE,
                     updated_at = $2
                 WHERE id = $3",
            )
            .bind(hashed_password)
            .bind(now)
            .bind(profile.id)
            .execute(state.db())
            .await?;

            tracing::info!("Updated default superuser {username}");
        } else {
            tracing::info!("Default superuser already up to date");
        }

        return Ok(());
    }

    let hashed_password = security::hash_password(&admin.first_superuser_password)?;

    sqlx::query(
        "INSERT INTO profiles (
            id, username, email, hashed_password, is_admin, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, TRUE, $5, $5)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(username)
    .bind(&admin.first_superuser_email)
    .bind(hashed_password)
    .bind(now)
    .execute(state.db())
    .await?;

    tracing::info!("Created default superuser {username}");
    Ok(())
}
