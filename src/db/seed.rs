use crate::config::AppConfig;
use anyhow::Result;
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use sqlx::PgPool;

const DEFAULT_FOCUS_GROUPS: [&str; 4] = ["Operations", "Sales", "IT", "Business"];

pub async fn seed_all(pool: &PgPool, config: &AppConfig) -> Result<()> {
    seed_focus_groups(pool).await?;
    seed_admin(pool, config).await?;
    Ok(())
}

async fn seed_focus_groups(pool: &PgPool) -> Result<()> {
    for name in DEFAULT_FOCUS_GROUPS {
        sqlx::query(
            r#"
            INSERT INTO focus_groups (name)
            VALUES ($1)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn seed_admin(pool: &PgPool, config: &AppConfig) -> Result<()> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        tracing::warn!("ADMIN_EMAIL/ADMIN_PASSWORD not set, skipping admin seed");
        return Ok(());
    };

    let salt = SaltString::generate(&mut rand_core::OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {}", e))?
        .to_string();

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, name, password_hash, role)
        VALUES ($1, 'Administrator', $2, 'ADMIN')
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(email)
    .bind(hash)
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        tracing::info!("Seeded admin account {}", email);
    }
    Ok(())
}
