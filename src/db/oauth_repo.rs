/// Social sign-in identities: `(provider, subject)` pairs mapped to local
/// accounts. First sign-in provisions the user and its profile.
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::User;
use crate::security::password::UNUSABLE_PASSWORD;

const USER_COLUMNS: &str =
    "id, username, email, first_name, password_hash, is_active, created_at, updated_at";

pub async fn find_user_by_identity(
    pool: &PgPool,
    provider: &str,
    subject: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.username, u.email, u.first_name, u.password_hash,
               u.is_active, u.created_at, u.updated_at
        FROM oauth_identities oi
        JOIN users u ON u.id = oi.user_id
        WHERE oi.provider = $1 AND oi.subject = $2
        "#,
    )
    .bind(provider)
    .bind(subject)
    .fetch_optional(pool)
    .await
}

/// Provision a local account for a first-time social sign-in: user row with
/// an unusable password, blank profile, and the identity link, all in one
/// transaction.
pub async fn create_user_for_identity(
    pool: &PgPool,
    provider: &str,
    subject: &str,
    username: &str,
    email: &str,
    first_name: &str,
) -> Result<User, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let id = Uuid::new_v4();
    let now = Utc::now();

    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (id, username, email, first_name, password_hash, is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, TRUE, $6, $6)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(username)
    .bind(email.to_lowercase())
    .bind(first_name)
    .bind(UNUSABLE_PASSWORD)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO profiles (user_id, created_at) VALUES ($1, $2)")
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    sqlx::query("INSERT INTO oauth_identities (provider, subject, user_id) VALUES ($1, $2, $3)")
        .bind(provider)
        .bind(subject)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(user)
}
