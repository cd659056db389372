/// Profile repository. Every user owns exactly one row, created alongside
/// the account.
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Profile;

pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>(
        "SELECT user_id, date_of_birth, photo_path, created_at FROM profiles WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    user_id: Uuid,
    date_of_birth: Option<NaiveDate>,
    photo_path: Option<&str>,
) -> Result<Profile, sqlx::Error> {
    sqlx::query_as::<_, Profile>(
        r#"
        UPDATE profiles
        SET date_of_birth = $1,
            photo_path = COALESCE($2, photo_path)
        WHERE user_id = $3
        RETURNING user_id, date_of_birth, photo_path, created_at
        "#,
    )
    .bind(date_of_birth)
    .bind(photo_path)
    .bind(user_id)
    .fetch_one(pool)
    .await
}
