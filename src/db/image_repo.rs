/// Image repository: bookmarked images and their liker sets.
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Image;

const IMAGE_COLUMNS: &str = "id, user_id, title, slug, url, image_path, description, created_at";

pub struct NewImage<'a> {
    pub user_id: Uuid,
    pub title: &'a str,
    pub slug: &'a str,
    pub url: &'a str,
    pub image_path: &'a str,
    pub description: &'a str,
}

pub async fn insert(pool: &PgPool, new: NewImage<'_>) -> Result<Image, sqlx::Error> {
    sqlx::query_as::<_, Image>(&format!(
        r#"
        INSERT INTO images (id, user_id, title, slug, url, image_path, description)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {IMAGE_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(new.user_id)
    .bind(new.title)
    .bind(new.slug)
    .bind(new.url)
    .bind(new.image_path)
    .bind(new.description)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Image>, sqlx::Error> {
    sqlx::query_as::<_, Image>(&format!("SELECT {IMAGE_COLUMNS} FROM images WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM images")
        .fetch_one(pool)
        .await
}

/// One page of the listing, newest first.
pub async fn page(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Image>, sqlx::Error> {
    sqlx::query_as::<_, Image>(&format!(
        r#"
        SELECT {IMAGE_COLUMNS}
        FROM images
        ORDER BY created_at DESC
        LIMIT $1 OFFSET $2
        "#
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Idempotent set-insert; returns true when the membership was new.
pub async fn like(pool: &PgPool, user_id: Uuid, image_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO image_likes (user_id, image_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, image_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(image_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Idempotent removal from the liker set.
pub async fn unlike(pool: &PgPool, user_id: Uuid, image_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM image_likes WHERE user_id = $1 AND image_id = $2")
        .bind(user_id)
        .bind(image_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn like_count(pool: &PgPool, image_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM image_likes WHERE image_id = $1")
        .bind(image_id)
        .fetch_one(pool)
        .await
}

pub async fn user_likes(pool: &PgPool, user_id: Uuid, image_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM image_likes WHERE user_id = $1 AND image_id = $2)",
    )
    .bind(user_id)
    .bind(image_id)
    .fetch_one(pool)
    .await
}

/// Usernames of likers, newest like first (shown on the detail page).
pub async fn liker_usernames(
    pool: &PgPool,
    image_id: Uuid,
    limit: i64,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT u.username
        FROM image_likes il
        JOIN users u ON u.id = il.user_id
        WHERE il.image_id = $1
        ORDER BY il.created_at DESC
        LIMIT $2
        "#,
    )
    .bind(image_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}
