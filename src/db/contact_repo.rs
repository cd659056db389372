/// Follow-edge repository. Both directions of the toggle are idempotent:
/// repeated follows converge on one edge, repeated unfollows on none.
use sqlx::PgPool;
use uuid::Uuid;

/// Get-or-create semantics; returns true when a new edge was inserted.
pub async fn follow(pool: &PgPool, follower_id: Uuid, followed_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO contacts (follower_id, followed_id)
        VALUES ($1, $2)
        ON CONFLICT (follower_id, followed_id) DO NOTHING
        "#,
    )
    .bind(follower_id)
    .bind(followed_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Returns true when an edge was actually removed.
pub async fn unfollow(
    pool: &PgPool,
    follower_id: Uuid,
    followed_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM contacts WHERE follower_id = $1 AND followed_id = $2")
        .bind(follower_id)
        .bind(followed_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn follower_count(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM contacts WHERE followed_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
}

pub async fn following_count(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM contacts WHERE follower_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
}
