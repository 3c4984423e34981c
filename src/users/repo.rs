use std::collections::{HashMap, HashSet};

use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo::User;

const USER_COLUMNS: &str = "id, email, username, first_name, last_name, password_hash, created_at";

pub async fn list(db: &PgPool, limit: i64, offset: i64) -> sqlx::Result<Vec<User>> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}

pub async fn by_ids(db: &PgPool, ids: &[Uuid]) -> sqlx::Result<Vec<User>> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
    ))
    .bind(ids)
    .fetch_all(db)
    .await
}

/// Which of `author_ids` the viewer is subscribed to.
pub async fn subscribed_author_ids(
    db: &PgPool,
    viewer: Uuid,
    author_ids: &[Uuid],
) -> sqlx::Result<HashSet<Uuid>> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT author_id FROM subscriptions WHERE user_id = $1 AND author_id = ANY($2)",
    )
    .bind(viewer)
    .bind(author_ids)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn is_subscribed(db: &PgPool, viewer: Uuid, author_id: Uuid) -> sqlx::Result<bool> {
    let row: Option<(i32,)> =
        sqlx::query_as("SELECT 1 FROM subscriptions WHERE user_id = $1 AND author_id = $2")
            .bind(viewer)
            .bind(author_id)
            .fetch_optional(db)
            .await?;
    Ok(row.is_some())
}

/// Authors the user follows, newest subscription first.
pub async fn subscriptions_page(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<User>> {
    sqlx::query_as::<_, User>(
        "SELECT u.id, u.email, u.username, u.first_name, u.last_name,
                u.password_hash, u.created_at
         FROM subscriptions s
         JOIN users u ON u.id = s.author_id
         WHERE s.user_id = $1
         ORDER BY s.created_at DESC
         LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}

pub async fn recipe_counts(db: &PgPool, author_ids: &[Uuid]) -> sqlx::Result<HashMap<Uuid, i64>> {
    let rows: Vec<(Uuid, i64)> = sqlx::query_as(
        "SELECT author_id, COUNT(*) FROM recipes WHERE author_id = ANY($1) GROUP BY author_id",
    )
    .bind(author_ids)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().collect())
}
