//! Membership registry between users and recipes/authors: favorites, cart
//! entries and subscriptions. All three share the same shape: insert and let
//! the unique constraint decide the winner, delete and report what was gone.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;

pub async fn add_favorite(db: &PgPool, user_id: Uuid, recipe_id: Uuid) -> Result<(), ApiError> {
    sqlx::query("INSERT INTO favorites (user_id, recipe_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(recipe_id)
        .execute(db)
        .await
        .map_err(|e| ApiError::conflict_on_unique(e, "Recipe is already in favorites"))?;
    Ok(())
}

pub async fn remove_favorite(db: &PgPool, user_id: Uuid, recipe_id: Uuid) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(recipe_id)
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Recipe is not in favorites"));
    }
    Ok(())
}

pub async fn add_cart_entry(db: &PgPool, user_id: Uuid, recipe_id: Uuid) -> Result<(), ApiError> {
    sqlx::query("INSERT INTO shopping_cart (user_id, recipe_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(recipe_id)
        .execute(db)
        .await
        .map_err(|e| ApiError::conflict_on_unique(e, "Recipe is already in the shopping cart"))?;
    Ok(())
}

pub async fn remove_cart_entry(db: &PgPool, user_id: Uuid, recipe_id: Uuid) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM shopping_cart WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(recipe_id)
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Recipe is not in the shopping cart"));
    }
    Ok(())
}

pub async fn subscribe(db: &PgPool, user_id: Uuid, author_id: Uuid) -> Result<(), ApiError> {
    if user_id == author_id {
        return Err(ApiError::validation("Cannot subscribe to yourself"));
    }
    sqlx::query("INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(author_id)
        .execute(db)
        .await
        .map_err(|e| ApiError::conflict_on_unique(e, "Already subscribed to this author"))?;
    Ok(())
}

pub async fn unsubscribe(db: &PgPool, user_id: Uuid, author_id: Uuid) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Subscription does not exist"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    #[tokio::test]
    async fn self_subscription_is_rejected_before_touching_the_store() {
        // Lazy pool: the query would fail if the check ever reached it.
        let state = AppState::fake();
        let user = Uuid::new_v4();
        let err = subscribe(&state.db, user, user).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
