use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{
        repo::User,
        services::{AuthUser, MaybeAuthUser},
    },
    error::ApiError,
    pagination::Pagination,
    recipes,
    relations,
    state::AppState,
    users::dto::{RecipesLimitQuery, SubscriptionItem, SubscriptionsQuery, UserProfile},
    users::repo,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/me", get(me))
        .route("/users/subscriptions", get(subscriptions))
        .route("/users/:id", get(get_user))
        .route("/users/:id/subscribe", post(subscribe).delete(unsubscribe))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let users = repo::list(&state.db, p.limit, p.offset).await?;

    let subscribed = match viewer {
        Some(viewer) => {
            let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
            repo::subscribed_author_ids(&state.db, viewer, &ids).await?
        }
        None => Default::default(),
    };

    let profiles = users
        .into_iter()
        .map(|u| {
            let is_subscribed = subscribed.contains(&u.id);
            UserProfile::from_user(u, is_subscribed)
        })
        .collect();
    Ok(Json(profiles))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserProfile>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::Unauthenticated)?;
    Ok(Json(UserProfile::from_user(user, false)))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let is_subscribed = match viewer {
        Some(viewer) => repo::is_subscribed(&state.db, viewer, id).await?,
        None => false,
    };
    Ok(Json(UserProfile::from_user(user, is_subscribed)))
}

#[instrument(skip(state))]
pub async fn subscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(author_id): Path<Uuid>,
    Query(q): Query<RecipesLimitQuery>,
) -> Result<(StatusCode, Json<SubscriptionItem>), ApiError> {
    let author = User::find_by_id(&state.db, author_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    relations::subscribe(&state.db, user_id, author_id).await?;
    info!(user_id = %user_id, author_id = %author_id, "subscribed");

    let item = subscription_items(&state, vec![author], q.recipes_limit)
        .await?
        .pop()
        .expect("one author in, one item out");
    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(state))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(author_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    relations::unsubscribe(&state.db, user_id, author_id).await?;
    info!(user_id = %user_id, author_id = %author_id, "unsubscribed");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn subscriptions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<SubscriptionsQuery>,
) -> Result<Json<Vec<SubscriptionItem>>, ApiError> {
    let authors = repo::subscriptions_page(&state.db, user_id, q.limit, q.offset).await?;
    let items = subscription_items(&state, authors, q.recipes_limit).await?;
    Ok(Json(items))
}

/// Enriches followed authors with their recipe count and a newest-first
/// preview, capped by `recipes_limit` when given.
async fn subscription_items(
    state: &AppState,
    authors: Vec<User>,
    recipes_limit: Option<usize>,
) -> Result<Vec<SubscriptionItem>, ApiError> {
    let ids: Vec<Uuid> = authors.iter().map(|u| u.id).collect();
    let counts = repo::recipe_counts(&state.db, &ids).await?;
    let mut previews = recipes::repo::shorts_by_authors(&state.db, &ids).await?;

    let items = authors
        .into_iter()
        .map(|author| {
            let recipes_count = counts.get(&author.id).copied().unwrap_or(0);
            let mut recipes = previews.remove(&author.id).unwrap_or_default();
            if let Some(cap) = recipes_limit {
                recipes.truncate(cap);
            }
            SubscriptionItem {
                recipes_count,
                recipes,
                // Listing one's subscriptions: everything here is subscribed.
                author: UserProfile::from_user(author, true),
            }
        })
        .collect();
    Ok(items)
}
