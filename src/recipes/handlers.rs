use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::services::{AuthUser, MaybeAuthUser},
    error::ApiError,
    relations,
    state::AppState,
};

use super::dto::{CreateRecipeRequest, RecipeFilter, RecipeRead, RecipeShort, UpdateRecipeRequest};
use super::repo::{self, Recipe};
use super::service;

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipes/:id",
            get(get_recipe).patch(update_recipe).delete(delete_recipe),
        )
        .route(
            "/recipes/:id/favorite",
            post(add_favorite).delete(remove_favorite),
        )
        .route(
            "/recipes/:id/shopping_cart",
            post(add_to_cart).delete(remove_from_cart),
        )
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<RecipeRead>>, ApiError> {
    let filter = RecipeFilter::from_pairs(&pairs)?;
    let page = repo::fetch_page(&state.db, &filter, viewer).await?;
    let projections = service::load_projections(&state.db, page, viewer).await?;
    Ok(Json(projections))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RecipeRead>, ApiError> {
    let recipe = fetch_recipe(&state, id).await?;
    let projection = service::load_projections(&state.db, vec![recipe], viewer)
        .await?
        .pop()
        .expect("one recipe in, one projection out");
    Ok(Json(projection))
}

#[instrument(skip(state, payload))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateRecipeRequest>,
) -> Result<(StatusCode, Json<RecipeRead>), ApiError> {
    let recipe = service::create_recipe(&state.db, user_id, &payload).await?;
    let projection = service::load_projections(&state.db, vec![recipe], Some(user_id))
        .await?
        .pop()
        .expect("one recipe in, one projection out");
    Ok((StatusCode::CREATED, Json(projection)))
}

#[instrument(skip(state, payload))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRecipeRequest>,
) -> Result<Json<RecipeRead>, ApiError> {
    let recipe = fetch_recipe(&state, id).await?;
    ensure_author(&recipe, user_id)?;

    let updated = service::update_recipe(&state.db, &recipe, &payload).await?;
    let projection = service::load_projections(&state.db, vec![updated], Some(user_id))
        .await?
        .pop()
        .expect("one recipe in, one projection out");
    Ok(Json(projection))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let recipe = fetch_recipe(&state, id).await?;
    ensure_author(&recipe, user_id)?;

    repo::delete(&state.db, recipe.id).await?;
    info!(recipe_id = %recipe.id, "recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn add_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<RecipeShort>), ApiError> {
    let recipe = fetch_recipe(&state, id).await?;
    relations::add_favorite(&state.db, user_id, recipe.id).await?;
    Ok((StatusCode::CREATED, Json(short(recipe))))
}

#[instrument(skip(state))]
pub async fn remove_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let recipe = fetch_recipe(&state, id).await?;
    relations::remove_favorite(&state.db, user_id, recipe.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<RecipeShort>), ApiError> {
    let recipe = fetch_recipe(&state, id).await?;
    relations::add_cart_entry(&state.db, user_id, recipe.id).await?;
    Ok((StatusCode::CREATED, Json(short(recipe))))
}

#[instrument(skip(state))]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let recipe = fetch_recipe(&state, id).await?;
    relations::remove_cart_entry(&state.db, user_id, recipe.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_recipe(state: &AppState, id: Uuid) -> Result<Recipe, ApiError> {
    repo::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Recipe not found"))
}

fn ensure_author(recipe: &Recipe, user_id: Uuid) -> Result<(), ApiError> {
    if recipe.author_id != user_id {
        return Err(ApiError::forbidden("Only the author may modify a recipe"));
    }
    Ok(())
}

fn short(recipe: Recipe) -> RecipeShort {
    RecipeShort {
        id: recipe.id,
        name: recipe.name,
        image: recipe.image,
        cooking_time: recipe.cooking_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn recipe_by(author_id: Uuid) -> Recipe {
        Recipe {
            id: Uuid::new_v4(),
            author_id,
            name: "Borscht".into(),
            text: "Simmer.".into(),
            image: None,
            cooking_time: 90,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn only_the_author_passes_the_ownership_check() {
        let author = Uuid::new_v4();
        let recipe = recipe_by(author);
        assert!(ensure_author(&recipe, author).is_ok());

        let err = ensure_author(&recipe, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
}
