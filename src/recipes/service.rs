use std::collections::{HashMap, HashSet};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::ApiError,
    ingredients::Ingredient,
    tags::Tag,
    users::{self, dto::UserProfile},
};

use super::dto::{
    CreateRecipeRequest, IngredientLineInput, IngredientLineView, RecipeRead, UpdateRecipeRequest,
};
use super::repo::{self, Recipe};

// Shared bounds for amounts and cooking time, enforced again by the schema.
pub const MIN_QUANTITY: i32 = 1;
pub const MAX_QUANTITY: i32 = 32000;

const NAME_MAX_LEN: usize = 200;

pub fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::validation("Recipe name must not be empty"));
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(ApiError::validation("Recipe name is too long"));
    }
    Ok(())
}

pub fn validate_cooking_time(minutes: i32) -> Result<(), ApiError> {
    if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&minutes) {
        return Err(ApiError::validation(format!(
            "Cooking time must be between {MIN_QUANTITY} and {MAX_QUANTITY} minutes"
        )));
    }
    Ok(())
}

pub fn validate_ingredient_lines(lines: &[IngredientLineInput]) -> Result<(), ApiError> {
    if lines.is_empty() {
        return Err(ApiError::validation(
            "Recipe must have at least one ingredient",
        ));
    }
    let mut seen = HashSet::new();
    for line in lines {
        if !seen.insert(line.id) {
            return Err(ApiError::validation("Duplicate ingredient in recipe"));
        }
        if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&line.amount) {
            return Err(ApiError::validation(format!(
                "Ingredient amount must be between {MIN_QUANTITY} and {MAX_QUANTITY}"
            )));
        }
    }
    Ok(())
}

pub fn validate_tag_ids(tag_ids: &[Uuid]) -> Result<(), ApiError> {
    if tag_ids.is_empty() {
        return Err(ApiError::validation("Recipe must have at least one tag"));
    }
    let mut seen = HashSet::new();
    for id in tag_ids {
        if !seen.insert(*id) {
            return Err(ApiError::validation("Duplicate tag in recipe"));
        }
    }
    Ok(())
}

/// Image references arrive as base64 data URLs; only the reference string is
/// stored.
pub fn validate_image_reference(image: &str) -> Result<(), ApiError> {
    let payload = image
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, payload)| payload)
        .ok_or_else(|| ApiError::validation("Image must be a base64 data URL"))?;
    BASE64
        .decode(payload)
        .map_err(|_| ApiError::validation("Image payload is not valid base64"))?;
    Ok(())
}

async fn ensure_ingredients_exist(db: &PgPool, lines: &[IngredientLineInput]) -> Result<(), ApiError> {
    let ids: Vec<Uuid> = lines.iter().map(|l| l.id).collect();
    if Ingredient::count_existing(db, &ids).await? != ids.len() as i64 {
        return Err(ApiError::validation("Unknown ingredient in recipe"));
    }
    Ok(())
}

async fn ensure_tags_exist(db: &PgPool, tag_ids: &[Uuid]) -> Result<(), ApiError> {
    if Tag::count_existing(db, tag_ids).await? != tag_ids.len() as i64 {
        return Err(ApiError::validation("Unknown tag in recipe"));
    }
    Ok(())
}

/// Validates the payload, then persists the recipe, its ingredient lines and
/// tag links in one transaction.
pub async fn create_recipe(
    db: &PgPool,
    author_id: Uuid,
    req: &CreateRecipeRequest,
) -> Result<Recipe, ApiError> {
    validate_name(&req.name)?;
    validate_cooking_time(req.cooking_time)?;
    validate_ingredient_lines(&req.ingredients)?;
    validate_tag_ids(&req.tags)?;
    if let Some(image) = &req.image {
        validate_image_reference(image)?;
    }
    ensure_ingredients_exist(db, &req.ingredients).await?;
    ensure_tags_exist(db, &req.tags).await?;

    let mut tx = db.begin().await?;
    let recipe = repo::insert_recipe(
        &mut tx,
        author_id,
        req.name.trim(),
        &req.text,
        req.image.as_deref(),
        req.cooking_time,
    )
    .await?;
    repo::replace_lines(&mut tx, recipe.id, &req.ingredients).await?;
    repo::replace_tags(&mut tx, recipe.id, &req.tags).await?;
    tx.commit().await?;

    info!(recipe_id = %recipe.id, author_id = %author_id, "recipe created");
    Ok(recipe)
}

/// Patches scalar fields and, when supplied, replaces the ingredient/tag sets
/// wholesale. The caller has already checked authorship.
pub async fn update_recipe(
    db: &PgPool,
    recipe: &Recipe,
    req: &UpdateRecipeRequest,
) -> Result<Recipe, ApiError> {
    if let Some(name) = &req.name {
        validate_name(name)?;
    }
    if let Some(minutes) = req.cooking_time {
        validate_cooking_time(minutes)?;
    }
    if let Some(image) = &req.image {
        validate_image_reference(image)?;
    }
    if let Some(lines) = &req.ingredients {
        validate_ingredient_lines(lines)?;
        ensure_ingredients_exist(db, lines).await?;
    }
    if let Some(tag_ids) = &req.tags {
        validate_tag_ids(tag_ids)?;
        ensure_tags_exist(db, tag_ids).await?;
    }

    let mut tx = db.begin().await?;
    let updated = repo::update_scalars(
        &mut tx,
        recipe.id,
        req.name.as_deref().map(str::trim),
        req.text.as_deref(),
        req.image.as_deref(),
        req.cooking_time,
    )
    .await?;
    if let Some(lines) = &req.ingredients {
        repo::replace_lines(&mut tx, recipe.id, lines).await?;
    }
    if let Some(tag_ids) = &req.tags {
        repo::replace_tags(&mut tx, recipe.id, tag_ids).await?;
    }
    tx.commit().await?;

    info!(recipe_id = %recipe.id, "recipe updated");
    Ok(updated)
}

/// Assembles full read projections for a page of recipes: authors, tags,
/// ingredient lines and the viewer-relative flags, all batch-loaded.
pub async fn load_projections(
    db: &PgPool,
    recipes: Vec<Recipe>,
    viewer: Option<Uuid>,
) -> Result<Vec<RecipeRead>, ApiError> {
    if recipes.is_empty() {
        return Ok(Vec::new());
    }

    let recipe_ids: Vec<Uuid> = recipes.iter().map(|r| r.id).collect();
    let author_ids: Vec<Uuid> = {
        let mut ids: Vec<Uuid> = recipes.iter().map(|r| r.author_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    };

    let authors: HashMap<Uuid, _> = users::repo::by_ids(db, &author_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let subscribed = match viewer {
        Some(viewer) => users::repo::subscribed_author_ids(db, viewer, &author_ids).await?,
        None => Default::default(),
    };
    let (favorited, in_cart) = match viewer {
        Some(viewer) => (
            repo::favorited_ids(db, viewer, &recipe_ids).await?,
            repo::in_cart_ids(db, viewer, &recipe_ids).await?,
        ),
        None => Default::default(),
    };

    let mut lines_by_recipe: HashMap<Uuid, Vec<IngredientLineView>> = HashMap::new();
    for line in repo::lines_by_recipes(db, &recipe_ids).await? {
        lines_by_recipe
            .entry(line.recipe_id)
            .or_default()
            .push(IngredientLineView {
                id: line.ingredient_id,
                name: line.name,
                measurement_unit: line.measurement_unit,
                amount: line.amount,
            });
    }

    let mut tags_by_recipe: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    for link in repo::tags_by_recipes(db, &recipe_ids).await? {
        tags_by_recipe.entry(link.recipe_id).or_default().push(Tag {
            id: link.id,
            name: link.name,
            color: link.color,
            slug: link.slug,
        });
    }

    let mut projections = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        let author = authors
            .get(&recipe.author_id)
            .cloned()
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("recipe author missing")))?;
        projections.push(RecipeRead {
            id: recipe.id,
            author: UserProfile::from_user(author, subscribed.contains(&recipe.author_id)),
            tags: tags_by_recipe.remove(&recipe.id).unwrap_or_default(),
            ingredients: lines_by_recipe.remove(&recipe.id).unwrap_or_default(),
            is_favorited: favorited.contains(&recipe.id),
            is_in_shopping_cart: in_cart.contains(&recipe.id),
            name: recipe.name,
            image: recipe.image,
            text: recipe.text,
            cooking_time: recipe.cooking_time,
            created_at: recipe.created_at,
        });
    }
    Ok(projections)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: Uuid, amount: i32) -> IngredientLineInput {
        IngredientLineInput { id, amount }
    }

    #[test]
    fn empty_ingredient_list_is_rejected() {
        let err = validate_ingredient_lines(&[]).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn duplicate_ingredient_is_rejected_regardless_of_amounts() {
        let id = Uuid::new_v4();
        for amounts in [(1, 1), (1, 2), (32000, 5)] {
            let err =
                validate_ingredient_lines(&[line(id, amounts.0), line(id, amounts.1)]).unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)));
        }
    }

    #[test]
    fn amount_bounds_are_enforced() {
        assert!(validate_ingredient_lines(&[line(Uuid::new_v4(), 0)]).is_err());
        assert!(validate_ingredient_lines(&[line(Uuid::new_v4(), -3)]).is_err());
        assert!(validate_ingredient_lines(&[line(Uuid::new_v4(), 32001)]).is_err());
        assert!(validate_ingredient_lines(&[line(Uuid::new_v4(), 1)]).is_ok());
        assert!(validate_ingredient_lines(&[line(Uuid::new_v4(), 32000)]).is_ok());
    }

    #[test]
    fn distinct_ingredients_pass() {
        let lines = [line(Uuid::new_v4(), 10), line(Uuid::new_v4(), 20)];
        assert!(validate_ingredient_lines(&lines).is_ok());
    }

    #[test]
    fn tag_set_must_be_non_empty_and_unique() {
        assert!(validate_tag_ids(&[]).is_err());
        let id = Uuid::new_v4();
        assert!(validate_tag_ids(&[id, id]).is_err());
        assert!(validate_tag_ids(&[id, Uuid::new_v4()]).is_ok());
    }

    #[test]
    fn cooking_time_bounds() {
        assert!(validate_cooking_time(0).is_err());
        assert!(validate_cooking_time(1).is_ok());
        assert!(validate_cooking_time(32000).is_ok());
        assert!(validate_cooking_time(32001).is_err());
    }

    #[test]
    fn recipe_name_must_be_present_and_bounded() {
        assert!(validate_name("Borscht").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(201)).is_err());
    }

    #[test]
    fn image_reference_must_be_a_base64_data_url() {
        assert!(validate_image_reference("data:image/png;base64,aGVsbG8=").is_ok());
        assert!(validate_image_reference("https://example.com/x.png").is_err());
        assert!(validate_image_reference("data:image/png;base64,!!!").is_err());
    }
}
