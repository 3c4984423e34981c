use std::collections::{HashMap, HashSet};

use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use super::dto::{IngredientLineInput, RecipeFilter, RecipeShort};

const RECIPE_COLUMNS: &str = "id, author_id, name, text, image, cooking_time, created_at";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Recipe {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub text: String,
    pub image: Option<String>,
    pub cooking_time: i32,
    pub created_at: OffsetDateTime,
}

/// Ingredient line joined with its catalog entry.
#[derive(Debug, Clone, FromRow)]
pub struct IngredientLineRow {
    pub recipe_id: Uuid,
    pub ingredient_id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct TagLinkRow {
    pub recipe_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub slug: String,
}

pub async fn find(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Recipe>> {
    sqlx::query_as::<_, Recipe>(&format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Filtered page, newest first. Tag slugs are OR-combined; the relation
/// filters only narrow for an authenticated viewer.
pub async fn fetch_page(
    db: &PgPool,
    filter: &RecipeFilter,
    viewer: Option<Uuid>,
) -> sqlx::Result<Vec<Recipe>> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT r.id, r.author_id, r.name, r.text, r.image, r.cooking_time, r.created_at
         FROM recipes r WHERE true",
    );

    if let Some(author) = filter.author {
        qb.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        qb.push(
            " AND EXISTS (SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id
                          WHERE rt.recipe_id = r.id AND t.slug = ANY(",
        )
        .push_bind(filter.tags.clone())
        .push("))");
    }
    if let Some(viewer) = viewer {
        if filter.is_favorited {
            qb.push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
        if filter.is_in_shopping_cart {
            qb.push(" AND EXISTS (SELECT 1 FROM shopping_cart sc WHERE sc.recipe_id = r.id AND sc.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
    }

    qb.push(" ORDER BY r.created_at DESC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);

    qb.build_query_as::<Recipe>().fetch_all(db).await
}

pub async fn lines_by_recipes(
    db: &PgPool,
    recipe_ids: &[Uuid],
) -> sqlx::Result<Vec<IngredientLineRow>> {
    sqlx::query_as::<_, IngredientLineRow>(
        "SELECT ri.recipe_id, ri.ingredient_id, i.name, i.measurement_unit, ri.amount
         FROM recipe_ingredients ri
         JOIN ingredients i ON i.id = ri.ingredient_id
         WHERE ri.recipe_id = ANY($1)
         ORDER BY i.name",
    )
    .bind(recipe_ids)
    .fetch_all(db)
    .await
}

pub async fn tags_by_recipes(db: &PgPool, recipe_ids: &[Uuid]) -> sqlx::Result<Vec<TagLinkRow>> {
    sqlx::query_as::<_, TagLinkRow>(
        "SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
         FROM recipe_tags rt
         JOIN tags t ON t.id = rt.tag_id
         WHERE rt.recipe_id = ANY($1)
         ORDER BY t.name",
    )
    .bind(recipe_ids)
    .fetch_all(db)
    .await
}

/// Which of `recipe_ids` the viewer has favorited.
pub async fn favorited_ids(
    db: &PgPool,
    viewer: Uuid,
    recipe_ids: &[Uuid],
) -> sqlx::Result<HashSet<Uuid>> {
    let rows: Vec<(Uuid,)> =
        sqlx::query_as("SELECT recipe_id FROM favorites WHERE user_id = $1 AND recipe_id = ANY($2)")
            .bind(viewer)
            .bind(recipe_ids)
            .fetch_all(db)
            .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Which of `recipe_ids` are in the viewer's cart.
pub async fn in_cart_ids(
    db: &PgPool,
    viewer: Uuid,
    recipe_ids: &[Uuid],
) -> sqlx::Result<HashSet<Uuid>> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT recipe_id FROM shopping_cart WHERE user_id = $1 AND recipe_id = ANY($2)",
    )
    .bind(viewer)
    .bind(recipe_ids)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Newest-first short projections grouped by author, for subscription
/// previews.
pub async fn shorts_by_authors(
    db: &PgPool,
    author_ids: &[Uuid],
) -> sqlx::Result<HashMap<Uuid, Vec<RecipeShort>>> {
    let rows: Vec<(Uuid, Uuid, String, Option<String>, i32)> = sqlx::query_as(
        "SELECT author_id, id, name, image, cooking_time
         FROM recipes WHERE author_id = ANY($1)
         ORDER BY created_at DESC",
    )
    .bind(author_ids)
    .fetch_all(db)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<RecipeShort>> = HashMap::new();
    for (author_id, id, name, image, cooking_time) in rows {
        grouped.entry(author_id).or_default().push(RecipeShort {
            id,
            name,
            image,
            cooking_time,
        });
    }
    Ok(grouped)
}

pub async fn insert_recipe(
    tx: &mut Transaction<'_, Postgres>,
    author_id: Uuid,
    name: &str,
    text: &str,
    image: Option<&str>,
    cooking_time: i32,
) -> sqlx::Result<Recipe> {
    sqlx::query_as::<_, Recipe>(&format!(
        "INSERT INTO recipes (author_id, name, text, image, cooking_time)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {RECIPE_COLUMNS}"
    ))
    .bind(author_id)
    .bind(name)
    .bind(text)
    .bind(image)
    .bind(cooking_time)
    .fetch_one(&mut **tx)
    .await
}

pub async fn update_scalars(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    name: Option<&str>,
    text: Option<&str>,
    image: Option<&str>,
    cooking_time: Option<i32>,
) -> sqlx::Result<Recipe> {
    sqlx::query_as::<_, Recipe>(&format!(
        "UPDATE recipes SET
            name = COALESCE($1, name),
            text = COALESCE($2, text),
            image = COALESCE($3, image),
            cooking_time = COALESCE($4, cooking_time)
         WHERE id = $5
         RETURNING {RECIPE_COLUMNS}"
    ))
    .bind(name)
    .bind(text)
    .bind(image)
    .bind(cooking_time)
    .bind(recipe_id)
    .fetch_one(&mut **tx)
    .await
}

/// Replaces the full ingredient set of a recipe inside the caller's
/// transaction. Lines are batch-inserted.
pub async fn replace_lines(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    lines: &[IngredientLineInput],
) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await?;

    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    qb.push_values(lines, |mut b, line| {
        b.push_bind(recipe_id).push_bind(line.id).push_bind(line.amount);
    });
    qb.build().execute(&mut **tx).await?;

    Ok(())
}

/// Replaces the full tag set of a recipe inside the caller's transaction.
pub async fn replace_tags(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    tag_ids: &[Uuid],
) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await?;

    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    qb.push_values(tag_ids, |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });
    qb.build().execute(&mut **tx).await?;

    Ok(())
}

/// Join rows, favorites and cart entries go with the recipe via FK cascade.
pub async fn delete(db: &PgPool, recipe_id: Uuid) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe_id)
        .execute(db)
        .await?;
    Ok(())
}
