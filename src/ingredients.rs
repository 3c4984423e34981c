use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// Reference data: the ingredient catalog is seeded from CSV and read-only
/// through the API.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
}

impl Ingredient {
    pub async fn find(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Ingredient>> {
        sqlx::query_as::<_, Ingredient>(
            "SELECT id, name, measurement_unit FROM ingredients WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Case-insensitive prefix search on name; no prefix lists everything.
    pub async fn search(db: &PgPool, prefix: Option<&str>) -> sqlx::Result<Vec<Ingredient>> {
        match prefix {
            Some(prefix) => {
                sqlx::query_as::<_, Ingredient>(
                    "SELECT id, name, measurement_unit FROM ingredients
                     WHERE name ILIKE $1 ORDER BY name",
                )
                .bind(like_prefix(prefix))
                .fetch_all(db)
                .await
            }
            None => {
                sqlx::query_as::<_, Ingredient>(
                    "SELECT id, name, measurement_unit FROM ingredients ORDER BY name",
                )
                .fetch_all(db)
                .await
            }
        }
    }

    /// How many of `ids` actually exist.
    pub async fn count_existing(db: &PgPool, ids: &[Uuid]) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ingredients WHERE id = ANY($1)")
            .bind(ids)
            .fetch_one(db)
            .await?;
        Ok(count)
    }
}

/// LIKE pattern matching `prefix` literally at the start of the value.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// One `name,unit` row of the seed CSV. The unit never contains a comma, the
/// name may, so the split happens at the last one.
fn parse_csv_line(line: &str) -> Option<(String, String)> {
    let (name, unit) = line.rsplit_once(',')?;
    let name = name.trim().trim_matches('"').trim();
    let unit = unit.trim().trim_matches('"').trim();
    if name.is_empty() || unit.is_empty() {
        return None;
    }
    Some((name.to_string(), unit.to_string()))
}

/// Idempotent catalog seed: inserts every parseable row, skipping those
/// already present. Returns how many rows were inserted.
pub async fn import_csv(db: &PgPool, path: &str) -> anyhow::Result<u64> {
    let contents = tokio::fs::read_to_string(path).await?;

    let mut inserted = 0u64;
    for line in contents.lines() {
        let Some((name, unit)) = parse_csv_line(line) else {
            continue;
        };
        let result = sqlx::query(
            "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2)
             ON CONFLICT (name, measurement_unit) DO NOTHING",
        )
        .bind(&name)
        .bind(&unit)
        .execute(db)
        .await?;
        inserted += result.rows_affected();
    }

    info!(path, inserted, "ingredient catalog import finished");
    Ok(inserted)
}

#[derive(Debug, Deserialize)]
struct IngredientSearch {
    name: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ingredients", get(list_ingredients))
        .route("/ingredients/:id", get(get_ingredient))
}

#[instrument(skip(state))]
async fn list_ingredients(
    State(state): State<AppState>,
    Query(q): Query<IngredientSearch>,
) -> Result<Json<Vec<Ingredient>>, ApiError> {
    let rows = Ingredient::search(&state.db, q.name.as_deref()).await?;
    Ok(Json(rows))
}

#[instrument(skip(state))]
async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ingredient>, ApiError> {
    let row = Ingredient::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Ingredient not found"))?;
    Ok(Json(row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("salt"), "salt%");
        assert_eq!(like_prefix("100%"), "100\\%%");
        assert_eq!(like_prefix("a_b"), "a\\_b%");
        assert_eq!(like_prefix("back\\slash"), "back\\\\slash%");
    }

    #[test]
    fn csv_line_splits_on_the_last_comma() {
        assert_eq!(
            parse_csv_line("salt,g"),
            Some(("salt".into(), "g".into()))
        );
        assert_eq!(
            parse_csv_line("peppers, red, sliced,g"),
            Some(("peppers, red, sliced".into(), "g".into()))
        );
        assert_eq!(
            parse_csv_line("\"cream, 20%\",ml"),
            Some(("cream, 20%".into(), "ml".into()))
        );
    }

    #[test]
    fn csv_rejects_incomplete_rows() {
        assert_eq!(parse_csv_line(""), None);
        assert_eq!(parse_csv_line("no-unit"), None);
        assert_eq!(parse_csv_line("name,"), None);
        assert_eq!(parse_csv_line(",unit"), None);
    }
}
