use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiError;
use crate::tags::Tag;
use crate::users::dto::UserProfile;

/// One `{id, amount}` entry of a write payload.
#[derive(Debug, Clone, Deserialize)]
pub struct IngredientLineInput {
    pub id: Uuid,
    pub amount: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecipeRequest {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: Option<String>,
    pub ingredients: Vec<IngredientLineInput>,
    pub tags: Vec<Uuid>,
}

/// PATCH payload. Omitted scalars stay unchanged; a present `ingredients` or
/// `tags` list replaces the full set.
#[derive(Debug, Deserialize)]
pub struct UpdateRecipeRequest {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub image: Option<String>,
    pub ingredients: Option<Vec<IngredientLineInput>>,
    pub tags: Option<Vec<Uuid>>,
}

#[derive(Debug, Serialize)]
pub struct IngredientLineView {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// Full read projection, viewer-relative flags included.
#[derive(Debug, Serialize)]
pub struct RecipeRead {
    pub id: Uuid,
    pub author: UserProfile,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<IngredientLineView>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i32,
    pub created_at: OffsetDateTime,
}

/// Short projection used by favorites/cart responses and subscription
/// previews.
#[derive(Debug, Serialize)]
pub struct RecipeShort {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: i32,
}

/// Parsed recipe list filters. Built from the raw query pairs because `tags`
/// repeats.
#[derive(Debug, Default, PartialEq)]
pub struct RecipeFilter {
    pub tags: Vec<String>,
    pub author: Option<Uuid>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub limit: i64,
    pub offset: i64,
}

impl RecipeFilter {
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, ApiError> {
        let mut filter = RecipeFilter {
            limit: 20,
            ..Default::default()
        };

        for (key, value) in pairs {
            match key.as_str() {
                "tags" => filter.tags.push(value.clone()),
                "author" => {
                    let id = value
                        .parse::<Uuid>()
                        .map_err(|_| ApiError::validation("author must be a valid id"))?;
                    filter.author = Some(id);
                }
                "is_favorited" => filter.is_favorited = parse_flag(value)?,
                "is_in_shopping_cart" => filter.is_in_shopping_cart = parse_flag(value)?,
                "limit" => {
                    filter.limit = value
                        .parse::<i64>()
                        .ok()
                        .filter(|v| *v >= 0)
                        .ok_or_else(|| ApiError::validation("limit must be a non-negative integer"))?;
                }
                "offset" => {
                    filter.offset = value
                        .parse::<i64>()
                        .ok()
                        .filter(|v| *v >= 0)
                        .ok_or_else(|| ApiError::validation("offset must be a non-negative integer"))?;
                }
                _ => {}
            }
        }

        Ok(filter)
    }
}

fn parse_flag(value: &str) -> Result<bool, ApiError> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(ApiError::validation("boolean filters accept 0/1/true/false")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(input: &[(&str, &str)]) -> Vec<(String, String)> {
        input
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn repeated_tags_accumulate() {
        let filter =
            RecipeFilter::from_pairs(&pairs(&[("tags", "breakfast"), ("tags", "dinner")])).unwrap();
        assert_eq!(filter.tags, vec!["breakfast", "dinner"]);
    }

    #[test]
    fn defaults_when_no_params() {
        let filter = RecipeFilter::from_pairs(&[]).unwrap();
        assert!(filter.tags.is_empty());
        assert_eq!(filter.author, None);
        assert!(!filter.is_favorited);
        assert!(!filter.is_in_shopping_cart);
        assert_eq!(filter.limit, 20);
        assert_eq!(filter.offset, 0);
    }

    #[test]
    fn flags_parse_both_spellings() {
        let filter = RecipeFilter::from_pairs(&pairs(&[
            ("is_favorited", "1"),
            ("is_in_shopping_cart", "true"),
        ]))
        .unwrap();
        assert!(filter.is_favorited);
        assert!(filter.is_in_shopping_cart);

        let filter = RecipeFilter::from_pairs(&pairs(&[("is_favorited", "0")])).unwrap();
        assert!(!filter.is_favorited);
    }

    #[test]
    fn bad_flag_is_a_validation_error() {
        let err = RecipeFilter::from_pairs(&pairs(&[("is_favorited", "yes")])).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn bad_author_is_a_validation_error() {
        let err = RecipeFilter::from_pairs(&pairs(&[("author", "42")])).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let filter = RecipeFilter::from_pairs(&pairs(&[("page_size", "5")])).unwrap();
        assert_eq!(filter.limit, 20);
    }
}
