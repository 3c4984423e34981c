use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo::User;
use crate::recipes::dto::RecipeShort;

/// Public user projection. `is_subscribed` is relative to the viewer and
/// false for anonymous requests.
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserProfile {
    pub fn from_user(user: User, is_subscribed: bool) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed,
        }
    }
}

/// One followed author in the subscriptions listing, with a recipe count and
/// a preview of their newest recipes.
#[derive(Debug, Serialize)]
pub struct SubscriptionItem {
    #[serde(flatten)]
    pub author: UserProfile,
    pub recipes_count: i64,
    pub recipes: Vec<RecipeShort>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionsQuery {
    pub recipes_limit: Option<usize>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct RecipesLimitQuery {
    pub recipes_limit: Option<usize>,
}
