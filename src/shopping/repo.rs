use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// One raw ingredient line from a recipe in the user's cart. The same
/// ingredient appears once per recipe that uses it.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CartLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

pub async fn cart_lines(db: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<CartLine>> {
    sqlx::query_as::<_, CartLine>(
        "SELECT i.name, i.measurement_unit, ri.amount
         FROM shopping_cart sc
         JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
         JOIN ingredients i ON i.id = ri.ingredient_id
         WHERE sc.user_id = $1",
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}
