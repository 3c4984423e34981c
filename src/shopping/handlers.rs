use axum::{
    http::{header, HeaderMap, StatusCode},
    extract::State,
    routing::get,
    Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use crate::{
    auth::{repo::User, services::AuthUser},
    error::ApiError,
    state::AppState,
};

use super::{repo, service};

pub fn shopping_routes() -> Router<AppState> {
    Router::new().route("/recipes/download_shopping_cart", get(download_shopping_cart))
}

#[instrument(skip(state))]
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<(StatusCode, HeaderMap, String), ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    let lines = repo::cart_lines(&state.db, user_id).await?;
    if lines.is_empty() {
        return Err(ApiError::validation("Shopping cart is empty"));
    }

    let totals = service::aggregate(lines);
    let today = OffsetDateTime::now_utc().date();
    let body = service::render(&display_name(&user), today, &totals);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        "text/plain; charset=utf-8".parse().expect("static header"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{}_shopping_list.txt\"", user.username)
            .parse()
            .map_err(|_| ApiError::Internal(anyhow::anyhow!("bad content-disposition")))?,
    );

    Ok((StatusCode::OK, headers, body))
}

fn display_name(user: &User) -> String {
    let full = format!("{} {}", user.first_name, user.last_name);
    let full = full.trim();
    if full.is_empty() {
        user.username.clone()
    } else {
        full.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn user(first: &str, last: &str, username: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@b.c".into(),
            username: username.into(),
            first_name: first.into(),
            last_name: last.into(),
            password_hash: String::new(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn display_name_prefers_full_name() {
        assert_eq!(display_name(&user("Anna", "Cook", "anna")), "Anna Cook");
        assert_eq!(display_name(&user("Anna", "", "anna")), "Anna");
        assert_eq!(display_name(&user("", "", "anna")), "anna");
    }
}
