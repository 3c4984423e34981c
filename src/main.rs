mod app;
mod auth;
mod config;
mod error;
mod ingredients;
mod pagination;
mod recipes;
mod relations;
mod shopping;
mod state;
mod tags;
mod users;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "recipebox=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    sqlx::migrate!("./migrations").run(&app_state.db).await?;

    if let Some(path) = app_state.config.ingredients_csv.clone() {
        if let Err(e) = ingredients::import_csv(&app_state.db, &path).await {
            tracing::warn!(error = %e, path, "ingredient catalog import failed; continuing");
        }
    }

    let app = app::build_app(app_state);
    app::serve(app).await
}
