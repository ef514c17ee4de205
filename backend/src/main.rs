use axum::Router;
use skillswap::{
    db::{ChangeFeed, PgChangeFeed, PgConnectionStore, PgNotificationSink, PgProfileDirectory},
    handlers::{self, AppState},
    services::{ConnectionManager, Notices, RetryPolicy},
    utils, Config, get_db_pool,
};
use std::sync::Arc;
use tower_http::{cors::{CorsLayer, Any}, trace::TraceLayer};
use axum::http::{Method, HeaderValue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    utils::init_logging();

    let config = Config::from_env()?;
    let db_config = skillswap::db::DatabaseConfig::from_env()?;
    let pool = get_db_pool(&db_config).await?;

    // Run migrations
    skillswap::db::migrations::run_migrations(&pool).await?;

    let manager = ConnectionManager::new(
        Arc::new(PgConnectionStore::new(pool.clone())),
        Arc::new(PgNotificationSink::new(pool.clone())),
        Arc::new(PgProfileDirectory::new(pool.clone())),
    )
    .with_retry_policy(RetryPolicy::from_config(&config))
    .with_notices(Notices::new(config.app_base_path.clone()));

    // Keep cached connection lists in step with writes from other instances.
    // The watcher is detached and lives as long as the process.
    let feed = PgChangeFeed::spawn(pool);
    let _watcher = manager.cache().watch(feed.subscribe());

    let port = config.port;
    let app = create_router(AppState::new(manager), &config);

    let listener = tokio::net::TcpListener::bind(&format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Server running on port {}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState, config: &Config) -> Router {
    handlers::router(state)
        .layer(create_cors_layer(config))
        .layer(TraceLayer::new_for_http())
}

fn create_cors_layer(config: &Config) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(false);

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        // Default to permissive for development
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}
