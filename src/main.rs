mod auth;
mod config;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod scheduling;
mod store;

use std::sync::Arc;

use crate::{auth::TokenKeys, config::Config, models::AppState, store::PgStore};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg.database_url, cfg.db_max_connections).await?;

    if cfg.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("migrations applied");
    }

    if !cfg.token_secret_from_env {
        tracing::warn!("TOKEN_SECRET not set; tokens will not survive a restart");
    }

    let state = AppState::new(
        Arc::new(PgStore::new(pool)),
        TokenKeys::new(&cfg.token_secret, cfg.token_ttl_hours),
    );

    // Browser clients send an OPTIONS preflight before POST/PUT with a bearer token.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}/dbproj", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
