// src/main.rs
// Orchestrator server entrypoint: binds the axum HTTP/WebSocket router
// (spec 4.7, 4.9) over the project-state SQLite pool.

use std::net::SocketAddr;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use forge_orchestrator::config::CONFIG;
use forge_orchestrator::metrics::init_metrics;
use forge_orchestrator::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&CONFIG.logging.level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting orchestrator server");
    init_metrics();

    let pool = SqlitePoolOptions::new()
        .max_connections(CONFIG.database.max_connections)
        .connect(&CONFIG.database.url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let state = AppState::new(pool).await?;
    let app = forge_orchestrator::api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = CONFIG.bind_address().parse()?;
    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
