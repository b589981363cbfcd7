//! Grant application service: entry point.
//!
//! Serves the submission, determination and project workflow over a small
//! Axum REST API backed by SQLite. Workflow events fan out to the configured
//! notification channels once their transaction has committed.

mod api;
mod config;
mod db;
mod determinations;
mod errors;
mod events;
mod notify;
mod projects;
mod storage;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use notify::Messenger;
use storage::FsDocumentStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controls verbosity.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Optional .env file.
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    let messenger = Messenger::from_config(&config.notify_channels, &pool)?;
    info!(channels = ?messenger.channel_names(), "notifications configured");

    let state = Arc::new(api::ApiState {
        pool,
        messenger,
        store: Arc::new(FsDocumentStore::new(&config.media_root)),
    });

    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
