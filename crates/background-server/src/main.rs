//! Background Server - local HTTP front for the new-tab background cache
//!
//! Serves cached background images, their metadata and expiry decisions to
//! the new-tab page, and stores images handed over by provider modules.

mod error;
mod html;
mod server;
mod types;

use crate::error::{Result, ServerError};
use crate::html::LatestLocation;
use crate::server::{start_server, ServerState, SharedState};
use crate::types::ServerConfig;
use background_cache::{BackgroundCache, HttpImageFetcher, JsonFileSettings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("background_server=info".parse()?)
        .add_directive("background_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting background server...");

    let config = load_config()?;
    info!("Port: {}", config.port);
    info!("Database: {:?}", config.db_path);
    info!("Settings: {:?}", config.settings_path);
    info!("Fetch timeout: {} seconds", config.fetch_timeout_secs);

    let fetcher = HttpImageFetcher::with_timeout(Duration::from_secs(config.fetch_timeout_secs))?;
    let location = Arc::new(LatestLocation::default());

    let cache = BackgroundCache::new(
        config.db_path,
        Arc::new(JsonFileSettings::new(config.settings_path)),
    )
    .with_fetcher(Arc::new(fetcher))
    .with_notifier(location.clone())
    .with_handle_base(config.handle_base.clone());
    cache.init().await?;

    let state: SharedState = Arc::new(ServerState::new(cache, location, config.handle_base));

    start_server(state, config.port)
        .await
        .map_err(|e| ServerError::Config(format!("Server error: {}", e)))?;

    Ok(())
}

fn load_config() -> Result<ServerConfig> {
    let defaults = ServerConfig::default();

    let port = match std::env::var("PORT") {
        Ok(s) => s
            .parse::<u16>()
            .map_err(|e| ServerError::Config(format!("invalid PORT '{}': {}", s, e)))?,
        Err(_) => defaults.port,
    };

    let db_path = std::env::var("CACHE_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or(defaults.db_path);

    let settings_path = std::env::var("SETTINGS_PATH")
        .map(PathBuf::from)
        .unwrap_or(defaults.settings_path);

    let fetch_timeout_secs = std::env::var("FETCH_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(defaults.fetch_timeout_secs);

    let handle_base = std::env::var("HANDLE_BASE").unwrap_or(defaults.handle_base);

    Ok(ServerConfig {
        port,
        db_path,
        settings_path,
        fetch_timeout_secs,
        handle_base,
    })
}
