//! Core types for the background server

use background_cache::{CacheStats, LocalImageMode, LocationInfo, SchedulePolicy, Source};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the background server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub settings_path: PathBuf,
    pub fetch_timeout_secs: u64,
    pub handle_base: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3002,
            db_path: PathBuf::from("./cache/backgrounds.db"),
            settings_path: PathBuf::from("./cache/settings.json"),
            fetch_timeout_secs: 30,
            handle_base: "/handles".to_string(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheStats,
}

/// Cached background as seen by the page; the blob is served via `handle`
#[derive(Debug, Serialize)]
pub struct BackgroundResponse {
    pub source: Source,
    pub metadata: serde_json::Value,
    pub mime_type: String,
    pub size: usize,
    pub timestamp: i64,
    pub handle: String,
}

#[derive(Debug, Deserialize)]
pub struct CacheRequest {
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Remote URL or `data:` URL
    pub image: String,
}

#[derive(Debug, Serialize)]
pub struct CacheResponse {
    pub cached: bool,
}

#[derive(Debug, Deserialize)]
pub struct ExpiredQuery {
    pub max_age_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct ExpiredResponse {
    pub expired: bool,
}

#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    pub applied: bool,
    pub html: String,
    pub location: Option<LocationInfo>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleBody {
    pub schedule: SchedulePolicy,
    pub local_mode: LocalImageMode,
}
