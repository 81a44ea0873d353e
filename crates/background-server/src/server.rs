//! HTTP server for the new-tab page
//!
//! Provides /health, /backgrounds/{source}, /handles/{id}, /location and
//! /settings/schedule endpoints.

use crate::error::ApiError;
use crate::html::{HtmlContainer, LatestLocation};
use crate::types::{
    ApplyResponse, BackgroundResponse, CacheRequest, CacheResponse, ClearResponse,
    ExpiredQuery, ExpiredResponse, HealthResponse, ScheduleBody,
};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get},
    Router,
};
use background_cache::{BackgroundCache, LocationInfo, ScheduleSettings, Source};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Shared state for the HTTP server
pub struct ServerState {
    pub cache: BackgroundCache,
    pub location: Arc<LatestLocation>,
    pub handle_base: String,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(cache: BackgroundCache, location: Arc<LatestLocation>, handle_base: String) -> Self {
        Self {
            cache,
            location,
            handle_base,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/backgrounds", delete(clear_backgrounds))
        .route(
            "/backgrounds/{source}",
            get(get_background).put(put_background),
        )
        .route("/backgrounds/{source}/expired", get(get_expired))
        .route("/backgrounds/{source}/apply", get(apply_background))
        .route("/handles/{id}", get(get_handle))
        .route("/location", get(get_location))
        .route("/settings/schedule", get(get_schedule).put(put_schedule))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    let (status, cache) = match state.cache.stats().await {
        Ok(stats) => ("ok", stats),
        Err(e) => {
            warn!(error = %e, "Failed to read cache stats");
            ("degraded", Default::default())
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        uptime_secs,
        cache,
    })
}

async fn get_background(
    State(state): State<SharedState>,
    Path(source): Path<String>,
) -> Result<Json<BackgroundResponse>, ApiError> {
    let source: Source = source.parse()?;
    let cached = state
        .cache
        .get_background(source)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No cached background for {}", source)))?;

    Ok(Json(BackgroundResponse {
        source: cached.entry.source,
        metadata: cached.entry.metadata,
        mime_type: cached.entry.image.mime_type,
        size: cached.entry.image.bytes.len(),
        timestamp: cached.entry.timestamp,
        handle: cached.handle.to_string(),
    }))
}

async fn put_background(
    State(state): State<SharedState>,
    Path(source): Path<String>,
    Json(body): Json<CacheRequest>,
) -> Result<Json<CacheResponse>, ApiError> {
    let source: Source = source.parse()?;
    let cached = state
        .cache
        .cache_background(source, body.metadata, body.image)
        .await;
    Ok(Json(CacheResponse { cached }))
}

async fn get_expired(
    State(state): State<SharedState>,
    Path(source): Path<String>,
    Query(query): Query<ExpiredQuery>,
) -> Result<Json<ExpiredResponse>, ApiError> {
    let source: Source = source.parse()?;
    let expired = state
        .cache
        .is_expired(source, Duration::from_millis(query.max_age_ms))
        .await;
    Ok(Json(ExpiredResponse { expired }))
}

async fn apply_background(
    State(state): State<SharedState>,
    Path(source): Path<String>,
) -> Result<Json<ApplyResponse>, ApiError> {
    let source: Source = source.parse()?;
    // A source without credits must not inherit the previous line
    state.location.reset();
    let mut container = HtmlContainer::new();
    let applied = state.cache.apply_background(source, &mut container).await;

    Ok(Json(ApplyResponse {
        applied,
        html: container.into_html(),
        location: if applied { state.location.get() } else { None },
    }))
}

async fn clear_backgrounds(State(state): State<SharedState>) -> Json<ClearResponse> {
    let cleared = state.cache.clear_all().await;
    if cleared {
        state.location.reset();
    }
    Json(ClearResponse { cleared })
}

/// Serve the blob behind a live display handle
async fn get_handle(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    let handle = format!("{}/{}", state.handle_base.trim_end_matches('/'), id);
    match state.cache.resolve_handle(&handle).await {
        Some(blob) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, blob.mime_type.clone()),
                (header::CACHE_CONTROL, "no-store".to_string()),
            ],
            blob.bytes.clone(),
        )
            .into_response(),
        None => ApiError::NotFound("Handle revoked or unknown".to_string()).into_response(),
    }
}

async fn get_location(State(state): State<SharedState>) -> Json<Option<LocationInfo>> {
    Json(state.location.get())
}

async fn get_schedule(State(state): State<SharedState>) -> Result<Json<ScheduleBody>, ApiError> {
    let settings = ScheduleSettings::load(state.cache.settings().as_ref()).await?;
    Ok(Json(ScheduleBody {
        schedule: settings.schedule,
        local_mode: settings.local_mode,
    }))
}

async fn put_schedule(
    State(state): State<SharedState>,
    Json(body): Json<ScheduleBody>,
) -> Result<Json<ScheduleBody>, ApiError> {
    let settings = ScheduleSettings {
        schedule: body.schedule,
        local_mode: body.local_mode,
    };
    settings.save(state.cache.settings().as_ref()).await?;
    info!(schedule = ?settings.schedule, local_mode = ?settings.local_mode, "Updated schedule");
    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use background_cache::MemorySettings;
    use serde_json::{json, Value};
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    const PNG_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn create_test_state() -> (TempDir, SharedState) {
        let dir = tempdir().unwrap();
        let location = Arc::new(LatestLocation::default());
        let cache = BackgroundCache::new(
            dir.path().join("backgrounds.db"),
            Arc::new(MemorySettings::new()),
        )
        .with_notifier(location.clone())
        .with_handle_base("/handles");
        let state = Arc::new(ServerState::new(cache, location, "/handles".to_string()));
        (dir, state)
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn with_json(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn put_reddit(router: &Router) {
        let (status, body) = send(
            router,
            with_json(
                "PUT",
                "/backgrounds/reddit",
                json!({ "metadata": { "title": "Sunset" }, "image": PNG_DATA_URL }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["cached"], true);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (_dir, state) = create_test_state();
        let router = create_router(state);

        let (status, body) = send(&router, get("/health")).await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["uptime_secs"].as_u64().is_some());
        assert_eq!(json["cache"]["entries"], 0);
    }

    #[tokio::test]
    async fn test_put_then_get_background() {
        let (_dir, state) = create_test_state();
        let router = create_router(state);
        put_reddit(&router).await;

        let (status, body) = send(&router, get("/backgrounds/reddit")).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["source"], "reddit");
        assert_eq!(json["metadata"]["title"], "Sunset");
        assert_eq!(json["mime_type"], "image/png");
        assert_eq!(json["size"], 70);
        assert!(json["timestamp"].as_i64().is_some());

        let handle = json["handle"].as_str().unwrap().to_string();
        assert!(handle.starts_with("/handles/"));

        let response = router.clone().oneshot(get(&handle)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
    }

    #[tokio::test]
    async fn test_get_missing_background_is_not_found() {
        let (_dir, state) = create_test_state();
        let router = create_router(state);

        let (status, _) = send(&router, get("/backgrounds/earth")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_source_is_bad_request() {
        let (_dir, state) = create_test_state();
        let router = create_router(state);

        let (status, body) = send(&router, get("/backgrounds/flickr")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].as_str().unwrap().contains("flickr"));
    }

    #[tokio::test]
    async fn test_put_unconvertible_image() {
        let (_dir, state) = create_test_state();
        let router = create_router(state);

        let (status, body) = send(
            &router,
            with_json("PUT", "/backgrounds/imgur", json!({ "image": "not an image" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["cached"], false);
    }

    #[tokio::test]
    async fn test_expired_endpoint_follows_schedule() {
        let (_dir, state) = create_test_state();
        let router = create_router(state);
        put_reddit(&router).await;

        let (_, body) = send(&router, get("/backgrounds/reddit/expired?max_age_ms=3600000")).await;
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["expired"], false);

        let (status, _) = send(
            &router,
            with_json(
                "PUT",
                "/settings/schedule",
                json!({ "schedule": "every-session", "local_mode": "single" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&router, get("/backgrounds/reddit/expired?max_age_ms=3600000")).await;
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["expired"], true);
    }

    #[tokio::test]
    async fn test_schedule_defaults() {
        let (_dir, state) = create_test_state();
        let router = create_router(state);

        let (status, body) = send(&router, get("/settings/schedule")).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, json!({ "schedule": "daily", "local_mode": "single" }));
    }

    #[tokio::test]
    async fn test_apply_renders_html_and_location() {
        let (_dir, state) = create_test_state();
        let router = create_router(state);
        put_reddit(&router).await;

        let (status, body) = send(&router, get("/backgrounds/reddit/apply")).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["applied"], true);
        let html = json["html"].as_str().unwrap();
        assert!(html.starts_with(r#"<img class="background-image" src="/handles/"#));
        assert!(html.contains(r#"alt="Sunset""#));
        assert_eq!(json["location"]["text"], "Sunset");

        let (_, body) = send(&router, get("/location")).await;
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["text"], "Sunset");
    }

    #[tokio::test]
    async fn test_apply_without_entry() {
        let (_dir, state) = create_test_state();
        let router = create_router(state);

        let (_, body) = send(&router, get("/backgrounds/local/apply")).await;
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["applied"], false);
        assert_eq!(json["html"], "");
        assert!(json["location"].is_null());
    }

    #[tokio::test]
    async fn test_clear_revokes_handles() {
        let (_dir, state) = create_test_state();
        let router = create_router(state);
        put_reddit(&router).await;

        let (_, body) = send(&router, get("/backgrounds/reddit")).await;
        let json: Value = serde_json::from_slice(&body).unwrap();
        let handle = json["handle"].as_str().unwrap().to_string();

        let request = Request::builder()
            .method("DELETE")
            .uri("/backgrounds")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["cleared"], true);

        let (status, _) = send(&router, get(&handle)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&router, get("/backgrounds/reddit")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_server_state_new() {
        let (_dir, state) = create_test_state();
        let diff = (Utc::now() - state.started_at).num_seconds();
        assert!((0..5).contains(&diff));
    }

    #[tokio::test]
    async fn test_apply_without_credits_clears_previous_location() {
        let (_dir, state) = create_test_state();
        let router = create_router(state);
        put_reddit(&router).await;

        let (_, body) = send(&router, get("/backgrounds/reddit/apply")).await;
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["location"]["text"], "Sunset");

        let (status, _) = send(
            &router,
            with_json(
                "PUT",
                "/backgrounds/pixabay",
                json!({ "metadata": { "tags": "forest" }, "image": PNG_DATA_URL }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&router, get("/backgrounds/pixabay/apply")).await;
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["applied"], true);
        assert!(json["location"].is_null());

        let (_, body) = send(&router, get("/location")).await;
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert!(json.is_null());
    }

    #[tokio::test]
    async fn test_clear_forgets_location() {
        let (_dir, state) = create_test_state();
        let router = create_router(state);
        put_reddit(&router).await;
        send(&router, get("/backgrounds/reddit/apply")).await;

        let request = Request::builder()
            .method("DELETE")
            .uri("/backgrounds")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&router, get("/location")).await;
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert!(json.is_null());
    }
}
