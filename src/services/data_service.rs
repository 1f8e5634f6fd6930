// Data Service
// HTTP surface of the optional dataset service

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{Path as UrlPath, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
};

use crate::models::ServiceConfig;

use super::chart_payload::build_payload;
use super::dataset_cache::DatasetCache;
use super::dataset_source::{LoadedDataset, SourceError};

pub const SERVICE_NAME: &str = "datalab-server";

#[derive(Clone)]
pub struct AppState {
    pub dataset_name: Arc<str>,
    pub cache: Arc<DatasetCache>,
}

impl AppState {
    pub fn new(dataset_name: &str, cache: DatasetCache) -> Self {
        Self {
            dataset_name: Arc::from(dataset_name),
            cache: Arc::new(cache),
        }
    }
}

/// Routes, CORS and optional static UI for `config`
pub fn router(state: AppState, config: &ServiceConfig) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/api/:dataset", get(dataset))
        .route("/api/:dataset/summary", get(summary))
        .with_state(state)
        .layer(build_cors_layer(&config.cors_origins));

    if let Some(ui_dir) = config.ui_dir.as_deref() {
        app = attach_ui(app, ui_dir);
    }
    app
}

fn attach_ui(app: Router, ui_dir: &Path) -> Router {
    if !ui_dir.exists() {
        log::warn!("UI directory {:?} not found, static serving disabled", ui_dir);
        return app;
    }
    log::info!("Serving UI from {:?}", ui_dir);
    app.fallback_service(ServeDir::new(ui_dir).fallback(ServeFile::new(ui_dir.join("index.html"))))
}

// ============================================================================
// CORS Configuration
// ============================================================================

pub fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allowed_origins = allowed_origins.to_vec();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            let origin_str = match origin.to_str() {
                Ok(s) => s,
                Err(_) => return false,
            };
            origin_allowed(&allowed_origins, origin_str)
        }))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

fn origin_allowed(allowed_origins: &[String], origin: &str) -> bool {
    allowed_origins.iter().any(|allowed| {
        if allowed == "*" {
            true
        } else if allowed.ends_with(":*") {
            // Wildcard port matching
            let prefix = allowed.trim_end_matches(":*");
            origin.starts_with(prefix) && origin[prefix.len()..].starts_with(':')
        } else {
            origin == allowed
        }
    })
}

// ============================================================================
// Handlers
// ============================================================================

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "dataset": state.dataset_name.to_string(),
        "loaded": state.cache.is_loaded(),
    }))
}

/// GET /api/:dataset - the normalized records as a JSON array
async fn dataset(State(state): State<AppState>, UrlPath(name): UrlPath<String>) -> Response {
    match load(&state, &name).await {
        Ok(dataset) => Json(&dataset.records).into_response(),
        Err(response) => response,
    }
}

/// GET /api/:dataset/summary - pre-aggregated chart payload
async fn summary(State(state): State<AppState>, UrlPath(name): UrlPath<String>) -> Response {
    match load(&state, &name).await {
        Ok(dataset) => Json(build_payload(&dataset.records, &dataset.columns)).into_response(),
        Err(response) => response,
    }
}

async fn load(state: &AppState, name: &str) -> Result<Arc<LoadedDataset>, Response> {
    if name != &*state.dataset_name {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Unknown dataset '{name}'") })),
        )
            .into_response());
    }

    state.cache.get().await.map_err(|e| {
        log::error!("Failed to load dataset '{name}': {e}");
        (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": public_message(&e) })),
        )
            .into_response()
    })
}

/// Error text safe to hand to clients (no URLs or paths)
fn public_message(error: &SourceError) -> &'static str {
    match error {
        SourceError::Unconfigured => "Dataset source not configured",
        SourceError::Network(_) | SourceError::Status(_) => "Dataset source unreachable",
        SourceError::Io(_) => "Dataset file unreadable",
        SourceError::Archive(_) | SourceError::CsvNotFound | SourceError::Csv(_) => {
            "Dataset source returned unreadable data"
        }
        SourceError::Empty => "Dataset source returned no rows",
    }
}
