//! HTTP API server.
//!
//! Exposes search and audio playback over REST for browser or other front ends.

use super::{load_retriever, resolve_limit};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::HarkError;
use crate::retriever::Retriever;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::Component;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, warn};

/// Shared application state.
pub struct AppState {
    pub retriever: Retriever,
    pub settings: Settings,
}

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    let retriever = load_retriever(&settings).await?;

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);

    let state = Arc::new(AppState { retriever, settings });
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Hark API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Index", "GET  /index");
    Output::kv("Search", "POST /search");
    Output::kv("Audio", "GET  /audio/{*path}");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the API router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/index", get(index_info))
        .route("/search", post(search))
        .route("/audio/{*path}", get(audio))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

#[derive(Serialize, Deserialize)]
pub struct SearchHit {
    pub rank: usize,
    pub id: String,
    pub text: String,
    pub audio_file: String,
    pub distance: f32,
    pub audio_available: bool,
    pub audio_url: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(e: HarkError) -> Response {
    let status = match e {
        HarkError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        HarkError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

/// Content type for an audio file, by extension.
fn audio_content_type(filename: &str) -> &'static str {
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("ogg") => "audio/ogg",
        Some("m4a") => "audio/mp4",
        _ => "application/octet-stream",
    }
}

/// Audio paths must stay inside the audio directory: relative, with no `..`
/// components. Subdirectories are allowed.
fn is_safe_relative_path(path: &str) -> bool {
    let components: Vec<_> = std::path::Path::new(path).components().collect();
    !path.contains('\\')
        && components.iter().any(|c| matches!(c, Component::Normal(_)))
        && components
            .iter()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// URL under which an audio file is served, percent-encoded per segment.
fn audio_url(audio_file: &str) -> String {
    let encoded: Vec<_> = audio_file.split('/').map(urlencoding::encode).collect();
    format!("/audio/{}", encoded.join("/"))
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn index_info(State(state): State<Arc<AppState>>) -> Response {
    match state.retriever.describe().await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => error_response(e),
    }
}

async fn search(State(state): State<Arc<AppState>>, Json(req): Json<SearchRequest>) -> Response {
    let limit = match resolve_limit(req.limit, &state.settings) {
        Ok(limit) => limit,
        Err(e) => return error_response(e),
    };

    match state.retriever.search(&req.query, limit).await {
        Ok(results) => Json(SearchResponse {
            results: results
                .into_iter()
                .enumerate()
                .map(|(i, r)| {
                    let audio_available = state
                        .retriever
                        .get_audio_path(&r.segment.audio_file)
                        .is_file();
                    SearchHit {
                        rank: i + 1,
                        audio_url: audio_url(&r.segment.audio_file),
                        id: r.segment.id,
                        text: r.segment.text,
                        audio_file: r.segment.audio_file,
                        distance: r.distance,
                        audio_available,
                    }
                })
                .collect(),
        })
        .into_response(),
        Err(e) => {
            warn!("Search failed: {}", e);
            error_response(e)
        }
    }
}

async fn audio(State(state): State<Arc<AppState>>, Path(filename): Path<String>) -> Response {
    if !is_safe_relative_path(&filename) {
        return error_response(HarkError::InvalidArgument(format!(
            "invalid audio path: {}",
            filename
        )));
    }

    let path = state.retriever.get_audio_path(&filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Serving {} ({} bytes)", path.display(), bytes.len());
            ([(header::CONTENT_TYPE, audio_content_type(&filename))], bytes).into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Audio file not found: {}", filename),
            }),
        )
            .into_response(),
        Err(e) => error_response(e.into()),
    }
}
