#![forbid(unsafe_code)]

//! HTTP front for the video cache.
//!
//! JSON endpoints for Google Drive imports, listing and deletion, plus two
//! routes that hand cached files to the browser's video player. All cache
//! work is blocking and runs on tokio's blocking pool.

use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Path as AxumPath, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt},
    signal, task,
};
use tokio_util::io::ReaderStream;
use tracing::{error, info};
use video_cache::{
    cache::{CacheManager, CacheOutcome, CachedVideo},
    config::{DEFAULT_CONFIG_PATH, Overrides, load_settings},
    content::serving_mime,
    error::CacheError,
    logging::init_logging,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve cached videos and import them from Google Drive.")]
struct Cli {
    #[arg(
        long = "config",
        value_name = "PATH",
        default_value = DEFAULT_CONFIG_PATH,
        help = "Path to the config file"
    )]
    config: PathBuf,
    #[arg(
        long = "cache-dir",
        value_name = "PATH",
        help = "Override the cache directory (default static/videos)"
    )]
    cache_dir: Option<PathBuf>,
    #[arg(long = "host", value_name = "ADDR", help = "Address to listen on")]
    host: Option<String>,
    #[arg(short = 'p', long = "port", value_name = "PORT", help = "Port to listen on")]
    port: Option<u16>,
}

#[derive(Clone)]
struct AppState {
    cache: Arc<CacheManager>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    error: String,
    message: String,
    extra: Map<String, Value>,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            message: message.into(),
            extra: Map::new(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found", message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Server error", message)
    }

    fn with(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        let status = match &err {
            CacheError::MissingUrl
            | CacheError::InvalidUrl { .. }
            | CacheError::UnsupportedType { .. }
            | CacheError::DownloadFailed { .. }
            | CacheError::SizeExceeded { .. } => StatusCode::BAD_REQUEST,
            CacheError::NotFound { .. } => StatusCode::NOT_FOUND,
            CacheError::Network(_) | CacheError::Storage { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let mut api = Self::new(status, err.title(), err.to_string());
        if let Some(hint) = err.hint() {
            api = api.with("hint", json!(hint));
        }
        if let CacheError::UnsupportedType { detected } = &err {
            api = api
                .with("detected_type", json!(detected))
                .with("supported_types", json!(CacheError::supported_types()))
                .with("supported_extensions", json!(CacheError::supported_extensions()));
        }
        api
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = Map::new();
        body.insert("error".into(), json!(self.error));
        body.insert("message".into(), json!(self.message));
        body.extend(self.extra);
        (self.status, Json(Value::Object(body))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let settings = load_settings(
        &cli.config,
        Overrides {
            cache_dir: cli.cache_dir,
            listen_host: cli.host,
            listen_port: cli.port,
        },
    )?;

    let cache = CacheManager::from_settings(&settings).context("initializing video cache")?;
    let state = AppState {
        cache: Arc::new(cache),
    };

    let host: IpAddr = settings
        .listen_host
        .parse()
        .with_context(|| format!("parsing listen host {}", settings.listen_host))?;
    let addr = SocketAddr::new(host, settings.listen_port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!(
        cache_dir = %settings.cache_dir.display(),
        store = ?settings.store_backend,
        "API server listening on http://{}",
        addr
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/download-gdrive", post(download_from_gdrive))
        .route("/api/cached-videos", get(list_cached_videos))
        .route("/api/delete-video/{filename}", delete(delete_video))
        .route("/video/{filename}", get(serve_video))
        .route("/stream/{filename}", get(stream_video))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", err);
    }
}

#[derive(Deserialize)]
struct DownloadRequest {
    url: Option<String>,
}

/// Accepts any body; a missing or malformed one is reported as a missing URL
/// rather than an extractor rejection.
async fn download_from_gdrive(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<CacheOutcome>> {
    let url = serde_json::from_slice::<DownloadRequest>(&body)
        .ok()
        .and_then(|request| request.url)
        .filter(|url| !url.trim().is_empty())
        .ok_or(CacheError::MissingUrl)?;

    let cache = state.cache.clone();
    let outcome = task::spawn_blocking(move || cache.resolve_and_cache(&url))
        .await
        .map_err(|err| ApiError::internal(format!("task join error: {err}")))??;
    Ok(Json(outcome))
}

#[derive(Debug, Serialize)]
struct CachedVideosPayload {
    success: bool,
    count: usize,
    videos: Vec<CachedVideo>,
}

async fn list_cached_videos(State(state): State<AppState>) -> ApiResult<Json<CachedVideosPayload>> {
    let cache = state.cache.clone();
    let videos = task::spawn_blocking(move || cache.list_cached())
        .await
        .map_err(|err| ApiError::internal(format!("task join error: {err}")))??;
    Ok(Json(CachedVideosPayload {
        success: true,
        count: videos.len(),
        videos,
    }))
}

async fn delete_video(
    State(state): State<AppState>,
    AxumPath(filename): AxumPath<String>,
) -> ApiResult<Json<Value>> {
    let cache = state.cache.clone();
    let name = filename.clone();
    task::spawn_blocking(move || cache.delete_cached(&name))
        .await
        .map_err(|err| ApiError::internal(format!("task join error: {err}")))??;
    Ok(Json(json!({
        "success": true,
        "message": format!("Video {filename} deleted successfully"),
    })))
}

async fn serve_video(
    State(state): State<AppState>,
    AxumPath(filename): AxumPath<String>,
) -> ApiResult<Response> {
    let path = state.cache.video_path(&filename)?;
    stream_file(path, None).await
}

async fn stream_video(
    State(state): State<AppState>,
    AxumPath(filename): AxumPath<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let path = state.cache.video_path(&filename)?;
    stream_file(path, Some(&headers)).await
}

/// Streams a file, honouring a single `Range: bytes=` request when headers
/// are supplied.
async fn stream_file(path: PathBuf, headers: Option<&HeaderMap>) -> ApiResult<Response> {
    let mut file = File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("Video not found"))?;
    let metadata = file
        .metadata()
        .await
        .map_err(|_| ApiError::not_found("Video not found"))?;
    if !metadata.is_file() {
        return Err(ApiError::not_found("Video not found"));
    }
    let size = metadata.len();

    let range = headers
        .and_then(|headers| headers.get(header::RANGE))
        .and_then(|value| parse_range_header(value, size));

    let mut response = if let Some((start, end)) = range {
        if start >= size {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::RANGE_NOT_SATISFIABLE;
            insert_header(&mut response, header::CONTENT_RANGE, format!("bytes */{size}"));
            response
        } else {
            let end = end.min(size.saturating_sub(1));
            let length = end - start + 1;
            file.seek(std::io::SeekFrom::Start(start))
                .await
                .map_err(|err| ApiError::internal(format!("seeking video: {err}")))?;
            let stream = ReaderStream::new(file.take(length));
            let mut response = Body::from_stream(stream).into_response();
            *response.status_mut() = StatusCode::PARTIAL_CONTENT;
            insert_header(
                &mut response,
                header::CONTENT_RANGE,
                format!("bytes {start}-{end}/{size}"),
            );
            response
                .headers_mut()
                .insert(header::CONTENT_LENGTH, HeaderValue::from(length));
            response
        }
    } else {
        let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from(size));
        response
    };

    response
        .headers_mut()
        .insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    insert_header(
        &mut response,
        header::CONTENT_TYPE,
        serving_mime(&path).to_string(),
    );

    Ok(response)
}

fn insert_header(response: &mut Response, name: header::HeaderName, value: String) {
    if let Ok(value) = HeaderValue::try_from(value) {
        response.headers_mut().insert(name, value);
    }
}

fn parse_range_header(value: &HeaderValue, size: u64) -> Option<(u64, u64)> {
    let value = value.to_str().ok()?.trim();
    let range = value.strip_prefix("bytes=")?.trim();
    // Multi-range requests are served as a full response.
    if range.is_empty() || range.contains(',') {
        return None;
    }
    let (start_str, end_str) = range.split_once('-')?;
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    if start_str.is_empty() {
        // Suffix range: "-N" means last N bytes.
        let suffix_len: u64 = end_str.parse().ok()?;
        if suffix_len == 0 {
            return None;
        }
        if suffix_len >= size {
            return Some((0, size.saturating_sub(1)));
        }
        return Some((size - suffix_len, size.saturating_sub(1)));
    }

    let start: u64 = start_str.parse().ok()?;
    if end_str.is_empty() {
        // Open-ended; a start past the end is left for the caller to reject.
        return Some((start, size.saturating_sub(1).max(start)));
    }
    let end: u64 = end_str.parse().ok()?;
    if end < start {
        return None;
    }
    Some((start, end))
}
