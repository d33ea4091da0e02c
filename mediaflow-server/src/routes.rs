//! HTTP routes.
//!
//! | Route | Body | Response |
//! |-------|------|----------|
//! | `POST /acquire` | `{url, cookies?}` | SSE |
//! | `POST /process-and-analyze` | multipart `file`… + `prompt` | SSE |
//! | `POST /submit-job` | `{query, stream?}` | SSE, or `{jobId}` when `stream` is false |
//! | `GET /job-status?id=` | | `RemoteJob` JSON |
//! | `GET /healthz` | | `{"status":"ok"}` |

use std::path::Path;

use axum::extract::multipart::Field;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mediaflow_core::{MIB, MediaKind, RemoteJob};
use mediaflow_fetch::extractor::mime_for_extension;
use mediaflow_fetch::{DEFAULT_EVENT_BUFFER, ProgressSink, SizeLimits, TempResource};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::bridge;
use crate::error::ApiError;
use crate::orchestrator::{IncomingFile, OrchestrationRequest, Orchestrator};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Request orchestrator.
    pub orchestrator: Orchestrator,
}

/// Builds the router for `orchestrator`.
pub fn build_router(orchestrator: Orchestrator) -> Router {
    let body_limit = request_body_limit(&orchestrator.config().limits);
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/acquire", post(acquire))
        .route("/process-and-analyze", post(process_and_analyze))
        .route("/submit-job", post(submit_job))
        .route("/job-status", get(job_status))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { orchestrator })
}

/// Hard cap on a request body: the largest per-file ceiling plus slack.
///
/// Individual files over their own ceiling are still read to the end and
/// reported as `size_limit_exceeded` in the stream.
fn request_body_limit(limits: &SizeLimits) -> usize {
    let largest = limits.image_bytes.max(limits.audio_bytes).max(limits.video_bytes);
    usize::try_from(largest.saturating_mul(2).saturating_add(16 * MIB)).unwrap_or(usize::MAX)
}

/// Starts `request` in the background and returns its event stream.
fn stream_response(orchestrator: Orchestrator, request: OrchestrationRequest) -> Response {
    let cancel = CancellationToken::new();
    let (sink, rx) = ProgressSink::channel(DEFAULT_EVENT_BUFFER, cancel.clone());
    tokio::spawn(async move {
        orchestrator.run(request, sink).await;
    });
    bridge::sse(rx, cancel).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct AcquireBody {
    url: String,
    #[serde(default)]
    cookies: Option<String>,
}

async fn acquire(
    State(state): State<AppState>,
    body: Result<Json<AcquireBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let request = OrchestrationRequest::Acquire {
        url: body.url,
        cookies: body.cookies,
    };
    state.orchestrator.preflight(&request)?;
    Ok(stream_response(state.orchestrator, request))
}

async fn process_and_analyze(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response, ApiError> {
    let config = state.orchestrator.config();
    let mut files = Vec::new();
    let mut prompt = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        match field.name() {
            Some("file") => {
                files.push(store_upload(field, &config.limits, &config.acquire.temp_root).await?);
            }
            Some("prompt") => {
                prompt = field.text().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
            }
            other => debug!(field = ?other, "Ignoring multipart field"),
        }
    }

    info!(files = files.len(), "Upload received");
    let request = OrchestrationRequest::Analyze { files, prompt };
    state.orchestrator.preflight(&request)?;
    Ok(stream_response(state.orchestrator, request))
}

/// Streams one multipart file into scratch storage.
///
/// Bytes past the kind's ceiling are counted but not written, so the
/// reported size is the client's true size.
async fn store_upload(mut field: Field<'_>, limits: &SizeLimits, temp_root: &Path) -> Result<IncomingFile, ApiError> {
    let filename = field
        .file_name()
        .and_then(|name| Path::new(name).file_name())
        .map_or_else(|| "upload.bin".to_string(), |n| n.to_string_lossy().into_owned());
    let mime_type = field
        .content_type()
        .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
        .map_or_else(
            || {
                let ext = Path::new(&filename).extension().and_then(|e| e.to_str()).unwrap_or("");
                mime_for_extension(ext).to_string()
            },
            str::to_string,
        );
    let limit = MediaKind::from_mime(&mime_type).map_or(limits.video_bytes, |kind| limits.for_kind(kind));

    let mut resource = TempResource::create_in(temp_root, "upload")?;
    let path = resource.dir().join(&filename);
    let mut out = tokio::fs::File::create(&path).await?;
    let mut size_bytes = 0u64;

    while let Some(chunk) = field.chunk().await.map_err(|e| ApiError::BadRequest(e.body_text()))? {
        size_bytes += chunk.len() as u64;
        if size_bytes <= limit {
            out.write_all(&chunk).await?;
        }
    }
    out.flush().await?;
    drop(out);
    resource.adopt(&path)?;

    debug!(file = %filename, mime = %mime_type, size_bytes, "Stored upload");
    Ok(IncomingFile {
        filename,
        mime_type,
        resource,
        size_bytes,
    })
}

#[derive(Debug, Deserialize)]
struct SubmitJobBody {
    query: String,
    #[serde(default = "default_stream")]
    stream: bool,
}

fn default_stream() -> bool {
    true
}

async fn submit_job(
    State(state): State<AppState>,
    body: Result<Json<SubmitJobBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if !body.stream {
        let job_id = state.orchestrator.submit_research(&body.query).await?;
        return Ok(Json(json!({ "jobId": job_id })).into_response());
    }

    let request = OrchestrationRequest::Research { query: body.query };
    state.orchestrator.preflight(&request)?;
    Ok(stream_response(state.orchestrator, request))
}

#[derive(Debug, Deserialize)]
struct JobStatusQuery {
    id: String,
}

async fn job_status(
    State(state): State<AppState>,
    query: Result<Query<JobStatusQuery>, QueryRejection>,
) -> Result<Json<RemoteJob>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let job = state.orchestrator.research_status(&query.id).await?;
    Ok(Json(job))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_limit_covers_largest_file() {
        let limits = SizeLimits::default();
        let limit = request_body_limit(&limits) as u64;
        assert!(limit > limits.video_bytes);
    }

    #[test]
    fn test_default_stream_is_true() {
        let body: SubmitJobBody = serde_json::from_str(r#"{"query":"q"}"#).unwrap();
        assert!(body.stream);
        let body: SubmitJobBody = serde_json::from_str(r#"{"query":"q","stream":false}"#).unwrap();
        assert!(!body.stream);
    }
}
