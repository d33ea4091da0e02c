use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use mediaflow_core::{JobStatus, MIB};
use mediaflow_fetch::{
    ExtractRequest, ExtractedMedia, FetchError, MediaExtractor, StrategyExecutor, TempResource,
};
use mediaflow_providers::{
    AnalysisRequest, AnalysisService, FileService, PlatformRegistry, RemoteFile, ResearchService,
    ServiceError, TextStream, UploadSource,
};
use mediaflow_server::{Orchestrator, ServerConfig, build_router};
use serde_json::{Value, json};
use tower::ServiceExt;

// ============================================================================
// Fakes
// ============================================================================

struct NoExtractor;

#[async_trait]
impl MediaExtractor for NoExtractor {
    fn id(&self) -> &str {
        "none"
    }

    async fn extract(
        &self,
        _request: &ExtractRequest<'_>,
        _scratch: &mut TempResource,
    ) -> Result<ExtractedMedia, FetchError> {
        Err(FetchError::Extractor("unreachable in these tests".into()))
    }
}

#[derive(Default)]
struct Calls {
    uploads: AtomicUsize,
    analyses: AtomicUsize,
}

struct CountingGemini(Arc<Calls>);

#[async_trait]
impl FileService for CountingGemini {
    async fn upload(&self, _source: &UploadSource) -> Result<RemoteFile, ServiceError> {
        self.0.uploads.fetch_add(1, Ordering::SeqCst);
        Err(ServiceError::Upload("not expected".into()))
    }

    async fn file(&self, _name: &str) -> Result<RemoteFile, ServiceError> {
        Err(ServiceError::Upload("not expected".into()))
    }
}

#[async_trait]
impl AnalysisService for CountingGemini {
    async fn analyze(&self, _request: AnalysisRequest) -> Result<TextStream, ServiceError> {
        self.0.analyses.fetch_add(1, Ordering::SeqCst);
        Err(ServiceError::InvalidResponse("not expected".into()))
    }
}

struct ScriptedResearch {
    statuses: Mutex<VecDeque<JobStatus>>,
}

impl ScriptedResearch {
    fn abc() -> Self {
        Self {
            statuses: Mutex::new(VecDeque::from([
                JobStatus::processing(),
                JobStatus::processing(),
                JobStatus::completed(json!({
                    "id": "abc",
                    "text": "First finding.\n\nSecond finding.",
                    "citations": []
                })),
            ])),
        }
    }
}

#[async_trait]
impl ResearchService for ScriptedResearch {
    async fn submit(&self, _query: &str) -> Result<String, ServiceError> {
        Ok("abc".to_string())
    }

    async fn status(&self, _job_id: &str) -> Result<JobStatus, ServiceError> {
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(JobStatus::processing))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn base_orchestrator(temp_root: &std::path::Path) -> Orchestrator {
    let mut config = ServerConfig::default();
    config.acquire.temp_root = temp_root.to_path_buf();
    config.acquire.browser_cookies = false;
    Orchestrator::new(
        Arc::new(config),
        StrategyExecutor::new(Arc::new(NoExtractor), Arc::new(PlatformRegistry)),
    )
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.expect("router should respond");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    (status, String::from_utf8(bytes.to_vec()).expect("utf-8 body"))
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builder should not fail")
}

/// JSON payloads of all `data:` lines except the sentinel.
fn frames(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .filter(|data| *data != "[DONE]")
        .map(|data| serde_json::from_str(data).expect("frame must be JSON"))
        .collect()
}

fn types(frames: &[Value]) -> Vec<&str> {
    frames.iter().map(|f| f["type"].as_str().unwrap_or("?")).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_healthz_returns_ok_json() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(base_orchestrator(dir.path()));

    let request = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_oversized_image_is_rejected_before_any_service_call() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(Calls::default());
    let gemini = Arc::new(CountingGemini(Arc::clone(&calls)));
    let app = build_router(
        base_orchestrator(dir.path())
            .with_files(gemini.clone())
            .with_analysis(gemini),
    );

    let boundary = "mediaflow-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"prompt\"\r\n\r\nDescribe it\r\n\
             --{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"big.png\"\r\n\
             Content-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend(std::iter::repeat_n(0u8, usize::try_from(25 * MIB).unwrap()));
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let request = Request::builder()
        .method("POST")
        .uri("/process-and-analyze")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    let frames = frames(&body);
    assert_eq!(types(&frames), vec!["error", "done"]);
    assert_eq!(frames[0]["kind"], "size_limit_exceeded");
    assert_eq!(frames[0]["httpStatus"], 413);
    assert_eq!(body.matches("data: [DONE]").count(), 1);

    assert_eq!(calls.uploads.load(Ordering::SeqCst), 0);
    assert_eq!(calls.analyses.load(Ordering::SeqCst), 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_research_job_streams_submit_poll_and_result() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(base_orchestrator(dir.path()).with_research(Arc::new(ScriptedResearch::abc())));

    let (status, body) = send(app, post_json("/submit-job", &json!({ "query": "sky colour" }))).await;
    assert_eq!(status, StatusCode::OK);

    let frames = frames(&body);
    let types = types(&frames);
    assert_eq!(
        types,
        vec!["progress", "progress", "progress", "data", "content", "content", "done"]
    );
    assert_eq!(frames[0]["stage"], "submitted");
    assert_eq!(frames[1]["stage"], "processing");
    assert_eq!(frames[2]["stage"], "processing");
    assert_eq!(frames[3]["payload"]["id"], "abc");
    assert_eq!(frames[4]["text"], "First finding.");
    assert_eq!(frames[5]["text"], "Second finding.");
    assert!(body.trim_end().ends_with("data: [DONE]"));
}

#[tokio::test]
async fn test_submit_without_stream_returns_job_id() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(base_orchestrator(dir.path()).with_research(Arc::new(ScriptedResearch::abc())));

    let (status, body) = send(
        app,
        post_json("/submit-job", &json!({ "query": "sky colour", "stream": false })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({ "jobId": "abc" }));
}

#[tokio::test]
async fn test_missing_key_is_a_json_500_before_streaming() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(base_orchestrator(dir.path()));

    let (status, body) = send(app, post_json("/submit-job", &json!({ "query": "q" }))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["kind"], "unknown");
    assert_eq!(value["retryable"], false);
    assert!(value["error"].as_str().unwrap().contains("RESEARCH_API_KEY"));
}

#[tokio::test]
async fn test_job_status_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(base_orchestrator(dir.path()).with_research(Arc::new(ScriptedResearch::abc())));

    let request = Request::builder().uri("/job-status?id=abc").body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["id"], "abc");
    assert_eq!(value["state"], "processing");
    assert_eq!(value["pollCount"], 1);
}

#[tokio::test]
async fn test_acquire_unsupported_platform_streams_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(base_orchestrator(dir.path()));

    let (status, body) = send(app, post_json("/acquire", &json!({ "url": "https://example.com/clip" }))).await;

    assert_eq!(status, StatusCode::OK);
    let frames = frames(&body);
    assert_eq!(types(&frames), vec!["error", "done"]);
    assert_eq!(frames[0]["kind"], "unsupported_platform");
    assert_eq!(frames[0]["retryable"], false);
}

#[tokio::test]
async fn test_acquire_rejects_malformed_body() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(base_orchestrator(dir.path()));

    let (status, _) = send(app, post_json("/acquire", &json!({ "link": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
