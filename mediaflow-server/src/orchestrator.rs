//! Request orchestration.
//!
//! The orchestrator owns the long-lived pieces (strategy executor, service
//! clients, configuration) and runs one pipeline per request against that
//! request's [`ProgressSink`]. Whatever happens inside a pipeline, [`run`]
//! emits exactly one terminal sequence: `Done`, or `Error` then `Done`.
//!
//! [`run`]: Orchestrator::run

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures::StreamExt;
use mediaflow_core::{
    ClassifyContext, ErrorClassification, ErrorKind, MIB, MediaKind, ProgressEvent, RemoteJob, Stage,
};
use mediaflow_fetch::{
    AcquireContext, AcquireSettings, AcquiredMedia, BrowserCookieImporter, CookieJar, FetchError,
    PollSettings, ProgressSink, RemoteJobPoller, RemoteJobSource, StrategyExecutor, TempResource,
    YtDlpExtractor,
};
use mediaflow_providers::{
    AnalysisRequest, AnalysisService, FileProcessingJob, FileService, GeminiClient, MediaPart,
    PlatformRegistry, ResearchClient, ResearchJob, ResearchService, ServiceError, UploadSource,
    file_uri,
};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::config::{GEMINI_API_KEY_ENV, RESEARCH_API_KEY_ENV, ServerConfig};
use crate::error::ApiError;

// ============================================================================
// Requests
// ============================================================================

/// An uploaded file already streamed into scratch storage.
#[derive(Debug)]
pub struct IncomingFile {
    /// Client-supplied file name.
    pub filename: String,
    /// Declared MIME type.
    pub mime_type: String,
    /// Scratch resource holding the bytes written so far.
    pub resource: TempResource,
    /// Bytes the client sent, including any not kept past the ceiling.
    pub size_bytes: u64,
}

/// One unit of work.
#[derive(Debug)]
pub enum OrchestrationRequest {
    /// Download media from a platform URL.
    Acquire {
        /// Platform URL.
        url: String,
        /// Optional `Cookie` header for authenticated strategies.
        cookies: Option<String>,
    },
    /// Analyze uploaded files with a prompt.
    Analyze {
        /// Uploaded files.
        files: Vec<IncomingFile>,
        /// Instruction for the model.
        prompt: String,
    },
    /// Run a research job.
    Research {
        /// Research question.
        query: String,
    },
}

impl OrchestrationRequest {
    /// Name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Acquire { .. } => "acquire",
            Self::Analyze { .. } => "analyze",
            Self::Research { .. } => "research",
        }
    }
}

type PipelineResult = Result<(), ErrorClassification>;

// ============================================================================
// Orchestrator
// ============================================================================

/// Runs acquisition, analysis and research pipelines.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<ServerConfig>,
    executor: StrategyExecutor,
    cookie_jar: Option<Arc<dyn CookieJar>>,
    files: Option<Arc<dyn FileService>>,
    analysis: Option<Arc<dyn AnalysisService>>,
    research: Option<Arc<dyn ResearchService>>,
}

impl Orchestrator {
    /// Creates an orchestrator with no remote services attached.
    pub fn new(config: Arc<ServerConfig>, executor: StrategyExecutor) -> Self {
        Self {
            config,
            executor,
            cookie_jar: None,
            files: None,
            analysis: None,
            research: None,
        }
    }

    /// Wires the production extractor, registry and clients from `config`.
    pub fn from_config(config: ServerConfig) -> Result<Self, ServiceError> {
        let config = Arc::new(config);
        let extractor = YtDlpExtractor::new(config.acquire.ytdlp_binary.clone());
        if !extractor.is_installed() {
            warn!(binary = %config.acquire.ytdlp_binary, "Extractor not found; acquisitions will fail");
        }
        let executor = StrategyExecutor::new(Arc::new(extractor), Arc::new(PlatformRegistry));
        let mut orchestrator = Self::new(Arc::clone(&config), executor);

        if config.acquire.browser_cookies {
            let importer = match config.acquire.pinned_browser() {
                Some(browser) => BrowserCookieImporter::for_browser(browser),
                None => BrowserCookieImporter::new(),
            };
            orchestrator = orchestrator.with_cookie_jar(Arc::new(importer));
        }
        if let Some(key) = &config.secrets.gemini {
            let gemini = Arc::new(GeminiClient::new(key.expose(), config.analysis.gemini.clone())?);
            orchestrator = orchestrator.with_files(gemini.clone()).with_analysis(gemini);
        } else {
            warn!("{GEMINI_API_KEY_ENV} not set; analysis and large acquisitions are unavailable");
        }
        if let Some(key) = &config.secrets.research {
            let research = ResearchClient::new(key.expose(), config.research.service.clone())?;
            orchestrator = orchestrator.with_research(Arc::new(research));
        } else {
            warn!("{RESEARCH_API_KEY_ENV} not set; research is unavailable");
        }

        Ok(orchestrator)
    }

    /// Attaches a browser cookie jar.
    #[must_use]
    pub fn with_cookie_jar(mut self, jar: Arc<dyn CookieJar>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    /// Attaches the file-processing service.
    #[must_use]
    pub fn with_files(mut self, files: Arc<dyn FileService>) -> Self {
        self.files = Some(files);
        self
    }

    /// Attaches the analysis service.
    #[must_use]
    pub fn with_analysis(mut self, analysis: Arc<dyn AnalysisService>) -> Self {
        self.analysis = Some(analysis);
        self
    }

    /// Attaches the research service.
    #[must_use]
    pub fn with_research(mut self, research: Arc<dyn ResearchService>) -> Self {
        self.research = Some(research);
        self
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Rejects requests that cannot start: malformed input or a missing key.
    ///
    /// Runs before any stream is opened so the client gets a plain JSON error.
    pub fn preflight(&self, request: &OrchestrationRequest) -> Result<(), ApiError> {
        match request {
            OrchestrationRequest::Acquire { url, .. } => {
                if url.trim().is_empty() {
                    return Err(ApiError::BadRequest("url is required".into()));
                }
            }
            OrchestrationRequest::Analyze { files, prompt } => {
                if files.is_empty() {
                    return Err(ApiError::BadRequest("at least one file is required".into()));
                }
                if prompt.trim().is_empty() {
                    return Err(ApiError::BadRequest("prompt is required".into()));
                }
                if self.files.is_none() || self.analysis.is_none() {
                    return Err(ApiError::MissingCredential(GEMINI_API_KEY_ENV));
                }
            }
            OrchestrationRequest::Research { query } => {
                if query.trim().is_empty() {
                    return Err(ApiError::BadRequest("query is required".into()));
                }
                self.research_service()?;
            }
        }
        Ok(())
    }

    /// Runs `request` to completion, emitting its events into `events`.
    ///
    /// The pipeline is bounded by its configured maximum duration; on expiry
    /// the request is cancelled and a `Timeout` error is emitted.
    #[instrument(skip_all, fields(request = request.name()))]
    pub async fn run(&self, request: OrchestrationRequest, events: ProgressSink) {
        let max_duration = self.max_duration(&request);
        let name = request.name();
        info!("Orchestration started");

        let pipeline = async {
            match request {
                OrchestrationRequest::Acquire { url, cookies } => self.acquire(&url, cookies, &events).await,
                OrchestrationRequest::Analyze { files, prompt } => self.analyze(files, prompt, &events).await,
                OrchestrationRequest::Research { query } => self.research(query, &events).await,
            }
        };

        let result = match tokio::time::timeout(max_duration, pipeline).await {
            Ok(result) => result,
            Err(_) => {
                warn!(max_secs = max_duration.as_secs(), "Orchestration exceeded its time budget");
                events.cancel_token().cancel();
                Err(
                    ErrorClassification::for_kind(ErrorKind::Timeout, &ClassifyContext::none()).with_message(
                        format!("The {name} request did not finish within {} seconds.", max_duration.as_secs()),
                    ),
                )
            }
        };

        match result {
            Ok(()) => info!("Orchestration finished"),
            Err(error) => {
                info!(kind = %error.kind, "Orchestration failed");
                events.emit(ProgressEvent::error(&error)).await;
            }
        }
        events.emit(ProgressEvent::Done).await;
    }

    /// Submits a research query without waiting for it.
    pub async fn submit_research(&self, query: &str) -> Result<String, ApiError> {
        if query.trim().is_empty() {
            return Err(ApiError::BadRequest("query is required".into()));
        }
        let service = self.research_service()?;
        let id = service.submit(query).await.map_err(FetchError::from)?;
        info!(job_id = %id, "Research submitted");
        Ok(id)
    }

    /// Polls a research job once and returns its snapshot.
    pub async fn research_status(&self, job_id: &str) -> Result<RemoteJob, ApiError> {
        if job_id.trim().is_empty() {
            return Err(ApiError::BadRequest("id is required".into()));
        }
        let service = self.research_service()?;
        let status = service.status(job_id).await.map_err(FetchError::from)?;

        let mut job = RemoteJob::new(job_id);
        job.poll_count = 1;
        job.apply(status);
        Ok(job)
    }

    fn research_service(&self) -> Result<&Arc<dyn ResearchService>, ApiError> {
        self.research
            .as_ref()
            .ok_or(ApiError::MissingCredential(RESEARCH_API_KEY_ENV))
    }

    fn max_duration(&self, request: &OrchestrationRequest) -> Duration {
        match request {
            OrchestrationRequest::Acquire { .. } => self.config.acquire_max_duration(),
            OrchestrationRequest::Analyze { .. } => self.config.analysis_max_duration(),
            OrchestrationRequest::Research { .. } => self.config.research_max_duration(),
        }
    }

    fn acquire_settings(&self) -> AcquireSettings {
        AcquireSettings {
            retry: self.config.acquire.retry.clone(),
            attempt_timeout_secs: self.config.acquire.attempt_timeout_secs,
            size_limits: self.config.limits,
            temp_root: self.config.acquire.temp_root.clone(),
        }
    }

    // ------------------------------------------------------------------------
    // Acquire
    // ------------------------------------------------------------------------

    async fn acquire(&self, url: &str, cookies: Option<String>, events: &ProgressSink) -> PipelineResult {
        let ctx = AcquireContext::builder(events.clone())
            .cookie_jar(self.cookie_jar.clone())
            .cookies(cookies)
            .settings(self.acquire_settings())
            .build();

        let outcome = self.executor.acquire(url, &ctx).await;
        debug!(attempts = outcome.attempts_count(), elapsed_ms = outcome.duration.as_millis(), "Executor returned");
        let media = outcome.result.map_err(|failure| failure.classification)?;

        let result = self.deliver(&media, events).await;
        media.resource.release();
        result
    }

    /// Emits the acquired file inline or as a processed-file reference.
    async fn deliver(&self, media: &AcquiredMedia, events: &ProgressSink) -> PipelineResult {
        let ctx = ClassifyContext::for_platform(media.platform);
        let size = media.resource.size_bytes();
        let filename = media.resource.filename().unwrap_or_default();
        let mime_type = media.media.mime_type.as_str();

        let mut payload = json!({
            "filename": filename,
            "sizeBytes": size,
            "platform": media.platform.display_name(),
            "mimeType": mime_type,
            "strategy": media.strategy_name,
        });
        if let Some(duration) = media.media.duration_seconds {
            payload["durationSeconds"] = json!(duration);
        }

        if size <= self.config.limits.inline_bytes {
            events
                .emit(ProgressEvent::progress(Stage::Preparing, format!("Encoding {filename}")))
                .await;
            let bytes = media.resource.read().await.map_err(|e| FetchError::Io(e).classify(&ctx))?;
            payload["dataUrl"] = json!(format!("data:{mime_type};base64,{}", STANDARD.encode(bytes)));
        } else {
            let Some(files) = &self.files else {
                return Err(FetchError::MissingCredential(GEMINI_API_KEY_ENV.to_string()).classify(&ctx));
            };
            let Some(path) = media.resource.path() else {
                return Err(FetchError::InvalidResponse("acquired resource has no file".into()).classify(&ctx));
            };
            events
                .emit(ProgressEvent::progress(
                    Stage::Uploading,
                    format!("Uploading {filename} ({} MB)", size / MIB),
                ))
                .await;

            let job = FileProcessingJob::new(
                Arc::clone(files),
                UploadSource {
                    path: path.to_path_buf(),
                    mime_type: mime_type.to_string(),
                    display_name: filename.clone(),
                    size_bytes: size,
                },
            );
            let uri = self.process_file(&job, events).await?;
            payload["resultRef"] = json!(uri);
        }

        events.emit(ProgressEvent::data(payload)).await;
        Ok(())
    }

    /// Uploads a file and waits until the service can use it.
    async fn process_file(&self, job: &FileProcessingJob, events: &ProgressSink) -> Result<String, ErrorClassification> {
        let poller = RemoteJobPoller::new(self.config.analysis.poll.clone());
        let outcome = poller.run(job, events).await;
        if let Some(error) = outcome.error(poller.settings()) {
            return Err(error);
        }

        outcome
            .result()
            .and_then(file_uri)
            .map(str::to_string)
            .ok_or_else(|| {
                ErrorClassification::for_kind(ErrorKind::UpstreamBroken, &ClassifyContext::none())
                    .with_message("The file service returned no file reference.")
            })
    }

    // ------------------------------------------------------------------------
    // Analyze
    // ------------------------------------------------------------------------

    async fn analyze(&self, files: Vec<IncomingFile>, prompt: String, events: &ProgressSink) -> PipelineResult {
        let result = self.analyze_files(&files, prompt, events).await;
        for file in files {
            file.resource.release();
        }
        result
    }

    async fn analyze_files(&self, files: &[IncomingFile], prompt: String, events: &ProgressSink) -> PipelineResult {
        let ctx = ClassifyContext::none();

        // Every ceiling is checked before anything leaves the server.
        let mut kinds = Vec::with_capacity(files.len());
        for file in files {
            let kind = MediaKind::from_mime(&file.mime_type)
                .ok_or_else(|| FetchError::UnsupportedMediaType(file.mime_type.clone()).classify(&ctx))?;
            let limit = self.config.limits.for_kind(kind);
            if file.size_bytes > limit {
                info!(file = %file.filename, size = file.size_bytes, limit, "Upload over size limit");
                return Err(FetchError::SizeLimitExceeded {
                    limit,
                    actual: Some(file.size_bytes),
                }
                .classify(&ctx));
            }
            kinds.push(kind);
        }

        let (Some(file_service), Some(analysis)) = (&self.files, &self.analysis) else {
            return Err(FetchError::MissingCredential(GEMINI_API_KEY_ENV.to_string()).classify(&ctx));
        };

        let mut parts = Vec::with_capacity(files.len());
        for (file, kind) in files.iter().zip(kinds) {
            if kind == MediaKind::Image {
                events
                    .emit(ProgressEvent::progress(Stage::Preparing, format!("Encoding {}", file.filename)))
                    .await;
                let bytes = file.resource.read().await.map_err(|e| FetchError::Io(e).classify(&ctx))?;
                parts.push(MediaPart::Inline {
                    mime_type: file.mime_type.clone(),
                    data: STANDARD.encode(bytes),
                });
                continue;
            }

            let Some(path) = file.resource.path() else {
                return Err(FetchError::InvalidResponse(format!("{} was not stored", file.filename)).classify(&ctx));
            };
            events
                .emit(ProgressEvent::progress(
                    Stage::Uploading,
                    format!("Uploading {} ({} MB)", file.filename, file.size_bytes / MIB),
                ))
                .await;
            let job = FileProcessingJob::new(
                Arc::clone(file_service),
                UploadSource {
                    path: path.to_path_buf(),
                    mime_type: file.mime_type.clone(),
                    display_name: file.filename.clone(),
                    size_bytes: file.size_bytes,
                },
            );
            let uri = self.process_file(&job, events).await?;
            parts.push(MediaPart::File {
                mime_type: file.mime_type.clone(),
                uri,
            });
        }

        events
            .emit(ProgressEvent::progress(
                Stage::Analyzing,
                format!("Analyzing {} file(s)", parts.len()),
            ))
            .await;
        stream_analysis(analysis.as_ref(), AnalysisRequest { prompt, parts }, events).await
    }

    // ------------------------------------------------------------------------
    // Research
    // ------------------------------------------------------------------------

    async fn research(&self, query: String, events: &ProgressSink) -> PipelineResult {
        let service = self.research_service().map_err(|e| e.classification())?;
        let job = ResearchJob::new(Arc::clone(service), query);
        drive_job(&job, self.config.research.poll.clone(), events).await
    }
}

/// Runs a job source to completion and emits its result, without `Done`.
async fn drive_job<S>(source: &S, settings: PollSettings, events: &ProgressSink) -> PipelineResult
where
    S: RemoteJobSource + ?Sized,
{
    let poller = RemoteJobPoller::new(settings);
    let outcome = poller.run(source, events).await;
    match outcome.result() {
        Some(result) if outcome.is_completed() => {
            poller.emit_completion(source, result, events).await;
            Ok(())
        }
        _ => Err(outcome.error(poller.settings()).unwrap_or_else(|| {
            ErrorClassification::for_kind(ErrorKind::UpstreamBroken, &ClassifyContext::none())
                .with_message("The job completed without a result.")
        })),
    }
}

/// Forwards analysis text as `Content` events until the stream ends.
async fn stream_analysis(
    analysis: &dyn AnalysisService,
    request: AnalysisRequest,
    events: &ProgressSink,
) -> PipelineResult {
    let ctx = ClassifyContext::none();
    let cancel = events.cancel_token();

    let started = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(FetchError::Cancelled.classify(&ctx)),
        r = analysis.analyze(request) => r,
    };
    let mut stream = started.map_err(|e| e.classify(&ctx))?;

    let mut chunks = 0usize;
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(FetchError::Cancelled.classify(&ctx)),
            next = stream.next() => next,
        };
        match next {
            None => break,
            Some(Ok(text)) => {
                chunks += 1;
                if !events.emit(ProgressEvent::content(text)).await {
                    return Err(FetchError::Cancelled.classify(&ctx));
                }
            }
            Some(Err(e)) => {
                warn!(error = %e, chunks, "Analysis stream failed");
                return Err(e.classify(&ctx));
            }
        }
    }

    debug!(chunks, "Analysis complete");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mediaflow_core::{JobStatus, Platform};
    use mediaflow_fetch::{AcquisitionStrategy, ExtractRequest, ExtractedMedia, MediaExtractor, PlanResolver, PlatformPlan};
    use mediaflow_providers::{FileState, RemoteFile, TextStream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    // -- fakes ---------------------------------------------------------------

    struct FixedPlan;

    impl PlanResolver for FixedPlan {
        fn resolve(&self, url: &str) -> Option<PlatformPlan> {
            Platform::from_url(url).map(|platform| PlatformPlan {
                platform,
                media_kind: MediaKind::Video,
                variants: vec![url.to_string()],
                strategies: vec![AcquisitionStrategy::new("test.public")],
            })
        }
    }

    struct BytesExtractor {
        size: usize,
    }

    #[async_trait]
    impl MediaExtractor for BytesExtractor {
        fn id(&self) -> &str {
            "bytes"
        }

        async fn extract(
            &self,
            _request: &ExtractRequest<'_>,
            scratch: &mut TempResource,
        ) -> Result<ExtractedMedia, FetchError> {
            scratch.write_file("clip.mp4", &vec![7u8; self.size]).await?;
            Ok(ExtractedMedia {
                title: None,
                duration_seconds: Some(12.5),
                mime_type: "video/mp4".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct CountingFiles {
        uploads: AtomicUsize,
    }

    #[async_trait]
    impl FileService for CountingFiles {
        async fn upload(&self, source: &UploadSource) -> Result<RemoteFile, ServiceError> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            Ok(RemoteFile {
                name: "files/abc".into(),
                uri: "https://files.example/abc".into(),
                mime_type: source.mime_type.clone(),
                state: FileState::Processing,
                error: None,
            })
        }

        async fn file(&self, name: &str) -> Result<RemoteFile, ServiceError> {
            Ok(RemoteFile {
                name: name.into(),
                uri: "https://files.example/abc".into(),
                mime_type: "video/mp4".into(),
                state: FileState::Active,
                error: None,
            })
        }
    }

    #[derive(Default)]
    struct EchoAnalysis {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AnalysisService for EchoAnalysis {
        async fn analyze(&self, request: AnalysisRequest) -> Result<TextStream, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let items = vec![Ok(format!("{} part(s)", request.parts.len())), Ok(" done".to_string())];
            Ok(futures::stream::iter(items).boxed())
        }
    }

    struct SlowResearch;

    #[async_trait]
    impl ResearchService for SlowResearch {
        async fn submit(&self, _query: &str) -> Result<String, ServiceError> {
            Ok("abc".into())
        }

        async fn status(&self, _job_id: &str) -> Result<JobStatus, ServiceError> {
            Ok(JobStatus::processing())
        }
    }

    fn config(dir: &std::path::Path) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.acquire.temp_root = dir.to_path_buf();
        config.acquire.browser_cookies = false;
        config
    }

    fn orchestrator(config: ServerConfig, size: usize) -> Orchestrator {
        Orchestrator::new(
            Arc::new(config),
            StrategyExecutor::new(Arc::new(BytesExtractor { size }), Arc::new(FixedPlan)),
        )
    }

    async fn collect(orch: &Orchestrator, request: OrchestrationRequest) -> Vec<ProgressEvent> {
        let (sink, mut rx) = ProgressSink::channel(256, CancellationToken::new());
        orch.run(request, sink).await;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn terminal_count(events: &[ProgressEvent]) -> usize {
        events.iter().filter(|e| matches!(e, ProgressEvent::Done)).count()
    }

    fn entries(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).map(Iterator::count).unwrap_or(0)
    }

    // -- acquire -------------------------------------------------------------

    #[tokio::test]
    async fn test_small_acquisition_is_inlined() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(config(dir.path()), 3);

        let events = collect(
            &orch,
            OrchestrationRequest::Acquire {
                url: "https://www.youtube.com/watch?v=x".into(),
                cookies: None,
            },
        )
        .await;

        let payload = events
            .iter()
            .find_map(|e| match e {
                ProgressEvent::Data { payload } => Some(payload.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(payload["dataUrl"], "data:video/mp4;base64,BwcH");
        assert_eq!(payload["sizeBytes"], 3);
        assert_eq!(payload["platform"], "YouTube");
        assert_eq!(payload["strategy"], "test.public");
        assert_eq!(payload["durationSeconds"], 12.5);
        assert_eq!(events.last(), Some(&ProgressEvent::Done));
        assert_eq!(terminal_count(&events), 1);
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_large_acquisition_is_uploaded() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.limits.inline_bytes = 2;
        let files = Arc::new(CountingFiles::default());
        let orch = orchestrator(config, 3).with_files(files.clone());

        let events = collect(
            &orch,
            OrchestrationRequest::Acquire {
                url: "https://www.youtube.com/watch?v=x".into(),
                cookies: None,
            },
        )
        .await;

        let payload = events
            .iter()
            .find_map(|e| match e {
                ProgressEvent::Data { payload } if payload.get("resultRef").is_some() => Some(payload.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(payload["resultRef"], "https://files.example/abc");
        assert!(payload.get("dataUrl").is_none());
        assert_eq!(files.uploads.load(Ordering::SeqCst), 1);
        assert_eq!(terminal_count(&events), 1);
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_unsupported_url_yields_error_then_done() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(config(dir.path()), 3);

        let events = collect(
            &orch,
            OrchestrationRequest::Acquire {
                url: "https://example.com/video".into(),
                cookies: None,
            },
        )
        .await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].error_kind(), Some(ErrorKind::UnsupportedPlatform));
        assert_eq!(events[1], ProgressEvent::Done);
    }

    // -- analyze -------------------------------------------------------------

    async fn incoming(dir: &std::path::Path, name: &str, mime: &str, bytes: &[u8], reported: u64) -> IncomingFile {
        let mut resource = TempResource::create_in(dir, "upload").unwrap();
        resource.write_file(name, bytes).await.unwrap();
        IncomingFile {
            filename: name.into(),
            mime_type: mime.into(),
            resource,
            size_bytes: reported,
        }
    }

    #[tokio::test]
    async fn test_oversized_upload_fails_before_any_remote_call() {
        let dir = tempfile::tempdir().unwrap();
        let files = Arc::new(CountingFiles::default());
        let analysis = Arc::new(EchoAnalysis::default());
        let orch = orchestrator(config(dir.path()), 0)
            .with_files(files.clone())
            .with_analysis(analysis.clone());

        let small = incoming(dir.path(), "a.png", "image/png", b"png", 3).await;
        let big = incoming(dir.path(), "b.png", "image/png", b"partial", 25 * MIB).await;
        let events = collect(
            &orch,
            OrchestrationRequest::Analyze {
                files: vec![small, big],
                prompt: "describe".into(),
            },
        )
        .await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].error_kind(), Some(ErrorKind::SizeLimitExceeded));
        assert_eq!(events[1], ProgressEvent::Done);
        assert_eq!(files.uploads.load(Ordering::SeqCst), 0);
        assert_eq!(analysis.calls.load(Ordering::SeqCst), 0);
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_analysis_streams_content() {
        let dir = tempfile::tempdir().unwrap();
        let files = Arc::new(CountingFiles::default());
        let orch = orchestrator(config(dir.path()), 0)
            .with_files(files.clone())
            .with_analysis(Arc::new(EchoAnalysis::default()));

        let image = incoming(dir.path(), "a.png", "image/png", b"png", 3).await;
        let video = incoming(dir.path(), "b.mp4", "video/mp4", b"mp4", 3).await;
        let events = collect(
            &orch,
            OrchestrationRequest::Analyze {
                files: vec![image, video],
                prompt: "describe".into(),
            },
        )
        .await;

        let content: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Content { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(content, vec!["2 part(s)", " done"]);
        // Only the video goes through the file service.
        assert_eq!(files.uploads.load(Ordering::SeqCst), 1);
        assert_eq!(events.last(), Some(&ProgressEvent::Done));
        assert!(events.iter().all(|e| e.error_kind().is_none()));
    }

    // -- research / preflight --------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_pipeline_budget_emits_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.research.max_duration_secs = 30;
        let orch = orchestrator(config, 0).with_research(Arc::new(SlowResearch));

        let (sink, mut rx) = ProgressSink::channel(256, CancellationToken::new());
        let cancel = sink.cancel_token().clone();
        orch.run(OrchestrationRequest::Research { query: "q".into() }, sink).await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        let n = events.len();
        assert_eq!(events[n - 2].error_kind(), Some(ErrorKind::Timeout));
        assert_eq!(events[n - 1], ProgressEvent::Done);
        assert_eq!(terminal_count(&events), 1);
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_preflight_requires_keys_and_input() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(config(dir.path()), 0);

        assert!(matches!(
            orch.preflight(&OrchestrationRequest::Research { query: "q".into() }),
            Err(ApiError::MissingCredential(RESEARCH_API_KEY_ENV))
        ));
        assert!(matches!(
            orch.preflight(&OrchestrationRequest::Acquire {
                url: " ".into(),
                cookies: None
            }),
            Err(ApiError::BadRequest(_))
        ));
        assert!(
            orch.preflight(&OrchestrationRequest::Acquire {
                url: "https://youtu.be/x".into(),
                cookies: None
            })
            .is_ok()
        );
    }

    #[tokio::test]
    async fn test_research_status_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(config(dir.path()), 0).with_research(Arc::new(SlowResearch));

        let job = orch.research_status("abc").await.unwrap();
        assert_eq!(job.id, "abc");
        assert_eq!(job.poll_count, 1);
        assert!(!job.is_terminal());
    }
}
