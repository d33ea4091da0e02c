//! Gemini API client.
//!
//! Implements [`FileService`] over the resumable Files API and
//! [`AnalysisService`] over `streamGenerateContent` with SSE framing.

use std::time::Duration;

use async_trait::async_trait;
use mediaflow_fetch::{HttpClient, ensure_success};
use reqwest::header::{CONTENT_LENGTH, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, instrument};
use url::Url;

use super::parser::{parse_file, parse_upload, sse_text_stream};
use crate::error::ServiceError;
use crate::services::{
    AnalysisRequest, AnalysisService, FileService, MediaPart, RemoteFile, TextStream, UploadSource,
};

// ============================================================================
// Constants
// ============================================================================

/// Generative Language API base URL.
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Default analysis model.
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-goog-api-key");
const UPLOAD_PROTOCOL: HeaderName = HeaderName::from_static("x-goog-upload-protocol");
const UPLOAD_COMMAND: HeaderName = HeaderName::from_static("x-goog-upload-command");
const UPLOAD_OFFSET: HeaderName = HeaderName::from_static("x-goog-upload-offset");
const UPLOAD_LENGTH: HeaderName = HeaderName::from_static("x-goog-upload-header-content-length");
const UPLOAD_TYPE: HeaderName = HeaderName::from_static("x-goog-upload-header-content-type");
const UPLOAD_URL: &str = "x-goog-upload-url";

// ============================================================================
// Settings
// ============================================================================

/// Endpoint and model selection for the Gemini client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeminiSettings {
    /// API base URL.
    pub base_url: String,
    /// Model used for analysis.
    pub model: String,
    /// Per-request timeout in seconds; covers uploads and whole streams.
    pub request_timeout_secs: u64,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            base_url: GEMINI_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout_secs: 600,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Gemini Files + generation client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: HttpClient,
    api_key: String,
    settings: GeminiSettings,
}

impl GeminiClient {
    /// Creates a client. Requests are restricted to the base URL's host.
    pub fn new(api_key: impl Into<String>, settings: GeminiSettings) -> Result<Self, ServiceError> {
        let host = Url::parse(&settings.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| {
                ServiceError::InvalidConfig(format!("invalid Gemini base URL: {}", settings.base_url))
            })?;
        let http = HttpClient::with_timeout(Duration::from_secs(settings.request_timeout_secs))?
            .allow_domains([host]);

        Ok(Self {
            http,
            api_key: api_key.into(),
            settings,
        })
    }

    fn base(&self) -> &str {
        self.settings.base_url.trim_end_matches('/')
    }

    fn auth_headers(&self) -> Result<HeaderMap, ServiceError> {
        let mut value = HeaderValue::from_str(&self.api_key)
            .map_err(|_| ServiceError::InvalidConfig("API key contains invalid characters".into()))?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, value);
        Ok(headers)
    }

    /// Opens a resumable upload session and returns its URL.
    async fn start_upload(&self, source: &UploadSource) -> Result<String, ServiceError> {
        let mut headers = self.auth_headers()?;
        headers.insert(UPLOAD_PROTOCOL, HeaderValue::from_static("resumable"));
        headers.insert(UPLOAD_COMMAND, HeaderValue::from_static("start"));
        headers.insert(UPLOAD_LENGTH, HeaderValue::from(source.size_bytes));
        headers.insert(
            UPLOAD_TYPE,
            HeaderValue::from_str(&source.mime_type)
                .map_err(|_| ServiceError::Upload(format!("invalid MIME type {}", source.mime_type)))?,
        );

        let url = format!("{}/upload/v1beta/files", self.base());
        let body = json!({ "file": { "display_name": source.display_name } });
        let response = ensure_success(self.http.post_json(&url, headers, &body).await?).await?;

        response
            .headers()
            .get(UPLOAD_URL)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ServiceError::Upload("response carried no upload URL".into()))
    }
}

#[async_trait]
impl FileService for GeminiClient {
    #[instrument(skip_all, fields(file = %source.display_name, size = source.size_bytes))]
    async fn upload(&self, source: &UploadSource) -> Result<RemoteFile, ServiceError> {
        let upload_url = self.start_upload(source).await?;

        let file = tokio::fs::File::open(&source.path).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        let mut headers = self.auth_headers()?;
        headers.insert(CONTENT_LENGTH, HeaderValue::from(source.size_bytes));
        headers.insert(UPLOAD_OFFSET, HeaderValue::from_static("0"));
        headers.insert(UPLOAD_COMMAND, HeaderValue::from_static("upload, finalize"));

        let response = ensure_success(self.http.post_body(&upload_url, headers, body).await?).await?;
        let file = parse_upload(&response.text().await?)?;
        info!(name = %file.name, state = ?file.state, "File uploaded");
        Ok(file)
    }

    #[instrument(skip(self))]
    async fn file(&self, name: &str) -> Result<RemoteFile, ServiceError> {
        if !is_file_name(name) {
            return Err(ServiceError::InvalidResponse(format!("not a file name: {name}")));
        }
        let url = format!("{}/v1beta/{name}", self.base());
        let response = ensure_success(self.http.get(&url, self.auth_headers()?).await?).await?;
        let file = parse_file(&response.text().await?)?;
        debug!(state = ?file.state, "File state");
        Ok(file)
    }
}

#[async_trait]
impl AnalysisService for GeminiClient {
    #[instrument(skip_all, fields(model = %self.settings.model, parts = request.parts.len()))]
    async fn analyze(&self, request: AnalysisRequest) -> Result<TextStream, ServiceError> {
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base(),
            self.settings.model
        );
        let body = generate_body(&request);
        let response = ensure_success(self.http.post_json(&url, self.auth_headers()?, &body).await?).await?;
        Ok(sse_text_stream(Box::pin(response.bytes_stream())))
    }
}

/// `files/<id>` with a plain id.
fn is_file_name(name: &str) -> bool {
    name.strip_prefix("files/").is_some_and(|id| {
        !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    })
}

/// Builds the `generateContent` request body: media parts first, prompt last.
fn generate_body(request: &AnalysisRequest) -> Value {
    let mut parts: Vec<Value> = request
        .parts
        .iter()
        .map(|part| match part {
            MediaPart::Inline { mime_type, data } => {
                json!({ "inline_data": { "mime_type": mime_type, "data": data } })
            }
            MediaPart::File { mime_type, uri } => {
                json!({ "file_data": { "mime_type": mime_type, "file_uri": uri } })
            }
        })
        .collect();
    parts.push(json!({ "text": request.prompt }));

    json!({ "contents": [{ "role": "user", "parts": parts }] })
}
