//! Narrow interfaces to the remote AI services.
//!
//! The orchestrator only ever talks to these traits. Concrete clients live in
//! [`crate::gemini`] and [`crate::research`]; tests substitute fakes.

use std::path::PathBuf;

use async_trait::async_trait;
use futures::stream::BoxStream;
use mediaflow_core::JobStatus;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Incremental text produced by an analysis.
pub type TextStream = BoxStream<'static, Result<String, ServiceError>>;

// ============================================================================
// Files
// ============================================================================

/// A local file to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSource {
    /// Path on disk.
    pub path: PathBuf,
    /// MIME type sent with the upload.
    pub mime_type: String,
    /// Name shown by the service.
    pub display_name: String,
    /// File size.
    pub size_bytes: u64,
}

/// Processing state of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    /// Still being processed.
    Processing,
    /// Ready to be referenced.
    Active,
    /// Processing failed.
    Failed,
}

/// A file held by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Resource name used for status lookups (e.g. `files/abc123`).
    pub name: String,
    /// URI used to reference the file in analysis requests.
    pub uri: String,
    /// MIME type recorded by the service.
    pub mime_type: String,
    /// Processing state.
    pub state: FileState,
    /// Failure message, when `Failed`.
    pub error: Option<String>,
}

/// Stores files for later analysis.
#[async_trait]
pub trait FileService: Send + Sync {
    /// Uploads a file. The returned file may still be processing.
    async fn upload(&self, source: &UploadSource) -> Result<RemoteFile, ServiceError>;

    /// Looks up a previously uploaded file.
    async fn file(&self, name: &str) -> Result<RemoteFile, ServiceError>;
}

// ============================================================================
// Analysis
// ============================================================================

/// One media input of an analysis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaPart {
    /// Bytes sent inline, base64-encoded.
    Inline {
        /// MIME type.
        mime_type: String,
        /// Base64 payload.
        data: String,
    },
    /// Reference to an uploaded file.
    File {
        /// MIME type.
        mime_type: String,
        /// File URI.
        uri: String,
    },
}

/// A prompt plus the media it is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    /// User prompt.
    pub prompt: String,
    /// Media parts, in order.
    pub parts: Vec<MediaPart>,
}

/// Generates text about media.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Starts an analysis and returns its text as it is produced.
    async fn analyze(&self, request: AnalysisRequest) -> Result<TextStream, ServiceError>;
}

// ============================================================================
// Research
// ============================================================================

/// Long-running background research.
#[async_trait]
pub trait ResearchService: Send + Sync {
    /// Submits a query and returns the job id.
    async fn submit(&self, query: &str) -> Result<String, ServiceError>;

    /// Fetches the job's current status.
    async fn status(&self, job_id: &str) -> Result<JobStatus, ServiceError>;
}
