//! Media extractors.
//!
//! An extractor turns (URL, strategy) into a file inside a scratch
//! [`TempResource`]. The executor owns retries, size enforcement and cleanup;
//! an extractor performs exactly one attempt.

mod ytdlp;

use std::time::Duration;

use async_trait::async_trait;
use mediaflow_core::Platform;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::host::browser::Cookie;
use crate::strategy::AcquisitionStrategy;
use crate::temp::TempResource;

pub use ytdlp::YtDlpExtractor;

/// Session credentials resolved for one strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieMaterial {
    /// A raw `Cookie` header from the client.
    Header(String),
    /// Cookies read from a browser profile.
    Jar(Vec<Cookie>),
}

/// Input for one extraction attempt.
#[derive(Debug, Clone)]
pub struct ExtractRequest<'a> {
    /// URL variant being tried.
    pub url: &'a str,
    /// Platform of the URL.
    pub platform: Platform,
    /// Strategy configuration.
    pub strategy: &'a AcquisitionStrategy,
    /// Credentials, when the strategy needs them.
    pub cookies: Option<&'a CookieMaterial>,
    /// Size ceiling the extractor should enforce while downloading.
    pub max_filesize_bytes: u64,
    /// Upper bound for the attempt.
    pub timeout: Duration,
}

/// Metadata about an extracted file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedMedia {
    /// Title reported by the platform.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Duration in seconds, for audio and video.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    /// MIME type derived from the container.
    pub mime_type: String,
}

/// Performs one extraction attempt into a scratch resource.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Identifier used in logs.
    fn id(&self) -> &str;

    /// Downloads `request.url` into `scratch` and records the file on it.
    async fn extract(
        &self,
        request: &ExtractRequest<'_>,
        scratch: &mut TempResource,
    ) -> Result<ExtractedMedia, FetchError>;
}

/// MIME type for a file extension, `application/octet-stream` when unknown.
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "ogg" | "opus" => "audio/ogg",
        "wav" => "audio/wav",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}
