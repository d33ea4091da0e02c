//! Fetch error types.

use std::time::Duration;

use mediaflow_core::{ClassifyContext, ErrorClassification, ErrorKind, classify};
use thiserror::Error;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for acquisition and remote job operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP client refused the request.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] HttpError),

    /// Upstream answered with a non-success status.
    #[error("Upstream returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (possibly truncated).
        body: String,
    },

    /// Request timed out.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Rate limited by the remote.
    #[error("Rate limited, retry after {retry_after:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after: Option<u64>,
    },

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid response from the remote.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Process error.
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    /// Browser error.
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    /// The media extractor reported a failure.
    #[error("Extractor failed: {0}")]
    Extractor(String),

    /// Resource exceeds the configured ceiling.
    #[error("Resource exceeds size limit of {limit} bytes (got {actual:?})")]
    SizeLimitExceeded {
        /// Configured ceiling.
        limit: u64,
        /// Observed size, when known.
        actual: Option<u64>,
    },

    /// No strategy table for the URL.
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Media type the pipeline cannot handle.
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// A required secret is not configured.
    #[error("Missing credential: {0} is not configured")]
    MissingCredential(String),

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,
}

impl FetchError {
    /// Returns true if this error came from cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Maps this error onto the error taxonomy.
    ///
    /// Structured variants map directly; anything carrying an opaque upstream
    /// message goes through the message classifier.
    pub fn classify(&self, ctx: &ClassifyContext) -> ErrorClassification {
        let raw = self.to_string();
        match self {
            Self::Cancelled => ErrorClassification::for_kind(ErrorKind::Cancelled, ctx),
            Self::Timeout(_) | Self::Process(ProcessError::Timeout(_)) | Self::HttpClient(HttpError::Timeout) => {
                ErrorClassification::for_kind(ErrorKind::Timeout, ctx).with_detail(&raw)
            }
            Self::RateLimited { .. } => {
                ErrorClassification::for_kind(ErrorKind::RateLimited, ctx).with_detail(&raw)
            }
            Self::AuthenticationFailed(_) => {
                ErrorClassification::for_kind(ErrorKind::AuthRequired, ctx).with_detail(&raw)
            }
            Self::SizeLimitExceeded { limit, .. } => {
                ErrorClassification::for_kind(ErrorKind::SizeLimitExceeded, ctx)
                    .with_message(format!(
                        "The file is larger than the allowed {} MB.",
                        limit / mediaflow_core::MIB
                    ))
                    .with_detail(&raw)
            }
            Self::UnsupportedPlatform(_) => {
                ErrorClassification::for_kind(ErrorKind::UnsupportedPlatform, ctx).with_detail(&raw)
            }
            Self::UnsupportedMediaType(mime) => {
                ErrorClassification::for_kind(ErrorKind::UnsupportedFormat, ctx)
                    .with_message(format!("Files of type {mime} cannot be analyzed."))
            }
            Self::MissingCredential(name) => {
                let mut c = ErrorClassification::for_kind(ErrorKind::Unknown, ctx)
                    .with_message(format!("The server is missing configuration: {name}."));
                c.retryable = false;
                c.remediation = vec![format!("Set {name} in the server environment")];
                c
            }
            Self::Process(ProcessError::NotFound(cmd)) => {
                ErrorClassification::for_kind(ErrorKind::UpstreamBroken, ctx)
                    .with_message(format!("{cmd} is not installed on the server."))
                    .with_detail(&raw)
            }
            Self::Status { status, body } => classify(body, &ctx.with_status(*status)),
            Self::Http(e) if e.is_timeout() => {
                ErrorClassification::for_kind(ErrorKind::Timeout, ctx).with_detail(&raw)
            }
            Self::Http(e) => match e.status() {
                Some(status) => classify(&raw, &ctx.with_status(status.as_u16())),
                None => classify(&raw, ctx),
            },
            _ => classify(&raw, ctx),
        }
    }
}

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Domain not allowed.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Timeout.
    #[error("Request timed out")]
    Timeout,
}

// ============================================================================
// Process Error
// ============================================================================

/// Error type for process operations.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Command not found.
    #[error("Command not found: {0}")]
    NotFound(String),

    /// Command timed out.
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Keychain Error
// ============================================================================

/// Error type for keychain operations.
#[derive(Debug, Error)]
pub enum KeychainError {
    /// Platform-specific failure.
    #[error("Keychain platform error: {0}")]
    Platform(String),

    /// Access denied by the user or policy.
    #[error("Keychain access denied")]
    AccessDenied,
}

impl From<keyring::Error> for KeychainError {
    fn from(e: keyring::Error) -> Self {
        match e {
            keyring::Error::NoStorageAccess(_) => Self::AccessDenied,
            other => Self::Platform(other.to_string()),
        }
    }
}

// ============================================================================
// Browser Error
// ============================================================================

/// Error type for browser cookie operations.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Browser not found.
    #[error("Browser not found: {0}")]
    BrowserNotFound(String),

    /// No browsers available.
    #[error("No browsers available")]
    NoBrowsersAvailable,

    /// Cookie database not found.
    #[error("Cookie database not found for {browser}: {path}")]
    DatabaseNotFound {
        /// Browser name.
        browser: String,
        /// Expected database path.
        path: String,
    },

    /// Failed to read cookies.
    #[error("Failed to read cookies: {0}")]
    ReadFailed(String),

    /// No cookies found for domain.
    #[error("No cookies found for domain: {0}")]
    NoCookiesFound(String),

    /// Cookie decryption failed.
    #[error("Cookie decryption failed: {0}")]
    DecryptionFailed(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaflow_core::Platform;

    #[test]
    fn test_structured_variants_classify_directly() {
        let ctx = ClassifyContext::for_platform(Platform::YouTube);
        assert_eq!(FetchError::Cancelled.classify(&ctx).kind, ErrorKind::Cancelled);
        assert_eq!(
            FetchError::Timeout(Duration::from_secs(1)).classify(&ctx).kind,
            ErrorKind::Timeout
        );
        let size = FetchError::SizeLimitExceeded {
            limit: 20 * mediaflow_core::MIB,
            actual: Some(25 * mediaflow_core::MIB),
        }
        .classify(&ctx);
        assert_eq!(size.kind, ErrorKind::SizeLimitExceeded);
        assert!(size.user_message.contains("20 MB"));
        assert!(!size.retryable);
    }

    #[test]
    fn test_extractor_message_goes_through_table() {
        let ctx = ClassifyContext::for_platform(Platform::TikTok);
        let err = FetchError::Extractor("ERROR: [TikTok] 7300: Cannot parse data".to_string());
        assert_eq!(err.classify(&ctx).kind, ErrorKind::UpstreamBroken);
    }

    #[test]
    fn test_status_uses_body_then_code() {
        let ctx = ClassifyContext::none();
        let err = FetchError::Status {
            status: 429,
            body: "slow down".to_string(),
        };
        assert_eq!(err.classify(&ctx).kind, ErrorKind::RateLimited);

        let err = FetchError::Status {
            status: 400,
            body: "Quota exceeded".to_string(),
        };
        assert_eq!(err.classify(&ctx).kind, ErrorKind::QuotaExceeded);
    }

    #[test]
    fn test_missing_credential_is_not_retryable() {
        let c = FetchError::MissingCredential("GEMINI_API_KEY".to_string())
            .classify(&ClassifyContext::none());
        assert!(!c.retryable);
        assert!(c.user_message.contains("GEMINI_API_KEY"));
    }
}
