//! Remote service errors.

use mediaflow_core::{ClassifyContext, ErrorClassification};
use mediaflow_fetch::{FetchError, HttpError};
use thiserror::Error;

/// Errors raised by the file, analysis and research clients.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Transport or status failure.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The client was configured with an unusable value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The service answered with a body we could not use.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The service reported an error inside a successful response.
    #[error("{service} error: {message}")]
    Remote {
        /// Service label.
        service: &'static str,
        /// Message reported by the service.
        message: String,
    },

    /// Upload could not be started or finished.
    #[error("Upload failed: {0}")]
    Upload(String),
}

impl ServiceError {
    /// Maps this error onto the error taxonomy.
    pub fn classify(&self, ctx: &ClassifyContext) -> ErrorClassification {
        match self {
            Self::Fetch(e) => e.classify(ctx),
            other => mediaflow_core::classify(&other.to_string(), ctx).with_detail(&other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        Self::Fetch(FetchError::Http(err))
    }
}

impl From<HttpError> for ServiceError {
    fn from(err: HttpError) -> Self {
        Self::Fetch(FetchError::HttpClient(err))
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        Self::Fetch(FetchError::Io(err))
    }
}

impl From<ServiceError> for FetchError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Fetch(e) => e,
            other => FetchError::InvalidResponse(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaflow_core::ErrorKind;

    #[test]
    fn test_remote_error_is_classified_by_message() {
        let err = ServiceError::Remote {
            service: "Gemini",
            message: "Resource has been exhausted (e.g. check quota).".to_string(),
        };
        assert_eq!(err.classify(&ClassifyContext::none()).kind, ErrorKind::QuotaExceeded);
    }

    #[test]
    fn test_status_error_uses_status_fallback() {
        let err = ServiceError::from(FetchError::Status {
            status: 503,
            body: "backend unavailable".to_string(),
        });
        assert_eq!(err.classify(&ClassifyContext::none()).kind, ErrorKind::UpstreamBroken);
    }

    #[test]
    fn test_conversion_to_fetch_error_keeps_inner() {
        let err: FetchError = ServiceError::Fetch(FetchError::Cancelled).into();
        assert!(err.is_cancelled());
    }
}
