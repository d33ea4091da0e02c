//! HTTP errors returned before an event stream starts.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mediaflow_core::{ClassifyContext, ErrorClassification, ErrorKind};
use mediaflow_fetch::FetchError;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

/// Request-level failures answered with a JSON body instead of SSE.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A pipeline needs a key the server does not have.
    #[error("Missing credential: {0} is not configured")]
    MissingCredential(&'static str),

    /// The request body or query is malformed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Reading an upload or creating scratch space failed.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// A single remote call made outside a stream failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl ApiError {
    /// Classification sent to the client.
    pub fn classification(&self) -> ErrorClassification {
        let ctx = ClassifyContext::none();
        match self {
            Self::MissingCredential(name) => FetchError::MissingCredential((*name).to_string()).classify(&ctx),
            Self::BadRequest(message) => {
                let mut c = ErrorClassification::for_kind(ErrorKind::Unknown, &ctx).with_message(message.clone());
                c.http_status = 400;
                c.retryable = false;
                c.remediation = Vec::new();
                c
            }
            Self::Upload(message) => ErrorClassification::for_kind(ErrorKind::Unknown, &ctx)
                .with_message("The upload could not be stored.")
                .with_detail(message),
            Self::Fetch(e) => e.classify(&ctx),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::Upload(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let classification = self.classification();
        warn!(error = %self, kind = %classification.kind, "Request rejected");

        let status =
            StatusCode::from_u16(classification.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "error": classification.user_message,
            "kind": classification.kind,
            "remediation": classification.remediation,
            "retryable": classification.retryable,
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_is_a_500() {
        let c = ApiError::MissingCredential("GEMINI_API_KEY").classification();
        assert_eq!(c.http_status, 500);
        assert_eq!(c.kind, ErrorKind::Unknown);
        assert!(!c.retryable);
        assert!(c.user_message.contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_bad_request_status() {
        let response = ApiError::BadRequest("missing url".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_fetch_errors_keep_their_kind() {
        let c = ApiError::Fetch(FetchError::Status {
            status: 404,
            body: "not found".into(),
        })
        .classification();
        assert_eq!(c.kind, ErrorKind::NotFound);
    }
}
