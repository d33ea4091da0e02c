//! Progress events streamed to clients.
//!
//! [`ProgressEvent`] is the closed set of frames an orchestration may emit.
//! The serde representation is the wire format: an internally tagged object
//! with a lowercase `type` and camelCase fields.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::classify::ErrorClassification;
use crate::error::ErrorKind;

// ============================================================================
// Stage
// ============================================================================

/// Coarse stage reported by a `Progress` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Resolving the platform and strategy table.
    Resolving,
    /// Running an acquisition strategy.
    Acquiring,
    /// Waiting before the next attempt.
    Retrying,
    /// Writing an upload to local scratch space.
    Preparing,
    /// Uploading bytes to a remote service.
    Uploading,
    /// A remote job was accepted.
    Submitted,
    /// A remote job is still running.
    Processing,
    /// A model is producing output.
    Analyzing,
}

impl Stage {
    /// Returns the wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolving => "resolving",
            Self::Acquiring => "acquiring",
            Self::Retrying => "retrying",
            Self::Preparing => "preparing",
            Self::Uploading => "uploading",
            Self::Submitted => "submitted",
            Self::Processing => "processing",
            Self::Analyzing => "analyzing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Progress Event
// ============================================================================

/// One frame of an orchestration's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ProgressEvent {
    /// Something is happening.
    Progress {
        /// Coarse stage.
        stage: Stage,
        /// Human-readable detail.
        message: String,
        /// Milliseconds since the stage began, when meaningful.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        elapsed_ms: Option<u64>,
    },
    /// A chunk of derived text output.
    Content {
        /// Text chunk.
        text: String,
    },
    /// A structured result payload.
    Data {
        /// Result payload.
        payload: serde_json::Value,
    },
    /// Terminal failure.
    Error {
        /// User-facing message.
        message: String,
        /// Classified kind.
        kind: ErrorKind,
        /// Suggested HTTP status.
        http_status: u16,
        /// Remediation hints.
        remediation: Vec<String>,
        /// Whether offering a retry makes sense.
        retryable: bool,
    },
    /// End of the logical stream.
    Done,
}

impl ProgressEvent {
    /// Creates a progress event.
    pub fn progress(stage: Stage, message: impl Into<String>) -> Self {
        Self::Progress {
            stage,
            message: message.into(),
            elapsed_ms: None,
        }
    }

    /// Creates a progress event carrying elapsed time.
    pub fn progress_elapsed(stage: Stage, message: impl Into<String>, elapsed_ms: u64) -> Self {
        Self::Progress {
            stage,
            message: message.into(),
            elapsed_ms: Some(elapsed_ms),
        }
    }

    /// Creates a content event.
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content { text: text.into() }
    }

    /// Creates a data event.
    pub fn data(payload: serde_json::Value) -> Self {
        Self::Data { payload }
    }

    /// Creates an error event from a classification.
    pub fn error(classification: &ErrorClassification) -> Self {
        Self::Error {
            message: classification.user_message.clone(),
            kind: classification.kind,
            http_status: classification.http_status,
            remediation: classification.remediation.clone(),
            retryable: classification.retryable,
        }
    }

    /// Wire name of the event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Content { .. } => "content",
            Self::Data { .. } => "data",
            Self::Error { .. } => "error",
            Self::Done => "done",
        }
    }

    /// Returns true for `Error` and `Done`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Done)
    }

    /// Returns the error kind for `Error` events.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Error { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Encodes the event as a single JSON frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_progress_wire_shape() {
        let event = ProgressEvent::progress_elapsed(Stage::Processing, "still working", 4000);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "progress",
                "stage": "processing",
                "message": "still working",
                "elapsedMs": 4000
            })
        );
    }

    #[test]
    fn test_elapsed_omitted_when_absent() {
        let frame = ProgressEvent::progress(Stage::Submitted, "ok").to_frame().unwrap();
        assert!(!frame.contains("elapsedMs"));
    }

    #[test]
    fn test_done_wire_shape() {
        let frame = ProgressEvent::Done.to_frame().unwrap();
        assert_eq!(frame, r#"{"type":"done"}"#);
    }

    #[test]
    fn test_error_wire_shape() {
        let event = ProgressEvent::Error {
            message: "Sign in required".to_string(),
            kind: ErrorKind::AuthRequired,
            http_status: 403,
            remediation: vec!["Provide cookies".to_string()],
            retryable: false,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["kind"], "auth_required");
        assert_eq!(value["httpStatus"], 403);
        assert_eq!(value["retryable"], false);
        assert!(event.is_terminal());
    }
}
