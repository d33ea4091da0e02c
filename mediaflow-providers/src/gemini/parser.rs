//! Gemini response parser.

use std::collections::VecDeque;

use futures::{Stream, StreamExt, stream};
use serde::Deserialize;
use tracing::debug;

use crate::error::ServiceError;
use crate::services::{FileState, RemoteFile, TextStream};

// ============================================================================
// Files
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    pub file: GeminiFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiFile {
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiStatus {
    #[serde(default)]
    pub message: String,
}

impl From<GeminiFile> for RemoteFile {
    fn from(file: GeminiFile) -> Self {
        let state = match file.state.as_deref() {
            Some("ACTIVE") => FileState::Active,
            Some("FAILED") => FileState::Failed,
            _ => FileState::Processing,
        };
        RemoteFile {
            name: file.name,
            uri: file.uri,
            mime_type: file.mime_type,
            state,
            error: file.error.map(|e| e.message).filter(|m| !m.is_empty()),
        }
    }
}

pub(crate) fn parse_upload(json_str: &str) -> Result<RemoteFile, ServiceError> {
    let response: UploadResponse = serde_json::from_str(json_str)
        .map_err(|e| ServiceError::InvalidResponse(format!("upload response: {e}")))?;
    Ok(response.file.into())
}

pub(crate) fn parse_file(json_str: &str) -> Result<RemoteFile, ServiceError> {
    let file: GeminiFile = serde_json::from_str(json_str)
        .map_err(|e| ServiceError::InvalidResponse(format!("file response: {e}")))?;
    Ok(file.into())
}

// ============================================================================
// Streamed Generation
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Parses one SSE line of a `streamGenerateContent?alt=sse` response.
///
/// Returns `None` for lines that carry no text (comments, blank lines,
/// empty deltas, the end marker).
pub(crate) fn parse_sse_line(line: &str) -> Option<Result<String, ServiceError>> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    let response: GenerateResponse = match serde_json::from_str(data) {
        Ok(r) => r,
        Err(e) => return Some(Err(ServiceError::InvalidResponse(format!("stream chunk: {e}")))),
    };

    if let Some(error) = response.error {
        return Some(Err(ServiceError::Remote {
            service: "Gemini",
            message: error.message,
        }));
    }
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Some(Err(ServiceError::Remote {
            service: "Gemini",
            message: format!("prompt blocked: {reason}"),
        }));
    }

    let candidate = response.candidates.into_iter().next()?;
    if let Some(reason) = candidate.finish_reason.as_deref() {
        if matches!(reason, "SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST") {
            return Some(Err(ServiceError::Remote {
                service: "Gemini",
                message: format!("response blocked: {reason}"),
            }));
        }
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.is_empty() { None } else { Some(Ok(text)) }
}

struct SseState<S> {
    inner: S,
    buffer: Vec<u8>,
    pending: VecDeque<Result<String, ServiceError>>,
    done: bool,
}

impl<S> SseState<S> {
    fn drain_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(item) = parse_sse_line(line.trim_end()) {
                self.pending.push_back(item);
            }
        }
    }
}

/// Turns an SSE byte stream into a stream of text deltas.
///
/// Lines are split on raw bytes so multi-byte characters that straddle chunk
/// boundaries survive. The stream ends after the first error.
pub(crate) fn sse_text_stream<S, B, E>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ServiceError> + Send + 'static,
{
    let state = SseState {
        inner: bytes,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                if item.is_err() {
                    st.pending.clear();
                    st.done = true;
                }
                return Some((item, st));
            }
            if st.done {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(chunk)) => {
                    st.buffer.extend_from_slice(chunk.as_ref());
                    st.drain_lines();
                }
                Some(Err(e)) => {
                    st.done = true;
                    st.pending.push_back(Err(e.into()));
                }
                None => {
                    debug!("Analysis stream finished");
                    st.done = true;
                    st.buffer.push(b'\n');
                    st.drain_lines();
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> String {
        format!(r#"data: {{"candidates":[{{"content":{{"parts":[{{"text":"{text}"}}],"role":"model"}}}}]}}"#)
    }

    #[test]
    fn test_parse_sse_line_text() {
        assert_eq!(parse_sse_line(&chunk("Hello")).unwrap().unwrap(), "Hello");
        assert!(parse_sse_line("").is_none());
        assert!(parse_sse_line(": keepalive").is_none());
        assert!(parse_sse_line("data: [DONE]").is_none());
    }

    #[test]
    fn test_parse_sse_line_errors() {
        let blocked = r#"data: {"promptFeedback":{"blockReason":"SAFETY"}}"#;
        assert!(parse_sse_line(blocked).unwrap().is_err());

        let remote = r#"data: {"error":{"code":429,"message":"Quota exceeded"}}"#;
        match parse_sse_line(remote).unwrap() {
            Err(ServiceError::Remote { message, .. }) => assert_eq!(message, "Quota exceeded"),
            other => panic!("unexpected {other:?}"),
        }

        assert!(parse_sse_line("data: {not json").unwrap().is_err());
    }

    #[test]
    fn test_parse_file_states() {
        let file = parse_file(
            r#"{"name":"files/abc","uri":"https://g/files/abc","mimeType":"video/mp4","state":"ACTIVE"}"#,
        )
        .unwrap();
        assert_eq!(file.state, FileState::Active);
        assert_eq!(file.name, "files/abc");

        let failed = parse_file(r#"{"name":"files/x","state":"FAILED","error":{"message":"bad codec"}}"#).unwrap();
        assert_eq!(failed.state, FileState::Failed);
        assert_eq!(failed.error.as_deref(), Some("bad codec"));

        let upload = parse_upload(r#"{"file":{"name":"files/y","uri":"u","mimeType":"audio/mpeg","state":"PROCESSING"}}"#).unwrap();
        assert_eq!(upload.state, FileState::Processing);
    }

    #[tokio::test]
    async fn test_sse_stream_reassembles_split_lines() {
        let body = format!("{}\n\n{}\n\n", chunk("Héllo "), chunk("world"));
        let bytes = body.into_bytes();
        // Split inside the multi-byte character.
        let split = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let parts: Vec<Result<Vec<u8>, ServiceError>> =
            vec![Ok(bytes[..split].to_vec()), Ok(bytes[split..].to_vec())];

        let texts: Vec<String> = sse_text_stream(stream::iter(parts))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(texts, vec!["Héllo ", "world"]);
    }

    #[tokio::test]
    async fn test_sse_stream_stops_after_error() {
        let body = format!(
            "{}\n\ndata: {{\"error\":{{\"message\":\"boom\"}}}}\n\n{}\n\n",
            chunk("a"),
            chunk("b")
        );
        let parts: Vec<Result<Vec<u8>, ServiceError>> = vec![Ok(body.into_bytes())];

        let items: Vec<_> = sse_text_stream(stream::iter(parts)).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }
}
