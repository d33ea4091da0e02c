//! Background response parser.

use mediaflow_core::JobStatus;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::ServiceError;

#[derive(Debug, Deserialize)]
struct ResponseObject {
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(default)]
    incomplete_details: Option<IncompleteDetails>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    content: Vec<ContentItem>,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    annotations: Vec<Annotation>,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct IncompleteDetails {
    #[serde(default)]
    reason: String,
}

fn parse_object(json_str: &str) -> Result<ResponseObject, ServiceError> {
    serde_json::from_str(json_str)
        .map_err(|e| ServiceError::InvalidResponse(format!("research response: {e}")))
}

/// Extracts the job id from a submission response.
pub(crate) fn parse_submission(json_str: &str) -> Result<String, ServiceError> {
    let object = parse_object(json_str)?;
    if object.id.is_empty() {
        return Err(ServiceError::InvalidResponse("research response has no id".into()));
    }
    Ok(object.id)
}

/// Maps a response object onto a job status.
///
/// Completed payloads are `{"id", "text", "citations": [{"url", "title"}]}`.
pub(crate) fn parse_status(json_str: &str) -> Result<JobStatus, ServiceError> {
    let object = parse_object(json_str)?;
    debug!(id = %object.id, status = %object.status, "Research status");

    let status = match object.status.as_str() {
        "completed" => {
            let (text, citations) = collect_output(&object.output);
            JobStatus::completed(json!({ "id": object.id, "text": text, "citations": citations }))
        }
        "failed" => JobStatus::failed(
            object
                .error
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "research failed".to_string()),
        ),
        "incomplete" => JobStatus::failed(format!(
            "research incomplete: {}",
            object.incomplete_details.map(|d| d.reason).unwrap_or_default()
        )),
        "cancelled" => JobStatus::failed("research was cancelled upstream"),
        _ => JobStatus::processing(),
    };
    Ok(status)
}

fn collect_output(output: &[OutputItem]) -> (String, Vec<Value>) {
    let mut text = String::new();
    let mut citations = Vec::new();

    for item in output.iter().filter(|i| i.kind == "message") {
        for content in item.content.iter().filter(|c| c.kind == "output_text") {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(&content.text);
            citations.extend(
                content
                    .annotations
                    .iter()
                    .filter(|a| a.kind == "url_citation")
                    .filter_map(|a| {
                        let url = a.url.as_ref()?;
                        Some(json!({ "url": url, "title": a.title.clone().unwrap_or_default() }))
                    }),
            );
        }
    }
    (text, citations)
}

/// Splits research text into paragraphs.
pub fn paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaflow_core::JobState;

    const COMPLETED: &str = r#"{
        "id": "resp_abc",
        "status": "completed",
        "output": [
            {"type": "web_search_call", "status": "completed"},
            {"type": "message", "content": [
                {"type": "output_text", "text": "First finding.\n\nSecond finding.",
                 "annotations": [
                    {"type": "url_citation", "url": "https://example.org/a", "title": "A"},
                    {"type": "file_citation"}
                 ]}
            ]}
        ]
    }"#;

    #[test]
    fn test_parse_completed() {
        let status = parse_status(COMPLETED).unwrap();
        assert_eq!(status.state, JobState::Completed);
        let result = status.result.unwrap();
        assert_eq!(result["text"], "First finding.\n\nSecond finding.");
        assert_eq!(result["citations"].as_array().unwrap().len(), 1);
        assert_eq!(result["citations"][0]["url"], "https://example.org/a");
    }

    #[test]
    fn test_parse_running_states() {
        for status in ["queued", "in_progress", ""] {
            let json = format!(r#"{{"id":"r","status":"{status}"}}"#);
            assert_eq!(parse_status(&json).unwrap().state, JobState::Processing);
        }
    }

    #[test]
    fn test_parse_failed() {
        let status = parse_status(r#"{"id":"r","status":"failed","error":{"message":"quota exceeded"}}"#).unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.error.as_deref(), Some("quota exceeded"));

        let status = parse_status(r#"{"id":"r","status":"incomplete","incomplete_details":{"reason":"max_output_tokens"}}"#).unwrap();
        assert_eq!(status.error.as_deref(), Some("research incomplete: max_output_tokens"));
    }

    #[test]
    fn test_parse_submission() {
        assert_eq!(parse_submission(r#"{"id":"resp_1","status":"queued"}"#).unwrap(), "resp_1");
        assert!(parse_submission(r#"{"status":"queued"}"#).is_err());
    }

    #[test]
    fn test_paragraphs() {
        assert_eq!(paragraphs("a\n\n\n\n b \n\nc"), vec!["a", "b", "c"]);
        assert!(paragraphs("  ").is_empty());
    }
}
