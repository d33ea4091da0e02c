//! Remote job sources backed by the service traits.
//!
//! - [`FileProcessingJob`] - upload a file, wait until the service can use it
//! - [`ResearchJob`] - submit a research query, wait for the report

use std::sync::Arc;

use async_trait::async_trait;
use mediaflow_core::JobStatus;
use mediaflow_fetch::{FetchError, RemoteJobSource, Submission};
use serde_json::{Value, json};

use crate::research::paragraphs;
use crate::services::{FileService, FileState, RemoteFile, ResearchService, UploadSource};

// ============================================================================
// File Processing
// ============================================================================

/// Upload-then-poll job for one file.
///
/// Completes with `{"name", "uri", "mimeType"}`. When polling degrades, the
/// payload is `{"resourceRef": uri, "degraded": true}`; [`file_uri`] reads
/// either shape.
pub struct FileProcessingJob {
    service: Arc<dyn FileService>,
    source: UploadSource,
}

impl FileProcessingJob {
    /// Creates a job for `source`.
    pub fn new(service: Arc<dyn FileService>, source: UploadSource) -> Self {
        Self { service, source }
    }

    /// The file this job uploads.
    pub fn source(&self) -> &UploadSource {
        &self.source
    }
}

#[async_trait]
impl RemoteJobSource for FileProcessingJob {
    fn label(&self) -> &str {
        "File processing"
    }

    async fn submit(&self) -> Result<Submission, FetchError> {
        let file = self.service.upload(&self.source).await?;
        Ok(Submission {
            job_id: file.name,
            resource_ref: Some(file.uri).filter(|u| !u.is_empty()),
        })
    }

    async fn poll(&self, job_id: &str) -> Result<JobStatus, FetchError> {
        let file = self.service.file(job_id).await?;
        Ok(file_status(file, &self.source.mime_type))
    }

    fn content_chunks(&self, _result: &Value) -> Vec<String> {
        Vec::new()
    }
}

fn file_status(file: RemoteFile, fallback_mime: &str) -> JobStatus {
    match file.state {
        FileState::Processing => JobStatus::processing(),
        FileState::Failed => JobStatus::failed(
            file.error
                .unwrap_or_else(|| "file processing failed".to_string()),
        ),
        FileState::Active => {
            let mime_type = if file.mime_type.is_empty() {
                fallback_mime.to_string()
            } else {
                file.mime_type
            };
            JobStatus::completed(json!({ "name": file.name, "uri": file.uri, "mimeType": mime_type }))
        }
    }
}

/// URI of a processed file from either completion payload.
pub fn file_uri(result: &Value) -> Option<&str> {
    result
        .get("uri")
        .or_else(|| result.get("resourceRef"))
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
}

// ============================================================================
// Research
// ============================================================================

/// Submit-then-poll research job. Content chunks are paragraphs.
pub struct ResearchJob {
    service: Arc<dyn ResearchService>,
    query: String,
}

impl ResearchJob {
    /// Creates a job for `query`.
    pub fn new(service: Arc<dyn ResearchService>, query: impl Into<String>) -> Self {
        Self {
            service,
            query: query.into(),
        }
    }
}

#[async_trait]
impl RemoteJobSource for ResearchJob {
    fn label(&self) -> &str {
        "Research"
    }

    async fn submit(&self) -> Result<Submission, FetchError> {
        let id = self.service.submit(&self.query).await?;
        Ok(Submission::job(id))
    }

    async fn poll(&self, job_id: &str) -> Result<JobStatus, FetchError> {
        Ok(self.service.status(job_id).await?)
    }

    fn content_chunks(&self, result: &Value) -> Vec<String> {
        result
            .get("text")
            .and_then(Value::as_str)
            .map(paragraphs)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use mediaflow_core::JobState;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct FakeFiles {
        states: Mutex<Vec<FileState>>,
    }

    fn remote(state: FileState) -> RemoteFile {
        RemoteFile {
            name: "files/abc".to_string(),
            uri: "https://files.example/abc".to_string(),
            mime_type: String::new(),
            state,
            error: None,
        }
    }

    #[async_trait]
    impl FileService for FakeFiles {
        async fn upload(&self, _source: &UploadSource) -> Result<RemoteFile, ServiceError> {
            Ok(remote(FileState::Processing))
        }

        async fn file(&self, _name: &str) -> Result<RemoteFile, ServiceError> {
            let state = self.states.lock().unwrap().remove(0);
            Ok(remote(state))
        }
    }

    fn source() -> UploadSource {
        UploadSource {
            path: PathBuf::from("/tmp/clip.mp4"),
            mime_type: "video/mp4".to_string(),
            display_name: "clip.mp4".to_string(),
            size_bytes: 10,
        }
    }

    #[tokio::test]
    async fn test_file_job_submission_and_poll() {
        let job = FileProcessingJob::new(
            Arc::new(FakeFiles {
                states: Mutex::new(vec![FileState::Processing, FileState::Active]),
            }),
            source(),
        );

        let submission = job.submit().await.unwrap();
        assert_eq!(submission.job_id, "files/abc");
        assert_eq!(submission.resource_ref.as_deref(), Some("https://files.example/abc"));

        assert_eq!(job.poll("files/abc").await.unwrap().state, JobState::Processing);
        let done = job.poll("files/abc").await.unwrap();
        let result = done.result.unwrap();
        assert_eq!(result["mimeType"], "video/mp4");
        assert_eq!(file_uri(&result), Some("https://files.example/abc"));
    }

    #[test]
    fn test_file_uri_reads_degraded_payload() {
        let degraded = json!({ "resourceRef": "https://files.example/x", "degraded": true });
        assert_eq!(file_uri(&degraded), Some("https://files.example/x"));
        assert_eq!(file_uri(&json!({})), None);
    }

    #[test]
    fn test_failed_file_status() {
        let mut file = remote(FileState::Failed);
        file.error = Some("unsupported codec".to_string());
        assert_eq!(file_status(file, "video/mp4").error.as_deref(), Some("unsupported codec"));
    }

    struct FakeResearch;

    #[async_trait]
    impl ResearchService for FakeResearch {
        async fn submit(&self, _query: &str) -> Result<String, ServiceError> {
            Ok("abc".to_string())
        }

        async fn status(&self, _job_id: &str) -> Result<JobStatus, ServiceError> {
            Err(ServiceError::Remote {
                service: "Research",
                message: "rate limit reached".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_research_job_chunks_paragraphs() {
        let job = ResearchJob::new(Arc::new(FakeResearch), "why is the sky blue");
        assert_eq!(job.submit().await.unwrap(), Submission::job("abc"));
        assert!(job.poll("abc").await.is_err());

        let chunks = job.content_chunks(&json!({ "text": "One.\n\nTwo." }));
        assert_eq!(chunks, vec!["One.", "Two."]);
    }
}
