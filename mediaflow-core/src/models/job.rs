//! Remote asynchronous job types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Job State
// ============================================================================

/// Lifecycle state of a remote job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted but not yet observed running.
    #[default]
    Created,
    /// Running server-side.
    Processing,
    /// Finished with a result.
    Completed,
    /// Finished with an error.
    Failed,
}

impl JobState {
    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

// ============================================================================
// Job Status
// ============================================================================

/// What a single poll observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Observed state.
    pub state: JobState,
    /// Result payload, present once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Remote error message, present once failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatus {
    /// Job still running.
    pub fn processing() -> Self {
        Self {
            state: JobState::Processing,
            result: None,
            error: None,
        }
    }

    /// Job finished with a payload.
    pub fn completed(result: serde_json::Value) -> Self {
        Self {
            state: JobState::Completed,
            result: Some(result),
            error: None,
        }
    }

    /// Job failed remotely.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            state: JobState::Failed,
            result: None,
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// Remote Job
// ============================================================================

/// A server-side asynchronous unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteJob {
    /// Remote job identifier.
    pub id: String,
    /// When the job was submitted.
    pub submitted_at: DateTime<Utc>,
    /// Current state.
    pub state: JobState,
    /// Result payload once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error message once failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Successful and failed polls issued so far.
    pub poll_count: u32,
    /// Poll failures since the last successful poll.
    pub consecutive_error_count: u32,
}

impl RemoteJob {
    /// Creates a freshly submitted job.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            submitted_at: Utc::now(),
            state: JobState::Created,
            result: None,
            error: None,
            poll_count: 0,
            consecutive_error_count: 0,
        }
    }

    /// Returns true once the job reached `Completed` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Applies a poll observation. Terminal jobs are left untouched.
    pub fn apply(&mut self, status: JobStatus) {
        if self.is_terminal() {
            return;
        }
        self.state = status.state;
        if status.result.is_some() {
            self.result = status.result;
        }
        if status.error.is_some() {
            self.error = status.error;
        }
    }

    /// Moves the job to `Completed` with the given payload.
    pub fn complete(&mut self, result: serde_json::Value) {
        if !self.is_terminal() {
            self.state = JobState::Completed;
            self.result = Some(result);
        }
    }

    /// Moves the job to `Failed` with the given message.
    pub fn fail(&mut self, error: impl Into<String>) {
        if !self.is_terminal() {
            self.state = JobState::Failed;
            self.error = Some(error.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terminal_state_is_final() {
        let mut job = RemoteJob::new("abc");
        job.apply(JobStatus::processing());
        assert_eq!(job.state, JobState::Processing);

        job.apply(JobStatus::completed(json!({"text": "hi"})));
        assert_eq!(job.state, JobState::Completed);

        job.apply(JobStatus::failed("late failure"));
        job.fail("also ignored");
        assert_eq!(job.state, JobState::Completed);
        assert!(job.error.is_none());
    }

    #[test]
    fn test_remote_job_wire_shape() {
        let job = RemoteJob::new("abc");
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["id"], "abc");
        assert_eq!(value["state"], "created");
        assert_eq!(value["pollCount"], 0);
        assert_eq!(value["consecutiveErrorCount"], 0);
        assert!(value.get("result").is_none());
    }
}
