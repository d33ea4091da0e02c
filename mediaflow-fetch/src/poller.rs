//! Submit-then-poll driver for remote asynchronous jobs.
//!
//! A [`RemoteJobSource`] knows how to submit one unit of work and how to ask
//! for its status. [`RemoteJobPoller`] owns the loop around it: the poll
//! interval, the total wait budget, tolerance for transient poll errors and
//! the events the client sees while it waits.

use std::time::Duration;

use async_trait::async_trait;
use mediaflow_core::{
    ClassifyContext, ErrorClassification, ErrorKind, JobState, JobStatus, ProgressEvent, RemoteJob,
    Stage,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::error::FetchError;
use crate::progress::ProgressSink;
use crate::retry::sleep_or_cancel;

// ============================================================================
// Source Trait
// ============================================================================

/// Identifiers returned by a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Remote job identifier used for polling.
    pub job_id: String,
    /// Reference to the submitted resource, usable even if polling never confirms.
    pub resource_ref: Option<String>,
}

impl Submission {
    /// A submission with only a job id.
    pub fn job(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            resource_ref: None,
        }
    }
}

/// A remote service that runs one job asynchronously.
#[async_trait]
pub trait RemoteJobSource: Send + Sync {
    /// Short label used in progress messages ("Research", "File processing").
    fn label(&self) -> &str;

    /// Submits the work.
    async fn submit(&self) -> Result<Submission, FetchError>;

    /// Asks for the job's current status.
    async fn poll(&self, job_id: &str) -> Result<JobStatus, FetchError>;

    /// Splits a completed result into `Content` chunks.
    fn content_chunks(&self, result: &Value) -> Vec<String> {
        text_chunks(result)
    }
}

/// Default chunking: the `text` field split on whitespace.
pub fn text_chunks(result: &Value) -> Vec<String> {
    result
        .get("text")
        .and_then(Value::as_str)
        .map(|text| text.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

// ============================================================================
// Settings
// ============================================================================

/// Timing and tolerance for one kind of remote job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollSettings {
    /// Time between polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Total wait budget after submission, in milliseconds.
    pub max_total_wait_ms: u64,
    /// Consecutive failed polls tolerated before giving up.
    pub max_consecutive_poll_errors: u32,
    /// Whether exhausted poll errors complete best-effort with the submitted resource.
    pub degrade_on_poll_errors: bool,
}

impl PollSettings {
    /// Uploaded file processing: every 2 s for up to 300 s.
    pub fn media_processing() -> Self {
        Self {
            poll_interval_ms: 2_000,
            max_total_wait_ms: 300_000,
            ..Self::default()
        }
    }

    /// Deep research: every 10 s for up to 1 800 s.
    pub fn research() -> Self {
        Self {
            poll_interval_ms: 10_000,
            max_total_wait_ms: 1_800_000,
            ..Self::default()
        }
    }

    /// Time between polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Total wait budget.
    pub fn max_total_wait(&self) -> Duration {
        Duration::from_millis(self.max_total_wait_ms)
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            max_total_wait_ms: 300_000,
            max_consecutive_poll_errors: 3,
            degrade_on_poll_errors: true,
        }
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// How a poll run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollTerminal {
    /// The job completed; `degraded` when completion was inferred after poll errors.
    Completed {
        /// True when the result is the best-effort submission reference.
        degraded: bool,
    },
    /// The job or its submission failed.
    Failed(ErrorClassification),
    /// The wait budget ran out.
    TimedOut,
    /// The request was cancelled.
    Aborted,
}

/// Result of [`RemoteJobPoller::run`].
#[derive(Debug, Clone)]
pub struct PollOutcome {
    /// The job, when submission succeeded.
    pub job: Option<RemoteJob>,
    /// How the run ended.
    pub terminal: PollTerminal,
    /// Wall time of the run.
    pub duration: Duration,
}

impl PollOutcome {
    /// Returns true if the job completed.
    pub fn is_completed(&self) -> bool {
        matches!(self.terminal, PollTerminal::Completed { .. })
    }

    /// The job's result payload, when completed.
    pub fn result(&self) -> Option<&Value> {
        self.job.as_ref().and_then(|j| j.result.as_ref())
    }

    /// Classification for every terminal other than `Completed`.
    pub fn error(&self, settings: &PollSettings) -> Option<ErrorClassification> {
        let ctx = ClassifyContext::none();
        match &self.terminal {
            PollTerminal::Completed { .. } => None,
            PollTerminal::Failed(classification) => Some(classification.clone()),
            PollTerminal::TimedOut => Some(
                ErrorClassification::for_kind(ErrorKind::Timeout, &ctx).with_message(format!(
                    "The job did not finish within {} seconds.",
                    settings.max_total_wait().as_secs()
                )),
            ),
            PollTerminal::Aborted => Some(ErrorClassification::for_kind(ErrorKind::Cancelled, &ctx)),
        }
    }
}

// ============================================================================
// Poller
// ============================================================================

/// Drives a [`RemoteJobSource`] to a terminal state.
#[derive(Debug, Clone)]
pub struct RemoteJobPoller {
    settings: PollSettings,
}

impl RemoteJobPoller {
    /// Creates a poller.
    pub fn new(settings: PollSettings) -> Self {
        Self { settings }
    }

    /// The poller's settings.
    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Submits and polls until a terminal state.
    ///
    /// Emits `Progress{submitted}` after submission and one `Progress{processing}`
    /// per non-terminal poll. Terminal events are left to the caller; see
    /// [`drive`](Self::drive).
    #[instrument(skip_all, fields(source = %source.label()))]
    pub async fn run<S>(&self, source: &S, events: &ProgressSink) -> PollOutcome
    where
        S: RemoteJobSource + ?Sized,
    {
        let start = Instant::now();
        let cancel = events.cancel_token();
        let ctx = ClassifyContext::none();
        let outcome = |job: Option<RemoteJob>, terminal: PollTerminal| PollOutcome {
            job,
            terminal,
            duration: start.elapsed(),
        };

        let submitted = tokio::select! {
            biased;
            () = cancel.cancelled() => return outcome(None, PollTerminal::Aborted),
            r = source.submit() => r,
        };
        let submission = match submitted {
            Ok(submission) => submission,
            Err(FetchError::Cancelled) => return outcome(None, PollTerminal::Aborted),
            Err(e) => {
                warn!(error = %e, "Submission failed");
                return outcome(None, PollTerminal::Failed(e.classify(&ctx)));
            }
        };

        let mut job = RemoteJob::new(&submission.job_id);
        info!(job_id = %job.id, "Job submitted");
        events
            .emit(ProgressEvent::progress(
                Stage::Submitted,
                format!("{} submitted", source.label()),
            ))
            .await;

        loop {
            if sleep_or_cancel(self.settings.poll_interval(), cancel).await.is_err() {
                return outcome(Some(job), PollTerminal::Aborted);
            }

            job.poll_count += 1;
            let polled = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                r = source.poll(&job.id) => Some(r),
            };
            let Some(polled) = polled else {
                return outcome(Some(job), PollTerminal::Aborted);
            };

            match polled {
                Ok(status) => {
                    job.consecutive_error_count = 0;
                    job.apply(status);
                    match job.state {
                        JobState::Completed => {
                            info!(job_id = %job.id, polls = job.poll_count, "Job completed");
                            return outcome(Some(job), PollTerminal::Completed { degraded: false });
                        }
                        JobState::Failed => {
                            let raw = job.error.clone().unwrap_or_else(|| "remote job failed".to_string());
                            warn!(job_id = %job.id, error = %raw, "Job failed");
                            let classification = mediaflow_core::classify(&raw, &ctx);
                            return outcome(Some(job), PollTerminal::Failed(classification));
                        }
                        JobState::Created | JobState::Processing => {
                            let elapsed = start.elapsed();
                            debug!(job_id = %job.id, poll = job.poll_count, "Job still running");
                            events
                                .emit(ProgressEvent::progress_elapsed(
                                    Stage::Processing,
                                    format!("{} processing ({}s)", source.label(), elapsed.as_secs()),
                                    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                                ))
                                .await;
                        }
                    }
                }
                Err(FetchError::Cancelled) => return outcome(Some(job), PollTerminal::Aborted),
                Err(e) => {
                    job.consecutive_error_count += 1;
                    warn!(
                        job_id = %job.id,
                        consecutive = job.consecutive_error_count,
                        error = %e,
                        "Poll failed"
                    );

                    if job.consecutive_error_count >= self.settings.max_consecutive_poll_errors.max(1) {
                        if self.settings.degrade_on_poll_errors {
                            if let Some(resource_ref) = &submission.resource_ref {
                                warn!(job_id = %job.id, "Completing with submitted resource after poll errors");
                                job.complete(json!({ "resourceRef": resource_ref, "degraded": true }));
                                return outcome(Some(job), PollTerminal::Completed { degraded: true });
                            }
                        }
                        let classification = e.classify(&ctx);
                        job.fail(e.to_string());
                        return outcome(Some(job), PollTerminal::Failed(classification));
                    }
                }
            }

            if start.elapsed() >= self.settings.max_total_wait() {
                warn!(job_id = %job.id, polls = job.poll_count, "Job timed out");
                return outcome(Some(job), PollTerminal::TimedOut);
            }
        }
    }

    /// Emits `Data{payload}` followed by one `Content` per chunk.
    pub async fn emit_completion<S>(&self, source: &S, result: &Value, events: &ProgressSink)
    where
        S: RemoteJobSource + ?Sized,
    {
        events.emit(ProgressEvent::data(result.clone())).await;
        for chunk in source.content_chunks(result) {
            if !events.emit(ProgressEvent::content(chunk)).await {
                break;
            }
        }
    }

    /// Runs the job and emits its terminal sequence: completion then `Done`,
    /// or `Error` then `Done`.
    pub async fn drive<S>(&self, source: &S, events: &ProgressSink) -> PollOutcome
    where
        S: RemoteJobSource + ?Sized,
    {
        let outcome = self.run(source, events).await;
        match (outcome.is_completed(), outcome.result()) {
            (true, Some(result)) => self.emit_completion(source, result, events).await,
            _ => {
                if let Some(error) = outcome.error(&self.settings) {
                    events.emit(ProgressEvent::error(&error)).await;
                }
            }
        }
        events.emit(ProgressEvent::Done).await;
        outcome
    }
}

// ============================================================================
// Tests
// ============================================================================
