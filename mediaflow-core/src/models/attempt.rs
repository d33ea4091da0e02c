//! Acquisition attempt records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reference to a materialized resource produced by a winning attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    /// File name of the materialized resource.
    pub filename: String,
    /// Size on disk.
    pub size_bytes: u64,
}

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The attempt produced the resource.
    Success(ResourceRef),
    /// The attempt failed in a way worth retrying.
    RetryableFailure(String),
    /// The attempt failed in a way retrying cannot fix.
    FatalFailure(String),
}

/// Record of one execution of one strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    /// Strategy that ran.
    pub strategy_name: String,
    /// URL variant the strategy ran against.
    pub url_variant: String,
    /// 1-based attempt number within the strategy.
    pub attempt_number: u32,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
    /// How long the attempt took.
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    /// How the attempt ended.
    pub outcome: AttemptOutcome,
}

impl Attempt {
    /// Returns true if the attempt produced the resource.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success(_))
    }

    /// Returns the failure reason, if any.
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            AttemptOutcome::Success(_) => None,
            AttemptOutcome::RetryableFailure(reason) | AttemptOutcome::FatalFailure(reason) => {
                Some(reason)
            }
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
