//! The error taxonomy for mediaflow.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Error Kind
// ============================================================================

/// Closed taxonomy of failures surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No strategy table exists for the URL's host.
    UnsupportedPlatform,
    /// The remote wants a signed-in session.
    AuthRequired,
    /// A usage quota is exhausted.
    QuotaExceeded,
    /// Too many requests in a short window.
    RateLimited,
    /// An attempt or the whole operation ran out of time.
    Timeout,
    /// The remote extractor or service is structurally failing.
    UpstreamBroken,
    /// Access was refused.
    Forbidden,
    /// The resource does not exist.
    NotFound,
    /// No usable media format was offered.
    UnsupportedFormat,
    /// The resource is larger than the configured ceiling.
    SizeLimitExceeded,
    /// The caller stopped the operation.
    Cancelled,
    /// Anything not matched by a rule.
    Unknown,
}

impl ErrorKind {
    /// Returns a stable snake_case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedPlatform => "unsupported_platform",
            Self::AuthRequired => "auth_required",
            Self::QuotaExceeded => "quota_exceeded",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::UpstreamBroken => "upstream_broken",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::UnsupportedFormat => "unsupported_format",
            Self::SizeLimitExceeded => "size_limit_exceeded",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }

    /// Default HTTP status suggested for this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::UnsupportedPlatform | Self::UnsupportedFormat => 400,
            Self::AuthRequired | Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Timeout => 408,
            Self::SizeLimitExceeded => 413,
            Self::QuotaExceeded | Self::RateLimited => 429,
            Self::Cancelled => 499,
            Self::UpstreamBroken => 503,
            Self::Unknown => 500,
        }
    }

    /// Whether a failure of this kind is worth retrying locally.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::QuotaExceeded | Self::RateLimited | Self::Timeout | Self::Unknown
        )
    }

    /// Whether this failure rules out every other strategy for the same URL.
    ///
    /// A structurally broken extractor fails the same way no matter which
    /// headers or credentials a strategy supplies.
    pub fn abandons_variant(&self) -> bool {
        matches!(self, Self::UpstreamBroken | Self::UnsupportedPlatform)
    }

    /// Whether this failure ends the whole operation regardless of strategy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SizeLimitExceeded | Self::Cancelled)
    }

    /// Returns all variants.
    pub fn all() -> &'static [ErrorKind] {
        &[
            Self::UnsupportedPlatform,
            Self::AuthRequired,
            Self::QuotaExceeded,
            Self::RateLimited,
            Self::Timeout,
            Self::UpstreamBroken,
            Self::Forbidden,
            Self::NotFound,
            Self::UnsupportedFormat,
            Self::SizeLimitExceeded,
            Self::Cancelled,
            Self::Unknown,
        ]
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
