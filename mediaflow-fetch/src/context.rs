//! Acquisition context handed to the executor.
//!
//! The context bundles the per-request pieces (client cookies, event sink,
//! cancellation) with the per-server ones (cookie jar, settings).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mediaflow_core::{MIB, MediaKind};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::host::browser::CookieJar;
use crate::progress::ProgressSink;
use crate::retry::RetryPolicy;

// ============================================================================
// Size Limits
// ============================================================================

/// Byte ceilings per media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SizeLimits {
    /// Ceiling for images.
    pub image_bytes: u64,
    /// Ceiling for audio.
    pub audio_bytes: u64,
    /// Ceiling for video.
    pub video_bytes: u64,
    /// Payloads at or below this size are inlined instead of uploaded.
    pub inline_bytes: u64,
}

impl SizeLimits {
    /// Ceiling for the given kind.
    pub fn for_kind(&self, kind: MediaKind) -> u64 {
        match kind {
            MediaKind::Image => self.image_bytes,
            MediaKind::Audio => self.audio_bytes,
            MediaKind::Video => self.video_bytes,
        }
    }
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            image_bytes: MediaKind::Image.default_max_bytes(),
            audio_bytes: MediaKind::Audio.default_max_bytes(),
            video_bytes: MediaKind::Video.default_max_bytes(),
            inline_bytes: 20 * MIB,
        }
    }
}

// ============================================================================
// Acquire Settings
// ============================================================================

/// Server-wide acquisition settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AcquireSettings {
    /// Attempts and backoff per strategy.
    pub retry: RetryPolicy,
    /// Upper bound for a single extractor run, in seconds.
    pub attempt_timeout_secs: u64,
    /// Byte ceilings.
    pub size_limits: SizeLimits,
    /// Directory under which scratch resources are created.
    pub temp_root: PathBuf,
}

impl AcquireSettings {
    /// Upper bound for a single extractor run.
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

impl Default for AcquireSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            attempt_timeout_secs: 300,
            size_limits: SizeLimits::default(),
            temp_root: std::env::temp_dir().join("mediaflow"),
        }
    }
}

// ============================================================================
// Acquire Context
// ============================================================================

/// Everything one acquisition needs besides the plan itself.
#[derive(Clone)]
pub struct AcquireContext {
    /// Stored browser cookies, when the server has a profile to read.
    pub cookie_jar: Option<Arc<dyn CookieJar>>,
    /// Cookie header supplied with this request; never persisted.
    pub cookies: Option<String>,
    /// Settings.
    pub settings: AcquireSettings,
    /// Event sink for this request.
    pub events: ProgressSink,
}

impl AcquireContext {
    /// Creates a builder around the request's event sink.
    pub fn builder(events: ProgressSink) -> AcquireContextBuilder {
        AcquireContextBuilder::new(events)
    }

    /// Cancellation token of the request.
    pub fn cancel(&self) -> &CancellationToken {
        self.events.cancel_token()
    }

    /// True if a usable cookie jar is attached.
    pub fn has_cookie_jar(&self) -> bool {
        self.cookie_jar.as_ref().is_some_and(|jar| jar.is_available())
    }
}

impl std::fmt::Debug for AcquireContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquireContext")
            .field("cookie_jar", &self.cookie_jar.is_some())
            .field("cookies", &self.cookies.as_ref().map(|_| "<redacted>"))
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Acquire Context Builder
// ============================================================================

/// Builder for constructing an [`AcquireContext`].
pub struct AcquireContextBuilder {
    cookie_jar: Option<Arc<dyn CookieJar>>,
    cookies: Option<String>,
    settings: AcquireSettings,
    events: ProgressSink,
}

impl AcquireContextBuilder {
    /// Creates a new builder.
    pub fn new(events: ProgressSink) -> Self {
        Self {
            cookie_jar: None,
            cookies: None,
            settings: AcquireSettings::default(),
            events,
        }
    }

    /// Sets the cookie jar.
    #[must_use]
    pub fn cookie_jar(mut self, jar: Option<Arc<dyn CookieJar>>) -> Self {
        self.cookie_jar = jar;
        self
    }

    /// Sets the request's cookie header. Blank values count as absent.
    #[must_use]
    pub fn cookies(mut self, cookies: Option<String>) -> Self {
        self.cookies = cookies.filter(|c| !c.trim().is_empty());
        self
    }

    /// Sets the settings.
    #[must_use]
    pub fn settings(mut self, settings: AcquireSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.settings.retry = retry;
        self
    }

    /// Sets the scratch root.
    #[must_use]
    pub fn temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.settings.temp_root = root.into();
        self
    }

    /// Builds the context.
    pub fn build(self) -> AcquireContext {
        AcquireContext {
            cookie_jar: self.cookie_jar,
            cookies: self.cookies,
            settings: self.settings,
            events: self.events,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let (sink, _rx) = ProgressSink::channel(1, CancellationToken::new());
        let ctx = AcquireContext::builder(sink)
            .cookies(Some("  ".to_string()))
            .retry(RetryPolicy::new(5))
            .temp_root("/tmp/mf-test")
            .build();

        assert!(ctx.cookies.is_none());
        assert!(!ctx.has_cookie_jar());
        assert_eq!(ctx.settings.retry.max_attempts, 5);
        assert_eq!(ctx.settings.temp_root, PathBuf::from("/tmp/mf-test"));
    }

    #[test]
    fn test_debug_redacts_cookies() {
        let (sink, _rx) = ProgressSink::channel(1, CancellationToken::new());
        let ctx = AcquireContext::builder(sink)
            .cookies(Some("SID=secret".to_string()))
            .build();
        let debug = format!("{ctx:?}");
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_default_limits() {
        let limits = SizeLimits::default();
        assert_eq!(limits.for_kind(MediaKind::Image), 20 * MIB);
        assert_eq!(limits.for_kind(MediaKind::Video), 1024 * MIB);
        assert_eq!(limits.inline_bytes, 20 * MIB);
    }
}
