//! Acquisition strategy types.
//!
//! A strategy is one way of asking the extractor for a media URL: a header
//! set, a format preference, an optional extractor hint and a credential
//! source. Each platform carries an ordered list of them plus the URL
//! variants to try them against; together they form a [`PlatformPlan`].

use std::fmt;

use mediaflow_core::{MediaKind, Platform};
use serde::{Deserialize, Serialize};

// ============================================================================
// Auth Source
// ============================================================================

/// Where a strategy gets its session credentials from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthSource {
    /// Anonymous request.
    #[default]
    None,
    /// Cookie header supplied by the client with this request.
    CookieString,
    /// Cookies read from a browser profile on the server.
    BrowserCookieJar,
}

impl AuthSource {
    /// Returns the display name for this source.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::None => "anonymous",
            Self::CookieString => "request cookies",
            Self::BrowserCookieJar => "browser cookies",
        }
    }
}

impl fmt::Display for AuthSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============================================================================
// Acquisition Strategy
// ============================================================================

/// One named way of acquiring media from a platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionStrategy {
    /// Identifier, unique within its platform (e.g. `youtube.android`).
    pub name: String,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Extractor format selector.
    pub format_hint: String,
    /// Credential source.
    pub auth_source: AuthSource,
    /// Extractor-specific arguments (e.g. `youtube:player_client=android`).
    pub extractor_hint: Option<String>,
}

impl AcquisitionStrategy {
    /// Best single file, falling back to best overall.
    pub const DEFAULT_FORMAT: &'static str = "best[ext=mp4]/best";

    /// Creates an anonymous strategy with the default format.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            headers: Vec::new(),
            format_hint: Self::DEFAULT_FORMAT.to_string(),
            auth_source: AuthSource::None,
            extractor_hint: None,
        }
    }

    /// Adds a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the format selector.
    #[must_use]
    pub fn format(mut self, hint: impl Into<String>) -> Self {
        self.format_hint = hint.into();
        self
    }

    /// Sets the credential source.
    #[must_use]
    pub fn auth(mut self, source: AuthSource) -> Self {
        self.auth_source = source;
        self
    }

    /// Sets extractor arguments.
    #[must_use]
    pub fn extractor_hint(mut self, hint: impl Into<String>) -> Self {
        self.extractor_hint = Some(hint.into());
        self
    }
}

// ============================================================================
// Platform Plan
// ============================================================================

/// Everything the executor needs to acquire one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformPlan {
    /// Platform the URL belongs to.
    pub platform: Platform,
    /// Kind of media expected; selects the size ceiling.
    pub media_kind: MediaKind,
    /// URL variants in order, the original first.
    pub variants: Vec<String>,
    /// Strategies in priority order.
    pub strategies: Vec<AcquisitionStrategy>,
}

impl PlatformPlan {
    /// Creates a plan for a single URL variant.
    pub fn new(platform: Platform, url: impl Into<String>) -> Self {
        Self {
            platform,
            media_kind: MediaKind::Video,
            variants: vec![url.into()],
            strategies: Vec::new(),
        }
    }

    /// Adds a fallback URL variant, ignoring duplicates.
    #[must_use]
    pub fn variant(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        if !self.variants.contains(&url) {
            self.variants.push(url);
        }
        self
    }

    /// Appends a strategy.
    #[must_use]
    pub fn strategy(mut self, strategy: AcquisitionStrategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Sets the expected media kind.
    #[must_use]
    pub fn media_kind(mut self, kind: MediaKind) -> Self {
        self.media_kind = kind;
        self
    }

    /// Number of (variant, strategy) pairs.
    pub fn combinations(&self) -> usize {
        self.variants.len() * self.strategies.len()
    }
}

/// Maps a URL onto a plan. `None` means no platform claims the URL.
pub trait PlanResolver: Send + Sync {
    /// Resolves `url` to the platform's plan.
    fn resolve(&self, url: &str) -> Option<PlatformPlan>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_builder() {
        let s = AcquisitionStrategy::new("youtube.android")
            .extractor_hint("youtube:player_client=android")
            .header("Accept-Language", "en-US")
            .auth(AuthSource::BrowserCookieJar);

        assert_eq!(s.format_hint, AcquisitionStrategy::DEFAULT_FORMAT);
        assert_eq!(s.auth_source, AuthSource::BrowserCookieJar);
        assert_eq!(s.headers.len(), 1);
    }

    #[test]
    fn test_plan_dedups_variants() {
        let plan = PlatformPlan::new(Platform::Twitter, "https://x.com/a/status/1")
            .variant("https://twitter.com/a/status/1")
            .variant("https://x.com/a/status/1")
            .strategy(AcquisitionStrategy::new("twitter.default"));

        assert_eq!(plan.variants.len(), 2);
        assert_eq!(plan.combinations(), 2);
    }

    #[test]
    fn test_auth_source_serde() {
        let json = serde_json::to_string(&AuthSource::BrowserCookieJar).unwrap();
        assert_eq!(json, "\"browser_cookie_jar\"");
    }
}
