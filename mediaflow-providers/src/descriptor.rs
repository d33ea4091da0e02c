//! Platform descriptor system.
//!
//! A descriptor holds the static acquisition configuration for a platform:
//! - The expected media kind
//! - The ordered strategy table
//! - The URL-variant normalizer

use mediaflow_core::{MediaKind, Platform};
use mediaflow_fetch::{AcquisitionStrategy, PlatformPlan};
use url::Url;

// ============================================================================
// Platform Descriptor
// ============================================================================

/// Complete acquisition descriptor for a platform.
pub struct PlatformDescriptor {
    /// Platform identifier.
    pub id: Platform,
    /// Kind of media the platform serves.
    pub media_kind: MediaKind,
    /// Builds the strategy table in priority order.
    pub strategies: fn() -> Vec<AcquisitionStrategy>,
    /// Returns alternate spellings of a URL, most preferred first.
    pub variants: fn(&Url) -> Vec<String>,
}

impl PlatformDescriptor {
    /// Returns the display name.
    pub fn display_name(&self) -> &'static str {
        self.id.display_name()
    }

    /// Builds the plan for `url`. The original URL is always the first variant.
    pub fn plan_for(&self, url: &str) -> PlatformPlan {
        let url = url.trim();
        let mut plan = PlatformPlan::new(self.id, url).media_kind(self.media_kind);

        if let Ok(parsed) = Url::parse(url) {
            for variant in (self.variants)(&parsed) {
                plan = plan.variant(variant);
            }
        }
        for strategy in (self.strategies)() {
            plan = plan.strategy(strategy);
        }
        plan
    }
}

impl std::fmt::Debug for PlatformDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformDescriptor")
            .field("id", &self.id)
            .field("media_kind", &self.media_kind)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Shared Helpers
// ============================================================================

/// Desktop browser user agent sent by header-based strategies.
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Mobile browser user agent.
pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";

/// Returns `url` with its host replaced, or `None` if the host cannot be set.
pub(crate) fn with_host(url: &Url, host: &str) -> Option<String> {
    let mut out = url.clone();
    out.set_host(Some(host)).ok()?;
    Some(out.to_string())
}

/// Lowercased host without a trailing dot.
pub(crate) fn host_of(url: &Url) -> String {
    url.host_str()
        .unwrap_or_default()
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// Non-empty path segments.
pub(crate) fn segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default()
}
