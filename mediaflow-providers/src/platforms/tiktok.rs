//! TikTok descriptor.
//!
//! TikTok serves different markup to mobile and desktop agents, so the
//! anonymous strategies differ only in their headers.

use mediaflow_core::{MediaKind, Platform};
use mediaflow_fetch::{AcquisitionStrategy, AuthSource};
use url::Url;

use crate::descriptor::{
    DESKTOP_USER_AGENT, MOBILE_USER_AGENT, PlatformDescriptor, host_of, with_host,
};

const REFERER: &str = "https://www.tiktok.com/";

/// Builds the TikTok descriptor.
pub fn tiktok_descriptor() -> PlatformDescriptor {
    PlatformDescriptor {
        id: Platform::TikTok,
        media_kind: MediaKind::Video,
        strategies: tiktok_strategies,
        variants: tiktok_variants,
    }
}

fn tiktok_strategies() -> Vec<AcquisitionStrategy> {
    vec![
        AcquisitionStrategy::new("tiktok.desktop")
            .header("User-Agent", DESKTOP_USER_AGENT)
            .header("Referer", REFERER),
        AcquisitionStrategy::new("tiktok.mobile")
            .header("User-Agent", MOBILE_USER_AGENT)
            .header("Referer", REFERER),
        AcquisitionStrategy::new("tiktok.request_cookies")
            .header("User-Agent", DESKTOP_USER_AGENT)
            .header("Referer", REFERER)
            .auth(AuthSource::CookieString),
        AcquisitionStrategy::new("tiktok.browser_cookies")
            .header("Referer", REFERER)
            .auth(AuthSource::BrowserCookieJar),
    ]
}

fn tiktok_variants(url: &Url) -> Vec<String> {
    match host_of(url).as_str() {
        "m.tiktok.com" => with_host(url, "www.tiktok.com").into_iter().collect(),
        _ => Vec::new(),
    }
}
