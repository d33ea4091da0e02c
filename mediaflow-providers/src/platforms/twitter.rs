//! Twitter / X descriptor.

use mediaflow_core::{MediaKind, Platform};
use mediaflow_fetch::{AcquisitionStrategy, AuthSource};
use url::Url;

use crate::descriptor::{PlatformDescriptor, host_of, with_host};

/// Builds the Twitter / X descriptor.
pub fn twitter_descriptor() -> PlatformDescriptor {
    PlatformDescriptor {
        id: Platform::Twitter,
        media_kind: MediaKind::Video,
        strategies: twitter_strategies,
        variants: twitter_variants,
    }
}

fn twitter_strategies() -> Vec<AcquisitionStrategy> {
    vec![
        AcquisitionStrategy::new("twitter.public"),
        AcquisitionStrategy::new("twitter.request_cookies").auth(AuthSource::CookieString),
        AcquisitionStrategy::new("twitter.browser_cookies").auth(AuthSource::BrowserCookieJar),
    ]
}

/// x.com and twitter.com serve the same statuses; mobile hosts map to desktop.
fn twitter_variants(url: &Url) -> Vec<String> {
    let hosts: &[&str] = match host_of(url).as_str() {
        "x.com" | "www.x.com" | "mobile.x.com" => &["x.com", "twitter.com"],
        "twitter.com" | "www.twitter.com" | "mobile.twitter.com" => &["twitter.com", "x.com"],
        _ => &[],
    };
    hosts.iter().filter_map(|h| with_host(url, h)).collect()
}
