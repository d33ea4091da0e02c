//! Facebook descriptor.

use mediaflow_core::{MediaKind, Platform};
use mediaflow_fetch::{AcquisitionStrategy, AuthSource};
use url::Url;

use crate::descriptor::{DESKTOP_USER_AGENT, PlatformDescriptor, host_of, with_host};

/// Builds the Facebook descriptor.
pub fn facebook_descriptor() -> PlatformDescriptor {
    PlatformDescriptor {
        id: Platform::Facebook,
        media_kind: MediaKind::Video,
        strategies: facebook_strategies,
        variants: facebook_variants,
    }
}

fn facebook_strategies() -> Vec<AcquisitionStrategy> {
    vec![
        AcquisitionStrategy::new("facebook.public").header("User-Agent", DESKTOP_USER_AGENT),
        AcquisitionStrategy::new("facebook.request_cookies").auth(AuthSource::CookieString),
        AcquisitionStrategy::new("facebook.browser_cookies").auth(AuthSource::BrowserCookieJar),
    ]
}

fn facebook_variants(url: &Url) -> Vec<String> {
    match host_of(url).as_str() {
        "m.facebook.com" | "mbasic.facebook.com" | "web.facebook.com" => {
            with_host(url, "www.facebook.com").into_iter().collect()
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mobile_link_gets_desktop_variant() {
        let plan = facebook_descriptor().plan_for("https://m.facebook.com/watch/?v=42");
        assert_eq!(plan.variants[1], "https://www.facebook.com/watch/?v=42");
    }

    #[test]
    fn test_fb_watch_is_tried_as_is() {
        let plan = facebook_descriptor().plan_for("https://fb.watch/abc/");
        assert_eq!(plan.variants.len(), 1);
    }
}
