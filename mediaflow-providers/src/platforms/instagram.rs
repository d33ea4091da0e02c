//! Instagram descriptor.
//!
//! Most Instagram media needs a session; the anonymous strategy only works
//! for some public posts.

use mediaflow_core::{MediaKind, Platform};
use mediaflow_fetch::{AcquisitionStrategy, AuthSource};
use url::Url;

use crate::descriptor::{DESKTOP_USER_AGENT, PlatformDescriptor, segments};

/// Builds the Instagram descriptor.
pub fn instagram_descriptor() -> PlatformDescriptor {
    PlatformDescriptor {
        id: Platform::Instagram,
        media_kind: MediaKind::Video,
        strategies: instagram_strategies,
        variants: instagram_variants,
    }
}

fn instagram_strategies() -> Vec<AcquisitionStrategy> {
    vec![
        AcquisitionStrategy::new("instagram.public").header("User-Agent", DESKTOP_USER_AGENT),
        AcquisitionStrategy::new("instagram.request_cookies").auth(AuthSource::CookieString),
        AcquisitionStrategy::new("instagram.browser_cookies").auth(AuthSource::BrowserCookieJar),
    ]
}

/// `/reel/<code>` and `/p/<code>` address the same media.
fn instagram_variants(url: &Url) -> Vec<String> {
    let alternate = match segments(url).as_slice() {
        ["reel" | "reels", code, ..] => format!("https://www.instagram.com/p/{code}/"),
        ["p", code, ..] => format!("https://www.instagram.com/reel/{code}/"),
        _ => return Vec::new(),
    };
    vec![alternate]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reel_and_post_swap() {
        let plan = instagram_descriptor().plan_for("https://www.instagram.com/reel/Cabc123/");
        assert_eq!(plan.variants[1], "https://www.instagram.com/p/Cabc123/");

        let plan = instagram_descriptor().plan_for("https://instagram.com/p/Cabc123/?igsh=x");
        assert_eq!(plan.variants[1], "https://www.instagram.com/reel/Cabc123/");
    }

    #[test]
    fn test_profile_has_no_variant() {
        let plan = instagram_descriptor().plan_for("https://www.instagram.com/someone/");
        assert_eq!(plan.variants.len(), 1);
    }
}
