//! YouTube descriptor.
//!
//! Anonymous web extraction first, then the mobile player clients, which are
//! often served when the web client is challenged. Signed-in strategies come
//! last.
//!
//! ## URL Variants
//!
//! `youtu.be/<id>`, `/shorts/<id>`, `/live/<id>`, `/embed/<id>` and
//! `m.youtube.com` links are also tried as `https://www.youtube.com/watch?v=<id>`.

use mediaflow_core::{MediaKind, Platform};
use mediaflow_fetch::{AcquisitionStrategy, AuthSource};
use url::Url;

use crate::descriptor::{PlatformDescriptor, host_of, segments};

/// Format selector capped at 720p to keep downloads small.
const FORMAT: &str = "best[ext=mp4][height<=720]/best[height<=720]/best";

/// Builds the YouTube descriptor.
pub fn youtube_descriptor() -> PlatformDescriptor {
    PlatformDescriptor {
        id: Platform::YouTube,
        media_kind: MediaKind::Video,
        strategies: youtube_strategies,
        variants: youtube_variants,
    }
}

fn youtube_strategies() -> Vec<AcquisitionStrategy> {
    vec![
        AcquisitionStrategy::new("youtube.web").format(FORMAT),
        AcquisitionStrategy::new("youtube.android")
            .format(FORMAT)
            .extractor_hint("youtube:player_client=android"),
        AcquisitionStrategy::new("youtube.ios")
            .format(FORMAT)
            .extractor_hint("youtube:player_client=ios"),
        AcquisitionStrategy::new("youtube.request_cookies")
            .format(FORMAT)
            .extractor_hint("youtube:player_client=web")
            .auth(AuthSource::CookieString),
        AcquisitionStrategy::new("youtube.browser_cookies")
            .format(FORMAT)
            .auth(AuthSource::BrowserCookieJar),
    ]
}

fn youtube_variants(url: &Url) -> Vec<String> {
    video_id(url)
        .map(|id| vec![format!("https://www.youtube.com/watch?v={id}")])
        .unwrap_or_default()
}

/// Extracts the video id from any of the supported link shapes.
fn video_id(url: &Url) -> Option<String> {
    let host = host_of(url);
    let segs = segments(url);

    let id = if host == "youtu.be" {
        segs.first().copied()
    } else if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
        return Some(v.into_owned()).filter(|v| is_video_id(v));
    } else {
        match segs.as_slice() {
            ["shorts" | "live" | "embed" | "v", id, ..] => Some(*id),
            _ => None,
        }
    };
    id.filter(|id| is_video_id(id)).map(str::to_string)
}

fn is_video_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variants(url: &str) -> Vec<String> {
        youtube_descriptor().plan_for(url).variants
    }

    #[test]
    fn test_shorts_and_short_links_get_watch_variant() {
        assert_eq!(
            variants("https://www.youtube.com/shorts/dQw4w9WgXcQ"),
            vec![
                "https://www.youtube.com/shorts/dQw4w9WgXcQ",
                "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
            ]
        );
        assert_eq!(
            variants("https://youtu.be/dQw4w9WgXcQ?t=10")[1],
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            variants("https://m.youtube.com/watch?v=dQw4w9WgXcQ")[1],
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_canonical_watch_url_is_not_duplicated() {
        assert_eq!(variants("https://www.youtube.com/watch?v=dQw4w9WgXcQ").len(), 1);
    }

    #[test]
    fn test_channel_url_has_no_variant() {
        assert_eq!(variants("https://www.youtube.com/@somechannel").len(), 1);
    }

    #[test]
    fn test_strategy_order() {
        let names: Vec<_> = youtube_strategies().into_iter().map(|s| s.name).collect();
        assert_eq!(names[0], "youtube.web");
        assert_eq!(names.last().map(String::as_str), Some("youtube.browser_cookies"));
    }
}
