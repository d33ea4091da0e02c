//! Platform and media kind types.
//!
//! - [`Platform`] - Social platforms with a strategy table
//! - [`MediaKind`] - Coarse media classes with their size ceilings

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

// ============================================================================
// Platform
// ============================================================================

/// Social media platforms mediaflow knows how to acquire from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// YouTube (including Shorts and youtu.be links).
    YouTube,
    /// TikTok.
    TikTok,
    /// Instagram posts and reels.
    Instagram,
    /// Twitter / X.
    Twitter,
    /// Facebook videos and fb.watch links.
    Facebook,
}

impl Platform {
    /// Returns the display name for this platform.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::YouTube => "YouTube",
            Self::TikTok => "TikTok",
            Self::Instagram => "Instagram",
            Self::Twitter => "X (Twitter)",
            Self::Facebook => "Facebook",
        }
    }

    /// Registrable domains served by this platform.
    pub fn domains(&self) -> &'static [&'static str] {
        match self {
            Self::YouTube => &["youtube.com", "youtu.be", "youtube-nocookie.com"],
            Self::TikTok => &["tiktok.com"],
            Self::Instagram => &["instagram.com", "instagr.am"],
            Self::Twitter => &["twitter.com", "x.com"],
            Self::Facebook => &["facebook.com", "fb.watch", "fb.com"],
        }
    }

    /// Returns all platforms.
    pub fn all() -> &'static [Platform] {
        &[
            Self::YouTube,
            Self::TikTok,
            Self::Instagram,
            Self::Twitter,
            Self::Facebook,
        ]
    }

    /// Returns true if the host belongs to this platform.
    pub fn matches_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.domains()
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
    }

    /// Resolves the platform for a URL by matching its hostname.
    pub fn from_url(url: &str) -> Option<Platform> {
        let parsed = Url::parse(url.trim()).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        let host = parsed.host_str()?;
        Self::all().iter().copied().find(|p| p.matches_host(host))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Media Kind
// ============================================================================

/// One mebibyte.
pub const MIB: u64 = 1024 * 1024;

/// Coarse classification of a media blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image.
    Image,
    /// Audio-only media.
    Audio,
    /// Video media.
    Video,
}

impl MediaKind {
    /// Classifies a MIME type (parameters are ignored).
    pub fn from_mime(mime: &str) -> Option<MediaKind> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        let (top, _) = essence.split_once('/')?;
        match top.to_ascii_lowercase().as_str() {
            "image" => Some(Self::Image),
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    /// Default size ceiling for this kind.
    pub fn default_max_bytes(&self) -> u64 {
        match self {
            Self::Image | Self::Audio => 20 * MIB,
            Self::Video => 1024 * MIB,
        }
    }

    /// Returns a lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
