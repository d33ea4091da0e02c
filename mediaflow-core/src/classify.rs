//! Error classification.
//!
//! Third-party extractors and APIs report failures as opaque strings. This
//! module maps such a string (plus optional platform and HTTP status context)
//! onto the closed [`ErrorKind`] taxonomy through one ordered rule table.
//! The first matching rule wins; matching is case-insensitive.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::models::Platform;

/// Longest raw detail kept on a classification.
const MAX_DETAIL_LEN: usize = 300;

// ============================================================================
// Classification
// ============================================================================

/// The classified form of a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorClassification {
    /// Taxonomy kind.
    pub kind: ErrorKind,
    /// Suggested HTTP status.
    pub http_status: u16,
    /// Message safe to show to users.
    pub user_message: String,
    /// Things the user can try.
    pub remediation: Vec<String>,
    /// Whether offering a retry makes sense.
    pub retryable: bool,
    /// Raw upstream message, truncated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorClassification {
    /// Builds the default classification for a kind in the given context.
    pub fn for_kind(kind: ErrorKind, ctx: &ClassifyContext) -> Self {
        Self {
            kind,
            http_status: kind.http_status(),
            user_message: user_message(kind, ctx.platform),
            remediation: remediation(kind, ctx.platform),
            retryable: kind.is_retryable(),
            detail: None,
        }
    }

    /// Replaces the user-facing message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.user_message = message.into();
        self
    }

    /// Attaches the raw upstream message.
    pub fn with_detail(mut self, raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return self;
        }
        let detail = match trimmed.char_indices().nth(MAX_DETAIL_LEN) {
            Some((idx, _)) => format!("{}…", &trimmed[..idx]),
            None => trimmed.to_string(),
        };
        self.detail = Some(detail);
        self
    }
}

// ============================================================================
// Context
// ============================================================================

/// Context that refines a classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifyContext {
    /// Platform the failure happened on.
    pub platform: Option<Platform>,
    /// Upstream HTTP status, when known.
    pub status: Option<u16>,
}

impl ClassifyContext {
    /// Context with no platform and no status.
    pub fn none() -> Self {
        Self::default()
    }

    /// Context for a platform.
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform: Some(platform),
            status: None,
        }
    }

    /// Adds an upstream HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

// ============================================================================
// Rule Table
// ============================================================================

struct Rule {
    kind: ErrorKind,
    patterns: &'static [&'static str],
}

/// Ordered rule table. Patterns are lowercase.
const RULES: &[Rule] = &[
    Rule {
        kind: ErrorKind::Cancelled,
        patterns: &["cancelled", "canceled", "aborted by client"],
    },
    Rule {
        kind: ErrorKind::SizeLimitExceeded,
        patterns: &[
            "larger than max-filesize",
            "file is larger",
            "too large",
            "exceeds the size",
        ],
    },
    Rule {
        kind: ErrorKind::QuotaExceeded,
        patterns: &["quota"],
    },
    Rule {
        kind: ErrorKind::RateLimited,
        patterns: &["rate limit", "rate-limit", "too many requests", "429"],
    },
    Rule {
        kind: ErrorKind::AuthRequired,
        patterns: &[
            "sign in",
            "confirm",
            "bot",
            "login required",
            "log in",
            "private video",
        ],
    },
    Rule {
        kind: ErrorKind::Timeout,
        patterns: &["timeout", "timed out"],
    },
    Rule {
        kind: ErrorKind::UpstreamBroken,
        patterns: &["cannot parse data", "unable to extract", "nsig extraction failed"],
    },
    Rule {
        kind: ErrorKind::Forbidden,
        patterns: &["403", "forbidden"],
    },
    Rule {
        kind: ErrorKind::NotFound,
        patterns: &["404", "not found", "video unavailable", "has been removed"],
    },
    Rule {
        kind: ErrorKind::UnsupportedPlatform,
        patterns: &["unsupported url"],
    },
    Rule {
        kind: ErrorKind::UnsupportedFormat,
        patterns: &["format", "no video"],
    },
];

/// Classifies a raw failure message.
///
/// Total and deterministic: every input maps to exactly one kind, and the
/// same input always maps to the same classification.
pub fn classify(raw: &str, ctx: &ClassifyContext) -> ErrorClassification {
    let kind = match_rules(raw)
        .or_else(|| ctx.status.and_then(kind_for_status))
        .unwrap_or(ErrorKind::Unknown);
    ErrorClassification::for_kind(kind, ctx).with_detail(raw)
}

/// Returns the kind of the first rule matching the message.
fn match_rules(raw: &str) -> Option<ErrorKind> {
    let lowered = raw.to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.patterns.iter().any(|p| lowered.contains(p)))
        .map(|rule| rule.kind)
}

/// Maps an upstream HTTP status to a kind when the message was not telling.
pub fn kind_for_status(status: u16) -> Option<ErrorKind> {
    match status {
        401 => Some(ErrorKind::AuthRequired),
        403 => Some(ErrorKind::Forbidden),
        404 | 410 => Some(ErrorKind::NotFound),
        408 | 504 => Some(ErrorKind::Timeout),
        413 => Some(ErrorKind::SizeLimitExceeded),
        415 => Some(ErrorKind::UnsupportedFormat),
        429 => Some(ErrorKind::RateLimited),
        500..=599 => Some(ErrorKind::UpstreamBroken),
        _ => None,
    }
}

// ============================================================================
// Messages & Remediation
// ============================================================================

fn platform_name(platform: Option<Platform>) -> &'static str {
    platform.map_or("The remote service", |p| p.display_name())
}

fn user_message(kind: ErrorKind, platform: Option<Platform>) -> String {
    let name = platform_name(platform);
    match kind {
        ErrorKind::UnsupportedPlatform => "This link is not from a supported platform.".to_string(),
        ErrorKind::AuthRequired => format!("{name} requires a signed-in session for this content."),
        ErrorKind::QuotaExceeded => format!("{name} quota has been exhausted."),
        ErrorKind::RateLimited => format!("{name} is rate limiting requests."),
        ErrorKind::Timeout => "The operation took too long and was stopped.".to_string(),
        ErrorKind::UpstreamBroken => format!("{name} is failing in a way we cannot work around right now."),
        ErrorKind::Forbidden => format!("{name} refused access to this content."),
        ErrorKind::NotFound => "The requested content could not be found.".to_string(),
        ErrorKind::UnsupportedFormat => "No supported media format is available for this content.".to_string(),
        ErrorKind::SizeLimitExceeded => "The file is larger than the allowed size.".to_string(),
        ErrorKind::Cancelled => "The operation was cancelled.".to_string(),
        ErrorKind::Unknown => "Something went wrong while processing the request.".to_string(),
    }
}

fn remediation(kind: ErrorKind, platform: Option<Platform>) -> Vec<String> {
    let mut hints: Vec<&str> = Vec::new();

    match (kind, platform) {
        (ErrorKind::UnsupportedPlatform, _) => {
            hints.push("Use a YouTube, TikTok, Instagram, X (Twitter) or Facebook link");
        }
        (ErrorKind::AuthRequired, Some(Platform::YouTube)) => {
            hints.push("YouTube is asking for bot verification; paste cookies from a signed-in browser");
            hints.push("Try a different public video URL");
        }
        (ErrorKind::AuthRequired, Some(Platform::Instagram)) => {
            hints.push("Instagram requires login for most media; provide your browser cookies");
            hints.push("Make sure the post is public");
        }
        (ErrorKind::AuthRequired, Some(Platform::Facebook)) => {
            hints.push("Only public Facebook videos can be downloaded without cookies");
            hints.push("Provide cookies from a signed-in browser");
        }
        (ErrorKind::AuthRequired, _) => {
            hints.push("Try a public video URL");
            hints.push("Provide cookies from a signed-in browser");
        }
        (ErrorKind::UpstreamBroken, Some(Platform::YouTube)) => {
            hints.push("YouTube changed its player; update yt-dlp (`yt-dlp -U`)");
            hints.push("Try again later");
        }
        (ErrorKind::UpstreamBroken, Some(Platform::TikTok)) => {
            hints.push("TikTok changed its page format; update yt-dlp (`yt-dlp -U`)");
            hints.push("Try the desktop share link instead of the app link");
        }
        (ErrorKind::UpstreamBroken, Some(_)) => {
            hints.push("Update yt-dlp (`yt-dlp -U`)");
            hints.push("Try again later");
        }
        (ErrorKind::UpstreamBroken, None) => {
            hints.push("The upstream service is having problems; try again later");
        }
        (ErrorKind::QuotaExceeded | ErrorKind::RateLimited, _) => {
            hints.push("Wait a few minutes before trying again");
        }
        (ErrorKind::Timeout, _) => {
            hints.push("Try again; shorter media finishes faster");
        }
        (ErrorKind::Forbidden, Some(Platform::TikTok)) => {
            hints.push("TikTok blocks some regions and datacenter addresses; try another video");
        }
        (ErrorKind::Forbidden, _) => {
            hints.push("The content may be private or region-locked");
        }
        (ErrorKind::NotFound, _) => {
            hints.push("Check that the link is correct and the content was not deleted");
        }
        (ErrorKind::UnsupportedFormat, _) => {
            hints.push("Make sure the link points to a video, not a photo post or live stream");
        }
        (ErrorKind::SizeLimitExceeded, _) => {
            hints.push("Use a shorter clip or a smaller file");
        }
        (ErrorKind::Cancelled, _) => {}
        (ErrorKind::Unknown, _) => {
            hints.push("Try again");
        }
    }

    hints.into_iter().map(str::to_string).collect()
}

// ============================================================================
// Tests
// ============================================================================
