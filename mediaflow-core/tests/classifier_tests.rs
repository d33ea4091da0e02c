//! Integration tests for the error classifier.

use mediaflow_core::{ClassifyContext, ErrorKind, Platform, classify};

const SAMPLES: &[&str] = &[
    "",
    "ERROR: [youtube] dQw4w9WgXcQ: Sign in to confirm you're not a bot",
    "ERROR: [Instagram] C1abc: Requested content is not available, rate-limit reached or login required",
    "HTTP Error 429: Too Many Requests",
    "ERROR: unable to download video data: HTTP Error 403: Forbidden",
    "ERROR: [generic] Unsupported URL: https://example.com",
    "Resource has been exhausted (e.g. check quota).",
    "connection reset by peer",
    "ERROR: File is larger than max-filesize (1073741824 bytes > 1048576000 bytes). Aborting.",
    "💥 unicode ünïcödé",
];

#[test]
fn test_classifier_is_deterministic() {
    for platform in [None, Some(Platform::YouTube), Some(Platform::TikTok)] {
        let ctx = ClassifyContext {
            platform,
            status: None,
        };
        for sample in SAMPLES {
            let first = classify(sample, &ctx);
            let second = classify(sample, &ctx);
            assert_eq!(first, second, "classification changed for {sample:?}");
            assert!(ErrorKind::all().contains(&first.kind));
            assert_eq!(first.http_status, first.kind.http_status());
        }
    }
}

#[test]
fn test_yt_dlp_messages() {
    let ctx = ClassifyContext::for_platform(Platform::YouTube);
    assert_eq!(classify(SAMPLES[1], &ctx).kind, ErrorKind::AuthRequired);
    assert_eq!(classify(SAMPLES[3], &ctx).kind, ErrorKind::RateLimited);
    assert_eq!(classify(SAMPLES[4], &ctx).kind, ErrorKind::Forbidden);
    assert_eq!(classify(SAMPLES[5], &ctx).kind, ErrorKind::UnsupportedPlatform);
    assert_eq!(classify(SAMPLES[6], &ctx).kind, ErrorKind::QuotaExceeded);
    assert_eq!(classify(SAMPLES[8], &ctx).kind, ErrorKind::SizeLimitExceeded);
}

#[test]
fn test_instagram_rate_limit_phrase_prefers_rate_limit() {
    // "rate-limit" sits above "login required" in the table.
    let c = classify(SAMPLES[2], &ClassifyContext::for_platform(Platform::Instagram));
    assert_eq!(c.kind, ErrorKind::RateLimited);
    assert!(c.retryable);
}

#[test]
fn test_unmatched_is_unknown_and_retryable() {
    let c = classify(SAMPLES[7], &ClassifyContext::none());
    assert_eq!(c.kind, ErrorKind::Unknown);
    assert_eq!(c.http_status, 500);
    assert!(c.retryable);
    assert!(!c.remediation.is_empty());
}
