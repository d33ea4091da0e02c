//! Strategy executor for acquiring remote media.
//!
//! The executor resolves a URL to a [`PlatformPlan`] and walks its URL
//! variants and strategies in order, retrying each strategy with exponential
//! backoff until one produces a file within the size ceiling.
//!
//! ## Failure scope
//!
//! - Retryable kinds: retry the same strategy after a backoff.
//! - Other kinds: stop this strategy and move to the next one.
//! - Kinds that [abandon the variant](ErrorKind::abandons_variant): skip the
//!   remaining strategies for this URL variant.
//! - [Fatal](ErrorKind::is_fatal) kinds (size, cancellation): end the run.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mediaflow_core::{
    Attempt, AttemptOutcome, ClassifyContext, ErrorClassification, ErrorKind, MediaKind, Platform,
    ProgressEvent, ResourceRef, Stage,
};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::context::AcquireContext;
use crate::error::FetchError;
use crate::extractor::{CookieMaterial, ExtractRequest, ExtractedMedia, MediaExtractor};
use crate::retry::sleep_or_cancel;
use crate::strategy::{AcquisitionStrategy, AuthSource, PlanResolver, PlatformPlan};
use crate::temp::TempResource;

// ============================================================================
// Outcome Types
// ============================================================================

/// A successfully acquired resource.
#[derive(Debug)]
pub struct AcquiredMedia {
    /// Scratch resource holding the file; the caller releases it.
    pub resource: TempResource,
    /// Platform the URL belonged to.
    pub platform: Platform,
    /// Media kind of the plan.
    pub media_kind: MediaKind,
    /// Strategy that won.
    pub strategy_name: String,
    /// URL variant that won.
    pub url_variant: String,
    /// Extractor metadata.
    pub media: ExtractedMedia,
}

/// A failed acquisition, already classified.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquireFailure {
    /// Platform, when the URL resolved to one.
    pub platform: Option<Platform>,
    /// Classified error with platform remediation.
    pub classification: ErrorClassification,
}

/// The outcome of one executor run.
#[derive(Debug)]
pub struct AcquireOutcome {
    /// The winning resource or the final classified failure.
    pub result: Result<AcquiredMedia, AcquireFailure>,
    /// Every attempt made, in order.
    pub attempts: Vec<Attempt>,
    /// Total wall time of the run.
    pub duration: Duration,
}

impl AcquireOutcome {
    /// Returns true if the acquisition succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Returns the number of attempts made.
    pub fn attempts_count(&self) -> usize {
        self.attempts.len()
    }

    /// Returns the winning strategy, if any.
    pub fn successful_strategy(&self) -> Option<&str> {
        self.result.as_ref().ok().map(|m| m.strategy_name.as_str())
    }

    /// Returns the failure reasons of all failed attempts.
    pub fn errors(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .filter_map(Attempt::failure_reason)
            .collect()
    }
}

/// How the loop over one strategy ended.
enum StrategyEnd {
    Won(AcquiredMedia),
    Fatal(ErrorClassification),
    NextStrategy,
    NextVariant,
}

// ============================================================================
// Strategy Executor
// ============================================================================

/// Runs platform strategies against an extractor until one succeeds.
#[derive(Clone)]
pub struct StrategyExecutor {
    extractor: Arc<dyn MediaExtractor>,
    resolver: Arc<dyn PlanResolver>,
}

impl StrategyExecutor {
    /// Creates an executor.
    pub fn new(extractor: Arc<dyn MediaExtractor>, resolver: Arc<dyn PlanResolver>) -> Self {
        Self {
            extractor,
            resolver,
        }
    }

    /// Acquires `url` into a scratch resource.
    #[instrument(skip(self, ctx), fields(extractor = %self.extractor.id()))]
    pub async fn acquire(&self, url: &str, ctx: &AcquireContext) -> AcquireOutcome {
        let Some(plan) = self.resolver.resolve(url) else {
            info!("No platform claims this URL");
            let error = FetchError::UnsupportedPlatform(url.to_string());
            return AcquireOutcome {
                result: Err(AcquireFailure {
                    platform: None,
                    classification: error.classify(&ClassifyContext::none()),
                }),
                attempts: Vec::new(),
                duration: Duration::ZERO,
            };
        };

        self.execute(&plan, ctx).await
    }

    /// Executes an already resolved plan.
    #[instrument(skip_all, fields(platform = %plan.platform.display_name(), variants = plan.variants.len(), strategies = plan.strategies.len()))]
    pub async fn execute(&self, plan: &PlatformPlan, ctx: &AcquireContext) -> AcquireOutcome {
        let start = Instant::now();
        let mut attempts = Vec::new();
        let classify_ctx = ClassifyContext::for_platform(plan.platform);

        ctx.events
            .emit(ProgressEvent::progress(
                Stage::Resolving,
                format!("Detected {}", plan.platform.display_name()),
            ))
            .await;

        let mut last_failure: Option<ErrorClassification> = None;
        let mut skipped_for_credentials = false;

        'variants: for variant in &plan.variants {
            for strategy in &plan.strategies {
                let cookies = match resolve_credentials(strategy, plan.platform, ctx).await {
                    Ok(cookies) => cookies,
                    Err(reason) => {
                        info!(strategy = %strategy.name, reason = %reason, "Skipping strategy");
                        skipped_for_credentials = true;
                        continue;
                    }
                };

                let end = self
                    .run_strategy(plan, variant, strategy, cookies.as_ref(), ctx, &classify_ctx, &mut attempts, &mut last_failure)
                    .await;

                match end {
                    StrategyEnd::Won(media) => {
                        info!(strategy = %media.strategy_name, attempts = attempts.len(), "Acquisition succeeded");
                        return AcquireOutcome {
                            result: Ok(media),
                            attempts,
                            duration: start.elapsed(),
                        };
                    }
                    StrategyEnd::Fatal(classification) => {
                        warn!(kind = %classification.kind, "Acquisition aborted");
                        return failed(plan.platform, classification, attempts, start);
                    }
                    StrategyEnd::NextStrategy => {}
                    StrategyEnd::NextVariant => continue 'variants,
                }
            }
        }

        let classification = last_failure.unwrap_or_else(|| {
            if skipped_for_credentials {
                ErrorClassification::for_kind(ErrorKind::AuthRequired, &classify_ctx)
            } else {
                ErrorClassification::for_kind(ErrorKind::Unknown, &classify_ctx)
                    .with_message("No acquisition strategy is configured for this platform.")
            }
        });
        warn!(kind = %classification.kind, attempts = attempts.len(), "All strategies exhausted");
        failed(plan.platform, classification, attempts, start)
    }

    /// Attempts one strategy on one variant up to the retry limit.
    #[allow(clippy::too_many_arguments)]
    async fn run_strategy(
        &self,
        plan: &PlatformPlan,
        variant: &str,
        strategy: &AcquisitionStrategy,
        cookies: Option<&CookieMaterial>,
        ctx: &AcquireContext,
        classify_ctx: &ClassifyContext,
        attempts: &mut Vec<Attempt>,
        last_failure: &mut Option<ErrorClassification>,
    ) -> StrategyEnd {
        let retry = &ctx.settings.retry;
        let max_attempts = retry.attempts();
        let max_bytes = ctx.settings.size_limits.for_kind(plan.media_kind);

        for attempt in 1..=max_attempts {
            if ctx.cancel().is_cancelled() {
                return StrategyEnd::Fatal(FetchError::Cancelled.classify(classify_ctx));
            }

            ctx.events
                .emit(ProgressEvent::progress(
                    Stage::Acquiring,
                    format!("Trying {} (attempt {attempt}/{max_attempts})", strategy.name),
                ))
                .await;

            let started_at = Utc::now();
            let attempt_start = Instant::now();

            let mut scratch = match TempResource::create_in(&ctx.settings.temp_root, "acquire") {
                Ok(scratch) => scratch,
                Err(e) => {
                    warn!(error = %e, "Cannot create scratch directory");
                    return StrategyEnd::Fatal(FetchError::Io(e).classify(classify_ctx));
                }
            };

            let request = ExtractRequest {
                url: variant,
                platform: plan.platform,
                strategy,
                cookies,
                max_filesize_bytes: max_bytes,
                timeout: ctx.settings.attempt_timeout(),
            };

            let result = tokio::select! {
                biased;
                () = ctx.cancel().cancelled() => Err(FetchError::Cancelled),
                r = tokio::time::timeout(request.timeout, self.extractor.extract(&request, &mut scratch)) => {
                    r.unwrap_or(Err(FetchError::Timeout(request.timeout)))
                }
            };
            let limits = &ctx.settings.size_limits;
            let result = result.and_then(|media| {
                let kind = MediaKind::from_mime(&media.mime_type).unwrap_or(plan.media_kind);
                verify_size(&scratch, limits.for_kind(kind)).map(|()| (media, kind))
            });

            let mut record = Attempt {
                strategy_name: strategy.name.clone(),
                url_variant: variant.to_string(),
                attempt_number: attempt,
                started_at,
                duration: attempt_start.elapsed(),
                outcome: AttemptOutcome::RetryableFailure(String::new()),
            };

            match result {
                Ok((media, media_kind)) => {
                    record.outcome = AttemptOutcome::Success(ResourceRef {
                        filename: scratch.filename().unwrap_or_default(),
                        size_bytes: scratch.size_bytes(),
                    });
                    attempts.push(record);
                    return StrategyEnd::Won(AcquiredMedia {
                        resource: scratch,
                        platform: plan.platform,
                        media_kind,
                        strategy_name: strategy.name.clone(),
                        url_variant: variant.to_string(),
                        media,
                    });
                }
                Err(error) => {
                    scratch.release();

                    let classification = error.classify(classify_ctx);
                    let kind = classification.kind;
                    let retry_locally = classification.retryable && !kind.is_fatal();
                    record.outcome = if retry_locally {
                        AttemptOutcome::RetryableFailure(error.to_string())
                    } else {
                        AttemptOutcome::FatalFailure(error.to_string())
                    };
                    attempts.push(record);

                    warn!(
                        strategy = %strategy.name,
                        attempt,
                        kind = %kind,
                        error = %error,
                        "Attempt failed"
                    );

                    if kind.is_fatal() {
                        return StrategyEnd::Fatal(classification);
                    }
                    *last_failure = Some(classification);

                    if kind.abandons_variant() {
                        debug!(variant, "Abandoning URL variant");
                        return StrategyEnd::NextVariant;
                    }
                    if !retry_locally {
                        return StrategyEnd::NextStrategy;
                    }

                    if attempt < max_attempts {
                        let delay = retry.delay_for_attempt(attempt);
                        ctx.events
                            .emit(ProgressEvent::progress(
                                Stage::Retrying,
                                format!("Retrying {} in {} ms", strategy.name, delay.as_millis()),
                            ))
                            .await;
                        if sleep_or_cancel(delay, ctx.cancel()).await.is_err() {
                            return StrategyEnd::Fatal(FetchError::Cancelled.classify(classify_ctx));
                        }
                    }
                }
            }
        }

        StrategyEnd::NextStrategy
    }
}

/// Resolves a strategy's credentials. `Err` means the source is unavailable.
async fn resolve_credentials(
    strategy: &AcquisitionStrategy,
    platform: Platform,
    ctx: &AcquireContext,
) -> Result<Option<CookieMaterial>, String> {
    match strategy.auth_source {
        AuthSource::None => Ok(None),
        AuthSource::CookieString => ctx
            .cookies
            .clone()
            .map(|c| Some(CookieMaterial::Header(c)))
            .ok_or_else(|| "no cookies supplied with the request".to_string()),
        AuthSource::BrowserCookieJar => {
            let jar = ctx
                .cookie_jar
                .as_ref()
                .filter(|jar| jar.is_available())
                .ok_or_else(|| "no browser cookie store reachable".to_string())?;
            let cookies = jar
                .cookies_for(platform.domains())
                .await
                .map_err(|e| e.to_string())?;
            Ok(Some(CookieMaterial::Jar(cookies)))
        }
    }
}

fn verify_size(scratch: &TempResource, max_bytes: u64) -> Result<(), FetchError> {
    if scratch.path().is_none() {
        return Err(FetchError::InvalidResponse(
            "extractor reported success without a file".to_string(),
        ));
    }
    if scratch.size_bytes() > max_bytes {
        return Err(FetchError::SizeLimitExceeded {
            limit: max_bytes,
            actual: Some(scratch.size_bytes()),
        });
    }
    Ok(())
}

fn failed(
    platform: Platform,
    classification: ErrorClassification,
    attempts: Vec<Attempt>,
    start: Instant,
) -> AcquireOutcome {
    AcquireOutcome {
        result: Err(AcquireFailure {
            platform: Some(platform),
            classification,
        }),
        attempts,
        duration: start.elapsed(),
    }
}

// ============================================================================
// Tests
// ============================================================================
