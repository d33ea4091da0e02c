// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # mediaflow Fetch
//!
//! Acquisition machinery and host APIs for mediaflow.
//!
//! ## Host APIs
//!
//! The [`host`] module wraps system interactions:
//!
//! - [`host::http`] - HTTP client with tracing and a domain allowlist
//! - [`host::process`] - Subprocess execution for the extractor
//! - [`host::keychain`] - API keys in the system keychain
//! - [`host::browser`] - Browser cookie import for signed-in strategies
//!
//! ## Acquisition
//!
//! - [`strategy::PlatformPlan`] - URL variants and strategies for one platform
//! - [`pipeline::StrategyExecutor`] - Tries variants and strategies in order,
//!   with per-strategy retries and exponential backoff
//! - [`context::AcquireContext`] - Cookies, settings and the event sink
//! - [`temp::TempResource`] - Scratch directory released on every path
//!
//! ## Remote Jobs
//!
//! - [`poller::RemoteJobPoller`] - Submit, poll, tolerate errors, time out
//! - [`progress::ProgressSink`] - Cancellation-aware event channel
//!
//! ## Example
//!
//! ```ignore
//! use mediaflow_fetch::{AcquireContext, ProgressSink, StrategyExecutor, YtDlpExtractor};
//!
//! let (sink, events) = ProgressSink::channel(64, CancellationToken::new());
//! let ctx = AcquireContext::builder(sink).build();
//!
//! let executor = StrategyExecutor::new(Arc::new(YtDlpExtractor::new("yt-dlp")), resolver);
//! let outcome = executor.acquire("https://www.tiktok.com/@a/video/1", &ctx).await;
//! ```

pub mod context;
pub mod error;
pub mod extractor;
pub mod host;
pub mod pipeline;
pub mod poller;
pub mod progress;
pub mod retry;
pub mod strategy;
pub mod temp;

// Re-export key types at crate root

// Errors
pub use error::{BrowserError, FetchError, HttpError, KeychainError, ProcessError};

// Host APIs
pub use host::{
    browser::{Browser, BrowserCookieImporter, Cookie, CookieJar},
    http::{HttpClient, ResponseExt, ensure_success},
    keychain::{KeychainApi, SystemKeychain},
    process::{ProcessOutput, ProcessRunner},
};

// Acquisition
pub use context::{AcquireContext, AcquireContextBuilder, AcquireSettings, SizeLimits};
pub use extractor::{CookieMaterial, ExtractRequest, ExtractedMedia, MediaExtractor, YtDlpExtractor};
pub use pipeline::{AcquireFailure, AcquireOutcome, AcquiredMedia, StrategyExecutor};
pub use strategy::{AcquisitionStrategy, AuthSource, PlanResolver, PlatformPlan};
pub use temp::TempResource;

// Remote jobs
pub use poller::{
    PollOutcome, PollSettings, PollTerminal, RemoteJobPoller, RemoteJobSource, Submission,
    text_chunks,
};
pub use progress::{DEFAULT_EVENT_BUFFER, ProgressSink};
pub use retry::{RetryPolicy, sleep_or_cancel};
