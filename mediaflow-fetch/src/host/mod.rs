//! Host APIs used by acquisition strategies and remote services.
//!
//! - [`browser`] - Browser cookie import
//! - [`http`] - HTTP client with tracing and domain allowlist
//! - [`keychain`] - API key lookup in the system keychain
//! - [`process`] - Subprocess execution for extractor tools

pub mod browser;
pub mod http;
pub mod keychain;
pub mod process;

pub use browser::{Browser, BrowserCookieImporter, Cookie, CookieJar};
pub use http::{HttpClient, ResponseExt, ensure_success};
pub use keychain::{KeychainApi, SystemKeychain};
pub use process::{ProcessOutput, ProcessRunner};
