//! Gemini (Google) client.
//!
//! Gemini backs both the file store and the media analysis:
//!
//! - Resumable upload to `POST /upload/v1beta/files`
//! - File state lookups via `GET /v1beta/files/{id}`
//!   (`PROCESSING` → `ACTIVE` | `FAILED`)
//! - Streamed analysis via
//!   `POST /v1beta/models/{model}:streamGenerateContent?alt=sse`
//!
//! The API key travels in the `x-goog-api-key` header, never in the URL.
//!
//! ## Usage
//!
//! ```ignore
//! use mediaflow_providers::gemini::{GeminiClient, GeminiSettings};
//!
//! let client = GeminiClient::new(api_key, GeminiSettings::default())?;
//! let file = client.upload(&source).await?;
//! ```

pub mod api;
mod parser;

pub use api::{GeminiClient, GeminiSettings};
