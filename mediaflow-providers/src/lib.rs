// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # mediaflow Providers
//!
//! Platform strategy tables and remote service clients for mediaflow.
//!
//! ## Platforms
//!
//! Each platform module provides a descriptor with its strategy table and
//! URL-variant normalizer; [`PlatformRegistry`] is the [`PlanResolver`]
//! handed to the strategy executor.
//!
//! | Platform | Anonymous | Request cookies | Browser cookies | URL variants |
//! |----------|-----------|-----------------|-----------------|--------------|
//! | YouTube | web, android, ios | ✅ | ✅ | shorts / youtu.be → watch |
//! | TikTok | desktop, mobile | ✅ | ✅ | m. → www. |
//! | Instagram | public | ✅ | ✅ | reel ↔ p |
//! | Twitter / X | public | ✅ | ✅ | x.com ↔ twitter.com |
//! | Facebook | public | ✅ | ✅ | m. → www. |
//!
//! ## Services
//!
//! - [`FileService`] / [`AnalysisService`] - [`GeminiClient`]
//! - [`ResearchService`] - [`ResearchClient`]
//! - [`FileProcessingJob`] / [`ResearchJob`] adapt them to the remote job poller
//!
//! ## Usage
//!
//! ```ignore
//! use mediaflow_providers::PlatformRegistry;
//! use mediaflow_fetch::PlanResolver;
//!
//! let plan = PlatformRegistry.resolve("https://youtu.be/dQw4w9WgXcQ").unwrap();
//! assert_eq!(plan.variants.len(), 2);
//! ```
//!
//! [`PlanResolver`]: mediaflow_fetch::PlanResolver

pub mod descriptor;
pub mod error;
pub mod gemini;
pub mod jobs;
pub mod platforms;
pub mod registry;
pub mod research;
pub mod services;

// Re-export key types
pub use descriptor::PlatformDescriptor;
pub use error::ServiceError;
pub use gemini::{GeminiClient, GeminiSettings};
pub use jobs::{FileProcessingJob, ResearchJob, file_uri};
pub use registry::PlatformRegistry;
pub use research::{ResearchClient, ResearchSettings};
pub use services::{
    AnalysisRequest, AnalysisService, FileService, FileState, MediaPart, RemoteFile,
    ResearchService, TextStream, UploadSource,
};
