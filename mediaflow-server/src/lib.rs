// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # mediaflow Server
//!
//! HTTP front end for mediaflow. Every long-running request is answered with
//! a server-sent event stream of [`ProgressEvent`] frames, terminated by a
//! `data: [DONE]` sentinel.
//!
//! - [`config`] - layered [`ServerConfig`] (file, environment, keychain)
//! - [`orchestrator`] - one pipeline per request with a single terminal sequence
//! - [`bridge`] - event channel to SSE, cancelling on client disconnect
//! - [`routes`] - the axum router
//!
//! [`ProgressEvent`]: mediaflow_core::ProgressEvent

pub mod bridge;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod routes;

pub use config::{ConfigError, Secret, ServerConfig};
pub use error::ApiError;
pub use orchestrator::{IncomingFile, OrchestrationRequest, Orchestrator};
pub use routes::{AppState, build_router};
