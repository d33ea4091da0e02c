// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # mediaflow Core
//!
//! Core types and the error taxonomy shared by every mediaflow crate.
//!
//! - Domain models (platforms, progress events, remote jobs, attempts)
//! - The closed [`ErrorKind`] taxonomy
//! - The [`classify`] function mapping raw failure messages onto it
//!
//! ## Key Types
//!
//! ### Events
//! - [`ProgressEvent`] - One frame of an orchestration's event stream
//! - [`Stage`] - Coarse stage carried by progress frames
//!
//! ### Jobs & Attempts
//! - [`RemoteJob`] - A server-side asynchronous unit of work
//! - [`JobStatus`] - What a single poll observed
//! - [`Attempt`] - One execution of one acquisition strategy
//!
//! ### Errors
//! - [`ErrorKind`] - Failure taxonomy
//! - [`ErrorClassification`] - Kind, status, message and remediation

pub mod classify;
pub mod error;
pub mod models;

pub use classify::{ClassifyContext, ErrorClassification, classify};
pub use error::ErrorKind;
pub use models::{
    Attempt, AttemptOutcome, JobState, JobStatus, MIB, MediaKind, Platform, ProgressEvent,
    RemoteJob, ResourceRef, Stage,
};
