//! Domain models for mediaflow.
//!
//! ## Submodules
//!
//! - [`platform`] - Platforms and media kinds
//! - [`event`] - Progress events streamed to clients
//! - [`job`] - Remote asynchronous jobs
//! - [`attempt`] - Acquisition attempt records

mod attempt;
mod event;
mod job;
mod platform;

pub use attempt::{Attempt, AttemptOutcome, ResourceRef};
pub use event::{ProgressEvent, Stage};
pub use job::{JobState, JobStatus, RemoteJob};
pub use platform::{MIB, MediaKind, Platform};
