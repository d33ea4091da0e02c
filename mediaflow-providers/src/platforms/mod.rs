//! Per-platform strategy tables and URL normalizers.
//!
//! Each platform module exposes a `*_descriptor()` constructor used by the
//! [`crate::registry::PlatformRegistry`].

pub mod facebook;
pub mod instagram;
pub mod tiktok;
pub mod twitter;
pub mod youtube;

pub use facebook::facebook_descriptor;
pub use instagram::instagram_descriptor;
pub use tiktok::tiktok_descriptor;
pub use twitter::twitter_descriptor;
pub use youtube::youtube_descriptor;
