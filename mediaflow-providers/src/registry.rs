//! Platform registry.
//!
//! The registry provides static access to every platform descriptor and is
//! the [`PlanResolver`] the strategy executor uses.

use std::sync::OnceLock;

use mediaflow_core::Platform;
use mediaflow_fetch::{PlanResolver, PlatformPlan};
use tracing::debug;

use crate::descriptor::PlatformDescriptor;
use crate::platforms::{
    facebook_descriptor, instagram_descriptor, tiktok_descriptor, twitter_descriptor,
    youtube_descriptor,
};

// ============================================================================
// Static Registry
// ============================================================================

/// Static storage for all platform descriptors.
static DESCRIPTORS: OnceLock<Vec<PlatformDescriptor>> = OnceLock::new();

fn init_descriptors() -> Vec<PlatformDescriptor> {
    vec![
        youtube_descriptor(),
        tiktok_descriptor(),
        instagram_descriptor(),
        twitter_descriptor(),
        facebook_descriptor(),
    ]
}

// ============================================================================
// Platform Registry
// ============================================================================

/// Global registry of platform descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformRegistry;

impl PlatformRegistry {
    /// Returns all platform descriptors.
    pub fn all() -> &'static [PlatformDescriptor] {
        DESCRIPTORS.get_or_init(init_descriptors)
    }

    /// Gets a descriptor by platform.
    pub fn get(id: Platform) -> Option<&'static PlatformDescriptor> {
        Self::all().iter().find(|d| d.id == id)
    }

    /// Finds the descriptor whose hostnames match `url`.
    pub fn for_url(url: &str) -> Option<&'static PlatformDescriptor> {
        Self::get(Platform::from_url(url)?)
    }
}

impl PlanResolver for PlatformRegistry {
    fn resolve(&self, url: &str) -> Option<PlatformPlan> {
        let descriptor = Self::for_url(url)?;
        let plan = descriptor.plan_for(url);
        debug!(
            platform = %descriptor.display_name(),
            variants = plan.variants.len(),
            strategies = plan.strategies.len(),
            "Resolved acquisition plan"
        );
        Some(plan)
    }
}
