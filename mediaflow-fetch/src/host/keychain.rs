//! API key lookup in the system keychain.
//!
//! Operators who prefer not to keep service keys in the environment can store
//! them under the `mediaflow:<service>` keychain entry instead:
//! - macOS: Keychain Services
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring, KDE Wallet)

use async_trait::async_trait;
use keyring::Entry;
use tracing::{debug, warn};

use crate::error::KeychainError;

/// Service name prefix for mediaflow credentials.
const SERVICE_PREFIX: &str = "mediaflow";

// ============================================================================
// Keychain API Trait
// ============================================================================

/// Read access to stored credentials.
#[async_trait]
pub trait KeychainApi: Send + Sync {
    /// Looks up a credential.
    ///
    /// * `Ok(Some(secret))` - Credential found
    /// * `Ok(None)` - No entry, or an empty one
    /// * `Err(e)` - The keychain could not be reached
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError>;
}

// ============================================================================
// System Keychain Implementation
// ============================================================================

/// Keychain backed by the platform credential store.
#[derive(Debug, Clone, Default)]
pub struct SystemKeychain;

impl SystemKeychain {
    /// Creates a new system keychain instance.
    pub fn new() -> Self {
        Self
    }

    /// Builds the full service name with prefix.
    fn full_service(service: &str) -> String {
        format!("{SERVICE_PREFIX}:{service}")
    }

    fn entry(service: &str, account: &str) -> Result<Entry, KeychainError> {
        Entry::new(&Self::full_service(service), account)
            .map_err(|e| KeychainError::Platform(e.to_string()))
    }
}

#[async_trait]
impl KeychainApi for SystemKeychain {
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError> {
        let service = service.to_string();
        let account = account.to_string();

        // Secret Service talks D-Bus synchronously.
        tokio::task::spawn_blocking(move || {
            let entry = Self::entry(&service, &account)?;
            match entry.get_password() {
                Ok(secret) if !secret.is_empty() => {
                    debug!(service = %service, account = %account, "Credential found");
                    Ok(Some(secret))
                }
                Ok(_) | Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => {
                    warn!(service = %service, account = %account, error = %e, "Failed to get credential");
                    Err(e.into())
                }
            }
        })
        .await
        .map_err(|e| KeychainError::Platform(e.to_string()))?
    }
}

// ============================================================================
// Credential Keys
// ============================================================================

/// Service names for stored keys.
pub mod services {
    /// Gemini file and generation API.
    pub const GEMINI: &str = "gemini";
    /// Deep research API.
    pub const RESEARCH: &str = "research";
}

/// Account names for stored keys.
pub mod accounts {
    /// API key credential.
    pub const API_KEY: &str = "api_key";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_service_name() {
        assert_eq!(SystemKeychain::full_service(services::GEMINI), "mediaflow:gemini");
        assert_eq!(SystemKeychain::full_service(services::RESEARCH), "mediaflow:research");
    }
}
