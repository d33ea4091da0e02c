//! Server configuration.
//!
//! Settings come from three layers, later ones winning:
//! 1. Built-in defaults
//! 2. A JSON file (`--config`, or `<config dir>/mediaflow/config.json`)
//! 3. Environment variables (a `.env` file is loaded first)
//!
//! API keys never live in the file. They come from the environment or, when
//! absent there, from the system keychain.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mediaflow_fetch::host::keychain::{accounts, services};
use mediaflow_fetch::{Browser, KeychainApi, PollSettings, RetryPolicy, SizeLimits};
use mediaflow_providers::{GeminiSettings, ResearchSettings};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Environment variable holding the Gemini API key.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Environment variable holding the research API key.
pub const RESEARCH_API_KEY_ENV: &str = "RESEARCH_API_KEY";
/// Environment variable overriding the listen address.
pub const BIND_ENV: &str = "MEDIAFLOW_BIND";
/// Environment variable overriding the scratch root.
pub const TEMP_DIR_ENV: &str = "MEDIAFLOW_TEMP_DIR";

// ============================================================================
// Errors
// ============================================================================

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Config file is not valid JSON for [`ServerConfig`].
    #[error("Invalid config file {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
}

// ============================================================================
// Secret
// ============================================================================

/// An API key. `Debug` and `Display` never show the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps a value; blank values yield `None`.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into().trim().to_string();
        if value.is_empty() { None } else { Some(Self(value)) }
    }

    /// The raw value, for building request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// API keys for the remote services.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    /// Gemini key (file store and analysis).
    pub gemini: Option<Secret>,
    /// Research service key.
    pub research: Option<Secret>,
}

// ============================================================================
// Sections
// ============================================================================

/// Media acquisition settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AcquireConfig {
    /// Attempts and backoff per strategy.
    pub retry: RetryPolicy,
    /// Bound for one extractor run, in seconds.
    pub attempt_timeout_secs: u64,
    /// Bound for the whole acquisition, in seconds.
    pub max_duration_secs: u64,
    /// yt-dlp binary name or path.
    pub ytdlp_binary: String,
    /// Whether browser-cookie strategies may read local browser profiles.
    pub browser_cookies: bool,
    /// Only read cookies from this browser (`firefox`, `chrome`, ...).
    /// Every installed browser is probed when unset.
    pub cookie_browser: Option<String>,
    /// Root for scratch directories.
    pub temp_root: PathBuf,
}

impl AcquireConfig {
    /// The browser cookie imports are pinned to, if a known one is named.
    pub fn pinned_browser(&self) -> Option<Browser> {
        let name = self.cookie_browser.as_deref()?;
        let browser = Browser::from_name(name);
        if browser.is_none() {
            warn!(browser = %name, "Unknown cookie browser; probing all browsers");
        }
        browser
    }
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            attempt_timeout_secs: 300,
            max_duration_secs: 900,
            ytdlp_binary: "yt-dlp".to_string(),
            browser_cookies: true,
            cookie_browser: None,
            temp_root: std::env::temp_dir().join("mediaflow"),
        }
    }
}

/// Upload-and-analyze settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    /// File processing poll policy.
    pub poll: PollSettings,
    /// Bound for the whole pipeline, in seconds.
    pub max_duration_secs: u64,
    /// Gemini endpoint and model.
    pub gemini: GeminiSettings,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            poll: PollSettings::media_processing(),
            max_duration_secs: 900,
            gemini: GeminiSettings::default(),
        }
    }
}

/// Research settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResearchConfig {
    /// Poll policy.
    pub poll: PollSettings,
    /// Bound for the whole pipeline, in seconds.
    pub max_duration_secs: u64,
    /// Research endpoint and model.
    pub service: ResearchSettings,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            poll: PollSettings::research(),
            max_duration_secs: 1_900,
            service: ResearchSettings::default(),
        }
    }
}

// ============================================================================
// Server Config
// ============================================================================

/// Complete server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Listen address.
    pub bind: String,
    /// Byte ceilings per media kind.
    pub limits: SizeLimits,
    /// Acquisition settings.
    pub acquire: AcquireConfig,
    /// Upload-and-analyze settings.
    pub analysis: AnalysisConfig,
    /// Research settings.
    pub research: ResearchConfig,
    /// API keys; never read from or written to the file.
    #[serde(skip)]
    pub secrets: Secrets,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
            limits: SizeLimits::default(),
            acquire: AcquireConfig::default(),
            analysis: AnalysisConfig::default(),
            research: ResearchConfig::default(),
            secrets: Secrets::default(),
        }
    }
}

impl ServerConfig {
    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mediaflow")
            .join("config.json")
    }

    /// Loads the file at `path`, or the default path when `None`.
    ///
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        if !explicit && !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path: path.clone(), source })?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Applies environment overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Applies environment overrides read through `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(GEMINI_API_KEY_ENV).and_then(Secret::new) {
            self.secrets.gemini = Some(key);
        }
        if let Some(key) = lookup(RESEARCH_API_KEY_ENV).and_then(Secret::new) {
            self.secrets.research = Some(key);
        }
        if let Some(bind) = lookup(BIND_ENV).filter(|b| !b.trim().is_empty()) {
            self.bind = bind;
        }
        if let Some(dir) = lookup(TEMP_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            self.acquire.temp_root = PathBuf::from(dir);
        }
    }

    /// Fills missing API keys from the keychain. Keychain failures only log.
    pub async fn fill_from_keychain(&mut self, keychain: &dyn KeychainApi) {
        for (service, slot) in [
            (services::GEMINI, &mut self.secrets.gemini),
            (services::RESEARCH, &mut self.secrets.research),
        ] {
            if slot.is_some() {
                continue;
            }
            match keychain.get(service, accounts::API_KEY).await {
                Ok(Some(value)) => {
                    debug!(service, "API key loaded from keychain");
                    *slot = Secret::new(value);
                }
                Ok(None) => {}
                Err(e) => warn!(service, error = %e, "Keychain lookup failed"),
            }
        }
    }

    /// Aggregate budget of the acquire pipeline.
    pub fn acquire_max_duration(&self) -> Duration {
        Duration::from_secs(self.acquire.max_duration_secs)
    }

    /// Aggregate budget of the analyze pipeline.
    pub fn analysis_max_duration(&self) -> Duration {
        Duration::from_secs(self.analysis.max_duration_secs)
    }

    /// Aggregate budget of the research pipeline.
    pub fn research_max_duration(&self) -> Duration {
        Duration::from_secs(self.research.max_duration_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mediaflow_fetch::KeychainError;
    use std::collections::HashMap;

    #[test]
    fn test_secret_redacts() {
        let secret = Secret::new("sk-very-secret").unwrap();
        assert!(!format!("{secret:?}").contains("very"));
        assert!(!format!("{secret}").contains("very"));
        assert_eq!(secret.expose(), "sk-very-secret");
        assert!(Secret::new("   ").is_none());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (GEMINI_API_KEY_ENV, "g-key"),
            (RESEARCH_API_KEY_ENV, ""),
            (BIND_ENV, "0.0.0.0:9000"),
            (TEMP_DIR_ENV, "/var/tmp/mf"),
        ]
        .into_iter()
        .collect();

        let mut config = ServerConfig::default();
        config.apply_env_with(|k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(config.secrets.gemini.as_ref().map(Secret::expose), Some("g-key"));
        assert!(config.secrets.research.is_none());
        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.acquire.temp_root, PathBuf::from("/var/tmp/mf"));
    }

    #[test]
    fn test_pinned_browser_by_name() {
        let mut acquire = AcquireConfig::default();
        assert_eq!(acquire.pinned_browser(), None);

        acquire.cookie_browser = Some("Firefox".to_string());
        assert_eq!(acquire.pinned_browser(), Some(Browser::Firefox));

        acquire.cookie_browser = Some("netscape".to_string());
        assert_eq!(acquire.pinned_browser(), None);

        let config: ServerConfig = serde_json::from_str(r#"{"acquire": {"cookieBrowser": "brave"}}"#).unwrap();
        assert_eq!(config.acquire.pinned_browser(), Some(Browser::Brave));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"acquire": {"retry": {"maxAttempts": 5}}, "research": {"poll": {"pollIntervalMs": 5000}}}"#,
        )
        .unwrap();

        let config = ServerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.acquire.retry.max_attempts, 5);
        assert_eq!(config.acquire.retry.base_delay_ms, 1000);
        assert_eq!(config.research.poll.poll_interval_ms, 5000);
        assert_eq!(config.research.poll.max_consecutive_poll_errors, 3);
        assert_eq!(config.analysis.poll, PollSettings::media_processing());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            ServerConfig::load(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_file_cannot_carry_secrets() {
        let config: ServerConfig = serde_json::from_str(r#"{"secrets": {"gemini": "x"}}"#).unwrap();
        assert!(config.secrets.gemini.is_none());
    }

    struct FakeKeychain;

    #[async_trait]
    impl KeychainApi for FakeKeychain {
        async fn get(&self, service: &str, _account: &str) -> Result<Option<String>, KeychainError> {
            match service {
                "gemini" => Ok(Some("from-keychain".to_string())),
                _ => Err(KeychainError::AccessDenied),
            }
        }
    }

    #[tokio::test]
    async fn test_keychain_fills_only_missing_keys() {
        let mut config = ServerConfig::default();
        config.fill_from_keychain(&FakeKeychain).await;
        assert_eq!(config.secrets.gemini.as_ref().map(Secret::expose), Some("from-keychain"));
        assert!(config.secrets.research.is_none());

        let mut config = ServerConfig::default();
        config.secrets.gemini = Secret::new("from-env");
        config.fill_from_keychain(&FakeKeychain).await;
        assert_eq!(config.secrets.gemini.as_ref().map(Secret::expose), Some("from-env"));
    }
}
