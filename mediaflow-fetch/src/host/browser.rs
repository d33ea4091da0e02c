//! Browser cookie import for authenticated acquisition.
//!
//! Some platforms only serve media to signed-in sessions. Strategies whose
//! auth source is [`AuthSource::BrowserCookieJar`](crate::AuthSource) read the
//! server operator's browser cookies for the platform's domains and hand them
//! to the extractor as a Netscape cookie file.
//!
//! ## Supported Browsers
//!
//! - **Firefox**: SQLite, no encryption
//! - **Chrome / Chromium / Brave / Edge**: SQLite, values decrypted with the
//!   browser's Safe Storage key when possible, skipped otherwise

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::error::BrowserError;

// ============================================================================
// Browser Enum
// ============================================================================

/// Browsers whose cookie stores can be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Browser {
    /// Mozilla Firefox.
    Firefox,
    /// Google Chrome.
    Chrome,
    /// Open-source Chromium.
    Chromium,
    /// Brave (Chromium-based).
    Brave,
    /// Microsoft Edge (Chromium-based).
    Edge,
}

impl Browser {
    /// Returns the display name for this browser.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Firefox => "Firefox",
            Self::Chrome => "Chrome",
            Self::Chromium => "Chromium",
            Self::Brave => "Brave",
            Self::Edge => "Edge",
        }
    }

    /// Parses a browser name as used in configuration.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "firefox" => Some(Self::Firefox),
            "chrome" => Some(Self::Chrome),
            "chromium" => Some(Self::Chromium),
            "brave" => Some(Self::Brave),
            "edge" => Some(Self::Edge),
            _ => None,
        }
    }

    /// Returns the cookie database path for this browser on macOS.
    #[cfg(target_os = "macos")]
    pub fn cookie_db_path(&self) -> Option<PathBuf> {
        let support = dirs::home_dir()?.join("Library/Application Support");
        let path = match self {
            Self::Firefox => find_firefox_profile(&support.join("Firefox/Profiles"))?
                .join("cookies.sqlite"),
            Self::Chrome => support.join("Google/Chrome/Default/Cookies"),
            Self::Chromium => support.join("Chromium/Default/Cookies"),
            Self::Brave => support.join("BraveSoftware/Brave-Browser/Default/Cookies"),
            Self::Edge => support.join("Microsoft Edge/Default/Cookies"),
        };
        Some(path)
    }

    /// Returns the cookie database path for this browser on Linux and others.
    #[cfg(not(target_os = "macos"))]
    pub fn cookie_db_path(&self) -> Option<PathBuf> {
        let home = dirs::home_dir()?;
        let config = dirs::config_dir().unwrap_or_else(|| home.join(".config"));
        let path = match self {
            Self::Firefox => {
                find_firefox_profile(&home.join(".mozilla/firefox"))?.join("cookies.sqlite")
            }
            Self::Chrome => config.join("google-chrome/Default/Cookies"),
            Self::Chromium => config.join("chromium/Default/Cookies"),
            Self::Brave => config.join("BraveSoftware/Brave-Browser/Default/Cookies"),
            Self::Edge => config.join("microsoft-edge/Default/Cookies"),
        };
        Some(path)
    }

    /// Check if this browser's cookie store exists.
    pub fn is_installed(&self) -> bool {
        self.cookie_db_path().is_some_and(|p| p.exists())
    }

    /// Whether this browser encrypts cookie values at rest.
    pub fn uses_encrypted_cookies(&self) -> bool {
        !matches!(self, Self::Firefox)
    }

    /// Keychain service holding the Safe Storage password (macOS).
    fn safe_storage_service(&self) -> Option<&'static str> {
        match self {
            Self::Firefox => None,
            Self::Chrome => Some("Chrome Safe Storage"),
            Self::Chromium => Some("Chromium Safe Storage"),
            Self::Brave => Some("Brave Safe Storage"),
            Self::Edge => Some("Microsoft Edge Safe Storage"),
        }
    }

    /// Returns all browser variants.
    pub fn all() -> &'static [Browser] {
        &[
            Self::Firefox,
            Self::Chrome,
            Self::Chromium,
            Self::Brave,
            Self::Edge,
        ]
    }

    /// Default priority order for auto-detection.
    /// Firefox first (no decryption needed).
    pub fn default_priority() -> &'static [Browser] {
        &[
            Self::Firefox,
            Self::Chrome,
            Self::Chromium,
            Self::Brave,
            Self::Edge,
        ]
    }
}

impl std::fmt::Display for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Find the default Firefox profile directory.
fn find_firefox_profile(profiles_dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(profiles_dir).ok()?;

    let mut default_profile = None;
    let mut any_profile = None;

    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".default-release") {
            return Some(entry.path());
        } else if name.ends_with(".default") {
            default_profile = Some(entry.path());
        } else {
            any_profile = Some(entry.path());
        }
    }

    default_profile.or(any_profile)
}

// ============================================================================
// Cookie
// ============================================================================

/// A browser cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain the cookie belongs to.
    pub domain: String,
    /// Path the cookie is valid for.
    pub path: String,
    /// Expiration time; `None` for session cookies.
    pub expires: Option<DateTime<Utc>>,
    /// Whether the cookie requires HTTPS.
    pub secure: bool,
}

impl Cookie {
    /// Returns true if the cookie is expired.
    pub fn is_expired(&self) -> bool {
        self.expires.is_some_and(|exp| exp < Utc::now())
    }

    /// Returns true if this cookie applies to the given host.
    pub fn matches_domain(&self, domain: &str) -> bool {
        let cookie_domain = self.domain.trim_start_matches('.');
        domain == cookie_domain || domain.ends_with(&format!(".{cookie_domain}"))
    }

    /// One line of a Netscape cookie file.
    pub fn to_netscape_line(&self) -> String {
        let include_subdomains = if self.domain.starts_with('.') {
            "TRUE"
        } else {
            "FALSE"
        };
        let secure = if self.secure { "TRUE" } else { "FALSE" };
        let expires = self.expires.map_or(0, |e| e.timestamp());
        format!(
            "{}\t{include_subdomains}\t{}\t{secure}\t{expires}\t{}\t{}",
            self.domain, self.path, self.name, self.value
        )
    }
}

/// Renders cookies as a Netscape cookie file, the format extractors accept.
pub fn to_netscape_file(cookies: &[Cookie]) -> String {
    let mut out = String::from("# Netscape HTTP Cookie File\n");
    for cookie in cookies {
        let _ = writeln!(out, "{}", cookie.to_netscape_line());
    }
    out
}

// ============================================================================
// Cookie Jar Seam
// ============================================================================

/// A source of stored session cookies.
#[async_trait]
pub trait CookieJar: Send + Sync {
    /// Whether any cookie store can be reached at all.
    fn is_available(&self) -> bool;

    /// Returns unexpired cookies for any of the given domains.
    async fn cookies_for(&self, domains: &[&str]) -> Result<Vec<Cookie>, BrowserError>;
}

// ============================================================================
// Browser Cookie Importer
// ============================================================================

/// Reads cookies from locally installed browsers.
#[derive(Debug, Clone, Default)]
pub struct BrowserCookieImporter {
    preferred: Option<Browser>,
}

impl BrowserCookieImporter {
    /// Creates an importer that probes browsers in default priority order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an importer pinned to one browser.
    pub fn for_browser(browser: Browser) -> Self {
        Self {
            preferred: Some(browser),
        }
    }

    /// Browsers this importer will try, in order.
    fn priority(&self) -> Vec<Browser> {
        match self.preferred {
            Some(browser) => vec![browser],
            None => Browser::default_priority().to_vec(),
        }
    }

    /// Import cookies for a specific domain from a browser.
    #[instrument(skip(self), fields(browser = %browser, domain = %domain))]
    pub fn import_cookies(&self, browser: Browser, domain: &str) -> Result<Vec<Cookie>, BrowserError> {
        let db_path = browser
            .cookie_db_path()
            .ok_or_else(|| BrowserError::BrowserNotFound(browser.display_name().to_string()))?;

        if !db_path.exists() {
            return Err(BrowserError::DatabaseNotFound {
                browser: browser.display_name().to_string(),
                path: db_path.display().to_string(),
            });
        }

        let cookies = if browser.uses_encrypted_cookies() {
            read_chromium_cookies(&db_path, domain, browser)?
        } else {
            read_firefox_cookies(&db_path, domain)?
        };

        let cookies: Vec<Cookie> = cookies
            .into_iter()
            .filter(|c| !c.is_expired())
            .collect();

        if cookies.is_empty() {
            return Err(BrowserError::NoCookiesFound(domain.to_string()));
        }

        debug!(count = cookies.len(), "Cookies imported");
        Ok(cookies)
    }

    /// Check which browsers have a cookie store on this host.
    pub fn available_browsers(&self) -> Vec<Browser> {
        self.priority()
            .into_iter()
            .filter(Browser::is_installed)
            .collect()
    }
}

#[async_trait]
impl CookieJar for BrowserCookieImporter {
    fn is_available(&self) -> bool {
        !self.available_browsers().is_empty()
    }

    async fn cookies_for(&self, domains: &[&str]) -> Result<Vec<Cookie>, BrowserError> {
        let importer = self.clone();
        let domains: Vec<String> = domains.iter().map(|d| (*d).to_string()).collect();

        // SQLite reads and decryption block; keep them off the runtime threads.
        tokio::task::spawn_blocking(move || {
            let mut last_error = None;
            for browser in importer.available_browsers() {
                let mut found = Vec::new();
                for domain in &domains {
                    match importer.import_cookies(browser, domain) {
                        Ok(cookies) => found.extend(cookies),
                        Err(e) => {
                            trace!(browser = %browser, error = %e, "No cookies from browser");
                            last_error = Some(e);
                        }
                    }
                }
                if !found.is_empty() {
                    return Ok(found);
                }
            }
            Err(last_error.unwrap_or(BrowserError::NoBrowsersAvailable))
        })
        .await
        .map_err(|e| BrowserError::ReadFailed(format!("cookie import task failed: {e}")))?
    }
}

// ============================================================================
// Store Readers
// ============================================================================

/// Open a private copy of a cookie database; browsers hold a lock on the original.
fn open_snapshot(db_path: &Path) -> Result<(tempfile::NamedTempFile, Connection), BrowserError> {
    let snapshot = tempfile::Builder::new()
        .prefix("mediaflow-cookies-")
        .suffix(".sqlite")
        .tempfile()?;
    std::fs::copy(db_path, snapshot.path())
        .map_err(|e| BrowserError::ReadFailed(format!("Failed to copy database: {e}")))?;

    let conn = Connection::open_with_flags(snapshot.path(), OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| BrowserError::ReadFailed(format!("SQLite open error: {e}")))?;
    Ok((snapshot, conn))
}

fn read_firefox_cookies(db_path: &Path, domain: &str) -> Result<Vec<Cookie>, BrowserError> {
    debug!(path = %db_path.display(), "Reading Firefox cookies");
    let (_snapshot, conn) = open_snapshot(db_path)?;

    let mut stmt = conn
        .prepare(
            "SELECT name, value, host, path, expiry, isSecure
             FROM moz_cookies
             WHERE host LIKE ?1 OR host = ?2",
        )
        .map_err(|e| BrowserError::ReadFailed(format!("Prepare error: {e}")))?;

    let pattern = format!("%.{domain}");
    let cookies = stmt
        .query_map([pattern.as_str(), domain], |row| {
            let expiry: i64 = row.get(4)?;
            Ok(Cookie {
                name: row.get(0)?,
                value: row.get(1)?,
                domain: row.get(2)?,
                path: row.get(3)?,
                expires: (expiry > 0)
                    .then(|| Utc.timestamp_opt(expiry, 0).single())
                    .flatten(),
                secure: row.get::<_, i32>(5)? != 0,
            })
        })
        .map_err(|e| BrowserError::ReadFailed(format!("Query error: {e}")))?
        .filter_map(Result::ok)
        .collect();

    Ok(cookies)
}

/// Microseconds between 1601-01-01 and the Unix epoch.
const WINDOWS_EPOCH_OFFSET_MICROS: i64 = 11_644_473_600_000_000;

fn read_chromium_cookies(
    db_path: &Path,
    domain: &str,
    browser: Browser,
) -> Result<Vec<Cookie>, BrowserError> {
    debug!(path = %db_path.display(), browser = %browser, "Reading Chromium cookies");
    let (_snapshot, conn) = open_snapshot(db_path)?;

    let mut stmt = conn
        .prepare(
            "SELECT name, value, encrypted_value, host_key, path, expires_utc, is_secure
             FROM cookies
             WHERE host_key LIKE ?1 OR host_key = ?2",
        )
        .map_err(|e| BrowserError::ReadFailed(format!("Prepare error: {e}")))?;

    let pattern = format!("%.{domain}");
    let rows: Vec<(String, String, Vec<u8>, String, String, i64, i32)> = stmt
        .query_map([pattern.as_str(), domain], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ))
        })
        .map_err(|e| BrowserError::ReadFailed(format!("Query error: {e}")))?
        .filter_map(Result::ok)
        .collect();

    let mut key: Option<[u8; 16]> = None;
    let mut cookies = Vec::with_capacity(rows.len());

    for (name, value, encrypted, host_key, path, expires_utc, is_secure) in rows {
        let value = if !value.is_empty() {
            value
        } else if !encrypted.is_empty() {
            if key.is_none() {
                key = Some(chromium_key(browser)?);
            }
            let Some(key) = key.as_ref() else { continue };
            match decrypt_chromium_value(&encrypted, key) {
                Ok(v) => v,
                Err(e) => {
                    trace!(name = %name, error = %e, "Failed to decrypt cookie, skipping");
                    continue;
                }
            }
        } else {
            continue;
        };

        let expires = (expires_utc > 0)
            .then(|| {
                let secs = (expires_utc - WINDOWS_EPOCH_OFFSET_MICROS) / 1_000_000;
                Utc.timestamp_opt(secs, 0).single()
            })
            .flatten();

        cookies.push(Cookie {
            name,
            value,
            domain: host_key,
            path,
            expires,
            secure: is_secure != 0,
        });
    }

    Ok(cookies)
}

// ============================================================================
// Chromium Decryption
// ============================================================================

/// Derives the AES-128 key Chromium uses for `v10`/`v11` cookie values.
pub fn derive_chromium_key(password: &str, iterations: u32) -> [u8; 16] {
    let iterations = std::num::NonZeroU32::new(iterations).unwrap_or(std::num::NonZeroU32::MIN);
    let mut key = [0u8; 16];
    ring::pbkdf2::derive(
        ring::pbkdf2::PBKDF2_HMAC_SHA1,
        iterations,
        b"saltysalt",
        password.as_bytes(),
        &mut key,
    );
    key
}

#[cfg(target_os = "macos")]
fn chromium_key(browser: Browser) -> Result<[u8; 16], BrowserError> {
    let service = browser
        .safe_storage_service()
        .ok_or_else(|| BrowserError::DecryptionFailed("not a Chromium browser".to_string()))?;
    let password = keyring::Entry::new(service, "")
        .and_then(|entry| entry.get_password())
        .map_err(|e| BrowserError::DecryptionFailed(format!("Keychain error: {e}")))?;
    Ok(derive_chromium_key(&password, 1003))
}

#[cfg(not(target_os = "macos"))]
fn chromium_key(browser: Browser) -> Result<[u8; 16], BrowserError> {
    // Without a desktop secret service Chromium falls back to a fixed password.
    let password = browser
        .safe_storage_service()
        .and_then(|service| keyring::Entry::new(service, "").ok())
        .and_then(|entry| entry.get_password().ok())
        .unwrap_or_else(|| "peanuts".to_string());
    Ok(derive_chromium_key(&password, 1))
}

/// Decrypts a `v10`/`v11` value with AES-128-CBC via the system `openssl`.
///
/// Key material goes through the environment rather than argv so it does not
/// show up in process listings.
fn decrypt_chromium_value(encrypted: &[u8], key: &[u8; 16]) -> Result<String, BrowserError> {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let (version, ciphertext) = encrypted.split_at(encrypted.len().min(3));
    if version != b"v10" && version != b"v11" {
        return Err(BrowserError::DecryptionFailed(format!(
            "unknown encryption version: {version:?}"
        )));
    }

    // Chromium uses an IV of sixteen spaces.
    let mut child = Command::new("sh")
        .arg("-c")
        .arg("openssl enc -d -aes-128-cbc -K \"$MEDIAFLOW_COOKIE_KEY\" -iv \"$MEDIAFLOW_COOKIE_IV\"")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .env("MEDIAFLOW_COOKIE_KEY", hex(key))
        .env("MEDIAFLOW_COOKIE_IV", hex(&[b' '; 16]))
        .spawn()
        .map_err(|e| BrowserError::DecryptionFailed(format!("openssl unavailable: {e}")))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(ciphertext)?;
    }

    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(BrowserError::DecryptionFailed("openssl rejected the value".to_string()));
    }

    // Newer Chromium prefixes the plaintext with a 32-byte host digest.
    let plain = match String::from_utf8(output.stdout) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            let tail = bytes.get(32..).unwrap_or_default();
            String::from_utf8(tail.to_vec())
                .map_err(|e| BrowserError::DecryptionFailed(format!("UTF-8 error: {e}")))?
        }
    };
    Ok(plain)
}

fn hex(data: &[u8]) -> String {
    data.iter().fold(String::with_capacity(data.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(name: &str, value: &str, domain: &str) -> Cookie {
        Cookie {
            name: name.to_string(),
            value: value.to_string(),
            domain: domain.to_string(),
            path: "/".to_string(),
            expires: None,
            secure: true,
        }
    }

    #[test]
    fn test_cookie_matches_domain() {
        let c = cookie("SID", "abc", ".youtube.com");
        assert!(c.matches_domain("youtube.com"));
        assert!(c.matches_domain("www.youtube.com"));
        assert!(!c.matches_domain("notyoutube.com"));
    }

    #[test]
    fn test_netscape_file_format() {
        let mut c = cookie("sessionid", "s3cr3t", ".instagram.com");
        c.expires = Utc.timestamp_opt(1_900_000_000, 0).single();
        let file = to_netscape_file(&[c]);
        let mut lines = file.lines();
        assert_eq!(lines.next(), Some("# Netscape HTTP Cookie File"));
        assert_eq!(
            lines.next(),
            Some(".instagram.com\tTRUE\t/\tTRUE\t1900000000\tsessionid\ts3cr3t")
        );
    }

    #[test]
    fn test_cookie_is_expired() {
        let mut c = cookie("a", "b", "example.com");
        assert!(!c.is_expired());
        c.expires = Some(Utc::now() - chrono::Duration::hours(1));
        assert!(c.is_expired());
        c.expires = Some(Utc::now() + chrono::Duration::hours(1));
        assert!(!c.is_expired());
    }

    #[test]
    fn test_browser_from_name() {
        assert_eq!(Browser::from_name("Firefox"), Some(Browser::Firefox));
        assert_eq!(Browser::from_name(" chrome "), Some(Browser::Chrome));
        assert_eq!(Browser::from_name("netscape"), None);
    }

    #[test]
    fn test_default_priority_prefers_unencrypted() {
        assert_eq!(Browser::default_priority()[0], Browser::Firefox);
        assert!(!Browser::Firefox.uses_encrypted_cookies());
        assert!(Browser::Brave.uses_encrypted_cookies());
    }

    #[test]
    fn test_derive_chromium_key_is_stable() {
        let a = derive_chromium_key("peanuts", 1);
        let b = derive_chromium_key("peanuts", 1);
        assert_eq!(a, b);
        assert_ne!(a, derive_chromium_key("peanuts", 1003));
    }

    #[test]
    fn test_pinned_importer_only_probes_one_browser() {
        let importer = BrowserCookieImporter::for_browser(Browser::Edge);
        assert_eq!(importer.priority(), vec![Browser::Edge]);
    }
}
