//! Client configuration.

use crate::device::DeviceInfo;
use crate::error::{AuthError, AuthResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted when no secret is configured.
pub const SECRET_ENV_VAR: &str = "CLIENT_SECRET";

const DEFAULT_VALIDITY_DAYS: u32 = 7;
const DEFAULT_CHECK_INTERVAL_DAYS: u32 = 2;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Settings for an [`AuthClient`](crate::AuthClient).
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the license server (e.g. `https://license.example.com`).
    pub server_url: String,
    /// Name the software registers under.
    pub software_name: String,
    /// Shared secret. Falls back to `CLIENT_SECRET` when unset.
    pub client_secret: Option<String>,
    /// Externally supplied device ID; generated and persisted when unset.
    pub device_id: Option<String>,
    /// Replaces the collected device description.
    pub device_info: Option<DeviceInfo>,
    /// Cache directory override.
    pub cache_dir: Option<PathBuf>,
    /// Device-ID store directory override.
    pub device_store_dir: Option<PathBuf>,
    /// Keep a local verdict cache.
    pub enable_cache: bool,
    /// How long a cached verdict may be trusted.
    pub cache_validity_days: u32,
    /// Interval after which `needs_recheck` reports true.
    pub check_interval_days: u32,
    /// Heartbeat request timeout.
    pub request_timeout_secs: u64,
    /// Verbose diagnostics.
    pub debug: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            software_name: String::new(),
            client_secret: None,
            device_id: None,
            device_info: None,
            cache_dir: None,
            device_store_dir: None,
            enable_cache: true,
            cache_validity_days: DEFAULT_VALIDITY_DAYS,
            check_interval_days: DEFAULT_CHECK_INTERVAL_DAYS,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            debug: false,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server_url", &self.server_url)
            .field("software_name", &self.software_name)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("device_id", &self.device_id)
            .field("cache_dir", &self.cache_dir)
            .field("device_store_dir", &self.device_store_dir)
            .field("enable_cache", &self.enable_cache)
            .field("cache_validity_days", &self.cache_validity_days)
            .field("check_interval_days", &self.check_interval_days)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("debug", &self.debug)
            .finish()
    }
}

impl ClientConfig {
    /// Creates a config with defaults for everything but the two required fields.
    pub fn new(server_url: impl Into<String>, software_name: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            software_name: software_name.into(),
            ..Default::default()
        }
    }

    /// Loads a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> AuthResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AuthError::Configuration(format!("{}: {e}", path.display())))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Checks required fields.
    ///
    /// # Errors
    /// Returns [`AuthError::Configuration`] if the server URL or software name is empty.
    pub fn validate(&self) -> AuthResult<()> {
        if self.server_url.trim().is_empty() {
            return Err(AuthError::Configuration("server_url must not be empty".into()));
        }
        if self.software_name.trim().is_empty() {
            return Err(AuthError::Configuration(
                "software_name must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Returns the configured secret, or `CLIENT_SECRET` from the environment.
    ///
    /// # Errors
    /// Returns [`AuthError::Configuration`] if neither is set.
    pub fn resolve_secret(&self) -> AuthResult<String> {
        self.client_secret
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| std::env::var(SECRET_ENV_VAR).ok().filter(|s| !s.is_empty()))
            .ok_or_else(|| {
                AuthError::Configuration(format!(
                    "client secret not configured; pass client_secret or set {SECRET_ENV_VAR}"
                ))
            })
    }

    /// Server URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    /// Cache validity window in seconds.
    #[must_use]
    pub fn validity_secs(&self) -> i64 {
        i64::from(self.cache_validity_days) * 24 * 60 * 60
    }

    /// Recheck interval in seconds.
    #[must_use]
    pub fn check_interval_secs(&self) -> i64 {
        i64::from(self.check_interval_days) * 24 * 60 * 60
    }

    /// Heartbeat timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
