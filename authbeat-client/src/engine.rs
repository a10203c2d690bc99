//! Authorization checks: online first, cache as a bounded fallback.
//!
//! Every check:
//! 1. reads the cache (absent, expired, or valid; unreadable counts as absent),
//! 2. always sends one heartbeat,
//! 3. on a usable reply, stores it and returns it as authoritative,
//! 4. otherwise returns the cached verdict if it is still valid,
//! 5. otherwise returns the online failure.
//!
//! `needs_recheck` is available on the store but does not gate step 2.

use crate::cache::{CacheStore, VerdictRecord};
use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::device::{DeviceFacts, DeviceIdentity, DeviceInfo};
use crate::error::{AuthError, AuthResult, AuthorizationError};
use crate::protocol::{
    EncryptedPayload, ErrorBody, HeartbeatRequest, HeartbeatVerdict, HEARTBEAT_PATH,
};
use crate::transport::HeartbeatTransport;
use authbeat_crypto::CryptoError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of one authorization check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthOutcome {
    /// The verdict (false whenever `success` is false).
    pub authorized: bool,
    /// Server message, or a local description of the failure.
    pub message: String,
    /// A verdict was obtained, online or from a valid cache.
    pub success: bool,
    /// The verdict came from the local cache.
    pub from_cache: bool,
}

impl AuthOutcome {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            authorized: false,
            message: message.into(),
            success: false,
            from_cache: false,
        }
    }

    fn online(verdict: &HeartbeatVerdict) -> Self {
        Self {
            authorized: verdict.is_authorized(),
            message: verdict.message().to_string(),
            success: true,
            from_cache: false,
        }
    }

    fn cached(record: &VerdictRecord) -> Self {
        Self {
            authorized: record.authorized,
            message: record.message.clone(),
            success: true,
            from_cache: true,
        }
    }
}

/// Outcome plus cache state, for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorizationInfo {
    pub authorized: bool,
    pub success: bool,
    pub from_cache: bool,
    pub message: String,
    pub device_id: String,
    pub server_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_time: Option<String>,
    pub cache_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at_readable: Option<String>,
}

/// Raw cache state, for debugging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheInfo {
    pub authorized: bool,
    pub message: String,
    pub cached_at: i64,
    pub last_check: i64,
    pub cache_age_days: f64,
    pub last_check_age_days: f64,
    pub cache_valid: bool,
    pub needs_check: bool,
}

/// Device authorization client.
pub struct AuthClient {
    config: ClientConfig,
    secret: String,
    device_id: String,
    device_info: DeviceInfo,
    cache: Option<CacheStore>,
    transport: Box<dyn HeartbeatTransport>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("server_url", &self.config.server_url)
            .field("software_name", &self.config.software_name)
            .field("device_id", &self.device_id)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl AuthClient {
    /// Creates a client using the blocking HTTP transport and the system clock.
    ///
    /// # Errors
    /// Returns [`AuthError::Configuration`] if the server URL, software name,
    /// or secret is missing.
    #[cfg(feature = "online")]
    pub fn new(config: ClientConfig) -> AuthResult<Self> {
        let transport = crate::transport::ReqwestTransport::new(config.request_timeout())?;
        Self::with_parts(config, Box::new(transport), Arc::new(SystemClock))
    }

    /// Creates a client with an explicit transport and clock.
    ///
    /// # Errors
    /// Returns [`AuthError::Configuration`] if the server URL, software name,
    /// or secret is missing.
    pub fn with_parts(
        config: ClientConfig,
        transport: Box<dyn HeartbeatTransport>,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<Self> {
        config.validate()?;
        let secret = config.resolve_secret()?;

        let facts = DeviceFacts::collect();
        let identity = DeviceIdentity::new(
            config.server_url.as_str(),
            config.software_name.as_str(),
            config.device_store_dir.clone(),
        );
        let device_id = identity.resolve(config.device_id.as_deref(), &facts);
        let device_info = config
            .device_info
            .clone()
            .unwrap_or_else(|| DeviceInfo::from_facts(&facts));

        let cache = config
            .enable_cache
            .then(|| CacheStore::new(&config, &device_id, Arc::clone(&clock)));

        Ok(Self {
            config,
            secret,
            device_id,
            device_info,
            cache,
            transport,
            clock,
        })
    }

    /// Creates a client with the system clock and a custom transport.
    pub fn with_transport(
        config: ClientConfig,
        transport: Box<dyn HeartbeatTransport>,
    ) -> AuthResult<Self> {
        Self::with_parts(config, transport, Arc::new(SystemClock))
    }

    /// The resolved device ID.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// The device description sent with each heartbeat.
    #[must_use]
    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    /// The client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The cache store, if caching is enabled.
    #[must_use]
    pub fn cache(&self) -> Option<&CacheStore> {
        self.cache.as_ref()
    }

    /// Sends one heartbeat and reports the server's verdict. Never touches the cache.
    pub fn check_online(&self) -> AuthOutcome {
        debug!("Starting online heartbeat");
        match self.heartbeat() {
            Ok(verdict) => {
                debug!("Heartbeat succeeded, authorized={}", verdict.is_authorized());
                AuthOutcome::online(&verdict)
            }
            Err(message) => AuthOutcome::failure(message),
        }
    }

    /// Runs the full online-then-cache check.
    pub fn check_authorization(&self) -> AuthOutcome {
        let Some(cache) = &self.cache else {
            return self.check_online();
        };

        debug!("Reading cache at {:?}", cache.path());
        let cached = match cache.read() {
            Ok(record) => record,
            Err(e) => {
                debug!("Cache unreadable, treating as absent: {}", e);
                None
            }
        };
        let valid = cached.as_ref().filter(|r| cache.is_record_valid(r));

        match (&cached, valid) {
            (_, Some(_)) => debug!("Valid cache present, still checking online"),
            (Some(_), None) => debug!("Cache expired, checking online"),
            (None, None) => debug!("No cache, checking online"),
        }

        let online = self.check_online();

        if online.success {
            match cache.write(online.authorized, &online.message) {
                Ok(_) => debug!("Cache updated at {:?}", cache.path()),
                Err(e) => warn!("Failed to update cache: {}", e),
            }
            return online;
        }

        if let Some(record) = valid {
            debug!(
                "Heartbeat failed ({}), using cached verdict, {} remaining",
                online.message,
                format_remaining(cache.remaining_validity(record))
            );
            return AuthOutcome::cached(record);
        }

        debug!("Heartbeat failed, no usable cache: {}", online.message);
        online
    }

    /// Runs a check and turns anything but an authorized verdict into an error.
    pub fn require_authorization(&self) -> Result<AuthOutcome, AuthorizationError> {
        let outcome = self.check_authorization();
        if outcome.success && outcome.authorized {
            return Ok(outcome);
        }
        Err(AuthorizationError {
            message: outcome.message.clone(),
            outcome: Some(outcome),
            device_id: self.device_id.clone(),
            server_url: self.config.server_url.clone(),
        })
    }

    /// Deletes the local cache file, if caching is enabled.
    pub fn clear_cache(&self) -> AuthResult<()> {
        match &self.cache {
            Some(cache) => cache.clear(),
            None => Ok(()),
        }
    }

    /// Runs a check and bundles the result with cache details.
    pub fn authorization_info(&self) -> AuthorizationInfo {
        let outcome = self.check_authorization();
        let mut info = AuthorizationInfo {
            authorized: outcome.authorized,
            success: outcome.success,
            from_cache: outcome.from_cache,
            message: outcome.message,
            device_id: self.device_id.clone(),
            server_url: self.config.server_url.clone(),
            remaining_time: None,
            cache_valid: false,
            cached_at: None,
            cached_at_readable: None,
        };

        if let Some(cache) = &self.cache {
            match cache.read() {
                Ok(Some(record)) => {
                    info.remaining_time = Some(format_remaining(cache.remaining_validity(&record)));
                    info.cache_valid = cache.is_record_valid(&record);
                    info.cached_at = Some(record.cached_at);
                    info.cached_at_readable = chrono::DateTime::from_timestamp(record.cached_at, 0)
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string());
                }
                _ => info.remaining_time = Some("no cache".to_string()),
            }
        }

        info
    }

    /// Current cache contents and ages, without contacting the server.
    pub fn cache_info(&self) -> Option<CacheInfo> {
        let cache = self.cache.as_ref()?;
        let record = cache.read().ok()??;
        let now = self.clock.now_unix();

        Some(CacheInfo {
            cache_age_days: (now - record.cached_at) as f64 / 86_400.0,
            last_check_age_days: (now - record.last_check) as f64 / 86_400.0,
            cache_valid: cache.is_record_valid(&record),
            needs_check: cache.is_recheck_due(&record),
            authorized: record.authorized,
            message: record.message,
            cached_at: record.cached_at,
            last_check: record.last_check,
        })
    }

    /// One heartbeat round trip. `Err` carries the user-facing failure message.
    fn heartbeat(&self) -> Result<HeartbeatVerdict, String> {
        let request = HeartbeatRequest {
            device_id: self.device_id.clone(),
            software_name: self.config.software_name.clone(),
            device_info: self.device_info.clone(),
        };
        let token = authbeat_crypto::encrypt_json(&request, &self.secret)
            .map_err(|e| format!("failed to encrypt request: {e}"))?;

        let url = format!("{}{HEARTBEAT_PATH}", self.config.base_url());
        let reply = self
            .transport
            .post(&url, &EncryptedPayload { encrypted_data: token })
            .map_err(|e| {
                debug!("Heartbeat transport error: {}", e);
                match e {
                    AuthError::Transport(msg) => format!("connection failed: {msg}"),
                    other => format!("connection failed: {other}"),
                }
            })?;

        if reply.status != 200 {
            let message = serde_json::from_slice::<ErrorBody>(&reply.body)
                .ok()
                .and_then(|b| b.detail)
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| format!("server error: {}", reply.status));
            debug!("Heartbeat rejected, status={}, message={}", reply.status, message);
            return Err(message);
        }

        let payload: EncryptedPayload = serde_json::from_slice(&reply.body)
            .map_err(|_| "malformed response".to_string())?;

        authbeat_crypto::decrypt_json(&payload.encrypted_data, &self.secret).map_err(|e| {
            debug!("Heartbeat response rejected: {}", e);
            match e {
                CryptoError::Serialization(_) => "malformed response payload".to_string(),
                _ => "failed to decrypt response".to_string(),
            }
        })
    }
}

/// Renders a remaining-seconds count as `"2d 3h 15m"`, or `"expired"`.
#[must_use]
pub fn format_remaining(secs: i64) -> String {
    if secs <= 0 {
        return "expired".to_string();
    }

    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 || parts.is_empty() {
        parts.push(format!("{minutes}m"));
    }
    parts.join(" ")
}
