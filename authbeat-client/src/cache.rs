//! File-backed verdict cache.
//!
//! One record per (device, software, server), stored obfuscated under a name
//! derived from `MD5("{device}:{software}")`. A missing file means "never
//! checked"; an unreadable one is an error for the caller to downgrade.

use crate::clock::Clock;
use crate::config::ClientConfig;
use crate::error::{AuthError, AuthResult};
use crate::obfuscation::ObfuscationContext;
use md5::Md5;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::Digest;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// The last verdict obtained from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictRecord {
    #[serde(rename = "a")]
    pub authorized: bool,
    #[serde(rename = "m", default)]
    pub message: String,
    /// When the verdict was obtained (Unix seconds).
    #[serde(rename = "c", deserialize_with = "unix_seconds")]
    pub cached_at: i64,
    /// When the server was last asked (Unix seconds).
    #[serde(rename = "l", deserialize_with = "unix_seconds")]
    pub last_check: i64,
}

/// Accepts integer or fractional seconds; older writers stored floats.
fn unix_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    Ok(secs as i64)
}

/// Platform cache directory for the verdict file.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    let base = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(|| PathBuf::from("."));

    if cfg!(target_os = "windows") {
        base.join("Microsoft").join("CLR_v4.0")
    } else if cfg!(target_os = "macos") {
        base.join(".com.apple.metadata")
    } else {
        base.join(".fontconfig")
    }
}

/// Owns the single cache file for one client.
pub struct CacheStore {
    dir: PathBuf,
    path: PathBuf,
    codec: ObfuscationContext,
    validity_secs: i64,
    check_interval_secs: i64,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("path", &self.path)
            .field("validity_secs", &self.validity_secs)
            .field("check_interval_secs", &self.check_interval_secs)
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    /// Creates the store for `device_id` using the config's cache settings.
    ///
    /// Nothing touches the filesystem until the first read or write.
    pub fn new(config: &ClientConfig, device_id: &str, clock: Arc<dyn Clock>) -> Self {
        let dir = config.cache_dir.clone().unwrap_or_else(default_cache_dir);
        let path = dir.join(Self::file_name(device_id, &config.software_name));
        let codec = ObfuscationContext::new(
            &config.server_url,
            device_id,
            config.software_name.as_str(),
            config.cache_validity_days,
        );

        Self {
            dir,
            path,
            codec,
            validity_secs: config.validity_secs(),
            check_interval_secs: config.check_interval_secs(),
            clock,
        }
    }

    /// `runtime_<first 12 hex of MD5("{device}:{software}")>.dat`
    #[must_use]
    pub fn file_name(device_id: &str, software_name: &str) -> String {
        let digest = hex::encode(Md5::digest(
            format!("{device_id}:{software_name}").as_bytes(),
        ));
        format!("runtime_{}.dat", &digest[..12])
    }

    /// Location of the cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validity window in seconds.
    #[must_use]
    pub fn validity_secs(&self) -> i64 {
        self.validity_secs
    }

    /// Reads the cached verdict. `Ok(None)` when no file exists.
    ///
    /// # Errors
    /// [`AuthError::Storage`] on I/O failure, [`AuthError::Recovery`] when the
    /// blob cannot be de-obfuscated, [`AuthError::Serialization`] when the
    /// recovered JSON is not a record.
    pub fn read(&self) -> AuthResult<Option<VerdictRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let blob = fs::read(&self.path)
            .map_err(|e| AuthError::Storage(format!("read {}: {e}", self.path.display())))?;
        let plaintext = self.codec.deobfuscate(&blob, self.clock.now_unix())?;
        Ok(Some(serde_json::from_slice(&plaintext)?))
    }

    /// Stores a fresh verdict with `cached_at = last_check = now`.
    pub fn write(&self, authorized: bool, message: &str) -> AuthResult<VerdictRecord> {
        let now = self.clock.now_unix();
        let record = VerdictRecord {
            authorized,
            message: message.to_string(),
            cached_at: now,
            last_check: now,
        };
        self.write_record(&record)?;
        Ok(record)
    }

    /// Obfuscates and writes `record`, retrying once after deleting a stale file.
    pub fn write_record(&self, record: &VerdictRecord) -> AuthResult<()> {
        let json = serde_json::to_vec(record)?;
        let blob = self.codec.obfuscate(&json, self.clock.now_unix())?;

        fs::create_dir_all(&self.dir)
            .map_err(|e| AuthError::Storage(format!("create {}: {e}", self.dir.display())))?;

        if let Err(first) = fs::write(&self.path, &blob) {
            if !self.path.exists() {
                return Err(AuthError::Storage(format!(
                    "write {}: {first}",
                    self.path.display()
                )));
            }
            debug!("Cache write failed ({}), recreating file", first);
            fs::remove_file(&self.path)
                .and_then(|()| fs::write(&self.path, &blob))
                .map_err(|e| {
                    AuthError::Storage(format!("rewrite {}: {e}", self.path.display()))
                })?;
        }

        mark_hidden(&self.path);
        Ok(())
    }

    /// Refreshes `last_check` on the stored record, keeping `cached_at`.
    ///
    /// Returns `false` if there was nothing to refresh.
    pub fn touch_last_check(&self) -> AuthResult<bool> {
        let Some(mut record) = self.read()? else {
            return Ok(false);
        };
        record.last_check = self.clock.now_unix();
        self.write_record(&record)?;
        Ok(true)
    }

    /// True when `record` is younger than the validity window.
    #[must_use]
    pub fn is_record_valid(&self, record: &VerdictRecord) -> bool {
        self.clock.now_unix() - record.cached_at < self.validity_secs
    }

    /// Seconds left before `record` leaves the validity window (may be negative).
    #[must_use]
    pub fn remaining_validity(&self, record: &VerdictRecord) -> i64 {
        self.validity_secs - (self.clock.now_unix() - record.cached_at)
    }

    /// True when a readable record exists and is inside the validity window.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self.read(), Ok(Some(record)) if self.is_record_valid(&record))
    }

    /// True when there is no readable record or the last check is older than
    /// the recheck interval.
    #[must_use]
    pub fn needs_recheck(&self) -> bool {
        match self.read() {
            Ok(Some(record)) => self.is_recheck_due(&record),
            _ => true,
        }
    }

    /// True when `record` was last checked at least one recheck interval ago.
    #[must_use]
    pub fn is_recheck_due(&self, record: &VerdictRecord) -> bool {
        self.clock.now_unix() - record.last_check >= self.check_interval_secs
    }

    /// Deletes the cache file. A missing file is not an error.
    pub fn clear(&self) -> AuthResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::Storage(format!(
                "remove {}: {e}",
                self.path.display()
            ))),
        }
    }
}

/// Best effort; only Windows has a hidden attribute.
#[cfg(target_os = "windows")]
fn mark_hidden(path: &Path) {
    if let Err(e) = std::process::Command::new("attrib")
        .arg("+H")
        .arg(path)
        .status()
    {
        tracing::warn!("Could not hide cache file: {}", e);
    }
}

#[cfg(not(target_os = "windows"))]
fn mark_hidden(_path: &Path) {}
