//! Device description and identity.
//!
//! The device ID is resolved once per client: an explicitly supplied ID wins,
//! then a previously persisted one, then a hash of stable hardware facts. Any
//! ID that was supplied or generated is written back so the next run agrees.

use crate::error::{AuthError, AuthResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;
use std::path::PathBuf;
use tracing::{debug, warn};

const STORE_DIR_NAME: &str = ".py_auth_device";

/// Raw facts gathered from the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFacts {
    pub system: String,
    pub release: String,
    pub machine: String,
    pub processor: String,
    pub hostname: String,
    pub machine_id: Option<String>,
    pub cpu_count: usize,
    pub disk_id: String,
}

impl DeviceFacts {
    /// Collects facts about the current device.
    #[must_use]
    pub fn collect() -> Self {
        Self {
            system: env::consts::OS.to_string(),
            release: get_os_release(),
            machine: env::consts::ARCH.to_string(),
            processor: env::consts::ARCH.to_string(),
            hostname: get_hostname(),
            machine_id: get_machine_id(),
            cpu_count: std::thread::available_parallelism().map_or(0, |n| n.get()),
            disk_id: if cfg!(windows) { "C:" } else { "/" }.to_string(),
        }
    }
}

/// Device description sent to the server with every heartbeat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub system: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub release: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub machine: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub processor: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub cpu_count: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl DeviceInfo {
    /// Collects information about the current device.
    #[must_use]
    pub fn collect() -> Self {
        Self::from_facts(&DeviceFacts::collect())
    }

    /// Builds the server-facing description from collected facts.
    #[must_use]
    pub fn from_facts(facts: &DeviceFacts) -> Self {
        Self {
            hostname: facts.hostname.clone(),
            system: facts.system.clone(),
            release: facts.release.clone(),
            machine: facts.machine.clone(),
            processor: facts.processor.clone(),
            cpu_count: facts.cpu_count,
            username: env::var("USER")
                .or_else(|_| env::var("USERNAME"))
                .unwrap_or_default(),
        }
    }
}

/// Resolves and persists the device ID for one (server, software) pair.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    store_dir: PathBuf,
    server_url: String,
    software_name: String,
}

impl DeviceIdentity {
    /// Creates a resolver. `store_dir` defaults to `~/.py_auth_device`.
    pub fn new(
        server_url: impl Into<String>,
        software_name: impl Into<String>,
        store_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            store_dir: store_dir.unwrap_or_else(default_store_dir),
            server_url: server_url.into(),
            software_name: software_name.into(),
        }
    }

    /// Path of the plain-text file holding the ID.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        let server_hash = hex::encode(Sha256::digest(self.server_url.as_bytes()));
        let software_hash = if self.software_name.is_empty() {
            "default".to_string()
        } else {
            hex::encode(Sha256::digest(self.software_name.as_bytes()))[..8].to_string()
        };
        self.store_dir
            .join(format!("device_{}_{software_hash}.txt", &server_hash[..12]))
    }

    /// Reads a previously persisted ID.
    #[must_use]
    pub fn load(&self) -> Option<String> {
        std::fs::read_to_string(self.path())
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Writes `device_id` to the store.
    pub fn persist(&self, device_id: &str) -> AuthResult<()> {
        std::fs::create_dir_all(&self.store_dir)
            .and_then(|()| std::fs::write(self.path(), device_id))
            .map_err(|e| AuthError::Storage(format!("persist device id: {e}")))
    }

    /// Returns the device ID to use, persisting it when it is new.
    ///
    /// Persistence failures are logged and otherwise ignored.
    pub fn resolve(&self, provided: Option<&str>, facts: &DeviceFacts) -> String {
        if let Some(id) = provided.filter(|s| !s.is_empty()) {
            self.persist_quietly(id);
            return id.to_string();
        }

        if let Some(id) = self.load() {
            debug!("Using persisted device id from {:?}", self.path());
            return id;
        }

        let id = generate_device_id(facts, &self.software_name);
        debug!("Generated new device id");
        self.persist_quietly(&id);
        id
    }

    fn persist_quietly(&self, device_id: &str) {
        if let Err(e) = self.persist(device_id) {
            warn!("Failed to persist device id: {}", e);
        }
    }
}

/// Hashes stable hardware facts and the software name into a 32-hex-char
/// device ID.
///
/// Falls back to a random UUID when no hardware facts are available; the
/// software name alone never produces a stable ID.
#[must_use]
pub fn generate_device_id(facts: &DeviceFacts, software_name: &str) -> String {
    let cpu = facts.cpu_count.to_string();
    let mut components: Vec<&str> = [
        facts.machine_id.as_deref().unwrap_or(""),
        facts.disk_id.as_str(),
        cpu.as_str(),
        facts.system.as_str(),
        facts.machine.as_str(),
    ]
    .into_iter()
    .filter(|c| !c.is_empty() && *c != "0")
    .collect();

    if components.is_empty() {
        return uuid::Uuid::new_v4().to_string();
    }
    if !software_name.is_empty() {
        components.push(software_name);
    }

    hex::encode(Sha256::digest(components.join("-").as_bytes()))[..32].to_string()
}

fn default_store_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STORE_DIR_NAME)
}

fn get_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn get_os_release() -> String {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("sw_vers")
            .arg("-productVersion")
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|s| format!("macOS {}", s.trim()))
            .unwrap_or_else(|| "macOS".to_string())
    }

    #[cfg(target_os = "windows")]
    {
        "Windows".to_string()
    }

    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/os-release")
            .ok()
            .and_then(|content| {
                content
                    .lines()
                    .find(|l| l.starts_with("PRETTY_NAME="))
                    .map(|l| l.trim_start_matches("PRETTY_NAME=").trim_matches('"').to_string())
            })
            .unwrap_or_else(|| "Linux".to_string())
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        env::consts::OS.to_string()
    }
}

fn get_machine_id() -> Option<String> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .find(|l| l.contains("IOPlatformUUID"))
                    .and_then(|l| l.split('"').nth(3))
                    .map(String::from)
            })
    }

    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/machine-id")
            .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}
