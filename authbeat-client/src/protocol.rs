//! Heartbeat wire schema.
//!
//! Request and response bodies are `{"encrypted_data": <token>}`; the token
//! wraps [`HeartbeatRequest`] going out and [`HeartbeatVerdict`] coming back.
//! Error replies may carry `{"detail": "..."}` in the clear.

use crate::device::DeviceInfo;
use serde::{Deserialize, Serialize};

/// Endpoint path relative to the server URL.
pub const HEARTBEAT_PATH: &str = "/api/auth/heartbeat";

/// Outer JSON body in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub encrypted_data: String,
}

/// Plaintext of the request token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub device_id: String,
    pub software_name: String,
    pub device_info: DeviceInfo,
}

/// Plaintext of the response token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatVerdict {
    #[serde(default)]
    pub authorized: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

impl HeartbeatVerdict {
    /// Missing `authorized` reads as not authorized.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.authorized.unwrap_or(false)
    }

    /// Missing `message` reads as empty.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }
}

/// Body of a non-200 reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
}
