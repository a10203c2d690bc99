//! Error types for the authorization client.

use crate::engine::AuthOutcome;
use authbeat_crypto::CryptoError;
use thiserror::Error;

/// Authorization-client errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Required configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network failure, timeout, or an unusable HTTP reply.
    #[error("transport error: {0}")]
    Transport(String),

    /// Token rejected by the codec (tag, version, or padding).
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Cache blob could not be recovered within the hour-offset window.
    #[error("cache could not be recovered")]
    Recovery,

    /// Filesystem error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for client operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// How a failed authorization should be read by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The server could not be reached.
    Network,
    /// The server answered and the device is not entitled.
    Unauthorized,
    /// The server answered but rejected the request, or the reply was unusable.
    Validation,
}

const NETWORK_KEYWORDS: [&str; 4] = ["network", "timeout", "timed out", "connection"];

/// Returned by [`AuthClient::require_authorization`](crate::AuthClient::require_authorization)
/// when the device may not run.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AuthorizationError {
    /// Server- or locally-generated message.
    pub message: String,
    /// The outcome that produced this error.
    pub outcome: Option<AuthOutcome>,
    /// Device ID used for the check.
    pub device_id: String,
    /// License server URL.
    pub server_url: String,
}

impl AuthorizationError {
    /// True when the message looks like a connectivity failure.
    #[must_use]
    pub fn is_network_error(&self) -> bool {
        let message = self
            .outcome
            .as_ref()
            .map_or(self.message.as_str(), |o| o.message.as_str())
            .to_lowercase();
        NETWORK_KEYWORDS.iter().any(|k| message.contains(k))
    }

    /// True when the server answered and said "not authorized".
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        match &self.outcome {
            Some(o) => o.success && !o.authorized,
            None => {
                let message = self.message.to_lowercase();
                message.contains("not authorized") || message.contains("disabled")
            }
        }
    }

    /// True when no usable verdict was obtained.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        match &self.outcome {
            Some(o) => !o.success,
            None => self.message.to_lowercase().contains("validation"),
        }
    }

    /// Classifies the failure. Unauthorized wins over network, which wins over validation.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        if self.is_unauthorized() {
            FailureKind::Unauthorized
        } else if self.is_network_error() {
            FailureKind::Network
        } else {
            FailureKind::Validation
        }
    }
}
