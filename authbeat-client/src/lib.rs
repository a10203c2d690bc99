//! Device authorization client for the authbeat license service.
//!
//! This crate handles:
//! - A periodic, encrypted heartbeat to the license server
//! - A local verdict cache that bridges network outages for a bounded window
//! - Device identity resolution and persistence
//!
//! # Design Principles
//!
//! - **Server is authoritative**: every check goes online first; the cache is
//!   only consulted when the server cannot be reached or answers garbage
//! - **Bounded grace**: a cached verdict is trusted for `cache_validity_days`
//! - **Degrade, don't fail**: cache and crypto errors are logged and treated as
//!   "no cache"; only missing configuration is fatal
//!
//! # Cache Format
//!
//! The cache file is *obfuscated*, not encrypted. Its keys derive from the
//! server URL, device ID and software name, none of which are secret, plus
//! the current hour. Reading it means searching nearby hours until the
//! embedded prefix tag lines up. See [`ObfuscationContext`].

mod cache;
mod clock;
mod config;
mod device;
mod engine;
mod error;
mod obfuscation;
mod protocol;
mod transport;

pub use cache::{default_cache_dir, CacheStore, VerdictRecord};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClientConfig, SECRET_ENV_VAR};
pub use device::{generate_device_id, DeviceFacts, DeviceIdentity, DeviceInfo};
pub use engine::{format_remaining, AuthClient, AuthOutcome, AuthorizationInfo, CacheInfo};
pub use error::{AuthError, AuthResult, AuthorizationError, FailureKind};
pub use obfuscation::{hour_bucket, ObfuscationContext, SLACK_HOURS};
pub use protocol::{
    EncryptedPayload, ErrorBody, HeartbeatRequest, HeartbeatVerdict, HEARTBEAT_PATH,
};
pub use transport::{HeartbeatTransport, HttpReply};

#[cfg(feature = "online")]
pub use transport::ReqwestTransport;
