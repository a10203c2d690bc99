//! HTTP transport for the heartbeat call.
//!
//! The engine only needs "POST this JSON, give me status and body"; the trait
//! keeps that seam narrow so tests and embedders can supply their own.

use crate::error::AuthResult;
use crate::protocol::EncryptedPayload;

/// Raw HTTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Posts an encrypted heartbeat and returns whatever came back.
///
/// Implementations return [`AuthError::Transport`](crate::AuthError::Transport)
/// only when no reply was received; HTTP error statuses are a normal reply.
pub trait HeartbeatTransport: Send + Sync {
    fn post(&self, url: &str, payload: &EncryptedPayload) -> AuthResult<HttpReply>;
}

#[cfg(feature = "online")]
mod online {
    use super::{HeartbeatTransport, HttpReply};
    use crate::error::{AuthError, AuthResult};
    use crate::protocol::EncryptedPayload;
    use std::time::Duration;

    /// Blocking `reqwest` client with a fixed timeout.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: reqwest::blocking::Client,
    }

    impl ReqwestTransport {
        /// Builds a client whose every request times out after `timeout`.
        pub fn new(timeout: Duration) -> AuthResult<Self> {
            let client = reqwest::blocking::Client::builder()
                .timeout(timeout)
                .user_agent(concat!("authbeat/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| AuthError::Transport(format!("http client: {e}")))?;
            Ok(Self { client })
        }
    }

    impl HeartbeatTransport for ReqwestTransport {
        fn post(&self, url: &str, payload: &EncryptedPayload) -> AuthResult<HttpReply> {
            let resp = self
                .client
                .post(url)
                .json(payload)
                .send()
                .map_err(|e| {
                    if e.is_timeout() {
                        AuthError::Transport(format!("request timed out: {e}"))
                    } else {
                        AuthError::Transport(e.to_string())
                    }
                })?;

            let status = resp.status().as_u16();
            let body = resp
                .bytes()
                .map_err(|e| AuthError::Transport(format!("read body: {e}")))?;

            Ok(HttpReply {
                status,
                body: body.to_vec(),
            })
        }
    }
}

#[cfg(feature = "online")]
pub use online::ReqwestTransport;
