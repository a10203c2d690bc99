//! Shared test helpers for client tests.

#![allow(dead_code)]

use authbeat_client::{
    AuthClient, AuthError, AuthResult, Clock, ClientConfig, EncryptedPayload, HeartbeatRequest,
    HeartbeatTransport, HeartbeatVerdict, HttpReply, ManualClock,
};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const SECRET: &str = "test-client-secret";
pub const SERVER_URL: &str = "https://license.test";
pub const SOFTWARE: &str = "TestApp";
pub const DEVICE_ID: &str = "device-0123456789";

/// 2023-11-14T22:13:20Z, an arbitrary fixed instant.
pub const T0: i64 = 1_700_000_000;
pub const HOUR: i64 = 3_600;
pub const DAY: i64 = 24 * HOUR;

/// Config rooted in a temp dir, with a fixed device ID and an explicit secret.
pub fn test_config(dir: &TempDir) -> ClientConfig {
    ClientConfig {
        client_secret: Some(SECRET.to_string()),
        device_id: Some(DEVICE_ID.to_string()),
        cache_dir: Some(dir.path().join("cache")),
        device_store_dir: Some(dir.path().join("device")),
        ..ClientConfig::new(SERVER_URL, SOFTWARE)
    }
}

pub fn client_with(
    config: ClientConfig,
    transport: impl HeartbeatTransport + 'static,
    clock: &Arc<ManualClock>,
) -> AuthClient {
    let clock: Arc<dyn Clock> = clock.clone();
    AuthClient::with_parts(config, Box::new(transport), clock).unwrap()
}

#[derive(Default)]
struct ServerState {
    verdict: HeartbeatVerdict,
    requests: Vec<(String, HeartbeatRequest)>,
}

/// In-process license server: decrypts the request and answers with a sealed verdict.
#[derive(Clone)]
pub struct FakeServer {
    secret: String,
    state: Arc<Mutex<ServerState>>,
}

impl FakeServer {
    pub fn new(authorized: bool, message: &str) -> Self {
        Self::with_secret(SECRET, authorized, message)
    }

    /// A server that seals its replies with a different secret.
    pub fn with_secret(secret: &str, authorized: bool, message: &str) -> Self {
        let state = ServerState {
            verdict: HeartbeatVerdict {
                authorized: Some(authorized),
                message: Some(message.to_string()),
            },
            requests: Vec::new(),
        };
        Self {
            secret: secret.to_string(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn set_verdict(&self, authorized: bool, message: &str) {
        self.state.lock().unwrap().verdict = HeartbeatVerdict {
            authorized: Some(authorized),
            message: Some(message.to_string()),
        };
    }

    pub fn requests(&self) -> Vec<(String, HeartbeatRequest)> {
        self.state.lock().unwrap().requests.clone()
    }
}

impl HeartbeatTransport for FakeServer {
    fn post(&self, url: &str, payload: &EncryptedPayload) -> AuthResult<HttpReply> {
        // The request is always sealed with the real client secret.
        let request: HeartbeatRequest =
            match authbeat_crypto::decrypt_json(&payload.encrypted_data, SECRET) {
                Ok(r) => r,
                Err(_) => {
                    return Ok(HttpReply {
                        status: 400,
                        body: br#"{"detail":"invalid encrypted data"}"#.to_vec(),
                    })
                }
            };

        let mut state = self.state.lock().unwrap();
        state.requests.push((url.to_string(), request));
        let token = authbeat_crypto::encrypt_json(&state.verdict, &self.secret).unwrap();
        let body = serde_json::to_vec(&EncryptedPayload {
            encrypted_data: token,
        })
        .unwrap();
        Ok(HttpReply { status: 200, body })
    }
}

/// A server that cannot be reached.
pub struct Unreachable;

impl HeartbeatTransport for Unreachable {
    fn post(&self, _url: &str, _payload: &EncryptedPayload) -> AuthResult<HttpReply> {
        Err(AuthError::Transport("connection refused".into()))
    }
}

/// A server that always answers with a fixed status and body.
pub struct Canned {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HeartbeatTransport for Canned {
    fn post(&self, _url: &str, _payload: &EncryptedPayload) -> AuthResult<HttpReply> {
        Ok(HttpReply {
            status: self.status,
            body: self.body.clone(),
        })
    }
}
