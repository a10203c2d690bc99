//! Token codec for the authbeat heartbeat channel.
//!
//! Every request and response body exchanged with the license service is a
//! single base64url token:
//!
//! ```text
//! version(0x80) | timestamp(8, BE) | iv(16) | AES-256-CBC ciphertext | HMAC-SHA256(32)
//! ```
//!
//! Both keys are derived from a shared secret that never leaves the process.
//! The codec is pure: no key material is cached between calls.

mod error;
mod key;
mod token;

pub use error::{CryptoError, CryptoResult};
pub use key::{derive_keys, master_key, DerivedKeyPair, KEY_SIZE};
pub use token::{
    decrypt, decrypt_json, encrypt, encrypt_json, open, Opened, BLOCK_SIZE, MIN_TOKEN_LEN,
    NONCE_SIZE, TAG_SIZE, TIMESTAMP_SIZE, VERSION,
};
