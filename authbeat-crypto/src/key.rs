//! Key derivation from the shared secret.
//!
//! `master = SHA-256(secret)`, then each working key is the first 32 bytes of
//! `SHA-512(label || master)`. The peer implementations carry the master key as
//! base64url text; the decoded form is the raw digest, which is what is hashed
//! here.

use crate::error::{CryptoError, CryptoResult};
use sha2::{Digest, Sha256, Sha512};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of each derived key in bytes.
pub const KEY_SIZE: usize = 32;

const SIGN_LABEL: &[u8] = b"sign";
const ENCRYPT_LABEL: &[u8] = b"encrypt";

/// Signing and encryption keys derived from a shared secret.
///
/// Recomputed on every operation; never stored.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKeyPair {
    sign_key: [u8; KEY_SIZE],
    enc_key: [u8; KEY_SIZE],
}

impl DerivedKeyPair {
    /// Returns the HMAC-SHA256 key.
    pub fn sign_key(&self) -> &[u8; KEY_SIZE] {
        &self.sign_key
    }

    /// Returns the AES-256 key.
    pub fn enc_key(&self) -> &[u8; KEY_SIZE] {
        &self.enc_key
    }
}

impl std::fmt::Debug for DerivedKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKeyPair")
            .field("sign_key", &"[REDACTED]")
            .field("enc_key", &"[REDACTED]")
            .finish()
    }
}

/// Hashes the shared secret into the 32-byte master key.
///
/// # Errors
/// Returns [`CryptoError::InvalidSecret`] if `secret` is empty.
pub fn master_key(secret: &str) -> CryptoResult<[u8; KEY_SIZE]> {
    if secret.is_empty() {
        return Err(CryptoError::InvalidSecret);
    }
    Ok(Sha256::digest(secret.as_bytes()).into())
}

/// Derives the signing/encryption key pair from the shared secret.
///
/// Pure and deterministic: identical secrets always yield identical keys, on
/// the client and on the server.
///
/// # Errors
/// Returns [`CryptoError::InvalidSecret`] if `secret` is empty.
pub fn derive_keys(secret: &str) -> CryptoResult<DerivedKeyPair> {
    let mut master = master_key(secret)?;
    let pair = DerivedKeyPair {
        sign_key: labelled_key(SIGN_LABEL, &master),
        enc_key: labelled_key(ENCRYPT_LABEL, &master),
    };
    master.zeroize();
    Ok(pair)
}

fn labelled_key(label: &[u8], master: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE] {
    let mut hasher = Sha512::new();
    hasher.update(label);
    hasher.update(master);
    let digest = hasher.finalize();

    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&digest[..KEY_SIZE]);
    key
}
