//! Sealing and opening heartbeat tokens.
//!
//! Encrypt-then-MAC: AES-256-CBC with a random IV, authenticated by
//! HMAC-SHA256 over everything that precedes the tag. The embedded timestamp
//! is carried but not checked here; callers that need a freshness window read
//! it through [`open`].

use crate::error::{CryptoError, CryptoResult};
use crate::key::{derive_keys, DerivedKeyPair};
use aes::Aes256;
use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use cbc::cipher::{
    block_padding::{NoPadding, Pkcs7},
    BlockDecryptMut, BlockEncryptMut, KeyIvInit,
};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use sha2::Sha256;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Leading version byte of every token.
pub const VERSION: u8 = 0x80;

/// Size of the big-endian timestamp field.
pub const TIMESTAMP_SIZE: usize = 8;

/// Size of the random nonce, used verbatim as the CBC IV.
pub const NONCE_SIZE: usize = 16;

/// Size of the HMAC-SHA256 tag.
pub const TAG_SIZE: usize = 32;

/// AES block size.
pub const BLOCK_SIZE: usize = 16;

/// Smallest decoded token that can be split into its fields.
pub const MIN_TOKEN_LEN: usize = 1 + TIMESTAMP_SIZE + NONCE_SIZE + TAG_SIZE;

const HEADER_LEN: usize = 1 + TIMESTAMP_SIZE + NONCE_SIZE;

/// URL-safe alphabet; emits `=` padding, accepts input with or without it.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A successfully authenticated and decrypted token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opened {
    /// Unix seconds written by the sender.
    pub timestamp: u64,
    /// Decrypted payload.
    pub plaintext: Vec<u8>,
}

/// Encrypts `plaintext` into a base64url token.
///
/// # Errors
/// Returns [`CryptoError::InvalidSecret`] if `secret` is empty.
pub fn encrypt(plaintext: &[u8], secret: &str) -> CryptoResult<String> {
    let keys = derive_keys(secret)?;

    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    let timestamp = chrono::Utc::now().timestamp().max(0) as u64;

    Ok(TOKEN_ENGINE.encode(seal(&keys, plaintext, timestamp, &nonce)))
}

/// Authenticates and decrypts a token, returning only the payload.
pub fn decrypt(token: &str, secret: &str) -> CryptoResult<Vec<u8>> {
    open(token, secret).map(|opened| opened.plaintext)
}

/// Authenticates and decrypts a token, keeping the sender's timestamp.
///
/// Checks run in a fixed order: encoding, length, tag, version, block
/// alignment, padding. Nothing is decrypted before the tag verifies.
pub fn open(token: &str, secret: &str) -> CryptoResult<Opened> {
    let keys = derive_keys(secret)?;

    let data = TOKEN_ENGINE
        .decode(token.trim())
        .map_err(|e| CryptoError::Encoding(e.to_string()))?;

    if data.len() < MIN_TOKEN_LEN {
        return Err(CryptoError::Truncated {
            min: MIN_TOKEN_LEN,
            actual: data.len(),
        });
    }

    let (message, tag) = data.split_at(data.len() - TAG_SIZE);
    let mut mac = signer(keys.sign_key());
    mac.update(message);
    mac.verify_slice(tag).map_err(|_| CryptoError::Integrity)?;

    if message[0] != VERSION {
        return Err(CryptoError::UnsupportedVersion(message[0]));
    }

    let mut ts_bytes = [0u8; TIMESTAMP_SIZE];
    ts_bytes.copy_from_slice(&message[1..1 + TIMESTAMP_SIZE]);
    let mut iv = [0u8; NONCE_SIZE];
    iv.copy_from_slice(&message[1 + TIMESTAMP_SIZE..HEADER_LEN]);
    let ciphertext = &message[HEADER_LEN..];

    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::InvalidCiphertextLength(ciphertext.len()));
    }

    let padded = Aes256CbcDec::new(keys.enc_key().into(), (&iv).into())
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|_| CryptoError::InvalidCiphertextLength(ciphertext.len()))?;

    let plaintext = strip_pkcs7(padded)?;

    Ok(Opened {
        timestamp: u64::from_be_bytes(ts_bytes),
        plaintext,
    })
}

/// Serializes `value` as JSON and encrypts it.
pub fn encrypt_json<T: Serialize>(value: &T, secret: &str) -> CryptoResult<String> {
    let json = serde_json::to_vec(value)?;
    encrypt(&json, secret)
}

/// Decrypts a token and parses the payload as JSON.
pub fn decrypt_json<T: DeserializeOwned>(token: &str, secret: &str) -> CryptoResult<T> {
    let plaintext = decrypt(token, secret)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

/// Builds `version | timestamp | nonce | ciphertext | tag` with explicit inputs.
pub(crate) fn seal(
    keys: &DerivedKeyPair,
    plaintext: &[u8],
    timestamp: u64,
    nonce: &[u8; NONCE_SIZE],
) -> Vec<u8> {
    let ciphertext = Aes256CbcEnc::new(keys.enc_key().into(), nonce.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len() + TAG_SIZE);
    out.push(VERSION);
    out.extend_from_slice(&timestamp.to_be_bytes());
    out.extend_from_slice(nonce);
    out.extend_from_slice(&ciphertext);

    let mut mac = signer(keys.sign_key());
    mac.update(&out);
    out.extend_from_slice(&mac.finalize().into_bytes());
    out
}

fn signer(sign_key: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(sign_key).expect("HMAC-SHA256 accepts keys of any length")
}

/// Removes PKCS#7 padding: last byte in `1..=BLOCK_SIZE`, all padding bytes equal.
fn strip_pkcs7(mut padded: Vec<u8>) -> CryptoResult<Vec<u8>> {
    let pad = *padded.last().ok_or(CryptoError::Padding)? as usize;
    if pad == 0 || pad > BLOCK_SIZE || pad > padded.len() {
        return Err(CryptoError::Padding);
    }
    if padded[padded.len() - pad..].iter().any(|&b| b as usize != pad) {
        return Err(CryptoError::Padding);
    }
    padded.truncate(padded.len() - pad);
    Ok(padded)
}
