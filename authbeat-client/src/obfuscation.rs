//! Time-keyed obfuscation of the local verdict cache.
//!
//! Layout before the outer pass:
//!
//! ```text
//! prefix_tag(4) | len(4, BE) | zlib(plaintext) ^ key_material
//! ```
//!
//! The whole buffer is then XORed with `SHA-256(key_material || prefix_tag)`.
//! `prefix_tag` is the first four bytes of `MD5("{device}:{software}:{hour}")`,
//! so the write hour is never stored; the reader recovers it by trying every
//! hour within `validity_days * 24 + 12` of its own clock and accepting the
//! first one whose tag reappears in the decoded header.
//!
//! This is obfuscation, not encryption: every key input is derivable from
//! values an attacker on the same machine can read.

use crate::error::{AuthError, AuthResult};
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use md5::Md5;
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use tracing::debug;

/// Extra hours searched beyond the validity window, for clock skew.
pub const SLACK_HOURS: i64 = 12;

const HOUR_SECS: i64 = 60 * 60;
const TAG_LEN: usize = 4;
const HEADER_LEN: usize = TAG_LEN + 4;
const KEY_SUFFIX: &str = "obfuscate_v1";

/// Coarse time quantum that keys the outer XOR pass.
#[must_use]
pub fn hour_bucket(now_unix: i64) -> i64 {
    now_unix.div_euclid(HOUR_SECS)
}

/// Everything needed to obfuscate or recover one device's cache blob.
#[derive(Clone)]
pub struct ObfuscationContext {
    device_id: String,
    software_name: String,
    key_material: [u8; 32],
    max_hour_offset: i64,
}

impl std::fmt::Debug for ObfuscationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObfuscationContext")
            .field("device_id", &self.device_id)
            .field("software_name", &self.software_name)
            .field("key_material", &"[REDACTED]")
            .field("max_hour_offset", &self.max_hour_offset)
            .finish()
    }
}

impl ObfuscationContext {
    /// Builds a context. The search bound is `validity_days * 24 + 12` hours.
    pub fn new(
        server_url: &str,
        device_id: impl Into<String>,
        software_name: impl Into<String>,
        validity_days: u32,
    ) -> Self {
        let device_id = device_id.into();
        let software_name = software_name.into();
        let key_material = Sha256::digest(
            format!("{server_url}:{device_id}:{software_name}:{KEY_SUFFIX}").as_bytes(),
        )
        .into();

        Self {
            device_id,
            software_name,
            key_material,
            max_hour_offset: i64::from(validity_days) * 24 + SLACK_HOURS,
        }
    }

    /// `SHA-256("{server}:{device}:{software}:obfuscate_v1")`.
    #[must_use]
    pub fn key_material(&self) -> &[u8; 32] {
        &self.key_material
    }

    /// Largest hour offset tried in either direction.
    #[must_use]
    pub fn max_hour_offset(&self) -> i64 {
        self.max_hour_offset
    }

    /// Tag written at the front of a blob produced during `bucket`.
    #[must_use]
    pub fn prefix_tag(&self, bucket: i64) -> [u8; TAG_LEN] {
        let digest = Md5::digest(
            format!("{}:{}:{}", self.device_id, self.software_name, bucket).as_bytes(),
        );
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&digest[..TAG_LEN]);
        tag
    }

    fn outer_key(&self, tag: &[u8; TAG_LEN]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.key_material);
        hasher.update(tag);
        hasher.finalize().into()
    }

    /// Compresses and scrambles `plaintext`, keyed to the hour containing `now_unix`.
    pub fn obfuscate(&self, plaintext: &[u8], now_unix: i64) -> AuthResult<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(plaintext)
            .map_err(|e| AuthError::Storage(format!("compress cache: {e}")))?;
        let mut body = encoder
            .finish()
            .map_err(|e| AuthError::Storage(format!("compress cache: {e}")))?;
        xor_cycle(&mut body, &self.key_material);

        let len = u32::try_from(body.len())
            .map_err(|_| AuthError::Storage("cache payload too large".into()))?;
        let tag = self.prefix_tag(hour_bucket(now_unix));

        let mut packed = Vec::with_capacity(HEADER_LEN + body.len());
        packed.extend_from_slice(&tag);
        packed.extend_from_slice(&len.to_be_bytes());
        packed.extend_from_slice(&body);

        xor_cycle(&mut packed, &self.outer_key(&tag));
        Ok(packed)
    }

    /// Recovers the plaintext by searching hour offsets around `now_unix`.
    ///
    /// # Errors
    /// Returns [`AuthError::Recovery`] if no offset in
    /// `[-max_hour_offset, max_hour_offset]` yields a consistent blob.
    pub fn deobfuscate(&self, blob: &[u8], now_unix: i64) -> AuthResult<Vec<u8>> {
        if blob.len() < HEADER_LEN {
            return Err(AuthError::Recovery);
        }

        let current = hour_bucket(now_unix);
        for offset in -self.max_hour_offset..=self.max_hour_offset {
            let tag = self.prefix_tag(current + offset);
            let outer = self.outer_key(&tag);

            // Cheap rejection on the tag before touching the rest.
            let mut head = [0u8; TAG_LEN];
            head.copy_from_slice(&blob[..TAG_LEN]);
            xor_cycle(&mut head, &outer);
            if head != tag {
                continue;
            }

            let mut unpacked = blob.to_vec();
            xor_cycle(&mut unpacked, &outer);

            let mut len_bytes = [0u8; 4];
            len_bytes.copy_from_slice(&unpacked[TAG_LEN..HEADER_LEN]);
            let len = u32::from_be_bytes(len_bytes) as usize;
            if len > unpacked.len() - HEADER_LEN {
                continue;
            }

            let mut body = unpacked[HEADER_LEN..HEADER_LEN + len].to_vec();
            xor_cycle(&mut body, &self.key_material);

            let mut plaintext = Vec::new();
            if ZlibDecoder::new(body.as_slice())
                .read_to_end(&mut plaintext)
                .is_err()
            {
                continue;
            }

            debug!("Recovered cache blob at hour offset {}", offset);
            return Ok(plaintext);
        }

        Err(AuthError::Recovery)
    }
}

/// XORs `data` in place against `key`, repeating the key as needed.
fn xor_cycle(data: &mut [u8], key: &[u8]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i % key.len()];
    }
}
