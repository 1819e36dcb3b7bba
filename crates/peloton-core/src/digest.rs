//! Keyed packet digest — tamper evidence for protected message types.
//!
//! The digest is a BLAKE3 keyed hash of the serialized pre-digest content
//! map, truncated to 16 bytes and hex-encoded. It authenticates the record;
//! it does not hide it — the payload still travels in the clear.

use std::fmt;

/// Key-derivation context. Changing this invalidates every digest already
/// on the air, fleet-wide.
const KEY_CONTEXT: &str = "peloton 2026-08 packet digest v1";

/// Digest size in bytes (32 hex characters on the wire).
pub const DIGEST_LEN: usize = 16;

/// A derived signing key. Built once from the process secret and shared
/// by the codec; cheap to clone.
#[derive(Clone)]
pub struct SigningKey([u8; 32]);

impl SigningKey {
    /// Derive the 32-byte key from a configured secret string.
    pub fn from_secret(secret: &str) -> Self {
        Self(blake3::derive_key(KEY_CONTEXT, secret.as_bytes()))
    }

    /// Digest of the serialized content, hex-encoded.
    pub fn sign(&self, payload: &[u8]) -> String {
        let hash = blake3::keyed_hash(&self.0, payload);
        hex::encode(&hash.as_bytes()[..DIGEST_LEN])
    }
}

// Key material stays out of Debug output and logs.
impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(..)")
    }
}
