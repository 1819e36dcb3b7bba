//! Packet codec — bidirectional conversion between wire records and
//! structured content maps.
//!
//! Decoding resolves the message-type tag against the active protocol,
//! enforces the schema's field count, coerces boolean wire tokens, and —
//! for protected tags with a signing key configured — injects the keyed
//! digest as the final construction step. Encoding is the inverse join
//! and lives on [`Packet`].
//!
//! The active protocol and the signing key are explicit instance state,
//! replaceable at runtime; there is no process-wide registry.

use std::sync::RwLock;

use serde_json::Value;

use crate::digest::SigningKey;
use crate::packet::{ContentMap, Packet};
use crate::protocol::{is_protected, Protocol};

/// Wire field separator.
pub const FIELD_SEPARATOR: char = ';';

/// Name of the trailing digest field appended to protected packets.
pub const DIGEST_FIELD: &str = "digest";

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The tag is absent from the active protocol registry.
    #[error("unknown message type tag: {0:?}")]
    InvalidType(String),

    /// The number of supplied values does not match the schema.
    #[error("field count mismatch for type {tag:?}: schema has {expected}, got {got}")]
    InvalidFieldCount {
        tag: String,
        expected: usize,
        got: usize,
    },

    /// A map-form input supplied a key the schema does not define.
    #[error("field {0:?} is not part of the schema")]
    UnknownField(String),

    /// A protected record carried a digest that does not match the
    /// locally recomputed one.
    #[error("digest mismatch, record rejected as tampered")]
    DigestMismatch,
}

// ── Input forms ───────────────────────────────────────────────────────────────

/// Input accepted by [`Codec::decode`].
#[derive(Debug, Clone)]
pub enum PacketSource {
    /// A raw `;`-joined wire record. Order-significant; boolean tokens
    /// are coerced, everything else stays a string.
    Wire(String),
    /// Already-typed values in wire order, forwarded unchanged.
    Record(Vec<Value>),
    /// Keyed content. Key-significant; fields missing from the input
    /// default to the schema zero-value (empty string).
    Map(ContentMap),
}

impl From<&str> for PacketSource {
    fn from(raw: &str) -> Self {
        Self::Wire(raw.to_owned())
    }
}

impl From<String> for PacketSource {
    fn from(raw: String) -> Self {
        Self::Wire(raw)
    }
}

impl From<Vec<Value>> for PacketSource {
    fn from(values: Vec<Value>) -> Self {
        Self::Record(values)
    }
}

impl From<ContentMap> for PacketSource {
    fn from(map: ContentMap) -> Self {
        Self::Map(map)
    }
}

// ── Codec ─────────────────────────────────────────────────────────────────────

pub struct Codec {
    protocol: RwLock<Protocol>,
    signing_key: RwLock<Option<SigningKey>>,
}

impl Codec {
    pub fn new(protocol: Protocol, signing_key: Option<SigningKey>) -> Self {
        Self {
            protocol: RwLock::new(protocol),
            signing_key: RwLock::new(signing_key),
        }
    }

    /// Standard protocol, no signing key.
    pub fn standard() -> Self {
        Self::new(Protocol::standard(), None)
    }

    /// Replace the active schema set.
    pub fn set_protocol(&self, protocol: Protocol) {
        tracing::info!(tags = protocol.len(), "protocol replaced");
        *self
            .protocol
            .write()
            .unwrap_or_else(|e| e.into_inner()) = protocol;
    }

    /// Enable or disable per-packet digesting. `None` degrades protected
    /// types to unsigned, silently.
    pub fn set_signing_key(&self, key: Option<SigningKey>) {
        tracing::info!(signing = key.is_some(), "signing key updated");
        *self
            .signing_key
            .write()
            .unwrap_or_else(|e| e.into_inner()) = key;
    }

    /// Decode any accepted input form into a [`Packet`].
    pub fn decode(&self, source: impl Into<PacketSource>) -> Result<Packet, CodecError> {
        match source.into() {
            PacketSource::Wire(raw) => self.decode_record(split_wire(&raw)),
            PacketSource::Record(values) => self.decode_record(values),
            PacketSource::Map(map) => self.decode_map(map),
        }
    }

    /// Ordered form: values are consumed positionally, field 1 is the tag.
    fn decode_record(&self, mut values: Vec<Value>) -> Result<Packet, CodecError> {
        let tag = match values.get(1) {
            Some(Value::String(tag)) => tag.clone(),
            Some(other) => return Err(CodecError::InvalidType(other.to_string())),
            None => return Err(CodecError::InvalidType(String::new())),
        };

        let protocol = self.protocol.read().unwrap_or_else(|e| e.into_inner());
        let fields = protocol
            .fields(&tag)
            .ok_or_else(|| CodecError::InvalidType(tag.clone()))?;

        // A protected record may arrive with the sender's trailing digest.
        // Strip it here; `finish` recomputes and verifies. Only a trailing
        // string can be a digest — anything else is a payload value and
        // falls through to the arity check below.
        let supplied_digest = if is_protected(&tag) && values.len() == fields.len() + 1 {
            match values.pop() {
                Some(Value::String(digest)) => Some(digest),
                Some(other) => {
                    values.push(other);
                    None
                }
                None => None,
            }
        } else {
            None
        };

        if values.len() != fields.len() {
            return Err(CodecError::InvalidFieldCount {
                tag,
                expected: fields.len(),
                got: values.len(),
            });
        }

        let mut content = ContentMap::new();
        for (name, value) in fields.iter().zip(values) {
            content.insert(name.clone(), value);
        }

        self.finish(&tag, content, supplied_digest)
    }

    /// Keyed form: the tag comes from the `type` key, unspecified fields
    /// default to the schema zero-value, unknown keys are rejected.
    fn decode_map(&self, mut map: ContentMap) -> Result<Packet, CodecError> {
        let tag = match map.get("type") {
            Some(Value::String(tag)) => tag.clone(),
            Some(other) => return Err(CodecError::InvalidType(other.to_string())),
            None => return Err(CodecError::InvalidType(String::new())),
        };

        let protocol = self.protocol.read().unwrap_or_else(|e| e.into_inner());
        let fields = protocol
            .fields(&tag)
            .ok_or_else(|| CodecError::InvalidType(tag.clone()))?;

        // A digest can only be a string; any other value under the key is
        // rejected outright, key or no key.
        let supplied_digest = if is_protected(&tag) {
            match map.remove(DIGEST_FIELD) {
                Some(Value::String(digest)) => Some(digest),
                Some(_) => return Err(CodecError::DigestMismatch),
                None => None,
            }
        } else {
            None
        };

        if let Some(unknown) = map.keys().find(|key| !fields.iter().any(|f| f == *key)) {
            return Err(CodecError::UnknownField(unknown.clone()));
        }

        let mut content = ContentMap::new();
        for name in fields {
            let value = map
                .remove(name)
                .unwrap_or_else(|| Value::String(String::new()));
            content.insert(name.clone(), value);
        }

        self.finish(&tag, content, supplied_digest)
    }

    /// Final construction step: digest injection for protected tags.
    ///
    /// With a key configured the digest is recomputed over the serialized
    /// pre-digest content; a supplied digest that disagrees is a tamper
    /// rejection. Without a key any supplied digest is dropped unverified —
    /// silent capability degradation, not an error.
    fn finish(
        &self,
        tag: &str,
        mut content: ContentMap,
        supplied_digest: Option<String>,
    ) -> Result<Packet, CodecError> {
        if is_protected(tag) {
            let key = self.signing_key.read().unwrap_or_else(|e| e.into_inner());
            if let Some(key) = key.as_ref() {
                let serialized =
                    serde_json::to_string(&content).unwrap_or_else(|_| String::from("{}"));
                let digest = key.sign(serialized.as_bytes());
                if matches!(&supplied_digest, Some(supplied) if *supplied != digest) {
                    return Err(CodecError::DigestMismatch);
                }
                content.insert(DIGEST_FIELD.to_owned(), Value::String(digest));
            }
        }
        Ok(Packet::new(content))
    }
}

/// Split a raw wire record into typed values. Tokens that are
/// case-insensitive `true`/`false` become booleans so boolean sensor flags
/// round-trip through the plain-text representation.
fn split_wire(raw: &str) -> Vec<Value> {
    raw.split(FIELD_SEPARATOR)
        .map(|token| {
            if token.eq_ignore_ascii_case("true") {
                Value::Bool(true)
            } else if token.eq_ignore_ascii_case("false") {
                Value::Bool(false)
            } else {
                Value::String(token.to_owned())
            }
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
