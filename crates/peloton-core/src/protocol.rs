//! Protocol registry — message-type tags and their ordered field schemas.
//!
//! Field order IS wire order: position 0 is the destination device code,
//! position 1 is the type tag, everything after is the schema-defined
//! payload. Every schema in active use must be known to the registry before
//! the first decode; an unknown tag fails the decode.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Well-known type tags of the standard protocol.
pub mod tags {
    pub const DATA: &str = "0";
    pub const STATE: &str = "1";
    pub const NOTICE: &str = "2";
    pub const SETTING: &str = "3";
    pub const SIGNAL: &str = "4";
    pub const MESSAGE: &str = "5";
    pub const RASPBERRY: &str = "6";
    pub const VIDEO: &str = "7";
}

/// Tags whose packets carry a keyed digest whenever a signing key is
/// configured. Telemetry (DATA/STATE/NOTICE) stays unsigned.
pub const PROTECTED: &[&str] = &[
    tags::SETTING,
    tags::SIGNAL,
    tags::MESSAGE,
    tags::RASPBERRY,
    tags::VIDEO,
];

/// Is this tag a protected type?
pub fn is_protected(tag: &str) -> bool {
    PROTECTED.contains(&tag)
}

/// The built-in standard protocol, tag → ordered field names.
const STANDARD: &[(&str, &[&str])] = &[
    (tags::DATA, &["dest", "type", "heartrate", "power", "cadence", "speed"]),
    (tags::STATE, &["dest", "type", "log", "video", "powermeter", "heartrate"]),
    (tags::NOTICE, &["dest", "type", "notice"]),
    (tags::SETTING, &["dest", "type", "circumference", "run", "log"]),
    (tags::SIGNAL, &["dest", "type", "signal"]),
    (tags::MESSAGE, &["dest", "type", "message", "priority"]),
    (tags::RASPBERRY, &["dest", "type", "command"]),
    (tags::VIDEO, &["dest", "type", "command", "value"]),
];

/// The active schema set. Immutable once built; the codec swaps whole
/// instances when a custom protocol is installed at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Protocol {
    schemas: HashMap<String, Vec<String>>,
}

impl Protocol {
    /// The built-in standard protocol.
    pub fn standard() -> Self {
        let schemas = STANDARD
            .iter()
            .map(|(tag, fields)| {
                let fields = fields.iter().map(|f| (*f).to_owned()).collect();
                ((*tag).to_owned(), fields)
            })
            .collect();
        Self { schemas }
    }

    /// A custom protocol from an already-structured schema set.
    pub fn from_schemas(schemas: HashMap<String, Vec<String>>) -> Self {
        Self { schemas }
    }

    /// A custom protocol from its serialized form, e.g.
    /// `{"0": ["dest", "type", "speed"]}`.
    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }

    /// The ordered field list for a tag. `None` means unknown type.
    pub fn fields(&self, tag: &str) -> Option<&[String]> {
        self.schemas.get(tag).map(Vec::as_slice)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.schemas.contains_key(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_protocol_knows_all_tags() {
        let protocol = Protocol::standard();
        for tag in ["0", "1", "2", "3", "4", "5", "6", "7"] {
            assert!(protocol.contains(tag), "tag {tag} missing");
        }
        assert_eq!(protocol.len(), 8);
    }

    #[test]
    fn schemas_lead_with_dest_and_type() {
        let protocol = Protocol::standard();
        for tag in protocol.tags() {
            let fields = protocol.fields(tag).unwrap();
            assert_eq!(&fields[0], "dest", "tag {tag}");
            assert_eq!(&fields[1], "type", "tag {tag}");
        }
    }

    #[test]
    fn unknown_tag_is_none() {
        assert!(Protocol::standard().fields("9").is_none());
    }

    #[test]
    fn custom_protocol_from_json() {
        let protocol = Protocol::from_json(r#"{"0": ["dest", "type", "speed"]}"#).unwrap();
        assert_eq!(protocol.len(), 1);
        assert_eq!(
            protocol.fields("0").unwrap(),
            &["dest".to_owned(), "type".to_owned(), "speed".to_owned()]
        );
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(Protocol::from_json(r#"{"0": "not-a-list"}"#).is_err());
    }

    #[test]
    fn protected_set_excludes_telemetry() {
        assert!(is_protected(tags::SETTING));
        assert!(is_protected(tags::VIDEO));
        assert!(!is_protected(tags::DATA));
        assert!(!is_protected(tags::STATE));
    }
}
