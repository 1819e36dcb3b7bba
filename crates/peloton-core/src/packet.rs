//! Decoded packet — an immutable content map in schema field order.

use std::fmt;

use serde_json::Value;

/// Ordered field name → value map. Iteration order is schema order
/// (serde_json is built with `preserve_order`), which makes `encode`
/// deterministic.
pub type ContentMap = serde_json::Map<String, Value>;

/// One decoded message. Constructed only by the codec, which enforces the
/// schema invariants: the tag is registered, the field count matches, and
/// the digest (if any) was injected exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    content: ContentMap,
}

impl Packet {
    pub(crate) fn new(content: ContentMap) -> Self {
        Self { content }
    }

    /// Destination device code — field 0 of every schema.
    pub fn dest(&self) -> &str {
        self.value_at(0)
    }

    /// Message-type tag — field 1 of every schema.
    pub fn kind(&self) -> &str {
        self.value_at(1)
    }

    /// The schema-defined payload, fields 2 onward.
    pub fn payload(&self) -> impl Iterator<Item = &Value> {
        self.content.values().skip(2)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.content.get(field)
    }

    pub fn content(&self) -> &ContentMap {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// The wire record: field values joined by `;` in schema order.
    /// Booleans render as the literal tokens `true`/`false`.
    pub fn encode(&self) -> String {
        let rendered: Vec<String> = self.content.values().map(render).collect();
        rendered.join(";")
    }

    /// JSON object rendering of the content map, in schema order.
    /// This is the form handed to the push observer.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.content).unwrap_or_else(|_| String::from("{}"))
    }

    fn value_at(&self, index: usize) -> &str {
        self.content
            .values()
            .nth(index)
            .and_then(Value::as_str)
            .unwrap_or("")
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}
