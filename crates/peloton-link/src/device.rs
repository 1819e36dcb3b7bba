//! Device actors — per-device packet memoization, history, and outbound
//! send convenience.
//!
//! [`RemoteDevice`] is one physical device as the coordinator sees it;
//! [`LocalDevice`] is the device's own view of itself on the leaf side.
//! Both live for the process lifetime once registered/bound.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use dashmap::DashMap;
use peloton_core::protocol::tags;
use peloton_core::{Codec, ContentMap, Packet};
use serde_json::Value;

use crate::radio::Radio;
use crate::LinkError;

// ── Link handle ───────────────────────────────────────────────────────────────

/// The outbound seam shared by transmitters and device actors: the radio,
/// plus the codec for building packets from structured content. Handed to
/// each actor at construction so actors never hold a reference back to
/// their transmitter.
#[derive(Clone)]
pub struct LinkHandle {
    radio: Arc<dyn Radio>,
    codec: Arc<Codec>,
}

impl LinkHandle {
    pub fn new(radio: Arc<dyn Radio>, codec: Arc<Codec>) -> Self {
        Self { radio, codec }
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub(crate) fn radio(&self) -> &dyn Radio {
        self.radio.as_ref()
    }

    /// Encode and hand the frame to the radio, fire-and-forget.
    pub fn send(&self, address: &str, packet: &Packet) {
        tracing::debug!(address, kind = packet.kind(), "frame out");
        self.radio.send(address, Bytes::from(packet.encode()));
    }

    pub fn broadcast(&self, packet: &Packet) {
        tracing::debug!(kind = packet.kind(), "broadcast out");
        self.radio.broadcast(Bytes::from(packet.encode()));
    }
}

/// Content accepted by [`RemoteDevice::send`]: a ready packet, or a keyed
/// content map that still needs encoding.
pub enum Outgoing {
    Packet(Packet),
    Fields(ContentMap),
}

impl From<Packet> for Outgoing {
    fn from(packet: Packet) -> Self {
        Self::Packet(packet)
    }
}

impl From<ContentMap> for Outgoing {
    fn from(fields: ContentMap) -> Self {
        Self::Fields(fields)
    }
}

// ── Remote device (hub side) ──────────────────────────────────────────────────

/// One fleet device as the coordinator sees it.
///
/// Remembers the last packet per type tag, accumulates DATA renderings in
/// an ordered, duplicate-suppressing history for replay to a reconnecting
/// observer, and sends toward the device's own antenna address.
pub struct RemoteDevice {
    code: String,
    address: String,
    link: LinkHandle,
    memo: DashMap<String, Packet>,
    history: Mutex<Vec<String>>,
}

impl RemoteDevice {
    pub fn new(code: impl Into<String>, address: impl Into<String>, link: LinkHandle) -> Arc<Self> {
        Arc::new(Self {
            code: code.into(),
            address: address.into(),
            link,
            memo: DashMap::new(),
            history: Mutex::new(Vec::new()),
        })
    }

    /// Device code used as the destination field in packets.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Hex hardware address of the device's antenna.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Record an inbound packet: overwrite the memo entry for its tag and,
    /// for DATA, append the rendering to history unless already present.
    pub fn receive(&self, packet: Packet) {
        if packet.kind() == tags::DATA {
            let rendered = packet.to_json();
            let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
            if !history.contains(&rendered) {
                history.push(rendered);
            }
        }
        self.memo.insert(packet.kind().to_owned(), packet);
    }

    /// Latest DATA rendering, `{}` if none received yet.
    pub fn data(&self) -> String {
        self.rendered(tags::DATA)
    }

    /// Latest STATE rendering, `{}` if none received yet.
    pub fn state(&self) -> String {
        self.rendered(tags::STATE)
    }

    /// Latest SETTING rendering, `{}` if none received yet.
    pub fn setting(&self) -> String {
        self.rendered(tags::SETTING)
    }

    /// Latest NOTICE rendering, `{}` if none received yet.
    pub fn notice(&self) -> String {
        self.rendered(tags::NOTICE)
    }

    /// Ordered DATA renderings observed so far, duplicates suppressed.
    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Send toward this device. Structured content is encoded first; a
    /// ready packet goes out verbatim.
    pub fn send(&self, content: impl Into<Outgoing>) -> Result<(), LinkError> {
        let packet = match content.into() {
            Outgoing::Packet(packet) => packet,
            Outgoing::Fields(fields) => self.link.codec().decode(fields)?,
        };
        self.link.send(&self.address, &packet);
        Ok(())
    }

    fn rendered(&self, tag: &str) -> String {
        self.memo
            .get(tag)
            .map(|packet| packet.to_json())
            .unwrap_or_else(|| String::from("{}"))
    }
}

// ── Local device (leaf side) ──────────────────────────────────────────────────

/// The local device's view of itself, plus convenience senders toward the
/// coordinator. Keeps the full ordered log of everything received, not
/// just DATA.
pub struct LocalDevice {
    code: String,
    /// Address of the coordinator's antenna.
    address: String,
    link: LinkHandle,
    log: Mutex<Vec<Packet>>,
}

impl LocalDevice {
    pub fn new(code: impl Into<String>, address: impl Into<String>, link: LinkHandle) -> Arc<Self> {
        Arc::new(Self {
            code: code.into(),
            address: address.into(),
            link,
            log: Mutex::new(Vec::new()),
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Append to the packet log, suppressing value duplicates.
    pub fn receive(&self, packet: Packet) {
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        if !log.contains(&packet) {
            log.push(packet);
        }
    }

    /// Everything received so far, in arrival order.
    pub fn packets(&self) -> Vec<Packet> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send a DATA record stamped with this device's own code.
    pub fn send_data(&self, fields: Value) -> Result<(), LinkError> {
        self.send_tagged(tags::DATA, fields)
    }

    /// Send a STATE record stamped with this device's own code.
    pub fn send_state(&self, fields: Value) -> Result<(), LinkError> {
        self.send_tagged(tags::STATE, fields)
    }

    /// Send a SETTING record stamped with this device's own code.
    pub fn send_setting(&self, fields: Value) -> Result<(), LinkError> {
        self.send_tagged(tags::SETTING, fields)
    }

    /// Forward an already-constructed packet verbatim, no type or
    /// destination inference.
    pub fn blind_send(&self, packet: &Packet) {
        self.link.send(&self.address, packet);
    }

    fn send_tagged(&self, tag: &str, fields: Value) -> Result<(), LinkError> {
        let Value::Object(fields) = fields else {
            return Err(LinkError::InvalidContent);
        };
        if fields.values().any(|v| v.is_object() || v.is_array()) {
            return Err(LinkError::InvalidContent);
        }

        let mut content = ContentMap::new();
        content.insert("dest".to_owned(), Value::String(self.code.clone()));
        content.insert("type".to_owned(), Value::String(tag.to_owned()));
        // caller-supplied fields win over the stamp
        for (key, value) in fields {
            content.insert(key, value);
        }

        let packet = self.link.codec().decode(content)?;
        self.link.send(&self.address, &packet);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
