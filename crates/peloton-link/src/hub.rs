//! Hub transmitter — coordinator-side routing among registered devices.
//!
//! Inbound frames arrive on a bounded queue fed by the radio's receive
//! callback and are drained by one dispatch task, so I/O-thread latency is
//! decoupled from dispatch-time locking. A corrupt or misrouted frame is
//! logged and dropped; it never takes the dispatch loop down.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use peloton_core::protocol::tags;
use peloton_core::{Codec, Packet};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::device::{LinkHandle, RemoteDevice};
use crate::radio::{PushObserver, Radio};
use crate::{LinkError, LinkOptions};

pub struct Hub {
    link: LinkHandle,
    ack_timeout: Duration,
    /// Routing table, device code → actor. Written during registration,
    /// read on every inbound frame.
    listeners: DashMap<String, Arc<RemoteDevice>>,
    observer: Mutex<Option<Arc<dyn PushObserver>>>,
    inbound_tx: mpsc::Sender<Bytes>,
    inbound_rx: Mutex<Option<mpsc::Receiver<Bytes>>>,
}

impl Hub {
    pub fn new(codec: Arc<Codec>, radio: Arc<dyn Radio>, opts: LinkOptions) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::channel(opts.inbound_queue);
        Arc::new(Self {
            link: LinkHandle::new(radio, codec),
            ack_timeout: opts.ack_timeout,
            listeners: DashMap::new(),
            observer: Mutex::new(None),
            inbound_tx,
            inbound_rx: Mutex::new(Some(inbound_rx)),
        })
    }

    /// Queue handle for the radio's receive callback. One clone per frame
    /// source; a full queue drops the frame at the radio boundary.
    pub fn inbound(&self) -> mpsc::Sender<Bytes> {
        self.inbound_tx.clone()
    }

    /// Outbound seam for constructing [`RemoteDevice`] actors.
    pub fn handle(&self) -> LinkHandle {
        self.link.clone()
    }

    /// Install the optional push observer for DATA fan-out.
    pub fn set_observer(&self, observer: Arc<dyn PushObserver>) {
        *self.observer.lock().unwrap_or_else(|e| e.into_inner()) = Some(observer);
    }

    /// Add a device actor to the routing table. The first registration of
    /// a code stays active; a second one is rejected.
    pub fn register(&self, device: Arc<RemoteDevice>) -> Result<(), LinkError> {
        match self.listeners.entry(device.code().to_owned()) {
            Entry::Occupied(_) => Err(LinkError::DuplicateCode(device.code().to_owned())),
            Entry::Vacant(slot) => {
                tracing::info!(code = device.code(), address = device.address(), "device registered");
                slot.insert(device);
                Ok(())
            }
        }
    }

    /// Number of registered devices.
    pub fn registered(&self) -> usize {
        self.listeners.len()
    }

    /// Spawn the dispatch task draining the inbound queue.
    /// Runs until every inbound sender is dropped.
    pub fn spawn_dispatch(self: &Arc<Self>) -> JoinHandle<()> {
        let hub = Arc::clone(self);
        let rx = hub
            .inbound_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        tokio::spawn(async move {
            let Some(mut rx) = rx else {
                tracing::warn!("hub dispatch already running");
                return;
            };
            while let Some(frame) = rx.recv().await {
                hub.dispatch(frame);
            }
            tracing::info!("inbound queue closed, hub dispatch stopped");
        })
    }

    /// One inbound frame: decode, route, memoize. All failures here are
    /// recovered locally — logged and dropped.
    fn dispatch(&self, frame: Bytes) {
        if frame.is_empty() {
            tracing::warn!("empty frame dropped");
            return;
        }
        let raw = match std::str::from_utf8(&frame) {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(%error, "non-UTF-8 frame dropped");
                return;
            }
        };
        let packet = match self.link.codec().decode(raw) {
            Ok(packet) => packet,
            Err(error) => {
                tracing::warn!(%error, raw, "undecodable frame dropped");
                return;
            }
        };

        let Some(device) = self.listeners.get(packet.dest()) else {
            let error = LinkError::NoSuchListener(packet.dest().to_owned());
            tracing::warn!(%error, "packet dropped");
            return;
        };
        tracing::debug!(dest = packet.dest(), kind = packet.kind(), "packet routed");
        device.receive(packet.clone());
        drop(device); // release the table guard before calling out

        // Best-effort fan-out, after the primary dispatch path.
        if packet.kind() == tags::DATA {
            let observer = self
                .observer
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone();
            if let Some(observer) = observer {
                observer.send_data(&packet.encode());
            }
        }
    }

    /// Fire-and-forget send. Single best-effort attempt.
    pub fn send(&self, address: &str, packet: &Packet) {
        self.link.send(address, packet);
    }

    /// Send to all devices on the link, no per-recipient acknowledgment.
    pub fn broadcast(&self, packet: &Packet) {
        self.link.broadcast(packet);
    }

    /// Send and wait for the radio's delivery confirmation, bounded by the
    /// configured ack timeout. A timeout (or a radio that gave up) is a
    /// recoverable per-send outcome. No lock shared with the dispatch path
    /// is held across the await.
    pub async fn send_and_await_ack(
        &self,
        address: &str,
        packet: &Packet,
    ) -> Result<(), LinkError> {
        let ack = self
            .link
            .radio()
            .send_confirmed(address, Bytes::from(packet.encode()));
        match tokio::time::timeout(self.ack_timeout, ack).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) | Err(_) => {
                tracing::warn!(address, timeout = ?self.ack_timeout, "no acknowledgment");
                Err(LinkError::AckTimeout {
                    address: address.to_owned(),
                    timeout: self.ack_timeout,
                })
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
