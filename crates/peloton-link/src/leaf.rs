//! Leaf transmitter — device-side, single destination by construction.
//!
//! Binds exactly one local device actor and forwards every decoded inbound
//! packet to it; there is no routing table lookup on this side of the link.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use peloton_core::Codec;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::device::{LinkHandle, LocalDevice};
use crate::radio::Radio;
use crate::{LinkError, LinkOptions};

pub struct Leaf {
    link: LinkHandle,
    bound: Mutex<Option<Arc<LocalDevice>>>,
    inbound_tx: mpsc::Sender<Bytes>,
    inbound_rx: Mutex<Option<mpsc::Receiver<Bytes>>>,
}

impl Leaf {
    pub fn new(codec: Arc<Codec>, radio: Arc<dyn Radio>, opts: LinkOptions) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::channel(opts.inbound_queue);
        Arc::new(Self {
            link: LinkHandle::new(radio, codec),
            bound: Mutex::new(None),
            inbound_tx,
            inbound_rx: Mutex::new(Some(inbound_rx)),
        })
    }

    /// Queue handle for the radio's receive callback.
    pub fn inbound(&self) -> mpsc::Sender<Bytes> {
        self.inbound_tx.clone()
    }

    /// Outbound seam for constructing the [`LocalDevice`] actor.
    pub fn handle(&self) -> LinkHandle {
        self.link.clone()
    }

    /// Bind the one local device this transmitter serves. Rebinding is
    /// rejected; the first bind stays active.
    pub fn bind(&self, device: Arc<LocalDevice>) -> Result<(), LinkError> {
        let mut bound = self.bound.lock().unwrap_or_else(|e| e.into_inner());
        if bound.is_some() {
            return Err(LinkError::AlreadyBound);
        }
        tracing::info!(code = device.code(), "local device bound");
        *bound = Some(device);
        Ok(())
    }

    /// Spawn the dispatch task draining the inbound queue.
    pub fn spawn_dispatch(self: &Arc<Self>) -> JoinHandle<()> {
        let leaf = Arc::clone(self);
        let rx = leaf
            .inbound_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        tokio::spawn(async move {
            let Some(mut rx) = rx else {
                tracing::warn!("leaf dispatch already running");
                return;
            };
            while let Some(frame) = rx.recv().await {
                leaf.dispatch(frame);
            }
            tracing::info!("inbound queue closed, leaf dispatch stopped");
        })
    }

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

        let bound = self
            .bound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match bound {
            Some(device) => device.receive(packet),
            None => tracing::warn!("no device bound yet, packet dropped"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
