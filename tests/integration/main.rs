//! Peloton integration test harness.
//!
//! Wires a coordinator-side Hub and a device-side Leaf over an in-memory
//! point-to-point radio pair: every frame sent on one side lands on the
//! other side's inbound queue, like two XBee antennas on a quiet channel.
//! Tests drive real tokio dispatch tasks end to end.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use bytes::Bytes;
use peloton_core::{Codec, Protocol, SigningKey};
use peloton_link::{Hub, Leaf, LinkOptions, PushObserver, Radio};
use tokio::sync::{mpsc, oneshot};

mod link;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const BIKE_CODE: &str = "7";
pub const BIKE_ADDR: &str = "0013A20040A1B2C3";
pub const HUB_ADDR: &str = "0013A200400AFFFF";

/// One side of an in-memory radio pair. Frames go straight into the peer
/// transmitter's inbound queue; acknowledgments are immediate when
/// `acks` is set and abandoned otherwise.
pub struct PairRadio {
    peer: mpsc::Sender<Bytes>,
    acks: bool,
}

impl PairRadio {
    pub fn new(peer: mpsc::Sender<Bytes>, acks: bool) -> Arc<Self> {
        Arc::new(Self { peer, acks })
    }
}

impl Radio for PairRadio {
    fn send(&self, _address: &str, frame: Bytes) {
        // point-to-point link: the address picks the one peer there is
        let _ = self.peer.try_send(frame);
    }

    fn send_confirmed(&self, address: &str, frame: Bytes) -> oneshot::Receiver<()> {
        self.send(address, frame);
        let (tx, rx) = oneshot::channel();
        if self.acks {
            let _ = tx.send(());
        }
        rx
    }

    fn broadcast(&self, frame: Bytes) {
        let _ = self.peer.try_send(frame);
    }
}

#[derive(Default)]
pub struct CollectingObserver {
    records: Mutex<Vec<String>>,
}

impl CollectingObserver {
    pub fn records(&self) -> Vec<String> {
        self.records.lock().unwrap().clone()
    }
}

impl PushObserver for CollectingObserver {
    fn send_data(&self, encoded: &str) {
        self.records.lock().unwrap().push(encoded.to_owned());
    }
}

/// A fully wired hub/leaf pair sharing one signed codec, dispatch tasks
/// running.
pub struct Rig {
    pub hub: Arc<Hub>,
    pub leaf: Arc<Leaf>,
    pub observer: Arc<CollectingObserver>,
}

pub fn rig() -> Rig {
    let codec = Arc::new(Codec::new(
        Protocol::standard(),
        Some(SigningKey::from_secret("integration-secret")),
    ));

    // Each side's radio feeds the other side's inbound queue. The leaf's
    // queue does not exist until the leaf does, so the hub's outbound
    // frames pass through an intermediate channel forwarded below.
    let (to_leaf_tx, to_leaf_rx) = mpsc::channel::<Bytes>(64);
    let hub_radio = PairRadio::new(to_leaf_tx, true);
    let hub = Hub::new(codec.clone(), hub_radio, LinkOptions::default());

    let leaf_radio = PairRadio::new(hub.inbound(), true);
    let leaf = Leaf::new(codec, leaf_radio, LinkOptions::default());

    // forward the hub's outbound frames into the leaf's inbound queue
    let leaf_inbound = leaf.inbound();
    tokio::spawn(async move {
        let mut rx = to_leaf_rx;
        while let Some(frame) = rx.recv().await {
            if leaf_inbound.send(frame).await.is_err() {
                break;
            }
        }
    });

    let observer = Arc::new(CollectingObserver::default());
    hub.set_observer(observer.clone());

    hub.spawn_dispatch();
    leaf.spawn_dispatch();

    Rig {
        hub,
        leaf,
        observer,
    }
}

/// Poll `check` until it holds or two seconds elapse.
pub async fn wait_until(what: &str, check: impl Fn() -> bool) -> Result<()> {
    for _ in 0..200 {
        if check() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    bail!("timed out waiting for: {what}")
}
