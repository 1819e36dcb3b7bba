//! peloton-link — transmitter roles and device actors over the radio seam.
//!
//! Two transmitter roles share one codec and one radio:
//!   Hub  — coordinator side, routes inbound packets among registered
//!          remote devices by destination code.
//!   Leaf — device side, forwards everything to the single bound local
//!          device.
//!
//! The physical radio is an external collaborator behind the [`Radio`]
//! trait; inbound frames reach a transmitter through its bounded queue.

use std::time::Duration;

use peloton_core::CodecError;
use thiserror::Error;

pub mod device;
pub mod hub;
pub mod leaf;
pub mod radio;

pub use device::{LinkHandle, LocalDevice, Outgoing, RemoteDevice};
pub use hub::Hub;
pub use leaf::Leaf;
pub use radio::{PushObserver, Radio};

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors surfaced by transmitters and device actors.
///
/// Registration-integrity and content violations reject the operation at
/// the caller; inbound-dispatch failures are logged and dropped inside the
/// dispatch task; [`LinkError::AckTimeout`] is a recoverable per-send
/// outcome, never fatal to the transmitter.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("device code {0:?} is already registered")]
    DuplicateCode(String),

    #[error("a local device is already bound to this transmitter")]
    AlreadyBound,

    #[error("no listener registered for device code {0:?}")]
    NoSuchListener(String),

    #[error("no acknowledgment from {address} within {timeout:?}")]
    AckTimeout { address: String, timeout: Duration },

    #[error("send content must be a flat map of scalar fields")]
    InvalidContent,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

// ── Options ───────────────────────────────────────────────────────────────────

/// Transmitter tunables. The schema source and signing key live on the
/// codec; everything the link layer itself needs is here.
#[derive(Debug, Clone)]
pub struct LinkOptions {
    /// Bound on [`Hub::send_and_await_ack`].
    pub ack_timeout: Duration,
    /// Capacity of the inbound frame queue between the radio callback and
    /// the dispatch task.
    pub inbound_queue: usize,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(1),
            inbound_queue: 64,
        }
    }
}
