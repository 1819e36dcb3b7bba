//! External collaborator contracts — the radio and the push observer.
//!
//! The transceiver's framing, addressing, and open/close lifecycle are out
//! of scope; this module is the entire surface the link layer consumes.
//! Addresses are hex-string hardware identifiers.

use bytes::Bytes;
use tokio::sync::oneshot;

/// The radio seam. Implementations wrap the actual transceiver driver.
///
/// Inbound delivery is not part of this trait: the radio's receive callback
/// pushes raw frames into the transmitter's bounded queue (see
/// [`Hub::inbound`](crate::Hub::inbound) and
/// [`Leaf::inbound`](crate::Leaf::inbound)).
pub trait Radio: Send + Sync {
    /// Fire-and-forget frame to one address. Single best-effort attempt,
    /// no retry.
    fn send(&self, address: &str, frame: Bytes);

    /// Frame with link-layer delivery confirmation. The radio resolves the
    /// returned channel when the ack arrives and drops it unresolved on
    /// link failure; the caller owns the timeout.
    fn send_confirmed(&self, address: &str, frame: Bytes) -> oneshot::Receiver<()>;

    /// Frame to every device on the link, no per-recipient confirmation.
    fn broadcast(&self, frame: Bytes);
}

/// Fire-and-forget sink for DATA records successfully routed by the hub,
/// e.g. a web front-end notification channel. Failures inside an
/// implementation must not reach the dispatch path.
pub trait PushObserver: Send + Sync {
    fn send_data(&self, encoded: &str);
}
