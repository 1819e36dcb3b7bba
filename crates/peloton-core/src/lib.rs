//! peloton-core — protocol registry, packet codec, and keyed digest.
//! All other Peloton crates depend on this one.

pub mod codec;
pub mod digest;
pub mod packet;
pub mod protocol;

pub use codec::{Codec, CodecError, PacketSource};
pub use digest::SigningKey;
pub use packet::{ContentMap, Packet};
pub use protocol::Protocol;
