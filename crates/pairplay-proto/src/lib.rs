//! Wire format for pairplay.
//!
//! Everything that crosses a socket lives here: the fixed binary
//! [`FrameHeader`], the [`Frame`] that pairs it with a CBOR payload, the
//! [`Payload`] enum that names every message, and the move records the two
//! games exchange. Nothing in this crate performs I/O.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
mod frame;
mod header;
mod opcode;
pub mod payloads;

pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use header::FrameHeader;
pub use opcode::Opcode;
pub use payloads::Payload;

/// Service identity advertised and browsed for during discovery.
///
/// Peers announcing any other identity are invisible to each other.
pub const SERVICE_TYPE: &str = "boardgames-p2p";

/// ALPN protocol identifier negotiated on the session transport.
pub const ALPN_PROTOCOL: &[u8] = b"pairplay";
