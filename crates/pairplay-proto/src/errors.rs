//! Protocol-level errors.
//!
//! These cover structural problems only: truncated buffers, bad magic,
//! oversized payloads and CBOR that does not match the expected shape.
//! Whether a well-formed message makes sense in the current session state is
//! decided further up, in `pairplay-core`.

use thiserror::Error;

use crate::payloads::moves::GameKind;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding wire data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer shorter than a frame header
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Minimum number of bytes required
        expected: usize,
        /// Number of bytes available
        actual: usize,
    },

    /// Header magic did not match
    #[error("invalid magic number")]
    InvalidMagic,

    /// Header carries a version we do not speak
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Payload exceeds [`crate::FrameHeader::MAX_PAYLOAD_SIZE`]
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Claimed or actual payload size
        size: usize,
        /// Maximum permitted size
        max: usize,
    },

    /// Header claims more payload than the buffer holds
    #[error("frame truncated: expected {expected} payload bytes, got {actual}")]
    FrameTruncated {
        /// Payload size claimed by the header
        expected: usize,
        /// Payload bytes actually present
        actual: usize,
    },

    /// Opcode not known to this version
    #[error("unknown opcode: {0:#06x}")]
    UnknownOpcode(u16),

    /// CBOR serialization failed
    #[error("CBOR encode failed: {0}")]
    CborEncode(String),

    /// CBOR deserialization failed
    #[error("CBOR decode failed: {0}")]
    CborDecode(String),

    /// Envelope tagged for a different game than the caller asked for
    #[error("move envelope is for {actual:?}, expected {expected:?}")]
    GameKindMismatch {
        /// Kind the caller tried to unwrap
        expected: GameKind,
        /// Kind carried by the envelope
        actual: GameKind,
    },
}
