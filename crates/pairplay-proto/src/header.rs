//! Frame header implementation with zero-copy parsing.
//!
//! The `FrameHeader` is a fixed 12-byte structure serialized as raw binary
//! (Big Endian). Readers pull exactly this many bytes off a stream, learn the
//! payload length, and only then read the payload.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    Opcode,
    errors::{ProtocolError, Result},
};

/// Fixed 12-byte frame header (Big Endian network byte order)
///
/// Fields are stored as raw byte arrays to avoid alignment issues.
///
/// # Security
///
/// The #[repr(C, packed)] layout with zerocopy traits ensures this struct can
/// be safely cast from untrusted network bytes - all 12-byte patterns are
/// valid. Semantic checks (magic, version, size limit) happen in
/// [`FrameHeader::from_bytes`].
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    magic: [u8; 4], // 0x50504C59 ("PPLY" in ASCII)
    version: u8,    // 0x01
    reserved: u8,
    pub(crate) opcode: [u8; 2],       // u16 operation code
    pub(crate) payload_size: [u8; 4], // u32 payload length
}

impl FrameHeader {
    /// Size of the serialized header (12 bytes)
    pub const SIZE: usize = 12;

    /// Magic number: "PPLY" in ASCII (0x50504C59)
    pub const MAGIC: u32 = 0x5050_4C59;

    /// Current protocol version
    pub const VERSION: u8 = 0x01;

    /// Maximum payload size (64 KiB). Moves and handshakes are tiny.
    pub const MAX_PAYLOAD_SIZE: u32 = 64 * 1024;

    /// Create a new header with the specified opcode and an empty payload.
    #[must_use]
    pub fn new(opcode: Opcode) -> Self {
        Self {
            magic: Self::MAGIC.to_be_bytes(),
            version: Self::VERSION,
            reserved: 0,
            opcode: opcode.to_u16().to_be_bytes(),
            payload_size: [0; 4],
        }
    }

    /// Parse header from network bytes (zero-copy, safe)
    ///
    /// Trailing bytes after the header are ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if buffer is shorter than 12 bytes
    /// - `ProtocolError::InvalidMagic` if magic number is invalid
    /// - `ProtocolError::UnsupportedVersion` if protocol version is unsupported
    /// - `ProtocolError::PayloadTooLarge` if payload size exceeds maximum
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::FrameTooShort {
                expected: Self::SIZE,
                actual: bytes.len(),
            })?
            .0;

        if u32::from_be_bytes(header.magic) != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        if header.version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        let payload_size = u32::from_be_bytes(header.payload_size);
        if payload_size > Self::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_size as usize,
                max: Self::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(header)
    }

    /// Serialize header to bytes (zero-copy)
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(IntoBytes::as_bytes(self));
        arr
    }

    /// Protocol magic number.
    #[must_use]
    pub fn magic(&self) -> u32 {
        u32::from_be_bytes(self.magic)
    }

    /// Protocol version byte.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Operation code as raw u16.
    #[must_use]
    pub fn opcode(&self) -> u16 {
        u16::from_be_bytes(self.opcode)
    }

    /// Operation code as enum. `None` if unrecognized.
    #[must_use]
    pub fn opcode_enum(&self) -> Option<Opcode> {
        Opcode::from_u16(self.opcode())
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn payload_size(&self) -> u32 {
        u32::from_be_bytes(self.payload_size)
    }
}

// Manual Debug implementation (can't derive due to packed repr)
impl std::fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHeader")
            .field("magic", &format!("{:#010x}", self.magic()))
            .field("version", &self.version())
            .field("opcode", &format!("{:#06x}", self.opcode()))
            .field("payload_size", &self.payload_size())
            .finish_non_exhaustive()
    }
}

// Manual PartialEq implementation (can't derive due to packed repr)
impl PartialEq for FrameHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for FrameHeader {}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn valid_prefix() -> [u8; FrameHeader::SIZE] {
        let mut buf = [0u8; FrameHeader::SIZE];
        buf[0..4].copy_from_slice(&FrameHeader::MAGIC.to_be_bytes());
        buf[4] = FrameHeader::VERSION;
        buf
    }

    #[test]
    fn header_size() {
        assert_eq!(std::mem::size_of::<FrameHeader>(), FrameHeader::SIZE);
    }

    #[test]
    fn new_header_is_parseable() {
        let header = FrameHeader::new(Opcode::Move);
        let bytes = header.to_bytes();
        let parsed = FrameHeader::from_bytes(&bytes).expect("should parse");
        assert_eq!(parsed.opcode_enum(), Some(Opcode::Move));
        assert_eq!(parsed.payload_size(), 0);
    }

    #[test]
    fn reject_short_buffer() {
        let result = FrameHeader::from_bytes(&[0u8; 5]);
        assert_eq!(result, Err(ProtocolError::FrameTooShort { expected: 12, actual: 5 }));
    }

    #[test]
    fn reject_invalid_magic() {
        let mut buf = valid_prefix();
        buf[0..4].copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(FrameHeader::from_bytes(&buf), Err(ProtocolError::InvalidMagic));
    }

    #[test]
    fn reject_invalid_version() {
        let mut buf = valid_prefix();
        buf[4] = 0xFF;
        assert_eq!(FrameHeader::from_bytes(&buf), Err(ProtocolError::UnsupportedVersion(0xFF)));
    }

    #[test]
    fn reject_oversized_payload() {
        let mut buf = valid_prefix();
        buf[8..12].copy_from_slice(&(FrameHeader::MAX_PAYLOAD_SIZE + 1).to_be_bytes());
        assert!(matches!(FrameHeader::from_bytes(&buf), Err(ProtocolError::PayloadTooLarge { .. })));
    }

    proptest! {
        #[test]
        fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..32)) {
            let _ = FrameHeader::from_bytes(&bytes);
        }
    }
}
