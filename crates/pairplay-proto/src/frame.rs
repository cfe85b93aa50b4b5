//! Frame type combining header and payload.
//!
//! A `Frame` is the transport-layer packet:
//! - 12-byte raw binary header (Big Endian)
//! - Variable-length raw bytes (already CBOR-encoded)
//!
//! This is a pure data holder. For typed access, see `Payload::into_frame()`
//! and `Payload::from_frame()`.

use bytes::{BufMut, Bytes};

use crate::{
    FrameHeader,
    errors::{ProtocolError, Result},
};

/// Complete protocol frame
///
/// Layout on the wire:
/// `[FrameHeader: 12 bytes] + [payload: variable bytes]`
///
/// # Invariants
///
/// - Size Consistency: `payload.len()` matches `header.payload_size()`.
///   Enforced by [`Frame::new`] and verified by [`Frame::decode`].
/// - Size Limit: `payload.len()` never exceeds
///   [`FrameHeader::MAX_PAYLOAD_SIZE`] on the wire. Oversized frames are
///   rejected by [`Frame::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header
    pub header: FrameHeader,

    /// Raw payload bytes (already CBOR-encoded)
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame, setting the header's payload size from the payload.
    ///
    /// Does not enforce the size limit; [`Frame::encode`] does.
    #[must_use]
    pub fn new(mut header: FrameHeader, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        // Lengths past u32 saturate; encode() rejects them anyway.
        let payload_len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        header.payload_size = payload_len.to_be_bytes();
        Self { header, payload }
    }

    /// Total encoded length (header plus payload).
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        FrameHeader::SIZE + self.payload.len()
    }

    /// Encode frame into buffer.
    ///
    /// Writes: `[header (12 bytes)] + [payload (variable)]`
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if payload exceeds `MAX_PAYLOAD_SIZE`
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        if self.payload.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: self.payload.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        debug_assert_eq!(self.payload.len(), self.header.payload_size() as usize);

        dst.put_slice(&self.header.to_bytes());
        dst.put_slice(&self.payload);

        Ok(())
    }

    /// Encode into a freshly allocated buffer.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Decode frame from wire format.
    ///
    /// Validates framing only; the payload is not parsed. Trailing bytes after
    /// the claimed payload are ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError` if header parsing fails
    /// - `ProtocolError::FrameTruncated` if the payload is shorter than claimed
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = FrameHeader::from_bytes(bytes)?;
        let payload_size = header.payload_size() as usize;

        let Some(payload) = bytes.get(FrameHeader::SIZE..FrameHeader::SIZE + payload_size) else {
            return Err(ProtocolError::FrameTruncated {
                expected: payload_size,
                actual: bytes.len().saturating_sub(FrameHeader::SIZE),
            });
        };

        Ok(Self { header: *header, payload: Bytes::copy_from_slice(payload) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Opcode;

    #[test]
    fn payload_size_tracks_payload() {
        let frame = Frame::new(FrameHeader::new(Opcode::Goodbye), vec![1, 2, 3, 4]);
        assert_eq!(frame.header.payload_size(), 4);

        let wire = frame.to_vec().expect("should encode");
        assert_eq!(wire.len(), FrameHeader::SIZE + 4);

        let parsed = Frame::decode(&wire).expect("should decode");
        assert_eq!(parsed, frame);
    }

    #[test]
    fn reject_truncated_frame() {
        let frame = Frame::new(FrameHeader::new(Opcode::Move), vec![0u8; 100]);
        let wire = frame.to_vec().expect("should encode");

        let result = Frame::decode(&wire[..FrameHeader::SIZE + 10]);
        assert_eq!(result, Err(ProtocolError::FrameTruncated { expected: 100, actual: 10 }));
    }

    #[test]
    fn reject_oversized_encode() {
        let payload = vec![0u8; FrameHeader::MAX_PAYLOAD_SIZE as usize + 1];
        let frame = Frame::new(FrameHeader::new(Opcode::Move), payload);
        assert!(matches!(frame.to_vec(), Err(ProtocolError::PayloadTooLarge { .. })));
    }

    #[test]
    fn trailing_bytes_ignored() {
        let frame = Frame::new(FrameHeader::new(Opcode::Invite), vec![9, 9]);
        let mut wire = frame.to_vec().expect("should encode");
        wire.extend_from_slice(&[0xAA; 7]);

        let parsed = Frame::decode(&wire).expect("should decode");
        assert_eq!(parsed.payload.as_ref(), &[9, 9]);
    }
}
