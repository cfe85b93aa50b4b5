//! CBOR-encoded protocol messages.
//!
//! Frame headers are raw binary, payloads are CBOR. The `Payload` enum covers
//! every message type: the session handshake, discovery beacons and game
//! moves.
//!
//! # Invariants
//!
//! Each payload variant maps to exactly one opcode (enforced by match
//! exhaustiveness). Decoding an encoded payload with the same opcode yields an
//! equal value.

pub mod discovery;
pub mod moves;
pub mod session;

use bytes::BufMut;
use serde::de::DeserializeOwned;

use crate::{
    Frame, FrameHeader, Opcode,
    errors::{ProtocolError, Result},
};

/// All possible frame payloads
///
/// The payload type is determined by the `Opcode` in the frame header, so only
/// the inner struct is serialized (no variant tag in CBOR).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Session offer
    Invite(session::Invite),
    /// Answer to a session offer
    InviteReply(session::InviteReply),
    /// Graceful disconnect
    Goodbye(session::Goodbye),
    /// Game move
    Move(moves::MoveEnvelope),
    /// Discovery announcement
    Beacon(discovery::Beacon),
}

fn decode_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
}

impl Payload {
    /// Opcode corresponding to this payload type.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Invite(_) => Opcode::Invite,
            Self::InviteReply(_) => Opcode::InviteReply,
            Self::Goodbye(_) => Opcode::Goodbye,
            Self::Move(_) => Opcode::Move,
            Self::Beacon(_) => Opcode::Beacon,
        }
    }

    /// Encode payload to buffer.
    ///
    /// Serializes only the inner struct, NOT the variant tag. Size limits are
    /// enforced later by [`Frame::encode`].
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let mut writer = dst.writer();

        match self {
            Self::Invite(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::InviteReply(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::Goodbye(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::Move(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::Beacon(inner) => ciborium::ser::into_writer(inner, &mut writer),
        }
        .map_err(|e| ProtocolError::CborEncode(e.to_string()))
    }

    /// Decode payload from bytes based on opcode.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if bytes exceed `MAX_PAYLOAD_SIZE`
    /// - `ProtocolError::CborDecode` if CBOR deserialization fails
    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Result<Self> {
        if bytes.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: bytes.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(match opcode {
            Opcode::Invite => Self::Invite(decode_cbor(bytes)?),
            Opcode::InviteReply => Self::InviteReply(decode_cbor(bytes)?),
            Opcode::Goodbye => Self::Goodbye(decode_cbor(bytes)?),
            Opcode::Move => Self::Move(decode_cbor(bytes)?),
            Opcode::Beacon => Self::Beacon(decode_cbor(bytes)?),
        })
    }

    /// Convert payload into a transport frame with the matching opcode.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn into_frame(self) -> Result<Frame> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(Frame::new(FrameHeader::new(self.opcode()), buf))
    }

    /// Parse payload from a raw transport frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownOpcode` if the opcode is not recognized
    /// - `ProtocolError::CborDecode` if CBOR deserialization fails
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let opcode = frame
            .header
            .opcode_enum()
            .ok_or_else(|| ProtocolError::UnknownOpcode(frame.header.opcode()))?;
        Self::decode(opcode, &frame.payload)
    }

    /// Decode a complete frame from a datagram and parse its payload.
    pub fn from_datagram(bytes: &[u8]) -> Result<Self> {
        Self::from_frame(&Frame::decode(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_round_trip() {
        let payload = Payload::Invite(session::Invite {
            peer_id: 0xDEAD_BEEF,
            display_name: "kitchen".to_string(),
        });

        let frame = payload.clone().into_frame().expect("should create frame");
        assert_eq!(frame.header.opcode_enum(), Some(Opcode::Invite));
        let decoded = Payload::from_frame(&frame).expect("should parse payload");
        assert_eq!(payload, decoded);
    }

    #[test]
    fn beacon_survives_datagram_encoding() {
        let payload = Payload::Beacon(discovery::Beacon {
            service: crate::SERVICE_TYPE.to_string(),
            peer_id: 7,
            display_name: "den".to_string(),
            port: 4433,
            leaving: false,
        });

        let wire = payload.clone().into_frame().and_then(|f| f.to_vec()).expect("encode");
        assert_eq!(Payload::from_datagram(&wire).expect("decode"), payload);
    }

    #[test]
    fn opcode_payload_mismatch_is_an_error() {
        let frame = Payload::InviteReply(session::InviteReply { accepted: true })
            .into_frame()
            .expect("encode");
        let result = Payload::decode(Opcode::Invite, &frame.payload);
        assert!(matches!(result, Err(ProtocolError::CborDecode(_))));
    }

    #[test]
    fn unknown_opcode_rejected() {
        let mut frame = Payload::Goodbye(session::Goodbye { reason: "bye".into() })
            .into_frame()
            .expect("encode");
        frame.header.opcode = 0x7777u16.to_be_bytes();
        assert_eq!(Payload::from_frame(&frame), Err(ProtocolError::UnknownOpcode(0x7777)));
    }
}
