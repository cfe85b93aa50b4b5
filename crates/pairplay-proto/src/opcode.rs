//! Frame opcodes.

/// Operation code carried in every [`crate::FrameHeader`].
///
/// The opcode alone determines how the payload bytes are decoded; the CBOR
/// payload never carries its own variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Session offer sent by the joining peer
    Invite,
    /// Accept/decline answer to an [`Opcode::Invite`]
    InviteReply,
    /// Graceful session teardown
    Goodbye,
    /// A game move wrapped in a move envelope
    Move,
    /// Discovery announcement datagram
    Beacon,
}

impl Opcode {
    /// Wire value of this opcode.
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        match self {
            Self::Invite => 0x0001,
            Self::InviteReply => 0x0002,
            Self::Goodbye => 0x0003,
            Self::Move => 0x0010,
            Self::Beacon => 0x0020,
        }
    }

    /// Parse a wire value. `None` if unrecognized.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(Self::Invite),
            0x0002 => Some(Self::InviteReply),
            0x0003 => Some(Self::Goodbye),
            0x0010 => Some(Self::Move),
            0x0020 => Some(Self::Beacon),
            _ => None,
        }
    }
}
