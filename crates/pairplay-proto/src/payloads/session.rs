//! Session handshake payloads.
//!
//! The joining peer opens the session stream and sends [`Invite`]; the
//! advertising peer answers once with [`InviteReply`]. Either side may send
//! [`Goodbye`] before closing.

use serde::{Deserialize, Serialize};

/// Session offer from the joining peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    /// Process-stable identifier of the inviting peer
    pub peer_id: u64,
    /// Human-readable name shown to the operator
    pub display_name: String,
}

/// Answer to an [`Invite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteReply {
    /// Whether the operator accepted the offer
    pub accepted: bool,
}

/// Graceful session teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goodbye {
    /// Free-form reason, for logs only
    pub reason: String,
}
