//! Driver notifications.
//!
//! Everything that happens off the runtime task (a beacon arriving, a QUIC
//! handshake finishing, a frame read from the stream) is delivered as a
//! [`DriverEvent`] and handled in arrival order.

use pairplay_core::{DiscoveredPeer, DiscoveryMode, DisconnectReason, PeerId, PeerIdentity};
use pairplay_proto::Frame;

/// Events produced by a [`crate::Driver`].
///
/// `R` is the driver's one-shot responder for inbound offers.
#[derive(Debug)]
pub enum DriverEvent<R> {
    /// A browsing beacon named a peer.
    PeerSighted(DiscoveredPeer),

    /// A peer left or stopped announcing.
    PeerLost(PeerId),

    /// Advertising or browsing could not start or died.
    DiscoveryFailed {
        /// Which toggle failed
        mode: DiscoveryMode,
        /// Human-readable cause
        reason: String,
    },

    /// A remote peer wants a session.
    InboundOffer {
        /// Who is asking
        peer: PeerIdentity,
        /// Answer exactly once
        responder: R,
    },

    /// The transport established a session link.
    PeerConnected(PeerIdentity),

    /// The transport lost, or never got, a link.
    PeerDisconnected {
        /// Which peer
        peer: PeerId,
        /// What happened
        reason: DisconnectReason,
    },

    /// A frame arrived on a session link.
    FrameReceived {
        /// Sender
        peer: PeerId,
        /// The frame
        frame: Frame,
    },
}
