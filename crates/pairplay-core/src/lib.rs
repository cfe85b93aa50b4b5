//! Sans-IO core of pairplay.
//!
//! Two peers find each other on a LAN, agree on a single session and then
//! take turns sending moves. Everything here is a pure state machine: callers
//! pass in the current time and receive actions to execute, so the same code
//! runs under the production QUIC driver and the deterministic simulation.
//!
//! Layering, leaves first:
//!
//! - [`rules`]: per-game legality and win detection
//! - [`turn`]: whose turn it is, and what happens when a move is made
//! - [`channel`]: framing moves for the connected peer
//! - [`invitation`]: the single pending inbound offer
//! - [`discovery`]: advertise/browse toggles and the list of visible peers
//! - [`session`]: the lifecycle state machine that owns all of the above

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod channel;
pub mod discovery;
pub mod env;
pub mod error;
pub mod game;
pub mod invitation;
pub mod peer;
pub mod rules;
pub mod session;
pub mod turn;

pub use channel::{ChannelLink, FrameSink, Inbound, MoveChannel, MoveSender};
pub use discovery::{Discovery, DiscoveryMode, StartOutcome};
pub use env::Environment;
pub use error::{ChannelError, MoveRejected, SessionError, TransportError};
pub use game::{ActiveGame, RemoteMove};
pub use invitation::{InvitationGate, OfferDecision, Responder};
pub use peer::{DiscoveredPeer, PeerId, PeerIdentity, Role};
pub use session::{
    DEFAULT_CONNECT_TIMEOUT, DisconnectReason, Session, SessionAction, SessionConfig, SessionState,
};
pub use turn::{LocalMove, TurnCoordinator};
