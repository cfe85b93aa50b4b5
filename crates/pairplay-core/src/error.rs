//! Error types for the pairplay core.
//!
//! Nothing here is fatal. Session errors are surfaced to the operator and the
//! session is left in a retryable state; move rejections leave the game
//! untouched; channel errors are logged and returned to the caller.

use std::time::Duration;

use pairplay_proto::payloads::moves::GameKind;
use thiserror::Error;

use crate::{discovery::DiscoveryMode, peer::PeerId, session::SessionState};

/// Errors surfaced by the session lifecycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Advertising or browsing could not start (or died)
    #[error("{mode} failed: {reason}")]
    DiscoveryStartFailed {
        /// Which toggle failed
        mode: DiscoveryMode,
        /// Underlying cause
        reason: String,
    },

    /// The connection deadline expired before the peer connected
    #[error("connection to {peer} timed out after {elapsed:?}")]
    ConnectionTimedOut {
        /// Peer we were connecting to
        peer: PeerId,
        /// How long we waited
        elapsed: Duration,
    },

    /// The remote operator declined our invitation
    #[error("connection to {peer} was declined")]
    ConnectionRejected {
        /// Peer that declined
        peer: PeerId,
    },

    /// The transport reported the peer unreachable before connecting
    #[error("connection to {peer} failed: {reason}")]
    ConnectionFailed {
        /// Peer we were connecting to
        peer: PeerId,
        /// Underlying cause
        reason: String,
    },

    /// A frame could not be handed to the transport
    #[error("transport send failed: {0}")]
    TransportSendFailed(String),

    /// Inbound bytes did not decode to a usable message
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    /// Operation not valid in the current state; rejected as a no-op
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvariantViolation {
        /// State when the operation was attempted
        state: SessionState,
        /// Operation that was attempted
        operation: &'static str,
    },
}

impl SessionError {
    /// Returns true if the operator can simply try again.
    ///
    /// Invariant violations and decode failures are not retryable: repeating
    /// the same operation in the same state fails the same way.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryStartFailed { .. }
                | Self::ConnectionTimedOut { .. }
                | Self::ConnectionRejected { .. }
                | Self::ConnectionFailed { .. }
                | Self::TransportSendFailed(_)
        )
    }
}

/// Failure to hand a frame to the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Errors from [`crate::MoveChannel::send`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// No session is connected
    #[error("no peer connected")]
    NoPeerConnected,

    /// The envelope could not be framed
    #[error("encode failed: {0}")]
    Encode(String),

    /// The transport refused the frame
    #[error("transport send failed: {0}")]
    TransportSendFailed(String),
}

impl From<ChannelError> for SessionError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::NoPeerConnected => Self::TransportSendFailed(err.to_string()),
            ChannelError::Encode(reason) => Self::DecodeFailed(reason),
            ChannelError::TransportSendFailed(reason) => Self::TransportSendFailed(reason),
        }
    }
}

/// Why a move was not applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoveRejected {
    /// Local submission while the opponent is to move
    #[error("not your turn")]
    NotYourTurn,

    /// The game already has a winner
    #[error("game is over")]
    GameOver,

    /// The rule engine refused the move
    #[error("illegal move")]
    Illegal,

    /// Coordinates outside the board
    #[error("move is off the board")]
    OutOfBounds,

    /// No game view is open
    #[error("no game is open")]
    NoActiveGame,

    /// The move belongs to a different game than the open view
    #[error("{requested} move while playing {active}")]
    WrongGame {
        /// Game currently open
        active: GameKind,
        /// Game the move was for
        requested: GameKind,
    },

    /// Inbound move record did not decode
    #[error("malformed move: {0}")]
    Malformed(String),
}
