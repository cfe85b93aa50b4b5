//! Operator intents.
//!
//! Every button or console line becomes a [`Command`] sent to the runtime
//! through a [`crate::NodeHandle`].

use pairplay_core::PeerId;
use pairplay_proto::payloads::moves::{GameKind, GridChessMove};

/// Commands accepted by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Advertise a room and remember the host role.
    Host,

    /// Browse for rooms and remember the guest role.
    Join,

    /// Stop advertising.
    StopHosting,

    /// Stop browsing.
    StopBrowsing,

    /// Invite a discovered peer.
    Connect(PeerId),

    /// Accept the pending invitation.
    Accept,

    /// Decline the pending invitation.
    Decline,

    /// Leave the session and stop discovery.
    Disconnect,

    /// Drop the link and restart whichever discovery was running.
    ResetConnection,

    /// Forget the remembered role.
    ResetRole,

    /// Open a fresh game view. Requires a connected session.
    OpenGame(GameKind),

    /// Close the game view.
    CloseGame,

    /// Place a line-connect stone.
    PlaceStone {
        /// Row, 0-indexed from the top
        row: u8,
        /// Column, 0-indexed from the left
        col: u8,
    },

    /// Move a grid chess piece.
    MovePiece(GridChessMove),

    /// Reset the open game's board.
    RestartGame,

    /// Leave the session and stop the runtime.
    Shutdown,
}
