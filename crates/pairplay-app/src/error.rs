//! Command failures.

use pairplay_core::{MoveRejected, SessionError};
use thiserror::Error;

/// Why the runtime refused a [`crate::Command`].
///
/// A refused command changes nothing. The same text is also published as the
/// snapshot's `last_error`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The session refused the transition
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The game refused the move
    #[error(transparent)]
    Move(#[from] MoveRejected),

    /// A game view needs a connected session
    #[error("no session is connected")]
    NotConnected,

    /// The runtime has shut down
    #[error("runtime stopped")]
    Stopped,
}
