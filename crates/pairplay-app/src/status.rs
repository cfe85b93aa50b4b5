//! Observable node state.

use std::{ops::Sub, time::Duration};

use pairplay_core::{
    ActiveGame, DiscoveredPeer, PeerIdentity, Responder, Role, Session, SessionState,
};

/// Everything a frontend renders, republished after every processed event.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    /// Human-readable status line
    pub status: String,
    /// A session is established
    pub connected: bool,
    /// A room is being announced
    pub advertising: bool,
    /// Rooms are being looked for
    pub browsing: bool,
    /// Session lifecycle state
    pub state: SessionState,
    /// Remembered role
    pub role: Option<Role>,
    /// This node
    pub local: PeerIdentity,
    /// The connecting or connected peer
    pub peer: Option<PeerIdentity>,
    /// Rooms seen while browsing
    pub discovered: Vec<DiscoveredPeer>,
    /// Offer waiting for accept/decline
    pub pending_invitation: Option<PeerIdentity>,
    /// Open game view
    pub game: Option<ActiveGame>,
    /// Most recent failure, cleared when the next command is processed
    pub last_error: Option<String>,
}

impl StatusSnapshot {
    /// Read everything off `session` and `game`.
    pub fn capture<R, I>(
        session: &Session<R, I>,
        game: Option<&ActiveGame>,
        last_error: Option<&str>,
    ) -> Self
    where
        R: Responder,
        I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
    {
        Self {
            status: session.status().to_string(),
            connected: session.is_connected(),
            advertising: session.is_advertising(),
            browsing: session.is_browsing(),
            state: session.state(),
            role: session.role(),
            local: session.local().clone(),
            peer: session.linked_peer().cloned(),
            discovered: session.discovered().to_vec(),
            pending_invitation: session.pending_invitation().cloned(),
            game: game.cloned(),
            last_error: last_error.map(str::to_string),
        }
    }

    /// Snapshot of a node that has not started yet.
    pub fn idle(local: PeerIdentity) -> Self {
        Self {
            status: "Not connected".to_string(),
            connected: false,
            advertising: false,
            browsing: false,
            state: SessionState::Idle,
            role: None,
            local,
            peer: None,
            discovered: Vec::new(),
            pending_invitation: None,
            game: None,
            last_error: None,
        }
    }
}
