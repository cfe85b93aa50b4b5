//! Peer identities and roles.

use std::{fmt, hash::Hash, net::SocketAddr};

use pairplay_proto::payloads::moves::Player;

/// Opaque, process-stable peer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A peer as the operator sees it: identifier plus display name.
///
/// Equality and hashing use the identifier only, so a peer that renames
/// itself is still the same peer.
#[derive(Debug, Clone)]
pub struct PeerIdentity {
    id: PeerId,
    display_name: String,
}

impl PeerIdentity {
    /// Create an identity.
    pub fn new(id: PeerId, display_name: impl Into<String>) -> Self {
        Self { id, display_name: display_name.into() }
    }

    /// Identifier.
    #[must_use]
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Human-readable name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

impl PartialEq for PeerIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PeerIdentity {}

impl Hash for PeerIdentity {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

/// A peer seen by discovery, with the address its session endpoint listens on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeer {
    /// Who the peer is
    pub identity: PeerIdentity,
    /// Where to send the invitation
    pub addr: SocketAddr,
}

/// Which side of the session this process started.
///
/// Remembered across disconnects so a reconnect puts players back in the same
/// seats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Advertised a room; moves first
    Host,
    /// Browsed and joined; moves second
    Guest,
}

impl Role {
    /// Seat this role plays in every game.
    #[must_use]
    pub const fn player(self) -> Player {
        match self {
            Self::Host => Player::First,
            Self::Guest => Player::Second,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Guest => f.write_str("guest"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn identity_equality_ignores_name() {
        let a = PeerIdentity::new(PeerId(1), "attic");
        let b = PeerIdentity::new(PeerId(1), "basement");
        assert_eq!(a, b);

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn host_plays_first() {
        assert_eq!(Role::Host.player(), Player::First);
        assert_eq!(Role::Guest.player(), Player::Second);
    }
}
