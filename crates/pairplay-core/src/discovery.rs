//! Discovery bookkeeping.
//!
//! Tracks which of the two mutually exclusive discovery toggles is on and the
//! deduplicated list of peers seen while browsing. The actual beacons and
//! sockets live in the driver; this type only decides what the sightings mean.

use std::fmt;

use crate::peer::{DiscoveredPeer, PeerId};

/// The two discovery toggles. At most one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveryMode {
    /// Announcing this peer so others can invite it
    Advertising,
    /// Listening for announcements
    Browsing,
}

impl fmt::Display for DiscoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Advertising => f.write_str("hosting"),
            Self::Browsing => f.write_str("browsing"),
        }
    }
}

/// Result of [`Discovery::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The requested mode was already on; nothing changed
    AlreadyActive,
    /// The mode is now on
    Started {
        /// The other mode, if it had to be switched off
        replaced: Option<DiscoveryMode>,
    },
}

/// Discovery toggles plus the peers currently visible.
///
/// # Invariants
///
/// - At most one mode is active.
/// - Known peers are unique by identifier and never include the local peer.
/// - The peer list is empty whenever browsing is off.
#[derive(Debug, Clone)]
pub struct Discovery {
    local: PeerId,
    mode: Option<DiscoveryMode>,
    peers: Vec<DiscoveredPeer>,
}

impl Discovery {
    /// Create a tracker with both toggles off.
    pub fn new(local: PeerId) -> Self {
        Self { local, mode: None, peers: Vec::new() }
    }

    /// Active toggle, if any.
    #[must_use]
    pub fn mode(&self) -> Option<DiscoveryMode> {
        self.mode
    }

    /// Whether this peer is announcing itself.
    #[must_use]
    pub fn is_advertising(&self) -> bool {
        self.mode == Some(DiscoveryMode::Advertising)
    }

    /// Whether this peer is listening for announcements.
    #[must_use]
    pub fn is_browsing(&self) -> bool {
        self.mode == Some(DiscoveryMode::Browsing)
    }

    /// Peers currently visible, in sighting order.
    #[must_use]
    pub fn peers(&self) -> &[DiscoveredPeer] {
        &self.peers
    }

    /// Look up a visible peer.
    #[must_use]
    pub fn find(&self, id: PeerId) -> Option<&DiscoveredPeer> {
        self.peers.iter().find(|p| p.identity.id() == id)
    }

    /// Turn on `mode`, switching the other toggle off if needed.
    pub fn start(&mut self, mode: DiscoveryMode) -> StartOutcome {
        if self.mode == Some(mode) {
            return StartOutcome::AlreadyActive;
        }
        let replaced = self.mode.replace(mode);
        self.peers.clear();
        StartOutcome::Started { replaced }
    }

    /// Turn off `mode` if it is active. Returns whether anything changed.
    pub fn stop(&mut self, mode: DiscoveryMode) -> bool {
        if self.mode != Some(mode) {
            return false;
        }
        self.mode = None;
        self.peers.clear();
        true
    }

    /// Drop every known peer without touching the toggles.
    pub fn clear_peers(&mut self) {
        self.peers.clear();
    }

    /// Record a sighting. Returns true if the peer was not known before.
    ///
    /// Ignored unless browsing, and ignored for our own announcements. A
    /// repeat sighting refreshes the address in place.
    pub fn on_sighted(&mut self, peer: DiscoveredPeer) -> bool {
        if !self.is_browsing() || peer.identity.id() == self.local {
            return false;
        }

        if let Some(known) = self.peers.iter_mut().find(|p| p.identity == peer.identity) {
            known.addr = peer.addr;
            return false;
        }

        self.peers.push(peer);
        true
    }

    /// Record a loss. Returns true if the peer was known.
    pub fn on_lost(&mut self, id: PeerId) -> bool {
        let before = self.peers.len();
        self.peers.retain(|p| p.identity.id() != id);
        self.peers.len() != before
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddr};

    use super::*;
    use crate::peer::PeerIdentity;

    fn peer(id: u64, port: u16) -> DiscoveredPeer {
        DiscoveredPeer {
            identity: PeerIdentity::new(PeerId(id), format!("peer-{id}")),
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
        }
    }

    #[test]
    fn modes_are_exclusive() {
        let mut discovery = Discovery::new(PeerId(0));
        assert_eq!(
            discovery.start(DiscoveryMode::Advertising),
            StartOutcome::Started { replaced: None }
        );
        assert_eq!(
            discovery.start(DiscoveryMode::Browsing),
            StartOutcome::Started { replaced: Some(DiscoveryMode::Advertising) }
        );
        assert!(discovery.is_browsing());
        assert!(!discovery.is_advertising());
    }

    #[test]
    fn starting_active_mode_is_a_no_op() {
        let mut discovery = Discovery::new(PeerId(0));
        discovery.start(DiscoveryMode::Browsing);
        discovery.on_sighted(peer(1, 1000));

        assert_eq!(discovery.start(DiscoveryMode::Browsing), StartOutcome::AlreadyActive);
        assert_eq!(discovery.peers().len(), 1);
    }

    #[test]
    fn duplicate_sightings_are_suppressed() {
        let mut discovery = Discovery::new(PeerId(0));
        discovery.start(DiscoveryMode::Browsing);

        assert!(discovery.on_sighted(peer(1, 1000)));
        assert!(!discovery.on_sighted(peer(1, 2000)));
        assert_eq!(discovery.peers().len(), 1);
        assert_eq!(discovery.peers()[0].addr.port(), 2000);
    }

    #[test]
    fn own_and_unbrowsed_sightings_ignored() {
        let mut discovery = Discovery::new(PeerId(9));
        assert!(!discovery.on_sighted(peer(1, 1000)));

        discovery.start(DiscoveryMode::Browsing);
        assert!(!discovery.on_sighted(peer(9, 1000)));
        assert!(discovery.peers().is_empty());
    }

    #[test]
    fn stop_is_idempotent_and_clears_peers() {
        let mut discovery = Discovery::new(PeerId(0));
        discovery.start(DiscoveryMode::Browsing);
        discovery.on_sighted(peer(1, 1000));

        assert!(discovery.stop(DiscoveryMode::Browsing));
        assert!(!discovery.stop(DiscoveryMode::Browsing));
        assert!(!discovery.stop(DiscoveryMode::Advertising));
        assert!(discovery.peers().is_empty());
        assert_eq!(discovery.mode(), None);
    }

    #[test]
    fn loss_removes_peer() {
        let mut discovery = Discovery::new(PeerId(0));
        discovery.start(DiscoveryMode::Browsing);
        discovery.on_sighted(peer(1, 1000));
        discovery.on_sighted(peer(2, 1001));

        assert!(discovery.on_lost(PeerId(1)));
        assert!(!discovery.on_lost(PeerId(1)));
        assert!(discovery.find(PeerId(2)).is_some());
    }
}
