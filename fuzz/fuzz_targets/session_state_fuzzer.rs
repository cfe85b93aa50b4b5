//! Fuzz target for the Session state machine
//!
//! # Strategy
//!
//! - Operator commands in any order, including ones the state refuses
//! - Transport callbacks for known, unknown and stale peers
//! - Time jumps across the connection deadline
//!
//! # Invariants
//!
//! - Advertising, browsing and connected are mutually exclusive
//! - An offer only waits while advertising
//! - A connecting or connected state names the linked peer
//! - The deadline only exists while connecting

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pairplay_core::{
    DisconnectReason, DiscoveredPeer, DiscoveryMode, PeerId, PeerIdentity, Responder, Session,
    SessionConfig, SessionState,
};

struct Ignore;

impl Responder for Ignore {
    fn respond(self, _accept: bool) {}
}

#[derive(Debug, Clone, Arbitrary)]
enum SessionOp {
    Host,
    Join,
    StopHosting,
    StopBrowsing,
    Connect(u8),
    Offer(u8),
    Accept,
    Decline,
    PeerConnected(u8),
    PeerDisconnected(u8, u8),
    Disconnect,
    Reset,
    ResetRole,
    Sighted(u8),
    Lost(u8),
    DiscoveryFailed(bool),
    Advance(u16),
}

fn peer(n: u8) -> PeerIdentity {
    PeerIdentity::new(PeerId(u64::from(n % 4) + 1), format!("peer-{}", n % 4))
}

fn reason(n: u8) -> DisconnectReason {
    match n % 3 {
        0 => DisconnectReason::Declined,
        1 => DisconnectReason::Failed("fuzz".into()),
        _ => DisconnectReason::Closed,
    }
}

fuzz_target!(|ops: Vec<SessionOp>| {
    let local = PeerIdentity::new(PeerId(0), "local");
    let mut session: Session<Ignore, Duration> = Session::new(local, SessionConfig::default());
    let mut now = Duration::ZERO;

    for op in ops {
        match op {
            SessionOp::Host => _ = session.start_hosting(),
            SessionOp::Join => _ = session.start_joining(),
            SessionOp::StopHosting => _ = session.stop_hosting(),
            SessionOp::StopBrowsing => _ = session.stop_browsing(),
            SessionOp::Connect(n) => _ = session.connect(peer(n).id(), now),
            SessionOp::Offer(n) => _ = session.on_inbound_offer(peer(n), Ignore),
            SessionOp::Accept => _ = session.accept_invitation(now),
            SessionOp::Decline => _ = session.decline_invitation(),
            SessionOp::PeerConnected(n) => _ = session.on_peer_connected(peer(n)),
            SessionOp::PeerDisconnected(n, r) => {
                _ = session.on_peer_disconnected(peer(n).id(), &reason(r));
            },
            SessionOp::Disconnect => _ = session.disconnect(),
            SessionOp::Reset => _ = session.reset_connection(),
            SessionOp::ResetRole => session.reset_role(),
            SessionOp::Sighted(n) => session.on_peer_sighted(DiscoveredPeer {
                identity: peer(n),
                addr: ([10, 0, 0, n % 4 + 1], 47801).into(),
            }),
            SessionOp::Lost(n) => session.on_peer_lost(peer(n).id()),
            SessionOp::DiscoveryFailed(advertising) => {
                let mode =
                    if advertising { DiscoveryMode::Advertising } else { DiscoveryMode::Browsing };
                _ = session.on_discovery_failed(mode, "fuzz");
            },
            SessionOp::Advance(ms) => {
                now += Duration::from_millis(u64::from(ms) * 10);
                _ = session.tick(now);
            },
        }

        let active = [session.is_advertising(), session.is_browsing(), session.is_connected()];
        assert!(active.iter().filter(|on| **on).count() <= 1, "{session:?}");
        if session.pending_invitation().is_some() {
            assert!(session.is_advertising(), "{session:?}");
        }
        match session.state() {
            SessionState::Connecting(id) | SessionState::Connected(id) => {
                assert_eq!(session.linked_peer().map(PeerIdentity::id), Some(id));
            },
            _ => assert!(session.time_until_deadline(now).is_none(), "{session:?}"),
        }
    }
});
