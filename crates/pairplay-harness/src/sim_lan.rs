//! Simulated LAN and the driver that plugs into it.
//!
//! `SimDriver` provides the same interface as the production network driver
//! but delivers everything through in-memory queues. It implements
//! [`Driver`] so the same [`pairplay_app::Runtime`] code runs in production
//! and simulation.
//!
//! Delivery is instant and ordered. An invitation is answered through a
//! [`SimResponder`] that resolves the attempt synchronously, so a whole
//! host/guest handshake settles without any timers.

use std::{
    collections::HashMap,
    fmt,
    net::{Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use pairplay_app::{Driver, DriverEvent};
use pairplay_core::{
    DiscoveredPeer, DisconnectReason, FrameSink, PeerId, PeerIdentity, Responder, TransportError,
};
use pairplay_proto::{Frame, Payload, payloads::session::Goodbye};
use tokio::sync::mpsc;

/// Port every simulated node claims to listen on.
const SIM_PORT: u16 = 47801;

type Event = DriverEvent<SimResponder>;

/// Error type for the simulation driver.
#[derive(Debug, Clone)]
pub struct SimDriverError(pub String);

impl fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

#[derive(Debug, Clone, Copy, Default)]
struct Faults {
    drop_invites: bool,
    fail_sends: bool,
    refuse_discovery: bool,
}

struct NodeSlot {
    identity: Option<PeerIdentity>,
    addr: SocketAddr,
    advertising: bool,
    browsing: bool,
    events: mpsc::UnboundedSender<Event>,
}

struct Attempt {
    from: usize,
    to: usize,
}

#[derive(Default)]
struct LanState {
    nodes: Vec<NodeSlot>,
    attempts: HashMap<u64, Attempt>,
    links: Vec<(usize, usize)>,
    next_attempt: u64,
    faults: Faults,
}

impl LanState {
    fn deliver(&self, node: usize, event: Event) {
        if self.nodes[node].events.send(event).is_err() {
            tracing::trace!(node, "dropping event for departed node");
        }
    }

    fn index_of(&self, peer: PeerId) -> Option<usize> {
        self.nodes
            .iter()
            .position(|slot| slot.identity.as_ref().is_some_and(|identity| identity.id() == peer))
    }

    fn identity(&self, node: usize) -> Option<PeerIdentity> {
        self.nodes[node].identity.clone()
    }

    fn sighting(&self, node: usize) -> Option<DiscoveredPeer> {
        let slot = &self.nodes[node];
        let identity = slot.identity.clone()?;
        Some(DiscoveredPeer { identity, addr: slot.addr })
    }

    fn link_between(&self, a: usize, b: usize) -> Option<usize> {
        self.links.iter().position(|&(x, y)| (x, y) == (a, b) || (x, y) == (b, a))
    }

    fn is_linked(&self, node: usize) -> bool {
        self.links.iter().any(|&(x, y)| x == node || y == node)
    }

    fn remember(&mut self, node: usize, local: &PeerIdentity) {
        self.nodes[node].identity = Some(local.clone());
    }

    fn resolve(&mut self, attempt: u64, accept: bool) {
        let Some(Attempt { from, to }) = self.attempts.remove(&attempt) else {
            tracing::debug!(attempt, "answer for abandoned attempt");
            return;
        };
        let (Some(inviter), Some(invitee)) = (self.identity(from), self.identity(to)) else {
            return;
        };

        if !accept {
            let reason = DisconnectReason::Declined;
            self.deliver(from, DriverEvent::PeerDisconnected { peer: invitee.id(), reason });
            return;
        }

        if self.is_linked(from) || self.is_linked(to) {
            tracing::debug!(attempt, "refusing second link");
            self.deliver(
                from,
                DriverEvent::PeerDisconnected {
                    peer: invitee.id(),
                    reason: DisconnectReason::Failed("peer already linked".into()),
                },
            );
            return;
        }

        self.links.push((from, to));
        self.deliver(from, DriverEvent::PeerConnected(invitee));
        self.deliver(to, DriverEvent::PeerConnected(inviter));
    }
}

/// Shared in-memory network.
///
/// Cheap to clone; every clone is the same LAN.
#[derive(Clone, Default)]
pub struct SimLan {
    state: Arc<Mutex<LanState>>,
}

impl SimLan {
    /// Empty LAN.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LanState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a new node.
    pub fn driver(&self) -> SimDriver {
        let (events, inbox) = mpsc::unbounded_channel();
        let mut state = self.state();
        let index = state.nodes.len();
        let addr = SocketAddr::from((Ipv4Addr::new(10, 0, 0, index as u8 + 1), SIM_PORT));
        state.nodes.push(NodeSlot {
            identity: None,
            addr,
            advertising: false,
            browsing: false,
            events,
        });
        SimDriver { lan: self.clone(), index, inbox }
    }

    /// Swallow every invitation from now on. Inviters hear nothing back.
    pub fn set_drop_invites(&self, drop: bool) {
        self.state().faults.drop_invites = drop;
    }

    /// Fail every frame send from now on.
    pub fn set_fail_sends(&self, fail: bool) {
        self.state().faults.fail_sends = fail;
    }

    /// Refuse to start advertising or browsing from now on.
    pub fn set_refuse_discovery(&self, refuse: bool) {
        self.state().faults.refuse_discovery = refuse;
    }

    /// Break the link between two peers as if the network failed.
    ///
    /// Both sides see `PeerDisconnected` with a failure reason. Returns false
    /// if they were not linked.
    pub fn sever(&self, a: PeerId, b: PeerId) -> bool {
        let mut state = self.state();
        let (Some(x), Some(y)) = (state.index_of(a), state.index_of(b)) else {
            return false;
        };
        let Some(link) = state.link_between(x, y) else {
            return false;
        };
        state.links.remove(link);

        let reason = DisconnectReason::Failed("link severed".into());
        state.deliver(x, DriverEvent::PeerDisconnected { peer: b, reason: reason.clone() });
        state.deliver(y, DriverEvent::PeerDisconnected { peer: a, reason });
        true
    }

    /// Whether the two peers currently share a link.
    pub fn linked(&self, a: PeerId, b: PeerId) -> bool {
        let state = self.state();
        match (state.index_of(a), state.index_of(b)) {
            (Some(x), Some(y)) => state.link_between(x, y).is_some(),
            _ => false,
        }
    }

    /// Number of live links on the LAN.
    pub fn link_count(&self) -> usize {
        self.state().links.len()
    }

    /// Number of invitations sent but not yet answered or abandoned.
    pub fn open_attempts(&self) -> usize {
        self.state().attempts.len()
    }

    fn resolve(&self, attempt: u64, accept: bool) {
        self.state().resolve(attempt, accept);
    }
}

/// One-shot answer to a simulated invitation.
pub struct SimResponder {
    lan: SimLan,
    attempt: u64,
}

impl fmt::Debug for SimResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimResponder").field("attempt", &self.attempt).finish()
    }
}

impl Responder for SimResponder {
    fn respond(self, accept: bool) {
        self.lan.resolve(self.attempt, accept);
    }
}

/// Simulation driver for deterministic testing.
///
/// One node on a [`SimLan`].
pub struct SimDriver {
    lan: SimLan,
    index: usize,
    inbox: mpsc::UnboundedReceiver<Event>,
}

impl SimDriver {
    /// The LAN this node is attached to.
    pub fn lan(&self) -> &SimLan {
        &self.lan
    }

    fn goodbye() -> Option<Frame> {
        Payload::Goodbye(Goodbye { reason: "session closed".into() }).into_frame().ok()
    }
}

impl FrameSink for SimDriver {
    fn transmit(&mut self, peer: PeerId, frame: Frame) -> Result<(), TransportError> {
        let state = self.lan.state();
        if state.faults.fail_sends {
            return Err(TransportError("simulated send failure".into()));
        }
        let Some(sender) = state.identity(self.index) else {
            return Err(TransportError("node has no identity yet".into()));
        };
        let other = state
            .index_of(peer)
            .filter(|&other| state.link_between(self.index, other).is_some())
            .ok_or_else(|| TransportError(format!("no link to {peer}")))?;

        state.deliver(other, DriverEvent::FrameReceived { peer: sender.id(), frame });
        Ok(())
    }
}

impl Driver for SimDriver {
    type Responder = SimResponder;
    type Error = SimDriverError;

    async fn poll_event(&mut self) -> Option<DriverEvent<Self::Responder>> {
        self.inbox.recv().await
    }

    fn start_advertising(&mut self, local: &PeerIdentity) -> Result<(), SimDriverError> {
        let mut state = self.lan.state();
        if state.faults.refuse_discovery {
            return Err(SimDriverError("advertising refused".into()));
        }
        state.remember(self.index, local);
        state.nodes[self.index].advertising = true;

        let Some(sighting) = state.sighting(self.index) else {
            return Ok(());
        };
        for node in 0..state.nodes.len() {
            if node != self.index && state.nodes[node].browsing {
                state.deliver(node, DriverEvent::PeerSighted(sighting.clone()));
            }
        }
        Ok(())
    }

    fn stop_advertising(&mut self) {
        let mut state = self.lan.state();
        if !state.nodes[self.index].advertising {
            return;
        }
        state.nodes[self.index].advertising = false;

        let Some(local) = state.identity(self.index) else {
            return;
        };
        for node in 0..state.nodes.len() {
            if node != self.index && state.nodes[node].browsing {
                state.deliver(node, DriverEvent::PeerLost(local.id()));
            }
        }
    }

    fn start_browsing(&mut self, local: &PeerIdentity) -> Result<(), SimDriverError> {
        let mut state = self.lan.state();
        if state.faults.refuse_discovery {
            return Err(SimDriverError("browsing refused".into()));
        }
        state.remember(self.index, local);
        state.nodes[self.index].browsing = true;

        for node in 0..state.nodes.len() {
            if node != self.index
                && state.nodes[node].advertising
                && let Some(sighting) = state.sighting(node)
            {
                state.deliver(self.index, DriverEvent::PeerSighted(sighting));
            }
        }
        Ok(())
    }

    fn stop_browsing(&mut self) {
        self.lan.state().nodes[self.index].browsing = false;
    }

    fn invite(&mut self, local: &PeerIdentity, peer: &DiscoveredPeer) {
        let mut state = self.lan.state();
        state.remember(self.index, local);

        if state.faults.drop_invites {
            tracing::debug!(peer = %peer.identity.id(), "dropping invitation");
            return;
        }

        let Some(target) = state.index_of(peer.identity.id()) else {
            state.deliver(
                self.index,
                DriverEvent::PeerDisconnected {
                    peer: peer.identity.id(),
                    reason: DisconnectReason::Failed("no route to peer".into()),
                },
            );
            return;
        };

        let attempt = state.next_attempt;
        state.next_attempt += 1;
        state.attempts.insert(attempt, Attempt { from: self.index, to: target });

        let responder = SimResponder { lan: self.lan.clone(), attempt };
        state.deliver(target, DriverEvent::InboundOffer { peer: local.clone(), responder });
    }

    fn close(&mut self, peer: PeerId) {
        let mut state = self.lan.state();
        let Some(other) = state.index_of(peer) else {
            return;
        };
        let me = self.index;
        state.attempts.retain(|_, attempt| {
            let pair = (attempt.from, attempt.to);
            pair != (me, other) && pair != (other, me)
        });

        let Some(link) = state.link_between(me, other) else {
            return;
        };
        state.links.remove(link);

        let Some(local) = state.identity(me) else {
            return;
        };
        if let Some(frame) = Self::goodbye() {
            state.deliver(other, DriverEvent::FrameReceived { peer: local.id(), frame });
        }
        state.deliver(
            other,
            DriverEvent::PeerDisconnected { peer: local.id(), reason: DisconnectReason::Closed },
        );
    }

    async fn shutdown(&mut self) {
        self.stop_advertising();
        self.stop_browsing();

        let peers: Vec<PeerId> = {
            let state = self.lan.state();
            let me = self.index;
            state
                .links
                .iter()
                .filter_map(|&(x, y)| match (x == me, y == me) {
                    (true, _) => state.identity(y),
                    (_, true) => state.identity(x),
                    _ => None,
                })
                .map(|identity| identity.id())
                .collect()
        };
        for peer in peers {
            self.close(peer);
        }

        let me = self.index;
        self.lan.state().attempts.retain(|_, attempt| attempt.from != me && attempt.to != me);
    }
}
