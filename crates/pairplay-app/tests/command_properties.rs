//! Property-based tests for the runtime.
//!
//! Arbitrary operator command sequences, interleaved with discovery and
//! transport events, must never leave the published snapshot in a state the
//! session forbids.

use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use pairplay_app::{Command, Driver, DriverEvent, Runtime, StatusSnapshot};
use pairplay_core::{
    DiscoveredPeer, DisconnectReason, Environment, FrameSink, PeerId, PeerIdentity,
    SessionConfig, SessionState, TransportError,
};
use pairplay_proto::{
    Frame,
    payloads::moves::{GameKind, GridChessMove},
};
use proptest::prelude::*;
use tokio::sync::{mpsc, oneshot};

#[derive(Clone)]
struct PausedEnv;

impl Environment for PausedEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(1);
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unreachable")]
struct Never;

struct NullDriver {
    events: mpsc::UnboundedReceiver<DriverEvent<oneshot::Sender<bool>>>,
}

impl FrameSink for NullDriver {
    fn transmit(&mut self, _peer: PeerId, _frame: Frame) -> Result<(), TransportError> {
        Ok(())
    }
}

impl Driver for NullDriver {
    type Responder = oneshot::Sender<bool>;
    type Error = Never;

    async fn poll_event(&mut self) -> Option<DriverEvent<Self::Responder>> {
        self.events.recv().await
    }

    fn start_advertising(&mut self, _local: &PeerIdentity) -> Result<(), Never> {
        Ok(())
    }

    fn stop_advertising(&mut self) {}

    fn start_browsing(&mut self, _local: &PeerIdentity) -> Result<(), Never> {
        Ok(())
    }

    fn stop_browsing(&mut self) {}

    fn invite(&mut self, _local: &PeerIdentity, _peer: &DiscoveredPeer) {}

    fn close(&mut self, _peer: PeerId) {}

    async fn shutdown(&mut self) {}
}

#[derive(Debug, Clone)]
enum Step {
    Command(Command),
    Sighted(u64),
    Lost(u64),
    Offer(u64),
    Connected(u64),
    Disconnected(u64),
    Wait(u64),
}

fn identity(id: u64) -> PeerIdentity {
    PeerIdentity::new(PeerId(id), format!("peer-{id}"))
}

fn command_strategy() -> impl Strategy<Value = Command> {
    prop_oneof![
        Just(Command::Host),
        Just(Command::Join),
        Just(Command::StopHosting),
        Just(Command::StopBrowsing),
        (1u64..4).prop_map(|id| Command::Connect(PeerId(id))),
        Just(Command::Accept),
        Just(Command::Decline),
        Just(Command::Disconnect),
        Just(Command::ResetConnection),
        Just(Command::ResetRole),
        Just(Command::OpenGame(GameKind::LineConnect)),
        Just(Command::OpenGame(GameKind::GridChess)),
        (0u8..16, 0u8..16).prop_map(|(row, col)| Command::PlaceStone { row, col }),
        (0u8..10, 0u8..9, 0u8..10, 0u8..9).prop_map(|(from_row, from_col, to_row, to_col)| {
            Command::MovePiece(GridChessMove { from_row, from_col, to_row, to_col })
        }),
        Just(Command::RestartGame),
    ]
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => command_strategy().prop_map(Step::Command),
        2 => (1u64..4).prop_map(Step::Sighted),
        1 => (1u64..4).prop_map(Step::Lost),
        1 => (1u64..4).prop_map(Step::Offer),
        2 => (1u64..4).prop_map(Step::Connected),
        1 => (1u64..4).prop_map(Step::Disconnected),
        1 => (1u64..20).prop_map(Step::Wait),
    ]
}

fn check(snapshot: &StatusSnapshot) -> Result<(), String> {
    let exclusive =
        [snapshot.advertising, snapshot.browsing, snapshot.connected].iter().filter(|on| **on).count();
    if exclusive > 1 {
        return Err(format!("more than one of advertising/browsing/connected: {snapshot:?}"));
    }
    if snapshot.pending_invitation.is_some() && !snapshot.advertising {
        return Err("pending invitation without advertising".into());
    }
    if snapshot.connected != matches!(snapshot.state, SessionState::Connected(_)) {
        return Err(format!("connected flag disagrees with {:?}", snapshot.state));
    }
    if snapshot.connected && !snapshot.discovered.is_empty() {
        return Err("discovered peers kept while connected".into());
    }
    match snapshot.state {
        SessionState::Connected(id) | SessionState::Connecting(id) => {
            if snapshot.peer.as_ref().map(PeerIdentity::id) != Some(id) {
                return Err("linked peer missing".into());
            }
        },
        _ => {
            if snapshot.peer.is_some() {
                return Err("linked peer without a link".into());
            }
        },
    }
    Ok(())
}

async fn drive(steps: Vec<Step>) -> Result<(), String> {
    let (events, rx) = mpsc::unbounded_channel();
    let (runtime, handle) =
        Runtime::new(NullDriver { events: rx }, PausedEnv, "local", SessionConfig::default());
    let task = tokio::spawn(runtime.run());

    for step in steps {
        match step {
            Step::Command(command) => {
                let _ = handle.execute(command).await;
            },
            Step::Sighted(id) => {
                let peer = DiscoveredPeer {
                    identity: identity(id),
                    addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 4000 + id as u16)),
                };
                let _ = events.send(DriverEvent::PeerSighted(peer));
            },
            Step::Lost(id) => {
                let _ = events.send(DriverEvent::PeerLost(PeerId(id)));
            },
            Step::Offer(id) => {
                let (responder, _answer) = oneshot::channel();
                let _ = events.send(DriverEvent::InboundOffer { peer: identity(id), responder });
            },
            Step::Connected(id) => {
                let _ = events.send(DriverEvent::PeerConnected(identity(id)));
            },
            Step::Disconnected(id) => {
                let _ = events.send(DriverEvent::PeerDisconnected {
                    peer: PeerId(id),
                    reason: DisconnectReason::Failed("lost".into()),
                });
            },
            Step::Wait(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        }

        // Let the runtime drain what was queued.
        tokio::task::yield_now().await;
        check(&handle.status())?;
    }

    let _ = handle.execute(Command::Shutdown).await;
    let _ = task.await;
    let last = handle.status();
    if last.advertising || last.browsing || last.connected {
        return Err(format!("shutdown left the node active: {last:?}"));
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_snapshot_invariants_hold(steps in prop::collection::vec(step_strategy(), 0..40)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let outcome = rt.block_on(drive(steps));
        prop_assert!(outcome.is_ok(), "{}", outcome.unwrap_err());
    }

    #[test]
    fn prop_disconnect_is_idempotent(steps in prop::collection::vec(step_strategy(), 0..20)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        rt.block_on(async {
            let (events, rx) = mpsc::unbounded_channel();
            let (runtime, handle) =
                Runtime::new(NullDriver { events: rx }, PausedEnv, "local", SessionConfig::default());
            tokio::spawn(runtime.run());

            for step in steps {
                if let Step::Command(command) = step {
                    let _ = handle.execute(command).await;
                }
            }

            handle.execute(Command::Disconnect).await.unwrap();
            let first = handle.status();
            handle.execute(Command::Disconnect).await.unwrap();
            let second = handle.status();

            assert_eq!(first.state, second.state);
            assert_eq!(first.status, second.status);
            assert!(!second.advertising && !second.browsing && !second.connected);
            drop(events);
        });
    }
}
