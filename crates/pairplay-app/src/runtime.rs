//! Generic runtime for node orchestration.
//!
//! The runtime is the only place session and game state change. It drives a
//! single loop that serializes three sources:
//! - operator [`Command`]s from a [`NodeHandle`]
//! - [`DriverEvent`]s from the [`Driver`]
//! - the session's connection deadline
//!
//! After each one it republishes a [`StatusSnapshot`].

use std::mem;

use pairplay_core::{
    ActiveGame, ChannelLink, DiscoveryMode, DisconnectReason, Environment, Inbound, LocalMove,
    MoveChannel, MoveRejected, PeerId, PeerIdentity, Session, SessionAction, SessionConfig,
    SessionError,
};
use pairplay_proto::{Frame, Payload};
use tokio::sync::{mpsc, oneshot, watch};

use crate::{Command, CommandError, Driver, DriverEvent, StatusSnapshot};

const COMMAND_QUEUE_DEPTH: usize = 32;

struct Request {
    command: Command,
    reply: oneshot::Sender<Result<(), CommandError>>,
}

/// Frontend side of a running node.
///
/// Cheap to clone. Commands are answered once the runtime has processed
/// them, so a returned `Ok` means the transition already happened.
#[derive(Clone)]
pub struct NodeHandle {
    commands: mpsc::Sender<Request>,
    status: watch::Receiver<StatusSnapshot>,
}

impl NodeHandle {
    /// Send `command` and wait for the runtime's answer.
    ///
    /// # Errors
    ///
    /// Returns the reason the command was refused, or
    /// `CommandError::Stopped` if the runtime is gone.
    pub async fn execute(&self, command: Command) -> Result<(), CommandError> {
        let (reply, answer) = oneshot::channel();
        self.commands
            .send(Request { command, reply })
            .await
            .map_err(|_| CommandError::Stopped)?;
        answer.await.map_err(|_| CommandError::Stopped)?
    }

    /// Latest published snapshot.
    pub fn status(&self) -> StatusSnapshot {
        self.status.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    pub fn watch(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.clone()
    }

    /// Wait until a snapshot satisfies `predicate`, checking the current one
    /// first.
    ///
    /// # Errors
    ///
    /// `CommandError::Stopped` if the runtime exits first.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&StatusSnapshot) -> bool,
    ) -> Result<StatusSnapshot, CommandError> {
        let mut status = self.status.clone();
        let snapshot = status.wait_for(predicate).await.map_err(|_| CommandError::Stopped)?;
        Ok(snapshot.clone())
    }
}

/// Generic runtime that owns the session and drives the driver.
///
/// # Type Parameters
///
/// - `D`: Platform-specific I/O driver
/// - `E`: Environment for time and randomness
pub struct Runtime<D, E>
where
    D: Driver,
    E: Environment,
{
    driver: D,
    env: E,
    session: Session<D::Responder, E::Instant>,
    channel: MoveChannel,
    game: Option<ActiveGame>,
    last_error: Option<String>,
    commands: mpsc::Receiver<Request>,
    status: watch::Sender<StatusSnapshot>,
}

impl<D, E> Runtime<D, E>
where
    D: Driver,
    E: Environment,
{
    /// Create a runtime and the handle that controls it.
    ///
    /// The node's identifier is drawn from `env` once, here, and stays fixed
    /// for the life of the process.
    pub fn new(
        driver: D,
        env: E,
        display_name: impl Into<String>,
        config: SessionConfig,
    ) -> (Self, NodeHandle) {
        let local = PeerIdentity::new(PeerId(env.random_u64()), display_name);
        let (command_tx, commands) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (status, status_rx) = watch::channel(StatusSnapshot::idle(local.clone()));

        let runtime = Self {
            driver,
            env,
            session: Session::new(local, config),
            channel: MoveChannel::new(),
            game: None,
            last_error: None,
            commands,
            status,
        };
        (runtime, NodeHandle { commands: command_tx, status: status_rx })
    }

    /// This node's identity.
    pub fn local(&self) -> &PeerIdentity {
        self.session.local()
    }

    /// Run until [`Command::Shutdown`], until every handle is dropped, or
    /// until the driver stops producing events.
    ///
    /// On the way out the session is disconnected, so any link is closed and
    /// discovery stopped.
    pub async fn run(mut self) {
        let local = self.session.local();
        tracing::info!(peer = %local.id(), name = %local, "node started");
        self.publish();
        let mut shutdown_reply = None;

        loop {
            let deadline = self.session.time_until_deadline(self.env.now());

            tokio::select! {
                request = self.commands.recv() => {
                    let Some(Request { command, reply }) = request else {
                        tracing::debug!("all handles dropped");
                        break;
                    };
                    if command == Command::Shutdown {
                        shutdown_reply = Some(reply);
                        break;
                    }
                    let result = self.handle_command(command);
                    self.publish();
                    // The caller may have given up waiting.
                    let _ = reply.send(result);
                },
                event = self.driver.poll_event() => {
                    let Some(event) = event else {
                        tracing::warn!("driver closed");
                        break;
                    };
                    self.handle_event(event);
                },
                () = self.env.sleep(deadline.unwrap_or_default()), if deadline.is_some() => {
                    let actions = self.session.tick(self.env.now());
                    self.execute(actions);
                },
            }

            self.publish();
        }

        let actions = self.session.disconnect();
        self.execute(actions);
        self.publish();
        self.driver.shutdown().await;
        tracing::info!("node stopped");

        if let Some(reply) = shutdown_reply {
            let _ = reply.send(Ok(()));
        }
    }

    fn publish(&self) {
        let snapshot =
            StatusSnapshot::capture(&self.session, self.game.as_ref(), self.last_error.as_deref());
        self.status.send_replace(snapshot);
    }

    fn report(&mut self, error: &impl std::fmt::Display) {
        self.last_error = Some(error.to_string());
    }

    fn handle_command(&mut self, command: Command) -> Result<(), CommandError> {
        self.last_error = None;
        tracing::debug!(?command, "command");

        let result = self.apply_command(command);
        if let Err(e) = &result {
            tracing::warn!(error = %e, state = ?self.session.state(), "command refused");
            self.report(e);
        }
        result
    }

    fn apply_command(&mut self, command: Command) -> Result<(), CommandError> {
        let now = self.env.now();
        let actions = match command {
            Command::Host => self.session.start_hosting()?,
            Command::Join => self.session.start_joining()?,
            Command::StopHosting => self.session.stop_hosting(),
            Command::StopBrowsing => self.session.stop_browsing(),
            Command::Connect(peer) => self.session.connect(peer, now)?,
            Command::Accept => self.session.accept_invitation(now)?,
            Command::Decline => self.session.decline_invitation()?,
            Command::Disconnect => self.session.disconnect(),
            Command::ResetConnection => self.session.reset_connection(),
            Command::ResetRole => {
                self.session.reset_role();
                Vec::new()
            },
            Command::OpenGame(kind) => {
                if !self.session.is_connected() {
                    return Err(CommandError::NotConnected);
                }
                let game = ActiveGame::open(kind, self.session.role());
                tracing::info!(%kind, seat = ?game.seat(), "game opened");
                self.game = Some(game);
                Vec::new()
            },
            Command::CloseGame => {
                self.game = None;
                Vec::new()
            },
            Command::PlaceStone { row, col } => {
                let game = self.game.as_mut().ok_or(MoveRejected::NoActiveGame)?;
                let peer = self.session.connected_peer();
                let mut link = ChannelLink::new(&mut self.channel, peer, &mut self.driver);
                let outcome = game.place_stone(row, col, &mut link)?;
                self.after_local_move(outcome);
                Vec::new()
            },
            Command::MovePiece(mv) => {
                let game = self.game.as_mut().ok_or(MoveRejected::NoActiveGame)?;
                let peer = self.session.connected_peer();
                let mut link = ChannelLink::new(&mut self.channel, peer, &mut self.driver);
                let outcome = game.move_piece(mv, &mut link)?;
                self.after_local_move(outcome);
                Vec::new()
            },
            Command::RestartGame => {
                let game = self.game.as_mut().ok_or(MoveRejected::NoActiveGame)?;
                game.restart();
                Vec::new()
            },
            Command::Shutdown => Vec::new(),
        };

        self.execute(actions);
        Ok(())
    }

    fn after_local_move(&mut self, outcome: LocalMove) {
        if let Err(e) = outcome.delivery {
            self.report(&SessionError::from(e));
        }
        if let Some(winner) = outcome.winner {
            tracing::info!(?winner, "game won");
        }
    }

    fn handle_event(&mut self, event: DriverEvent<D::Responder>) {
        match event {
            DriverEvent::PeerSighted(peer) => self.session.on_peer_sighted(peer),
            DriverEvent::PeerLost(peer) => self.session.on_peer_lost(peer),
            DriverEvent::DiscoveryFailed { mode, reason } => {
                let actions = self.session.on_discovery_failed(mode, &reason);
                self.execute(actions);
            },
            DriverEvent::InboundOffer { peer, responder } => {
                let id = peer.id();
                let decision = self.session.on_inbound_offer(peer, responder);
                tracing::debug!(peer = %id, ?decision, "inbound offer");
            },
            DriverEvent::PeerConnected(peer) => {
                let before = self.session.connected_peer().map(PeerIdentity::id);
                let actions = self.session.on_peer_connected(peer);
                let after = self.session.connected_peer().map(PeerIdentity::id);
                if after.is_some() && after != before {
                    // Fresh session, fresh table.
                    self.game = None;
                    self.channel = MoveChannel::new();
                }
                self.execute(actions);
            },
            DriverEvent::PeerDisconnected { peer, reason } => {
                let actions = self.session.on_peer_disconnected(peer, &reason);
                self.execute(actions);
            },
            DriverEvent::FrameReceived { peer, frame } => self.handle_frame(peer, &frame),
        }
    }

    fn handle_frame(&mut self, peer: PeerId, frame: &Frame) {
        if self.session.connected_peer().map(PeerIdentity::id) != Some(peer) {
            tracing::debug!(peer = %peer, "dropping frame from a peer that is not connected");
            return;
        }

        match self.channel.receive(frame, self.game.as_ref().map(ActiveGame::kind)) {
            Inbound::Move(envelope) => {
                let Some(game) = self.game.as_mut() else {
                    return;
                };
                match game.handle_envelope(&envelope) {
                    Ok(remote) => {
                        tracing::debug!(peer = %peer, ?remote, "remote move applied");
                        if let Some(winner) = game.winner() {
                            tracing::info!(?winner, "game won");
                        }
                    },
                    Err(e) => {
                        tracing::warn!(peer = %peer, error = %e, "dropping remote move");
                        self.report(&SessionError::DecodeFailed(e.to_string()));
                    },
                }
            },
            Inbound::Ignored(_) => {},
            Inbound::Control(Payload::Goodbye(goodbye)) => {
                tracing::info!(peer = %peer, reason = %goodbye.reason, "peer said goodbye");
                let actions = self.session.on_peer_disconnected(peer, &DisconnectReason::Closed);
                self.execute(actions);
            },
            Inbound::Control(other) => {
                let opcode = other.opcode();
                tracing::debug!(peer = %peer, ?opcode, "unexpected control payload");
            },
            Inbound::Malformed(e) => self.report(&e),
        }
    }

    /// Execute session actions against the driver.
    ///
    /// A discovery toggle that fails to start feeds back into the session,
    /// which may produce further actions.
    fn execute(&mut self, initial: Vec<SessionAction>) {
        let mut pending = initial;

        while !pending.is_empty() {
            for action in mem::take(&mut pending) {
                match action {
                    SessionAction::StartAdvertising => {
                        if let Err(e) = self.driver.start_advertising(self.session.local()) {
                            let reason = e.to_string();
                            pending.extend(
                                self.session.on_discovery_failed(DiscoveryMode::Advertising, &reason),
                            );
                        }
                    },
                    SessionAction::StopAdvertising => self.driver.stop_advertising(),
                    SessionAction::StartBrowsing => {
                        if let Err(e) = self.driver.start_browsing(self.session.local()) {
                            let reason = e.to_string();
                            pending.extend(
                                self.session.on_discovery_failed(DiscoveryMode::Browsing, &reason),
                            );
                        }
                    },
                    SessionAction::StopBrowsing => self.driver.stop_browsing(),
                    SessionAction::Invite(peer) => self.driver.invite(self.session.local(), &peer),
                    SessionAction::CloseLink(peer) => self.driver.close(peer),
                    SessionAction::Report(error) => {
                        let retryable = error.is_retryable();
                        tracing::warn!(error = %error, retryable, "session error");
                        self.report(&error);
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        net::{Ipv4Addr, SocketAddr},
        time::Duration,
    };

    use pairplay_core::{DiscoveredPeer, FrameSink, SessionState, TransportError};
    use pairplay_proto::payloads::moves::{GameKind, LineConnectMove, MoveEnvelope, Player};
    use tokio::time::Instant;

    use super::*;

    #[derive(Clone)]
    struct TestEnv;

    impl Environment for TestEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            Instant::now()
        }

        fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            tokio::time::sleep(duration)
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(7);
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("refused")]
    struct Refused;

    /// Driver scripted through a channel; records what the runtime asked.
    struct ScriptDriver {
        events: mpsc::UnboundedReceiver<DriverEvent<oneshot::Sender<bool>>>,
        log: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
        refuse_browsing: bool,
    }

    impl FrameSink for ScriptDriver {
        fn transmit(&mut self, peer: PeerId, _frame: Frame) -> Result<(), TransportError> {
            self.log.lock().unwrap().push(format!("transmit {peer}"));
            Ok(())
        }
    }

    impl Driver for ScriptDriver {
        type Responder = oneshot::Sender<bool>;
        type Error = Refused;

        async fn poll_event(&mut self) -> Option<DriverEvent<Self::Responder>> {
            self.events.recv().await
        }

        fn start_advertising(&mut self, _local: &PeerIdentity) -> Result<(), Refused> {
            self.log.lock().unwrap().push("advertise".into());
            Ok(())
        }

        fn stop_advertising(&mut self) {
            self.log.lock().unwrap().push("stop advertise".into());
        }

        fn start_browsing(&mut self, _local: &PeerIdentity) -> Result<(), Refused> {
            if self.refuse_browsing {
                return Err(Refused);
            }
            self.log.lock().unwrap().push("browse".into());
            Ok(())
        }

        fn stop_browsing(&mut self) {
            self.log.lock().unwrap().push("stop browse".into());
        }

        fn invite(&mut self, _local: &PeerIdentity, peer: &DiscoveredPeer) {
            self.log.lock().unwrap().push(format!("invite {}", peer.identity.id()));
        }

        fn close(&mut self, peer: PeerId) {
            self.log.lock().unwrap().push(format!("close {peer}"));
        }

        async fn shutdown(&mut self) {}
    }

    struct Fixture {
        handle: NodeHandle,
        events: mpsc::UnboundedSender<DriverEvent<oneshot::Sender<bool>>>,
        log: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    }

    fn spawn(refuse_browsing: bool) -> Fixture {
        let (events, rx) = mpsc::unbounded_channel();
        let log = std::sync::Arc::default();
        let driver = ScriptDriver { events: rx, log: std::sync::Arc::clone(&log), refuse_browsing };
        let (runtime, handle) = Runtime::new(driver, TestEnv, "local", SessionConfig::default());
        tokio::spawn(runtime.run());
        Fixture { handle, events, log }
    }

    fn remote() -> DiscoveredPeer {
        DiscoveredPeer {
            identity: PeerIdentity::new(PeerId(42), "remote"),
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 4000)),
        }
    }

    async fn connected_guest(fx: &Fixture) {
        fx.handle.execute(Command::Join).await.unwrap();
        fx.events.send(DriverEvent::PeerSighted(remote())).unwrap();
        fx.handle.wait_for(|s| !s.discovered.is_empty()).await.unwrap();
        fx.handle.execute(Command::Connect(PeerId(42))).await.unwrap();
        fx.events.send(DriverEvent::PeerConnected(remote().identity)).unwrap();
        fx.handle.wait_for(|s| s.connected).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn join_connect_and_play() {
        let fx = spawn(false);
        connected_guest(&fx).await;

        fx.handle.execute(Command::OpenGame(GameKind::LineConnect)).await.unwrap();
        let status = fx.handle.status();
        let game = status.game.unwrap();
        assert_eq!(game.seat(), Player::Second);
        assert!(!game.is_my_turn());

        let mv = LineConnectMove { row: 7, col: 7, player: Player::First };
        let frame = Payload::Move(MoveEnvelope::wrap(&mv).unwrap()).into_frame().unwrap();
        fx.events.send(DriverEvent::FrameReceived { peer: PeerId(42), frame }).unwrap();
        fx.handle.wait_for(|s| s.game.as_ref().is_some_and(ActiveGame::is_my_turn)).await.unwrap();

        fx.handle.execute(Command::PlaceStone { row: 7, col: 8 }).await.unwrap();
        assert!(fx.log.lock().unwrap().contains(&format!("transmit {}", PeerId(42))));
        assert_eq!(
            fx.handle.execute(Command::PlaceStone { row: 0, col: 0 }).await,
            Err(CommandError::Move(MoveRejected::NotYourTurn))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_fires_through_the_loop() {
        let fx = spawn(false);
        fx.handle.execute(Command::Join).await.unwrap();
        fx.events.send(DriverEvent::PeerSighted(remote())).unwrap();
        fx.handle.wait_for(|s| !s.discovered.is_empty()).await.unwrap();
        fx.handle.execute(Command::Connect(PeerId(42))).await.unwrap();

        let status = fx.handle.wait_for(|s| s.state == SessionState::Disconnected).await.unwrap();
        assert_eq!(status.status, "Connection timed out, please retry manually");
        assert!(status.browsing);
        assert!(status.last_error.is_some());
        assert!(fx.log.lock().unwrap().contains(&format!("close {}", PeerId(42))));
    }

    #[tokio::test(start_paused = true)]
    async fn browse_failure_turns_toggle_off() {
        let fx = spawn(true);
        fx.handle.execute(Command::Join).await.unwrap();

        let status = fx.handle.status();
        assert!(!status.browsing);
        assert_eq!(status.status, "Browsing failed: refused");
        assert!(status.last_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn open_game_requires_connection() {
        let fx = spawn(false);
        assert_eq!(
            fx.handle.execute(Command::OpenGame(GameKind::GridChess)).await,
            Err(CommandError::NotConnected)
        );
        assert_eq!(
            fx.handle.execute(Command::PlaceStone { row: 0, col: 0 }).await,
            Err(CommandError::Move(MoveRejected::NoActiveGame))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn goodbye_ends_session() {
        let fx = spawn(false);
        connected_guest(&fx).await;

        let frame = Payload::Goodbye(pairplay_proto::payloads::session::Goodbye {
            reason: "bye".into(),
        })
        .into_frame()
        .unwrap();
        fx.events.send(DriverEvent::FrameReceived { peer: PeerId(42), frame }).unwrap();

        let status = fx.handle.wait_for(|s| !s.connected).await.unwrap();
        assert_eq!(status.state, SessionState::Disconnected);
        assert_eq!(status.role, Some(pairplay_core::Role::Guest));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_link() {
        let fx = spawn(false);
        connected_guest(&fx).await;

        fx.handle.execute(Command::Shutdown).await.unwrap();

        assert!(fx.log.lock().unwrap().contains(&format!("close {}", PeerId(42))));
        assert_eq!(fx.handle.execute(Command::Host).await, Err(CommandError::Stopped));
    }

    #[tokio::test(start_paused = true)]
    async fn queued_offers_are_answered() {
        let fx = spawn(false);
        fx.handle.execute(Command::Host).await.unwrap();

        let mut answers = VecDeque::new();
        for id in [1, 2] {
            let (responder, answer) = oneshot::channel();
            let peer = PeerIdentity::new(PeerId(id), format!("p{id}"));
            fx.events.send(DriverEvent::InboundOffer { peer, responder }).unwrap();
            answers.push_back(answer);
        }

        fx.handle.wait_for(|s| s.pending_invitation.is_some()).await.unwrap();
        let second = answers.pop_back().unwrap();
        assert_eq!(second.await, Ok(false));

        fx.handle.execute(Command::Decline).await.unwrap();
        let first = answers.pop_front().unwrap();
        assert_eq!(first.await, Ok(false));
        assert!(fx.handle.status().advertising);
    }
}
