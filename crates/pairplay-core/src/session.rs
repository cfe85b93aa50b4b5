//! Session lifecycle state machine.
//!
//! Owns the discovery toggles, the invitation gate, the single link to the
//! other peer, the connection deadline and role memory. Uses the action
//! pattern: methods take time as input and return actions for the runtime to
//! execute. Every transition happens here; everything else reads.
//!
//! # State Machine
//!
//! ```text
//!            start_hosting            inbound offer
//! ┌──────┐ ───────────────> ┌─────────────┐ ──────────> ┌───────────────────┐
//! │ Idle │                  │ Advertising │ <────────── │ PendingInvitation │
//! └──────┘ ───────────────> └─────────────┘   decline   └───────────────────┘
//!            start_joining  ┌──────────┐                        │ accept
//!                           │ Browsing │ ── connect ──┐         ↓
//!                           └──────────┘              │   ┌────────────┐
//!                                                     └─> │ Connecting │
//!                                                         └────────────┘
//!                             timeout / failure             │       │ connected
//!                           ┌──────────────┐ <──────────────┘       ↓
//!                           │ Disconnected │ <─────────────── ┌───────────┐
//!                           └──────────────┘    disconnect    │ Connected │
//!                                                             └───────────┘
//! ```
//!
//! `Disconnected` is a display state: hosting and joining can always be
//! re-entered from it, and a timed-out joiner keeps browsing so it can call
//! `connect` again straight away.

use std::{
    ops::Sub,
    time::{Duration, Instant},
};

use crate::{
    discovery::{Discovery, DiscoveryMode, StartOutcome},
    error::SessionError,
    invitation::{InvitationGate, OfferDecision, Responder},
    peer::{DiscoveredPeer, PeerId, PeerIdentity, Role},
};

/// Time allowed from invite (or accept) until the transport reports the peer
/// connected.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing running
    Idle,
    /// Announcing a room, no offer pending
    Advertising,
    /// Listening for rooms
    Browsing,
    /// An inbound offer from this peer awaits the operator
    PendingInvitation(PeerId),
    /// Waiting for the transport to connect this peer
    Connecting(PeerId),
    /// Session established with this peer
    Connected(PeerId),
    /// The last attempt or session ended; retry manually
    Disconnected,
}

/// Actions returned by the session state machine.
///
/// The runtime executes these against its driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Begin announcing this peer
    StartAdvertising,
    /// Stop announcing this peer
    StopAdvertising,
    /// Begin listening for announcements
    StartBrowsing,
    /// Stop listening for announcements
    StopBrowsing,
    /// Send a session offer to this peer
    Invite(DiscoveredPeer),
    /// Tear down any transport link with this peer
    CloseLink(PeerId),
    /// Surface an error to the operator
    Report(SessionError),
}

/// Why the transport says a peer is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The remote operator declined our offer
    Declined,
    /// The link could not be established or broke
    Failed(String),
    /// The remote side closed the session
    Closed,
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deadline for a connection attempt, outbound or accepted
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { connect_timeout: DEFAULT_CONNECT_TIMEOUT }
    }
}

#[derive(Debug, Clone)]
enum Link<I> {
    None,
    Connecting { peer: PeerIdentity, started: I },
    Connected { peer: PeerIdentity },
}

/// Session lifecycle state machine
///
/// Pure state machine: no I/O, no clock. Generic over `Instant` to support
/// both real time and virtual time, and over the offer [`Responder`] so the
/// simulation can use the same tokio oneshot as production or its own.
///
/// # Invariants
///
/// - At most one of {advertising, browsing, connected} holds.
/// - At most one peer is connecting or connected, and never both.
/// - The deadline exists exactly while a peer is connecting.
pub struct Session<R, I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    config: SessionConfig,
    local: PeerIdentity,
    discovery: Discovery,
    gate: InvitationGate<R>,
    link: Link<I>,
    role: Option<Role>,
    status: String,
    disconnected: bool,
    connect_attempts: u32,
}

impl<R, I> Session<R, I>
where
    R: Responder,
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a session in [`SessionState::Idle`].
    pub fn new(local: PeerIdentity, config: SessionConfig) -> Self {
        Self {
            config,
            discovery: Discovery::new(local.id()),
            local,
            gate: InvitationGate::new(),
            link: Link::None,
            role: None,
            status: "Not connected".to_string(),
            disconnected: false,
            connect_attempts: 0,
        }
    }

    /// Current observable state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        match &self.link {
            Link::Connected { peer } => SessionState::Connected(peer.id()),
            Link::Connecting { peer, .. } => SessionState::Connecting(peer.id()),
            Link::None => {
                if let Some(peer) = self.gate.pending_peer() {
                    SessionState::PendingInvitation(peer.id())
                } else if self.disconnected {
                    SessionState::Disconnected
                } else {
                    match self.discovery.mode() {
                        Some(DiscoveryMode::Advertising) => SessionState::Advertising,
                        Some(DiscoveryMode::Browsing) => SessionState::Browsing,
                        None => SessionState::Idle,
                    }
                }
            },
        }
    }

    /// This process's identity.
    #[must_use]
    pub fn local(&self) -> &PeerIdentity {
        &self.local
    }

    /// Operator-facing status line.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Remembered role. Survives disconnects.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Whether this peer is announcing itself.
    #[must_use]
    pub fn is_advertising(&self) -> bool {
        self.discovery.is_advertising()
    }

    /// Whether this peer is listening for announcements.
    #[must_use]
    pub fn is_browsing(&self) -> bool {
        self.discovery.is_browsing()
    }

    /// Whether a session is established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self.link, Link::Connected { .. })
    }

    /// The connected peer, if any. The move channel sends only to this peer.
    #[must_use]
    pub fn connected_peer(&self) -> Option<&PeerIdentity> {
        match &self.link {
            Link::Connected { peer } => Some(peer),
            _ => None,
        }
    }

    /// Peer currently connecting or connected.
    #[must_use]
    pub fn linked_peer(&self) -> Option<&PeerIdentity> {
        match &self.link {
            Link::Connecting { peer, .. } | Link::Connected { peer } => Some(peer),
            Link::None => None,
        }
    }

    /// Peers visible while browsing.
    #[must_use]
    pub fn discovered(&self) -> &[DiscoveredPeer] {
        self.discovery.peers()
    }

    /// Peer whose inbound offer awaits the operator.
    #[must_use]
    pub fn pending_invitation(&self) -> Option<&PeerIdentity> {
        self.gate.pending_peer()
    }

    /// Connection attempts since the last successful connection or
    /// disconnect.
    #[must_use]
    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts
    }

    /// Deadline for the current connection attempt.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.config.connect_timeout
    }

    /// Time left until the connection deadline fires. `None` when no attempt
    /// is in flight.
    #[must_use]
    pub fn time_until_deadline(&self, now: I) -> Option<Duration> {
        match &self.link {
            Link::Connecting { started, .. } => {
                Some(self.config.connect_timeout.saturating_sub(now - *started))
            },
            _ => None,
        }
    }

    /// Elapsed time since the attempt started, if the deadline has passed.
    /// `None` otherwise.
    #[must_use]
    pub fn check_timeout(&self, now: I) -> Option<Duration> {
        let Link::Connecting { started, .. } = &self.link else {
            return None;
        };
        let elapsed = now - *started;
        if elapsed >= self.config.connect_timeout { Some(elapsed) } else { None }
    }

    fn invalid(&self, operation: &'static str) -> SessionError {
        SessionError::InvariantViolation { state: self.state(), operation }
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        tracing::debug!(status = %self.status, "session status");
    }

    fn rooms_status(&self) -> String {
        match self.discovery.peers().len() {
            0 => "No rooms found".to_string(),
            1 => "Found 1 room".to_string(),
            n => format!("Found {n} rooms"),
        }
    }

    fn stop_action(mode: DiscoveryMode) -> SessionAction {
        match mode {
            DiscoveryMode::Advertising => SessionAction::StopAdvertising,
            DiscoveryMode::Browsing => SessionAction::StopBrowsing,
        }
    }

    fn start_action(mode: DiscoveryMode) -> SessionAction {
        match mode {
            DiscoveryMode::Advertising => SessionAction::StartAdvertising,
            DiscoveryMode::Browsing => SessionAction::StartBrowsing,
        }
    }

    fn enter_discovery(
        &mut self,
        mode: DiscoveryMode,
        operation: &'static str,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if !matches!(self.link, Link::None) {
            return Err(self.invalid(operation));
        }

        let role = match mode {
            DiscoveryMode::Advertising => Role::Host,
            DiscoveryMode::Browsing => Role::Guest,
        };
        let mut actions = Vec::new();
        match self.discovery.start(mode) {
            StartOutcome::AlreadyActive if self.role == Some(role) => return Ok(actions),
            StartOutcome::AlreadyActive => {},
            StartOutcome::Started { replaced } => {
                if let Some(previous) = replaced {
                    actions.push(Self::stop_action(previous));
                }
                actions.push(Self::start_action(mode));
            },
        }

        // Only an advertiser can hold an offer.
        if mode == DiscoveryMode::Browsing
            && let Some(peer) = self.gate.decline()
        {
            tracing::info!(peer = %peer.id(), "declined pending invitation to start browsing");
        }

        self.discovery.clear_peers();
        self.disconnected = false;
        self.role = Some(role);
        self.set_status(match mode {
            DiscoveryMode::Advertising => "Creating room...",
            DiscoveryMode::Browsing => "Searching for rooms...",
        });

        tracing::info!(?mode, "discovery started");
        Ok(actions)
    }

    /// Start hosting: advertise this peer and remember the host role.
    ///
    /// Re-enterable from any non-connected state. Stops browsing.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvariantViolation` while connecting or connected
    pub fn start_hosting(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        self.enter_discovery(DiscoveryMode::Advertising, "start_hosting")
    }

    /// Start joining: browse for rooms and remember the guest role.
    ///
    /// Re-enterable from any non-connected state. Stops advertising and
    /// declines any pending offer.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvariantViolation` while connecting or connected
    pub fn start_joining(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        self.enter_discovery(DiscoveryMode::Browsing, "start_joining")
    }

    fn leave_discovery(&mut self, mode: DiscoveryMode) -> Vec<SessionAction> {
        if !self.discovery.stop(mode) {
            return Vec::new();
        }
        if mode == DiscoveryMode::Advertising {
            self.gate.decline();
        }
        if matches!(self.link, Link::None) {
            self.set_status("Not connected");
        }
        tracing::info!(?mode, "discovery stopped");
        vec![Self::stop_action(mode)]
    }

    /// Stop advertising. Declines any pending offer. Idempotent.
    pub fn stop_hosting(&mut self) -> Vec<SessionAction> {
        self.leave_discovery(DiscoveryMode::Advertising)
    }

    /// Stop browsing and forget discovered peers. Idempotent.
    pub fn stop_browsing(&mut self) -> Vec<SessionAction> {
        self.leave_discovery(DiscoveryMode::Browsing)
    }

    /// Invite a discovered peer and arm the connection deadline.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvariantViolation` unless browsing with nothing
    ///   connecting or connected, or if `peer` is not currently discovered
    pub fn connect(&mut self, peer: PeerId, now: I) -> Result<Vec<SessionAction>, SessionError> {
        if !self.discovery.is_browsing() || !matches!(self.link, Link::None) {
            return Err(self.invalid("connect"));
        }
        let Some(target) = self.discovery.find(peer).cloned() else {
            return Err(self.invalid("connect to an unknown peer"));
        };

        self.connect_attempts += 1;
        self.disconnected = false;
        self.set_status(format!("Connecting to {}...", target.identity));
        tracing::info!(peer = %peer, attempt = self.connect_attempts, "inviting peer");

        self.link = Link::Connecting { peer: target.identity.clone(), started: now };
        Ok(vec![SessionAction::Invite(target)])
    }

    /// Handle an inbound session offer.
    ///
    /// Parks it as the pending invitation, or declines it on the spot when a
    /// session is connected or connecting, another offer is pending, or this
    /// peer is not advertising.
    pub fn on_inbound_offer(&mut self, peer: PeerIdentity, responder: R) -> OfferDecision {
        let busy = !matches!(self.link, Link::None) || !self.discovery.is_advertising();
        let name = peer.display_name().to_string();
        let decision = self.gate.offer(peer, responder, busy);
        if decision == OfferDecision::Pending {
            self.set_status(format!("Connection request from {name}"));
        }
        decision
    }

    /// Accept the pending offer and arm the connection deadline.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvariantViolation` if no offer is pending
    pub fn accept_invitation(&mut self, now: I) -> Result<Vec<SessionAction>, SessionError> {
        let Some(peer) = self.gate.accept() else {
            return Err(self.invalid("accept_invitation"));
        };

        self.disconnected = false;
        self.set_status(format!("Connecting to {peer}..."));
        tracing::info!(peer = %peer.id(), "accepted invitation");
        self.link = Link::Connecting { peer, started: now };
        Ok(Vec::new())
    }

    /// Decline the pending offer and keep advertising.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvariantViolation` if no offer is pending
    pub fn decline_invitation(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        let Some(peer) = self.gate.decline() else {
            return Err(self.invalid("decline_invitation"));
        };
        tracing::info!(peer = %peer.id(), "declined invitation");
        self.set_status("Declined connection request");
        Ok(Vec::new())
    }

    /// The transport connected `peer`.
    ///
    /// Completes the attempt in flight for that peer. Any other connection,
    /// including one that completes after its attempt timed out, is refused.
    pub fn on_peer_connected(&mut self, peer: PeerIdentity) -> Vec<SessionAction> {
        match &self.link {
            Link::Connecting { peer: expected, .. } if *expected == peer => {},
            Link::Connected { peer: current } if *current == peer => return Vec::new(),
            _ => {
                let state = self.state();
                tracing::warn!(peer = %peer.id(), ?state, "refusing stale connection");
                return vec![SessionAction::CloseLink(peer.id())];
            },
        }

        let mut actions = Vec::new();
        for mode in [DiscoveryMode::Advertising, DiscoveryMode::Browsing] {
            if self.discovery.stop(mode) {
                actions.push(Self::stop_action(mode));
            }
        }
        self.gate.decline();

        self.connect_attempts = 0;
        self.disconnected = false;
        self.set_status(format!("Connected to {peer}"));
        tracing::info!(peer = %peer.id(), name = %peer, "session connected");
        self.link = Link::Connected { peer };
        actions
    }

    /// The transport reports `peer` gone or unreachable.
    ///
    /// Ignored unless `peer` is the one connecting or connected.
    pub fn on_peer_disconnected(
        &mut self,
        peer: PeerId,
        reason: &DisconnectReason,
    ) -> Vec<SessionAction> {
        match &self.link {
            Link::Connecting { peer: current, .. } if current.id() == peer => {
                let name = current.display_name().to_string();
                self.link = Link::None;
                self.disconnected = true;

                let error = match reason {
                    DisconnectReason::Declined => {
                        self.set_status(format!("Invitation declined by {name}"));
                        SessionError::ConnectionRejected { peer }
                    },
                    DisconnectReason::Failed(cause) => {
                        self.set_status("Connection failed or disconnected");
                        SessionError::ConnectionFailed { peer, reason: cause.clone() }
                    },
                    DisconnectReason::Closed => {
                        self.set_status("Connection failed or disconnected");
                        SessionError::ConnectionFailed {
                            peer,
                            reason: "closed before connecting".to_string(),
                        }
                    },
                };
                tracing::warn!(peer = %peer, ?reason, "connection attempt failed");
                vec![SessionAction::Report(error)]
            },
            Link::Connected { peer: current } if current.id() == peer => {
                self.link = Link::None;
                self.disconnected = true;
                self.set_status("Connection failed or disconnected");
                tracing::info!(peer = %peer, ?reason, "session ended by transport");
                Vec::new()
            },
            _ => {
                tracing::debug!(peer = %peer, ?reason, "ignoring disconnect for unrelated peer");
                Vec::new()
            },
        }
    }

    /// Leave the session.
    ///
    /// Closes any link, stops both discovery toggles, declines a pending
    /// offer, cancels the deadline and resets the attempt counter. Role
    /// memory is kept. Idempotent and valid from every state.
    pub fn disconnect(&mut self) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        let mut was_active = false;

        if let Some(peer) = self.linked_peer() {
            actions.push(SessionAction::CloseLink(peer.id()));
            was_active = true;
        }
        self.link = Link::None;

        for mode in [DiscoveryMode::Advertising, DiscoveryMode::Browsing] {
            if self.discovery.stop(mode) {
                actions.push(Self::stop_action(mode));
                was_active = true;
            }
        }

        if self.gate.decline().is_some() {
            was_active = true;
        }

        self.connect_attempts = 0;
        if was_active {
            self.disconnected = true;
            self.set_status("Disconnected");
            tracing::info!("session disconnected");
        }
        actions
    }

    /// Drop the current link and restart whichever discovery toggle was on.
    pub fn reset_connection(&mut self) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        if let Some(peer) = self.linked_peer() {
            actions.push(SessionAction::CloseLink(peer.id()));
        }
        self.link = Link::None;
        self.gate.decline();
        self.connect_attempts = 0;
        self.disconnected = false;

        if let Some(mode) = self.discovery.mode() {
            self.discovery.clear_peers();
            actions.push(Self::stop_action(mode));
            actions.push(Self::start_action(mode));
        }

        self.set_status("Connection reset");
        tracing::info!("connection reset");
        actions
    }

    /// Forget the remembered role.
    pub fn reset_role(&mut self) {
        self.role = None;
    }

    /// Discovery saw a peer.
    pub fn on_peer_sighted(&mut self, peer: DiscoveredPeer) {
        let id = peer.identity.id();
        if self.discovery.on_sighted(peer) {
            tracing::info!(peer = %id, "peer discovered");
            if matches!(self.link, Link::None) && !self.disconnected {
                let status = self.rooms_status();
                self.set_status(status);
            }
        }
    }

    /// Discovery lost a peer.
    pub fn on_peer_lost(&mut self, peer: PeerId) {
        if self.discovery.on_lost(peer) {
            tracing::info!(peer = %peer, "peer lost");
            if matches!(self.link, Link::None) && !self.disconnected {
                let status = self.rooms_status();
                self.set_status(status);
            }
        }
    }

    /// Advertising or browsing failed to start or died.
    ///
    /// Turns the toggle off and reports. No automatic retry.
    pub fn on_discovery_failed(&mut self, mode: DiscoveryMode, reason: &str) -> Vec<SessionAction> {
        if !self.discovery.stop(mode) {
            tracing::debug!(?mode, reason, "discovery failure for inactive toggle");
            return Vec::new();
        }
        if mode == DiscoveryMode::Advertising {
            self.gate.decline();
        }

        let label = match mode {
            DiscoveryMode::Advertising => "Hosting",
            DiscoveryMode::Browsing => "Browsing",
        };
        self.set_status(format!("{label} failed: {reason}"));
        tracing::warn!(?mode, reason, "discovery failed");
        vec![SessionAction::Report(SessionError::DiscoveryStartFailed {
            mode,
            reason: reason.to_string(),
        })]
    }

    /// Fire the connection deadline if it has passed.
    ///
    /// The attempt is abandoned with an explicit retry-manually status. The
    /// discovery toggle is left as it was.
    pub fn tick(&mut self, now: I) -> Vec<SessionAction> {
        let Some(elapsed) = self.check_timeout(now) else {
            return Vec::new();
        };
        let peer = match &self.link {
            Link::Connecting { peer, .. } => peer.clone(),
            _ => return Vec::new(),
        };
        self.link = Link::None;

        self.disconnected = true;
        self.set_status("Connection timed out, please retry manually");
        tracing::warn!(peer = %peer.id(), ?elapsed, "connection attempt timed out");

        vec![
            SessionAction::CloseLink(peer.id()),
            SessionAction::Report(SessionError::ConnectionTimedOut { peer: peer.id(), elapsed }),
        ]
    }
}

impl<R, I> std::fmt::Debug for Session<R, I>
where
    R: Responder,
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("local", &self.local.id())
            .field("state", &self.state())
            .field("role", &self.role)
            .field("status", &self.status)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}
