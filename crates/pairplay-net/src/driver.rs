//! Production driver.
//!
//! [`NetDriver`] owns the QUIC endpoint, the beacon tasks and one outbound
//! queue per live link. Background tasks report through a single unbounded
//! channel; [`Driver::poll_event`] filters those reports against the driver's
//! current bookkeeping so the runtime never sees news about attempts it has
//! already abandoned.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use futures::{Stream, StreamExt};
use pairplay_app::{Driver, DriverEvent};
use pairplay_core::{
    DiscoveredPeer, DiscoveryMode, FrameSink, PeerId, PeerIdentity, TransportError,
};
use pairplay_proto::{
    Frame, Payload, SERVICE_TYPE,
    payloads::{discovery::Beacon, session::Goodbye},
};
use tokio::{
    sync::{mpsc, mpsc::error::TrySendError, oneshot},
    task::JoinHandle,
};

use crate::{
    NetConfig, NetError, QuinnTransport,
    beacon::{self, Advertiser, BrowseConfig, BrowseEvent},
    link::{self, Signal, Signals},
};

/// How long shutdown waits for open connections to drain.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

struct Attempt {
    peer: PeerId,
    /// Outbound attempts only; inbound ones end on their own.
    task: Option<JoinHandle<()>>,
}

struct LinkHandle {
    generation: u64,
    outbound: mpsc::Sender<Frame>,
}

/// UDP beacons for discovery, QUIC for sessions.
pub struct NetDriver {
    config: NetConfig,
    transport: QuinnTransport,
    signals: Signals,
    inbox: mpsc::UnboundedReceiver<Signal>,
    generations: Arc<AtomicU64>,
    advertiser: Option<Advertiser>,
    browser: Option<JoinHandle<()>>,
    attempts: HashMap<u64, Attempt>,
    links: HashMap<PeerId, LinkHandle>,
    acceptor: JoinHandle<()>,
}

impl NetDriver {
    /// Bind the QUIC endpoint and start accepting connections.
    ///
    /// Discovery sockets are bound later, when advertising or browsing starts.
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `NetError::Bind` or `NetError::Config` from [`QuinnTransport::bind`]
    pub fn bind(config: NetConfig) -> Result<Self, NetError> {
        let transport = QuinnTransport::bind(config.bind, config.idle_timeout)?;
        let (signals, inbox) = mpsc::unbounded_channel();
        let generations = Arc::new(AtomicU64::new(1));

        let acceptor = tokio::spawn(link::accept_loop(
            transport.endpoint(),
            Arc::clone(&generations),
            config.link_queue_depth,
            signals.clone(),
        ));

        Ok(Self {
            config,
            transport,
            signals,
            inbox,
            generations,
            advertiser: None,
            browser: None,
            attempts: HashMap::new(),
            links: HashMap::new(),
            acceptor,
        })
    }

    /// Address of the QUIC endpoint. Its port goes into beacons.
    ///
    /// # Errors
    ///
    /// - `NetError::Io` if the socket is gone
    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        self.transport.local_addr()
    }

    /// Turn a background report into an event for the runtime, or drop it.
    fn absorb(&mut self, signal: Signal) -> Option<DriverEvent<oneshot::Sender<bool>>> {
        match signal {
            Signal::Event(event) => self.still_wanted(event),
            Signal::Offer { peer, generation, responder } => {
                self.attempts.insert(generation, Attempt { peer: peer.id(), task: None });
                Some(DriverEvent::InboundOffer { peer, responder })
            },
            Signal::LinkUp { peer, generation, outbound } => {
                if self.attempts.remove(&generation).is_none() {
                    tracing::debug!(peer = %peer.id(), generation, "refusing abandoned attempt");
                    return None;
                }
                if self.links.contains_key(&peer.id()) {
                    tracing::warn!(peer = %peer.id(), generation, "refusing second link to peer");
                    return None;
                }
                self.links.insert(peer.id(), LinkHandle { generation, outbound });
                Some(DriverEvent::PeerConnected(peer))
            },
            Signal::AttemptEnded { generation, reason } => {
                let attempt = self.attempts.remove(&generation)?;
                reason.map(|reason| DriverEvent::PeerDisconnected { peer: attempt.peer, reason })
            },
            Signal::LinkDown { peer, generation, reason } => {
                let current =
                    self.links.get(&peer).is_some_and(|link| link.generation == generation);
                if !current {
                    return None;
                }
                self.links.remove(&peer);
                Some(DriverEvent::PeerDisconnected { peer, reason })
            },
        }
    }

    /// Drop discovery news for a toggle that has since been turned off.
    fn still_wanted(
        &self,
        event: DriverEvent<oneshot::Sender<bool>>,
    ) -> Option<DriverEvent<oneshot::Sender<bool>>> {
        let wanted = match &event {
            DriverEvent::PeerSighted(_)
            | DriverEvent::PeerLost(_)
            | DriverEvent::DiscoveryFailed { mode: DiscoveryMode::Browsing, .. } => {
                self.browser.is_some()
            },
            DriverEvent::DiscoveryFailed { mode: DiscoveryMode::Advertising, .. } => {
                self.advertiser.is_some()
            },
            _ => true,
        };
        wanted.then_some(event)
    }
}

async fn forward_browse(events: impl Stream<Item = BrowseEvent>, signals: Signals) {
    let mut events = std::pin::pin!(events);
    while let Some(event) = events.next().await {
        let event = match event {
            BrowseEvent::Sighted(peer) => DriverEvent::PeerSighted(peer),
            BrowseEvent::Lost(peer) => DriverEvent::PeerLost(peer),
            BrowseEvent::Failed(reason) => {
                DriverEvent::DiscoveryFailed { mode: DiscoveryMode::Browsing, reason }
            },
        };
        if signals.send(Signal::Event(event)).is_err() {
            break;
        }
    }
}

impl FrameSink for NetDriver {
    fn transmit(&mut self, peer: PeerId, frame: Frame) -> Result<(), TransportError> {
        let link =
            self.links.get(&peer).ok_or_else(|| TransportError(format!("no link to {peer}")))?;
        link.outbound.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => TransportError(format!("send queue to {peer} is full")),
            TrySendError::Closed(_) => TransportError(format!("link to {peer} is closed")),
        })
    }
}

impl Driver for NetDriver {
    type Responder = oneshot::Sender<bool>;
    type Error = NetError;

    async fn poll_event(&mut self) -> Option<DriverEvent<Self::Responder>> {
        loop {
            let signal = self.inbox.recv().await?;
            if let Some(event) = self.absorb(signal) {
                return Some(event);
            }
        }
    }

    fn start_advertising(&mut self, local: &PeerIdentity) -> Result<(), NetError> {
        let beacon = Beacon {
            service: SERVICE_TYPE.to_string(),
            peer_id: local.id().0,
            display_name: local.display_name().to_string(),
            port: self.transport.local_addr()?.port(),
            leaving: false,
        };

        let signals = self.signals.clone();
        let advertiser = Advertiser::start(
            beacon,
            self.config.beacon_target,
            self.config.beacon_interval,
            move |e| {
                let mode = DiscoveryMode::Advertising;
                let event = DriverEvent::DiscoveryFailed { mode, reason: e.to_string() };
                let _ = signals.send(Signal::Event(event));
            },
        )?;
        self.advertiser = Some(advertiser);
        Ok(())
    }

    fn stop_advertising(&mut self) {
        // Dropping the advertiser sends the leaving beacon.
        self.advertiser = None;
    }

    fn start_browsing(&mut self, local: &PeerIdentity) -> Result<(), NetError> {
        let events = beacon::browse(BrowseConfig {
            bind: self.config.discovery_bind,
            peer_expiry: self.config.peer_expiry,
            local: local.id(),
        });
        let task = tokio::spawn(forward_browse(events, self.signals.clone()));
        if let Some(previous) = self.browser.replace(task) {
            previous.abort();
        }
        Ok(())
    }

    fn stop_browsing(&mut self) {
        if let Some(task) = self.browser.take() {
            task.abort();
        }
    }

    fn invite(&mut self, local: &PeerIdentity, peer: &DiscoveredPeer) {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        tracing::info!(peer = %peer.identity.id(), addr = %peer.addr, generation, "inviting");

        let task = tokio::spawn(link::offer_session(
            self.transport.endpoint(),
            local.clone(),
            peer.clone(),
            generation,
            self.config.link_queue_depth,
            self.signals.clone(),
        ));
        self.attempts.insert(generation, Attempt { peer: peer.identity.id(), task: Some(task) });
    }

    fn close(&mut self, peer: PeerId) {
        self.attempts.retain(|_, attempt| {
            if attempt.peer != peer {
                return true;
            }
            if let Some(task) = &attempt.task {
                task.abort();
            }
            false
        });

        let Some(link) = self.links.remove(&peer) else {
            return;
        };
        // The link task writes what is queued, then finishes the stream once
        // this last sender is dropped.
        match Payload::Goodbye(Goodbye { reason: "session closed".into() }).into_frame() {
            Ok(frame) => {
                if link.outbound.try_send(frame).is_err() {
                    tracing::debug!(peer = %peer, "goodbye not queued");
                }
            },
            Err(e) => tracing::warn!(error = %e, "failed to encode goodbye"),
        }
        tracing::info!(peer = %peer, "link closed");
    }

    async fn shutdown(&mut self) {
        self.stop_browsing();
        for (_, attempt) in self.attempts.drain() {
            if let Some(task) = attempt.task {
                task.abort();
            }
        }
        let peers: Vec<PeerId> = self.links.keys().copied().collect();
        for peer in peers {
            self.close(peer);
        }
        if let Some(advertiser) = self.advertiser.take() {
            advertiser.finish().await;
        }

        let endpoint = self.transport.endpoint();
        if tokio::time::timeout(SHUTDOWN_GRACE, endpoint.wait_idle()).await.is_err() {
            tracing::debug!("connections still open at shutdown");
        }
        endpoint.close(0u32.into(), b"shutdown");
        self.acceptor.abort();
        tracing::info!("driver shut down");
    }
}

impl Drop for NetDriver {
    fn drop(&mut self) {
        self.acceptor.abort();
        self.stop_browsing();
    }
}
