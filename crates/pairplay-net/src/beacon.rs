//! UDP beacon discovery.
//!
//! An advertiser broadcasts a [`Beacon`] frame every interval and one final
//! beacon with `leaving` set when it stops. A browser listens on the discovery
//! port and turns beacons into [`BrowseEvent`]s.
//!
//! [`browse`] returns a stream that binds its socket on first poll, yields
//! events for as long as the socket is healthy, and can simply be created
//! again to restart browsing.

use std::{
    collections::{HashMap, VecDeque},
    net::SocketAddr,
    time::Duration,
};

use futures::Stream;
use pairplay_core::{DiscoveredPeer, PeerId, PeerIdentity};
use pairplay_proto::{Payload, SERVICE_TYPE, payloads::discovery::Beacon};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::{
    net::UdpSocket,
    sync::oneshot,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::NetError;

/// Largest datagram a browser reads. Beacons are far smaller.
const MAX_DATAGRAM: usize = 2048;

/// Shortest wait between expiry sweeps and between announcements.
const MIN_PERIOD: Duration = Duration::from_millis(50);

/// How long a browser waits for a datagram before sweeping for quiet peers.
fn sweep_interval(peer_expiry: Duration) -> Duration {
    (peer_expiry / 2).max(MIN_PERIOD)
}

/// What a browse stream saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseEvent {
    /// A beacon from this peer arrived
    Sighted(DiscoveredPeer),
    /// This peer left or went quiet
    Lost(PeerId),
    /// The socket failed; the stream ends after this
    Failed(String),
}

/// Settings for a browse stream.
#[derive(Debug, Clone, Copy)]
pub struct BrowseConfig {
    /// Address to listen on
    pub bind: SocketAddr,
    /// Quiet time after which a peer is lost
    pub peer_expiry: Duration,
    /// Our own identifier, never reported
    pub local: PeerId,
}

fn udp_socket(addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuse_port(true)?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}

fn beacon_datagram(beacon: Beacon) -> Result<Vec<u8>, NetError> {
    Ok(Payload::Beacon(beacon).into_frame()?.to_vec()?)
}

/// Running advertiser. Dropping it stops advertising.
pub struct Advertiser {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Advertiser {
    /// Bind a broadcast socket and start announcing `beacon`.
    ///
    /// `on_failure` runs once if a send fails; the advertiser is dead after
    /// that. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `NetError::Bind` if no socket can be bound
    /// - `NetError::Protocol` if the beacon cannot be encoded
    pub fn start(
        beacon: Beacon,
        target: SocketAddr,
        interval: Duration,
        on_failure: impl FnOnce(NetError) + Send + 'static,
    ) -> Result<Self, NetError> {
        let local = if target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = udp_socket(local).map_err(|source| NetError::Bind { addr: local, source })?;

        let announce = beacon_datagram(beacon.clone())?;
        let leaving = beacon_datagram(Beacon { leaving: true, ..beacon })?;

        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(async move {
            if let Err(e) =
                announce_until_stopped(socket, announce, leaving, target, interval, stopped).await
            {
                tracing::warn!(%target, error = %e, "advertising failed");
                on_failure(e);
            }
        });
        tracing::info!(%target, ?interval, "advertising");
        Ok(Self { stop: Some(stop), task })
    }

    /// Stop and wait for the leaving beacon to go out.
    pub async fn finish(mut self) {
        self.stop.take();
        if let Err(e) = (&mut self.task).await {
            tracing::debug!(error = %e, "advertiser task ended abnormally");
        }
    }
}

impl Drop for Advertiser {
    fn drop(&mut self) {
        // Dropping the sender wakes the loop, which sends the leaving beacon.
        self.stop.take();
    }
}

async fn announce_until_stopped(
    socket: UdpSocket,
    announce: Vec<u8>,
    leaving: Vec<u8>,
    target: SocketAddr,
    interval: Duration,
    mut stopped: oneshot::Receiver<()>,
) -> Result<(), NetError> {
    let mut ticker = tokio::time::interval(interval.max(MIN_PERIOD));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                socket.send_to(&announce, target).await?;
            },
            _ = &mut stopped => break,
        }
    }

    if let Err(e) = socket.send_to(&leaving, target).await {
        tracing::debug!(error = %e, "leaving beacon not sent");
    }
    tracing::info!("advertising stopped");
    Ok(())
}

/// Listen for beacons.
///
/// Nothing is bound until the stream is first polled. Every beacon yields a
/// [`BrowseEvent::Sighted`]; a leaving beacon or `peer_expiry` of silence
/// yields [`BrowseEvent::Lost`]. A socket error yields one
/// [`BrowseEvent::Failed`] and ends the stream.
pub fn browse(config: BrowseConfig) -> impl Stream<Item = BrowseEvent> + Send + 'static {
    futures::stream::unfold(Browser::new(config), |mut browser| async move {
        let event = browser.next_event().await?;
        Some((event, browser))
    })
}

struct Browser {
    config: BrowseConfig,
    socket: Option<UdpSocket>,
    last_heard: HashMap<PeerId, Instant>,
    queued: VecDeque<BrowseEvent>,
    done: bool,
}

impl Browser {
    fn new(config: BrowseConfig) -> Self {
        Self {
            config,
            socket: None,
            last_heard: HashMap::new(),
            queued: VecDeque::new(),
            done: false,
        }
    }

    fn fail(&mut self, reason: String) -> Option<BrowseEvent> {
        tracing::warn!(bind = %self.config.bind, reason = %reason, "browsing failed");
        self.done = true;
        self.socket = None;
        Some(BrowseEvent::Failed(reason))
    }

    async fn next_event(&mut self) -> Option<BrowseEvent> {
        loop {
            if let Some(event) = self.queued.pop_front() {
                return Some(event);
            }
            if self.done {
                return None;
            }

            if self.socket.is_none() {
                match udp_socket(self.config.bind) {
                    Ok(socket) => {
                        tracing::info!(bind = %self.config.bind, "browsing");
                        self.socket = Some(socket);
                    },
                    Err(e) => return self.fail(e.to_string()),
                }
            }
            let Some(socket) = self.socket.as_ref() else {
                return None;
            };

            let mut buf = [0u8; MAX_DATAGRAM];
            let sweep = sweep_interval(self.config.peer_expiry);
            let received = tokio::time::timeout(sweep, socket.recv_from(&mut buf)).await;

            match received {
                Ok(Ok((len, from))) => self.on_datagram(&buf[..len], from, Instant::now()),
                Ok(Err(e)) => return self.fail(e.to_string()),
                Err(_quiet) => {},
            }
            self.expire(Instant::now());
        }
    }

    fn on_datagram(&mut self, bytes: &[u8], from: SocketAddr, now: Instant) {
        let beacon = match Payload::from_datagram(bytes) {
            Ok(Payload::Beacon(beacon)) => beacon,
            Ok(other) => {
                tracing::debug!(%from, opcode = ?other.opcode(), "ignoring non-beacon datagram");
                return;
            },
            Err(e) => {
                tracing::debug!(%from, error = %e, "ignoring undecodable datagram");
                return;
            },
        };

        if beacon.service != SERVICE_TYPE {
            tracing::debug!(%from, service = %beacon.service, "ignoring foreign service");
            return;
        }
        let peer = PeerId(beacon.peer_id);
        if peer == self.config.local {
            return;
        }

        if beacon.leaving {
            if self.last_heard.remove(&peer).is_some() {
                self.queued.push_back(BrowseEvent::Lost(peer));
            }
            return;
        }

        self.last_heard.insert(peer, now);
        self.queued.push_back(BrowseEvent::Sighted(DiscoveredPeer {
            identity: PeerIdentity::new(peer, beacon.display_name),
            addr: SocketAddr::new(from.ip(), beacon.port),
        }));
    }

    fn expire(&mut self, now: Instant) {
        let expiry = self.config.peer_expiry;
        let stale: Vec<PeerId> = self
            .last_heard
            .iter()
            .filter(|(_, heard)| now.duration_since(**heard) >= expiry)
            .map(|(peer, _)| *peer)
            .collect();

        for peer in stale {
            self.last_heard.remove(&peer);
            tracing::debug!(peer = %peer, "peer went quiet");
            self.queued.push_back(BrowseEvent::Lost(peer));
        }
    }
}
