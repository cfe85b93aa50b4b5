//! Network configuration.

use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

/// UDP port beacons are sent to and browsed on.
pub const DEFAULT_DISCOVERY_PORT: u16 = 47800;

/// Network configuration
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// QUIC endpoint address. Port 0 picks a free port, which beacons carry.
    pub bind: SocketAddr,
    /// Where browsing listens for beacons
    pub discovery_bind: SocketAddr,
    /// Where advertising sends beacons
    pub beacon_target: SocketAddr,
    /// Time between beacons
    pub beacon_interval: Duration,
    /// A browsed peer is lost after this long without a beacon
    pub peer_expiry: Duration,
    /// Outbound frames buffered per link before sends are refused
    pub link_queue_depth: usize,
    /// QUIC idle timeout
    pub idle_timeout: Duration,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            discovery_bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_DISCOVERY_PORT)),
            beacon_target: SocketAddr::from((Ipv4Addr::BROADCAST, DEFAULT_DISCOVERY_PORT)),
            beacon_interval: Duration::from_secs(1),
            peer_expiry: Duration::from_secs(3),
            link_queue_depth: 64,
            idle_timeout: Duration::from_secs(30),
        }
    }
}
