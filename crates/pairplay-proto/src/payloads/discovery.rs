//! Discovery beacon payload.

use serde::{Deserialize, Serialize};

/// Periodic announcement broadcast by an advertising peer.
///
/// Browsers ignore beacons whose `service` differs from
/// [`crate::SERVICE_TYPE`] and beacons carrying their own `peer_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beacon {
    /// Service identity the peer advertises under
    pub service: String,
    /// Process-stable identifier of the advertiser
    pub peer_id: u64,
    /// Human-readable name shown in the room list
    pub display_name: String,
    /// Port the advertiser's session endpoint listens on
    pub port: u16,
    /// Set on the final beacon sent when advertising stops
    #[serde(default)]
    pub leaving: bool,
}
