//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the runtime from specific I/O
//! implementations. Production uses UDP beacons and QUIC; the simulation
//! harness uses an in-memory LAN. The generic [`crate::Runtime`] handles all
//! orchestration for both.

use std::future::Future;

use pairplay_core::{DiscoveredPeer, FrameSink, PeerId, PeerIdentity, Responder};

use crate::DriverEvent;

/// Abstracts discovery and session transport for the runtime.
///
/// Every method except [`Driver::poll_event`] returns immediately: work that
/// takes time (a QUIC handshake, waiting on a remote operator) is spawned and
/// reports back through `poll_event`. Frames go out through the
/// [`FrameSink`] supertrait.
///
/// # Associated Types
///
/// - [`Responder`](Driver::Responder): answers an inbound offer
/// - [`Error`](Driver::Error): why discovery could not start
pub trait Driver: FrameSink + Send + 'static {
    /// One-shot answer to an inbound offer.
    type Responder: Responder + std::fmt::Debug + 'static;

    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Wait for the next event.
    ///
    /// Must be cancel-safe: the runtime polls it inside `tokio::select!`.
    /// Returns `None` once the driver can produce no more events.
    fn poll_event(&mut self) -> impl Future<Output = Option<DriverEvent<Self::Responder>>> + Send;

    /// Begin announcing `local`.
    ///
    /// # Errors
    ///
    /// Returns an error if announcing cannot begin. Failures after start are
    /// reported as [`DriverEvent::DiscoveryFailed`].
    fn start_advertising(&mut self, local: &PeerIdentity) -> Result<(), Self::Error>;

    /// Stop announcing. Idempotent.
    fn stop_advertising(&mut self);

    /// Begin listening for announcements other than `local`'s.
    ///
    /// # Errors
    ///
    /// Returns an error if browsing cannot begin.
    fn start_browsing(&mut self, local: &PeerIdentity) -> Result<(), Self::Error>;

    /// Stop listening. Idempotent.
    fn stop_browsing(&mut self);

    /// Offer `peer` a session on behalf of `local`.
    ///
    /// Ends in [`DriverEvent::PeerConnected`] or
    /// [`DriverEvent::PeerDisconnected`].
    fn invite(&mut self, local: &PeerIdentity, peer: &DiscoveredPeer);

    /// Close any link with `peer`, including one still being set up.
    fn close(&mut self, peer: PeerId);

    /// Release transport resources before the runtime exits.
    fn shutdown(&mut self) -> impl Future<Output = ()> + Send;
}
