//! Inbound offer gate.
//!
//! A remote peer that wants a session sends an offer together with a one-shot
//! [`Responder`]. The gate either parks the offer for the operator or answers
//! it immediately with a decline. Because [`Responder::respond`] consumes the
//! responder, an offer can be answered at most once.

use std::fmt;

use crate::peer::PeerIdentity;

/// One-shot answer to an inbound offer.
pub trait Responder: Send {
    /// Deliver the answer. Consumes the responder.
    fn respond(self, accept: bool);
}

impl Responder for tokio::sync::oneshot::Sender<bool> {
    fn respond(self, accept: bool) {
        if self.send(accept).is_err() {
            tracing::debug!(accept, "offer withdrawn before it was answered");
        }
    }
}

/// What the gate did with an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferDecision {
    /// Parked as the pending invitation, waiting for the operator
    Pending,
    /// Declined on the spot without surfacing it
    AutoDeclined,
}

struct PendingOffer<R> {
    peer: PeerIdentity,
    responder: R,
}

/// Holds at most one pending inbound offer.
///
/// # Invariants
///
/// - At most one offer is pending.
/// - Every offer handed to the gate is answered exactly once: immediately,
///   by [`InvitationGate::accept`], or by [`InvitationGate::decline`].
pub struct InvitationGate<R> {
    pending: Option<PendingOffer<R>>,
}

impl<R: Responder> InvitationGate<R> {
    /// Empty gate.
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Peer whose offer is waiting, if any.
    #[must_use]
    pub fn pending_peer(&self) -> Option<&PeerIdentity> {
        self.pending.as_ref().map(|offer| &offer.peer)
    }

    /// Consider an inbound offer.
    ///
    /// `busy` is true when the owner cannot take a session right now (already
    /// connected, connecting, or not accepting offers). A busy owner or an
    /// already pending offer means an immediate decline.
    pub fn offer(&mut self, peer: PeerIdentity, responder: R, busy: bool) -> OfferDecision {
        if busy || self.pending.is_some() {
            tracing::debug!(peer = %peer.id(), busy, "auto-declining inbound offer");
            responder.respond(false);
            return OfferDecision::AutoDeclined;
        }

        self.pending = Some(PendingOffer { peer, responder });
        OfferDecision::Pending
    }

    /// Accept the pending offer. `None` if nothing is pending.
    pub fn accept(&mut self) -> Option<PeerIdentity> {
        let offer = self.pending.take()?;
        offer.responder.respond(true);
        Some(offer.peer)
    }

    /// Decline the pending offer. `None` if nothing is pending.
    pub fn decline(&mut self) -> Option<PeerIdentity> {
        let offer = self.pending.take()?;
        offer.responder.respond(false);
        Some(offer.peer)
    }
}

impl<R: Responder> Default for InvitationGate<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for InvitationGate<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvitationGate")
            .field("pending", &self.pending.as_ref().map(|offer| offer.peer.id()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot;

    use super::*;
    use crate::peer::PeerId;

    fn offer_from(id: u64) -> (PeerIdentity, oneshot::Sender<bool>, oneshot::Receiver<bool>) {
        let (tx, rx) = oneshot::channel();
        (PeerIdentity::new(PeerId(id), format!("peer-{id}")), tx, rx)
    }

    #[test]
    fn second_offer_is_auto_declined() {
        let mut gate = InvitationGate::new();
        let (a, a_tx, mut a_rx) = offer_from(1);
        let (b, b_tx, mut b_rx) = offer_from(2);

        assert_eq!(gate.offer(a, a_tx, false), OfferDecision::Pending);
        assert_eq!(gate.offer(b, b_tx, false), OfferDecision::AutoDeclined);

        assert_eq!(b_rx.try_recv(), Ok(false));
        assert!(a_rx.try_recv().is_err(), "first offer still waiting");
        assert_eq!(gate.pending_peer().map(PeerIdentity::id), Some(PeerId(1)));
    }

    #[test]
    fn busy_owner_declines_immediately() {
        let mut gate = InvitationGate::new();
        let (a, a_tx, mut a_rx) = offer_from(1);

        assert_eq!(gate.offer(a, a_tx, true), OfferDecision::AutoDeclined);
        assert_eq!(a_rx.try_recv(), Ok(false));
        assert!(gate.pending_peer().is_none());
    }

    #[test]
    fn accept_answers_once_and_clears() {
        let mut gate = InvitationGate::new();
        let (a, a_tx, mut a_rx) = offer_from(1);
        gate.offer(a, a_tx, false);

        assert_eq!(gate.accept().map(|p| p.id()), Some(PeerId(1)));
        assert_eq!(a_rx.try_recv(), Ok(true));
        assert!(gate.accept().is_none());
        assert!(gate.decline().is_none());
    }

    #[test]
    fn decline_answers_false() {
        let mut gate = InvitationGate::new();
        let (a, a_tx, mut a_rx) = offer_from(1);
        gate.offer(a, a_tx, false);

        assert!(gate.decline().is_some());
        assert_eq!(a_rx.try_recv(), Ok(false));
    }

    #[test]
    fn withdrawn_offer_does_not_panic() {
        let mut gate = InvitationGate::new();
        let (a, a_tx, a_rx) = offer_from(1);
        gate.offer(a, a_tx, false);
        drop(a_rx);

        assert!(gate.accept().is_some());
    }
}
