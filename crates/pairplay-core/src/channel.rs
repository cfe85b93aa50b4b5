//! Move channel.
//!
//! Frames move envelopes for the connected peer and classifies inbound
//! frames. The channel never looks at the session state itself: callers pass
//! the connected peer, read from [`crate::Session::connected_peer`].
//!
//! Ordering and reliability come from the transport, which carries every
//! frame of a session on a single stream.

use pairplay_proto::{
    Frame, Payload,
    payloads::moves::{GameKind, MoveEnvelope},
};

use crate::{
    error::{ChannelError, SessionError, TransportError},
    peer::{PeerId, PeerIdentity},
};

/// Where framed bytes go. Implemented by drivers.
///
/// `transmit` must not block: implementations queue the frame and return.
pub trait FrameSink {
    /// Queue `frame` for delivery to `peer`.
    fn transmit(&mut self, peer: PeerId, frame: Frame) -> Result<(), TransportError>;
}

/// Anything that can carry an envelope to the opponent.
///
/// The turn coordinator only needs this much; [`ChannelLink`] is the real
/// implementation.
pub trait MoveSender {
    /// Send one envelope.
    fn send_envelope(&mut self, envelope: MoveEnvelope) -> Result<(), ChannelError>;
}

/// Classification of an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A move for the game currently open
    Move(MoveEnvelope),
    /// A move for another game (or no game open); dropped
    Ignored(GameKind),
    /// A well-formed non-move payload (handshake, goodbye)
    Control(Payload),
    /// Bytes that did not decode
    Malformed(SessionError),
}

/// Counts traffic and frames envelopes.
#[derive(Debug, Clone, Default)]
pub struct MoveChannel {
    sent: u64,
    received: u64,
    ignored: u64,
}

impl MoveChannel {
    /// Fresh channel with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Envelopes handed to the transport.
    #[must_use]
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Envelopes accepted for the open game.
    #[must_use]
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Envelopes dropped because they were for another game.
    #[must_use]
    pub fn ignored(&self) -> u64 {
        self.ignored
    }

    /// Send `envelope` to `peer`.
    ///
    /// # Errors
    ///
    /// - `ChannelError::NoPeerConnected` if `peer` is `None`
    /// - `ChannelError::TransportSendFailed` if the sink refuses the frame
    pub fn send<S: FrameSink + ?Sized>(
        &mut self,
        peer: Option<&PeerIdentity>,
        envelope: MoveEnvelope,
        sink: &mut S,
    ) -> Result<(), ChannelError> {
        let Some(peer) = peer else {
            tracing::warn!(kind = ?envelope.game_kind, "move not sent: no peer connected");
            return Err(ChannelError::NoPeerConnected);
        };

        let frame = Payload::Move(envelope)
            .into_frame()
            .map_err(|e| ChannelError::Encode(e.to_string()))?;

        sink.transmit(peer.id(), frame).map_err(|e| {
            tracing::warn!(peer = %peer.id(), error = %e, "move not sent");
            ChannelError::TransportSendFailed(e.0)
        })?;

        self.sent += 1;
        Ok(())
    }

    /// Classify an inbound frame against the open game.
    pub fn receive(&mut self, frame: &Frame, active: Option<GameKind>) -> Inbound {
        match Payload::from_frame(frame) {
            Ok(Payload::Move(envelope)) => {
                if Some(envelope.game_kind) == active {
                    self.received += 1;
                    Inbound::Move(envelope)
                } else {
                    self.ignored += 1;
                    tracing::debug!(
                        kind = ?envelope.game_kind,
                        ?active,
                        "ignoring move for a game that is not open"
                    );
                    Inbound::Ignored(envelope.game_kind)
                }
            },
            Ok(other) => Inbound::Control(other),
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable frame");
                Inbound::Malformed(SessionError::DecodeFailed(e.to_string()))
            },
        }
    }
}

/// A [`MoveChannel`] bound to the current peer and sink.
pub struct ChannelLink<'a, S: ?Sized> {
    channel: &'a mut MoveChannel,
    peer: Option<&'a PeerIdentity>,
    sink: &'a mut S,
}

impl<'a, S: FrameSink + ?Sized> ChannelLink<'a, S> {
    /// Bind `channel` to `peer` (if connected) and `sink`.
    pub fn new(
        channel: &'a mut MoveChannel,
        peer: Option<&'a PeerIdentity>,
        sink: &'a mut S,
    ) -> Self {
        Self { channel, peer, sink }
    }
}

impl<S: FrameSink + ?Sized> MoveSender for ChannelLink<'_, S> {
    fn send_envelope(&mut self, envelope: MoveEnvelope) -> Result<(), ChannelError> {
        self.channel.send(self.peer, envelope, &mut *self.sink)
    }
}

#[cfg(test)]
mod tests {
    use pairplay_proto::payloads::{
        moves::{GridChessMove, LineConnectMove, Player},
        session::Goodbye,
    };

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        frames: Vec<(PeerId, Frame)>,
        fail: bool,
    }

    impl FrameSink for RecordingSink {
        fn transmit(&mut self, peer: PeerId, frame: Frame) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError("link closed".into()));
            }
            self.frames.push((peer, frame));
            Ok(())
        }
    }

    fn stone() -> MoveEnvelope {
        MoveEnvelope::wrap(&LineConnectMove { row: 3, col: 4, player: Player::First })
            .expect("wrap")
    }

    #[test]
    fn send_without_peer_fails() {
        let mut channel = MoveChannel::new();
        let mut sink = RecordingSink::default();

        assert_eq!(channel.send(None, stone(), &mut sink), Err(ChannelError::NoPeerConnected));
        assert!(sink.frames.is_empty());
        assert_eq!(channel.sent(), 0);
    }

    #[test]
    fn send_reaches_connected_peer() {
        let mut channel = MoveChannel::new();
        let mut sink = RecordingSink::default();
        let peer = PeerIdentity::new(PeerId(5), "other");

        channel.send(Some(&peer), stone(), &mut sink).expect("send");
        assert_eq!(sink.frames.len(), 1);
        assert_eq!(sink.frames[0].0, PeerId(5));
        assert_eq!(channel.sent(), 1);

        let inbound = channel.receive(&sink.frames[0].1, Some(GameKind::LineConnect));
        assert_eq!(inbound, Inbound::Move(stone()));
    }

    #[test]
    fn transport_failure_surfaces() {
        let mut channel = MoveChannel::new();
        let mut sink = RecordingSink { fail: true, ..RecordingSink::default() };
        let peer = PeerIdentity::new(PeerId(5), "other");

        assert!(matches!(
            channel.send(Some(&peer), stone(), &mut sink),
            Err(ChannelError::TransportSendFailed(_))
        ));
    }

    #[test]
    fn mismatched_game_kind_ignored() {
        let mut channel = MoveChannel::new();
        let envelope =
            MoveEnvelope::wrap(&GridChessMove { from_row: 9, from_col: 0, to_row: 8, to_col: 0 })
                .expect("wrap");
        let frame = Payload::Move(envelope).into_frame().expect("frame");

        assert_eq!(
            channel.receive(&frame, Some(GameKind::LineConnect)),
            Inbound::Ignored(GameKind::GridChess)
        );
        assert_eq!(channel.receive(&frame, None), Inbound::Ignored(GameKind::GridChess));
        assert_eq!(channel.ignored(), 2);
        assert_eq!(channel.received(), 0);
    }

    #[test]
    fn garbage_is_malformed_not_fatal() {
        let mut channel = MoveChannel::new();
        let frame = Frame::new(
            pairplay_proto::FrameHeader::new(pairplay_proto::Opcode::Move),
            vec![0xFF, 0x00, 0x13],
        );
        assert!(matches!(
            channel.receive(&frame, Some(GameKind::LineConnect)),
            Inbound::Malformed(SessionError::DecodeFailed(_))
        ));
    }

    #[test]
    fn control_payloads_pass_through() {
        let mut channel = MoveChannel::new();
        let goodbye = Payload::Goodbye(Goodbye { reason: "done".into() });
        let frame = goodbye.clone().into_frame().expect("frame");
        assert_eq!(channel.receive(&frame, None), Inbound::Control(goodbye));
    }
}
