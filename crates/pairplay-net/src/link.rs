//! Session links over QUIC.
//!
//! One QUIC connection carries one session. The inviting side opens a
//! bidirectional stream and writes an `Invite`; the invited side answers with
//! an `InviteReply` on the same stream. After an accepted reply both sides
//! keep the stream and exchange frames on it until one of them finishes its
//! half.
//!
//! Every task here reports back to the driver through [`Signal`]s tagged with
//! a generation number, so the driver can tell a live attempt from one it
//! already abandoned.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use pairplay_app::DriverEvent;
use pairplay_core::{DiscoveredPeer, DisconnectReason, PeerId, PeerIdentity};
use pairplay_proto::{
    Frame, FrameHeader, Payload,
    payloads::session::{Invite, InviteReply},
};
use quinn::{Connection, Endpoint, ReadExactError, RecvStream, SendStream};
use tokio::sync::{mpsc, oneshot};

use crate::{NetError, transport::SERVER_NAME};

/// How long the invited side waits for the `Invite` after the handshake.
const INVITE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a finished stream waits for the peer to read it before the
/// connection is closed.
const LINGER: Duration = Duration::from_secs(2);

/// Application close code for an orderly close.
const CLOSE_OK: u32 = 0;

/// Reports from link tasks to the driver.
#[derive(Debug)]
pub(crate) enum Signal {
    /// Passed through to the runtime unchanged
    Event(DriverEvent<oneshot::Sender<bool>>),

    /// A remote peer sent an `Invite` and waits for the answer
    Offer {
        peer: PeerIdentity,
        generation: u64,
        responder: oneshot::Sender<bool>,
    },

    /// The handshake finished and the stream is ready for frames
    LinkUp {
        peer: PeerIdentity,
        generation: u64,
        outbound: mpsc::Sender<Frame>,
    },

    /// An attempt ended without a link. `None` means nothing to report.
    AttemptEnded {
        generation: u64,
        reason: Option<DisconnectReason>,
    },

    /// An established link ended
    LinkDown {
        peer: PeerId,
        generation: u64,
        reason: DisconnectReason,
    },
}

pub(crate) type Signals = mpsc::UnboundedSender<Signal>;

/// Read one frame. `Ok(None)` when the peer finished the stream cleanly.
///
/// # Errors
///
/// - `NetError::Stream` if the stream breaks mid-frame
/// - `NetError::Protocol` if the bytes are not a valid frame
pub(crate) async fn read_frame(recv: &mut RecvStream) -> Result<Option<Frame>, NetError> {
    let mut header = [0u8; FrameHeader::SIZE];
    match recv.read_exact(&mut header).await {
        Ok(()) => {},
        Err(ReadExactError::FinishedEarly(0)) => return Ok(None),
        Err(e) => return Err(NetError::Stream(format!("header read failed: {e}"))),
    }

    let payload_size = FrameHeader::from_bytes(&header)?.payload_size() as usize;
    let mut buf = vec![0u8; FrameHeader::SIZE + payload_size];
    buf[..FrameHeader::SIZE].copy_from_slice(&header);
    if payload_size > 0 {
        recv.read_exact(&mut buf[FrameHeader::SIZE..])
            .await
            .map_err(|e| NetError::Stream(format!("payload read failed: {e}")))?;
    }

    Ok(Some(Frame::decode(&buf)?))
}

/// Write one frame.
///
/// # Errors
///
/// - `NetError::Protocol` if the frame cannot be encoded
/// - `NetError::Stream` if the write fails
pub(crate) async fn write_frame(send: &mut SendStream, frame: &Frame) -> Result<(), NetError> {
    let bytes = frame.to_vec()?;
    send.write_all(&bytes).await.map_err(|e| NetError::Stream(format!("write failed: {e}")))
}

async fn read_payload(recv: &mut RecvStream) -> Result<Payload, NetError> {
    let frame = read_frame(recv)
        .await?
        .ok_or_else(|| NetError::Handshake("stream finished during handshake".into()))?;
    Ok(Payload::from_frame(&frame)?)
}

async fn write_payload(send: &mut SendStream, payload: Payload) -> Result<(), NetError> {
    write_frame(send, &payload.into_frame()?).await
}

/// Finish our half and give the peer a moment to read it.
async fn finish_and_linger(send: &mut SendStream) {
    if send.finish().is_err() {
        return;
    }
    if tokio::time::timeout(LINGER, send.stopped()).await.is_err() {
        tracing::debug!("peer did not drain the stream in time");
    }
}

/// Accept connections until the endpoint closes, answering each on its own
/// task.
pub(crate) async fn accept_loop(
    endpoint: Endpoint,
    generations: Arc<AtomicU64>,
    depth: usize,
    signals: Signals,
) {
    while let Some(incoming) = endpoint.accept().await {
        let generation = generations.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(answer_offer(incoming, generation, depth, signals.clone()));
    }
    tracing::debug!("endpoint closed, no longer accepting");
}

async fn receive_invite(
    connection: &Connection,
) -> Result<(SendStream, RecvStream, PeerIdentity), NetError> {
    let (send, mut recv) =
        connection.accept_bi().await.map_err(|e| NetError::Connection(e.to_string()))?;

    let invite = match read_payload(&mut recv).await? {
        Payload::Invite(invite) => invite,
        other => {
            return Err(NetError::Handshake(format!("expected Invite, got {:?}", other.opcode())));
        },
    };
    Ok((send, recv, PeerIdentity::new(PeerId(invite.peer_id), invite.display_name)))
}

/// Invited side: surface the offer, wait for the operator, reply.
async fn answer_offer(incoming: quinn::Incoming, generation: u64, depth: usize, signals: Signals) {
    let connection = match incoming.await {
        Ok(connection) => connection,
        Err(e) => {
            tracing::debug!(error = %e, "inbound handshake failed");
            return;
        },
    };
    let remote = connection.remote_address();

    let (mut send, recv, peer) =
        match tokio::time::timeout(INVITE_TIMEOUT, receive_invite(&connection)).await {
            Ok(Ok(invite)) => invite,
            Ok(Err(e)) => {
                tracing::debug!(%remote, error = %e, "no invite on inbound connection");
                return;
            },
            Err(_) => {
                tracing::debug!(%remote, "inbound connection sent no invite");
                return;
            },
        };
    tracing::info!(%remote, peer = %peer.id(), name = %peer, "inbound offer");

    let (responder, answer) = oneshot::channel();
    if signals.send(Signal::Offer { peer: peer.clone(), generation, responder }).is_err() {
        return;
    }

    let accepted = tokio::select! {
        answer = answer => answer.unwrap_or(false),
        _ = connection.closed() => {
            tracing::debug!(peer = %peer.id(), "offer withdrawn before it was answered");
            let _ = signals.send(Signal::AttemptEnded { generation, reason: None });
            return;
        },
    };

    if let Err(e) = write_payload(&mut send, Payload::InviteReply(InviteReply { accepted })).await {
        tracing::warn!(peer = %peer.id(), error = %e, "failed to answer offer");
        let reason = accepted.then(|| DisconnectReason::Failed(e.to_string()));
        let _ = signals.send(Signal::AttemptEnded { generation, reason });
        return;
    }

    if !accepted {
        finish_and_linger(&mut send).await;
        connection.close(CLOSE_OK.into(), b"declined");
        let _ = signals.send(Signal::AttemptEnded { generation, reason: None });
        return;
    }

    establish(peer, generation, &connection, send, recv, depth, &signals).await;
}

/// Inviting side: connect, send the `Invite`, wait for the reply.
///
/// `Ok(None)` means the peer declined.
async fn open_session(
    endpoint: &Endpoint,
    local: &PeerIdentity,
    target: &DiscoveredPeer,
) -> Result<Option<(Connection, SendStream, RecvStream)>, NetError> {
    let connection = endpoint
        .connect(target.addr, SERVER_NAME)
        .map_err(|e| NetError::Connection(format!("connect failed: {e}")))?
        .await
        .map_err(|e| NetError::Connection(e.to_string()))?;

    let (mut send, mut recv) =
        connection.open_bi().await.map_err(|e| NetError::Connection(e.to_string()))?;

    let invite = Invite { peer_id: local.id().0, display_name: local.display_name().to_string() };
    write_payload(&mut send, Payload::Invite(invite)).await?;

    match read_payload(&mut recv).await? {
        Payload::InviteReply(InviteReply { accepted: true }) => Ok(Some((connection, send, recv))),
        Payload::InviteReply(InviteReply { accepted: false }) => {
            connection.close(CLOSE_OK.into(), b"declined");
            Ok(None)
        },
        other => {
            Err(NetError::Handshake(format!("expected InviteReply, got {:?}", other.opcode())))
        },
    }
}

/// Send an invitation to `target` and, if accepted, run the link.
pub(crate) async fn offer_session(
    endpoint: Endpoint,
    local: PeerIdentity,
    target: DiscoveredPeer,
    generation: u64,
    depth: usize,
    signals: Signals,
) {
    match open_session(&endpoint, &local, &target).await {
        Ok(Some((connection, send, recv))) => {
            establish(target.identity, generation, &connection, send, recv, depth, &signals).await;
        },
        Ok(None) => {
            tracing::info!(peer = %target.identity.id(), "invitation declined");
            let reason = Some(DisconnectReason::Declined);
            let _ = signals.send(Signal::AttemptEnded { generation, reason });
        },
        Err(e) => {
            tracing::warn!(peer = %target.identity.id(), addr = %target.addr, error = %e, "invitation failed");
            let reason = Some(DisconnectReason::Failed(e.to_string()));
            let _ = signals.send(Signal::AttemptEnded { generation, reason });
        },
    }
}

async fn establish(
    peer: PeerIdentity,
    generation: u64,
    connection: &Connection,
    send: SendStream,
    recv: RecvStream,
    depth: usize,
    signals: &Signals,
) {
    let id = peer.id();
    let (outbound, queued) = mpsc::channel(depth);
    if signals.send(Signal::LinkUp { peer, generation, outbound }).is_err() {
        return;
    }
    tracing::info!(peer = %id, remote = %connection.remote_address(), "link up");

    let reason = run_link(id, connection, send, recv, queued, signals).await;
    tracing::info!(peer = %id, ?reason, "link down");
    let _ = signals.send(Signal::LinkDown { peer: id, generation, reason });
}

/// Pump frames both ways until either half ends.
///
/// The link ends locally when every sender for `queued` is gone; queued frames
/// are written first.
async fn run_link(
    peer: PeerId,
    connection: &Connection,
    mut send: SendStream,
    mut recv: RecvStream,
    mut queued: mpsc::Receiver<Frame>,
    signals: &Signals,
) -> DisconnectReason {
    let reading = async {
        loop {
            match read_frame(&mut recv).await {
                Ok(Some(frame)) => {
                    let event = DriverEvent::FrameReceived { peer, frame };
                    if signals.send(Signal::Event(event)).is_err() {
                        return DisconnectReason::Closed;
                    }
                },
                Ok(None) => return DisconnectReason::Closed,
                Err(e) => return DisconnectReason::Failed(e.to_string()),
            }
        }
    };

    let writing = async {
        while let Some(frame) = queued.recv().await {
            if let Err(e) = write_frame(&mut send, &frame).await {
                return DisconnectReason::Failed(e.to_string());
            }
        }
        finish_and_linger(&mut send).await;
        DisconnectReason::Closed
    };

    let reason = tokio::select! {
        reason = reading => reason,
        reason = writing => reason,
    };
    connection.close(CLOSE_OK.into(), b"closed");
    reason
}
