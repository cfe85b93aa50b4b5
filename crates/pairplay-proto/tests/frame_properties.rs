//! Property-based tests for frame and payload decoding
//!
//! Generates arbitrary payloads and arbitrary garbage and checks that the
//! decoders either reproduce the input or fail cleanly.

use pairplay_proto::{
    Frame, FrameHeader, Payload, SERVICE_TYPE,
    payloads::{
        discovery::Beacon,
        moves::{GridChessMove, LineConnectMove, MoveEnvelope, Player},
        session::{Goodbye, Invite, InviteReply},
    },
};
use proptest::prelude::*;

fn arbitrary_player() -> impl Strategy<Value = Player> {
    prop_oneof![Just(Player::First), Just(Player::Second)]
}

fn arbitrary_envelope() -> impl Strategy<Value = MoveEnvelope> {
    prop_oneof![
        (0u8..15, 0u8..15, arbitrary_player()).prop_map(|(row, col, player)| {
            MoveEnvelope::wrap(&LineConnectMove { row, col, player }).expect("wrap")
        }),
        (0u8..10, 0u8..9, 0u8..10, 0u8..9).prop_map(|(from_row, from_col, to_row, to_col)| {
            MoveEnvelope::wrap(&GridChessMove { from_row, from_col, to_row, to_col })
                .expect("wrap")
        }),
    ]
}

fn arbitrary_payload() -> impl Strategy<Value = Payload> {
    prop_oneof![
        (any::<u64>(), ".{0,32}").prop_map(|(peer_id, display_name)| {
            Payload::Invite(Invite { peer_id, display_name })
        }),
        any::<bool>().prop_map(|accepted| Payload::InviteReply(InviteReply { accepted })),
        ".{0,64}".prop_map(|reason| Payload::Goodbye(Goodbye { reason })),
        arbitrary_envelope().prop_map(Payload::Move),
        (any::<u64>(), ".{0,32}", any::<u16>(), any::<bool>()).prop_map(
            |(peer_id, display_name, port, leaving)| {
                Payload::Beacon(Beacon {
                    service: SERVICE_TYPE.to_string(),
                    peer_id,
                    display_name,
                    port,
                    leaving,
                })
            }
        ),
    ]
}

proptest! {
    #[test]
    fn prop_payload_survives_the_wire(payload in arbitrary_payload()) {
        let frame = payload.clone().into_frame().expect("into_frame");
        let wire = frame.to_vec().expect("encode");

        prop_assert_eq!(wire.len(), FrameHeader::SIZE + frame.payload.len());

        let decoded = Payload::from_datagram(&wire).expect("decode");
        prop_assert_eq!(decoded, payload);
    }

    #[test]
    fn prop_garbage_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = Frame::decode(&bytes);
        let _ = Payload::from_datagram(&bytes);
    }

    #[test]
    fn prop_valid_header_with_garbage_payload_fails_cleanly(
        garbage in prop::collection::vec(any::<u8>(), 0..128)
    ) {
        let frame = Frame::new(FrameHeader::new(pairplay_proto::Opcode::Move), garbage);
        let wire = frame.to_vec().expect("encode");
        // Either a structurally valid envelope or a decode error; never a panic.
        match Payload::from_datagram(&wire) {
            Ok(Payload::Move(_)) | Err(_) => {},
            Ok(other) => prop_assert!(false, "unexpected payload {other:?}"),
        }
    }

    #[test]
    fn prop_truncation_detected(payload in arbitrary_payload(), cut in 1usize..8) {
        let wire = payload.into_frame().and_then(|f| f.to_vec()).expect("encode");
        let cut = cut.min(wire.len() - FrameHeader::SIZE);
        prop_assume!(cut > 0);
        prop_assert!(Frame::decode(&wire[..wire.len() - cut]).is_err());
    }
}
