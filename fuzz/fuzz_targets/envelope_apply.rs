//! Fuzz target for inbound move envelopes
//!
//! Moves from the peer are applied without a legality check, so the only
//! line of defence is decoding plus the bounds check. Arbitrary envelopes,
//! applied to a game of either kind, must never panic and never move the
//! board outside its dimensions.

#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use pairplay_core::{ActiveGame, Role};
use pairplay_proto::payloads::moves::{GameKind, MoveEnvelope};

#[derive(Debug, Arbitrary)]
struct Input {
    open_chess: bool,
    host: bool,
    envelopes: Vec<(bool, Vec<u8>)>,
}

fn kind(chess: bool) -> GameKind {
    if chess { GameKind::GridChess } else { GameKind::LineConnect }
}

fuzz_target!(|input: Input| {
    let role = if input.host { Role::Host } else { Role::Guest };
    let mut game = ActiveGame::open(kind(input.open_chess), Some(role));

    for (chess, payload) in input.envelopes {
        let envelope = MoveEnvelope { game_kind: kind(chess), payload: Bytes::from(payload) };
        let before = game.clone();

        if game.handle_envelope(&envelope).is_err() {
            assert_eq!(game, before, "rejected envelope changed the game");
        }
    }
});
