//! Game rule engines.
//!
//! Each engine is a set of pure functions over an immutable board: one to
//! decide legality, one to apply a move and report a winner. Engines know
//! nothing about turns beyond the side-to-move flag stored in their state;
//! who is allowed to submit is the [`crate::TurnCoordinator`]'s business.

pub mod grid_chess;
pub mod line_connect;

use std::fmt::Debug;

use pairplay_proto::payloads::moves::{GameMove, Player};

pub use grid_chess::GridChess;
pub use line_connect::LineConnect;

/// Move legality and win detection for one game.
pub trait RuleEngine {
    /// Move record exchanged on the wire.
    type Move: GameMove + Copy + Debug + PartialEq;

    /// Board plus side to move plus winner.
    type State: Clone + Debug + PartialEq;

    /// Board at the start of a game.
    fn initial_state() -> Self::State;

    /// Whether every coordinate in `mv` lies on the board.
    fn in_bounds(mv: &Self::Move) -> bool;

    /// Whether `mv` is legal on `state`.
    fn is_legal(state: &Self::State, mv: &Self::Move) -> bool;

    /// Apply `mv` and report the winner it produces, if any.
    ///
    /// Does not check legality; inbound moves are applied as received.
    /// Callers must ensure [`RuleEngine::in_bounds`].
    fn apply_and_check_win(state: &Self::State, mv: &Self::Move) -> (Self::State, Option<Player>);
}
