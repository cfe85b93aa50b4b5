//! Turn coordination.
//!
//! One coordinator per open game. It owns the board, knows which seat this
//! process plays, and decides whether a local move may be submitted. Remote
//! moves are trusted: they are applied without re-checking legality, and the
//! only check is that their coordinates fit the board.

use pairplay_proto::payloads::moves::{GameMove, MoveEnvelope, Player};

use crate::{
    channel::MoveSender,
    error::{ChannelError, MoveRejected},
    peer::Role,
    rules::RuleEngine,
};

/// Result of an accepted local move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMove {
    /// Winner after the move, if the game ended
    pub winner: Option<Player>,
    /// Outcome of sending the move to the opponent. A failure here does not
    /// undo the move.
    pub delivery: Result<(), ChannelError>,
}

/// Turn state for one game.
///
/// # Invariants
///
/// - `is_my_turn` is true at game start iff this process plays
///   [`Player::First`] (the host).
/// - Each accepted local move sets `is_my_turn` to false; each applied remote
///   move sets it to true.
/// - Once a winner exists no further local move is accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnCoordinator<G: RuleEngine> {
    state: G::State,
    seat: Player,
    is_my_turn: bool,
    winner: Option<Player>,
    moves_played: u32,
}

impl<G: RuleEngine> TurnCoordinator<G> {
    /// Start a game. Without a remembered role this process plays as guest.
    pub fn new(role: Option<Role>) -> Self {
        let seat = role.map_or(Player::Second, Role::player);
        Self {
            state: G::initial_state(),
            seat,
            is_my_turn: seat == Player::First,
            winner: None,
            moves_played: 0,
        }
    }

    /// Current board.
    #[must_use]
    pub fn state(&self) -> &G::State {
        &self.state
    }

    /// Seat this process plays.
    #[must_use]
    pub fn seat(&self) -> Player {
        self.seat
    }

    /// Whether a local move may be submitted now.
    #[must_use]
    pub fn is_my_turn(&self) -> bool {
        self.is_my_turn
    }

    /// Winner, if the game has ended.
    #[must_use]
    pub fn winner(&self) -> Option<Player> {
        self.winner
    }

    /// Moves applied so far, local and remote.
    #[must_use]
    pub fn moves_played(&self) -> u32 {
        self.moves_played
    }

    /// Validate, apply and send a local move.
    ///
    /// On acceptance the move is applied and the turn passes before the send
    /// is attempted; the send result is reported in [`LocalMove::delivery`]
    /// and never rolls the move back.
    ///
    /// # Errors
    ///
    /// - `MoveRejected::GameOver` if the game has a winner
    /// - `MoveRejected::NotYourTurn` if the opponent is to move
    /// - `MoveRejected::OutOfBounds` / `MoveRejected::Illegal` if the rule
    ///   engine refuses the move
    pub fn submit_local_move<S: MoveSender + ?Sized>(
        &mut self,
        mv: G::Move,
        sender: &mut S,
    ) -> Result<LocalMove, MoveRejected> {
        if self.winner.is_some() {
            return Err(MoveRejected::GameOver);
        }
        if !self.is_my_turn {
            return Err(MoveRejected::NotYourTurn);
        }
        if !G::in_bounds(&mv) {
            return Err(MoveRejected::OutOfBounds);
        }
        if !G::is_legal(&self.state, &mv) {
            return Err(MoveRejected::Illegal);
        }

        self.apply(&mv);
        self.is_my_turn = false;

        let delivery = MoveEnvelope::wrap(&mv)
            .map_err(|e| ChannelError::Encode(e.to_string()))
            .and_then(|envelope| sender.send_envelope(envelope));
        if let Err(e) = &delivery {
            let kind = <G::Move as GameMove>::KIND;
            tracing::warn!(?kind, error = %e, "local move applied but not delivered");
        }

        Ok(LocalMove { winner: self.winner, delivery })
    }

    /// Apply a move received from the opponent.
    ///
    /// # Errors
    ///
    /// - `MoveRejected::OutOfBounds` if coordinates do not fit the board; the
    ///   move is dropped
    pub fn apply_remote_move(&mut self, mv: G::Move) -> Result<Option<Player>, MoveRejected> {
        if !G::in_bounds(&mv) {
            tracing::warn!(?mv, "dropping off-board remote move");
            return Err(MoveRejected::OutOfBounds);
        }

        self.apply(&mv);
        self.is_my_turn = true;
        Ok(self.winner)
    }

    /// Reset the board for a new game with the same seats.
    pub fn restart(&mut self) {
        self.state = G::initial_state();
        self.winner = None;
        self.is_my_turn = self.seat == Player::First;
        self.moves_played = 0;
    }

    fn apply(&mut self, mv: &G::Move) {
        let (state, winner) = G::apply_and_check_win(&self.state, mv);
        self.state = state;
        if self.winner.is_none() {
            self.winner = winner;
        }
        self.moves_played += 1;
        if let Some(winner) = self.winner {
            tracing::info!(?winner, moves = self.moves_played, "game over");
        }
    }
}
