//! The open game view.
//!
//! At most one game is open at a time, chosen after the session connects.
//! [`ActiveGame`] dispatches to the matching turn coordinator and turns
//! inbound envelopes into remote moves.

use pairplay_proto::payloads::moves::{
    GameKind, GridChessMove, LineConnectMove, MoveEnvelope, Player,
};

use crate::{
    channel::MoveSender,
    error::MoveRejected,
    peer::Role,
    rules::{GridChess, LineConnect},
    turn::{LocalMove, TurnCoordinator},
};

/// A move received from the opponent and applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteMove {
    /// Stone placed
    LineConnect(LineConnectMove),
    /// Piece moved
    GridChess(GridChessMove),
}

/// The game currently on screen.
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveGame {
    /// Five in a row
    LineConnect(TurnCoordinator<LineConnect>),
    /// Grid chess
    GridChess(TurnCoordinator<GridChess>),
}

impl ActiveGame {
    /// Open a fresh game. The remembered role picks the seat.
    pub fn open(kind: GameKind, role: Option<Role>) -> Self {
        match kind {
            GameKind::LineConnect => Self::LineConnect(TurnCoordinator::new(role)),
            GameKind::GridChess => Self::GridChess(TurnCoordinator::new(role)),
        }
    }

    /// Which game this is.
    #[must_use]
    pub fn kind(&self) -> GameKind {
        match self {
            Self::LineConnect(_) => GameKind::LineConnect,
            Self::GridChess(_) => GameKind::GridChess,
        }
    }

    /// Seat this process plays.
    #[must_use]
    pub fn seat(&self) -> Player {
        match self {
            Self::LineConnect(game) => game.seat(),
            Self::GridChess(game) => game.seat(),
        }
    }

    /// Whether a local move may be submitted now.
    #[must_use]
    pub fn is_my_turn(&self) -> bool {
        match self {
            Self::LineConnect(game) => game.is_my_turn(),
            Self::GridChess(game) => game.is_my_turn(),
        }
    }

    /// Winner, if the game has ended.
    #[must_use]
    pub fn winner(&self) -> Option<Player> {
        match self {
            Self::LineConnect(game) => game.winner(),
            Self::GridChess(game) => game.winner(),
        }
    }

    /// Place a stone for this process's seat.
    ///
    /// # Errors
    ///
    /// - `MoveRejected::WrongGame` unless line-connect is open
    /// - anything [`TurnCoordinator::submit_local_move`] rejects
    pub fn place_stone<S: MoveSender + ?Sized>(
        &mut self,
        row: u8,
        col: u8,
        sender: &mut S,
    ) -> Result<LocalMove, MoveRejected> {
        match self {
            Self::LineConnect(game) => {
                let mv = LineConnectMove { row, col, player: game.seat() };
                game.submit_local_move(mv, sender)
            },
            Self::GridChess(_) => Err(MoveRejected::WrongGame {
                active: GameKind::GridChess,
                requested: GameKind::LineConnect,
            }),
        }
    }

    /// Move one of this process's pieces.
    ///
    /// # Errors
    ///
    /// - `MoveRejected::WrongGame` unless grid chess is open
    /// - anything [`TurnCoordinator::submit_local_move`] rejects
    pub fn move_piece<S: MoveSender + ?Sized>(
        &mut self,
        mv: GridChessMove,
        sender: &mut S,
    ) -> Result<LocalMove, MoveRejected> {
        match self {
            Self::GridChess(game) => game.submit_local_move(mv, sender),
            Self::LineConnect(_) => Err(MoveRejected::WrongGame {
                active: GameKind::LineConnect,
                requested: GameKind::GridChess,
            }),
        }
    }

    /// Apply an inbound envelope.
    ///
    /// # Errors
    ///
    /// - `MoveRejected::WrongGame` if the envelope is for the other game
    /// - `MoveRejected::Malformed` if the inner record does not decode
    /// - `MoveRejected::OutOfBounds` if the move does not fit the board
    pub fn handle_envelope(&mut self, envelope: &MoveEnvelope) -> Result<RemoteMove, MoveRejected> {
        let active = self.kind();
        if envelope.game_kind != active {
            return Err(MoveRejected::WrongGame { active, requested: envelope.game_kind });
        }

        match self {
            Self::LineConnect(game) => {
                let mv = envelope
                    .unwrap_move::<LineConnectMove>()
                    .map_err(|e| MoveRejected::Malformed(e.to_string()))?;
                game.apply_remote_move(mv)?;
                Ok(RemoteMove::LineConnect(mv))
            },
            Self::GridChess(game) => {
                let mv = envelope
                    .unwrap_move::<GridChessMove>()
                    .map_err(|e| MoveRejected::Malformed(e.to_string()))?;
                game.apply_remote_move(mv)?;
                Ok(RemoteMove::GridChess(mv))
            },
        }
    }

    /// Start over with the same seats.
    pub fn restart(&mut self) {
        match self {
            Self::LineConnect(game) => game.restart(),
            Self::GridChess(game) => game.restart(),
        }
    }
}
