//! Grid chess: a xiangqi-style game on a 10×9 grid.
//!
//! Red ([`Player::First`]) starts on rows 5-9 and moves toward row 0; black
//! ([`Player::Second`]) starts on rows 0-4 and moves toward row 9. The river
//! runs between rows 4 and 5. Capturing the opposing general wins.
//!
//! Movement rules are plain functions looked up by [`PieceKind`], so adding a
//! piece means adding one function and one table entry.

use pairplay_proto::payloads::moves::{GridChessMove, Player};

use super::RuleEngine;

/// Rows on the board.
pub const ROWS: usize = 10;

/// Columns on the board.
pub const COLS: usize = 9;

/// The seven piece kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    /// Confined to the palace, one orthogonal step
    General,
    /// Confined to the palace, one diagonal step
    Advisor,
    /// Two diagonal steps, blockable, never crosses the river
    Elephant,
    /// One orthogonal then one diagonal step, blockable at the leg
    Horse,
    /// Any distance orthogonally
    Chariot,
    /// Moves like a chariot, captures by jumping exactly one piece
    Cannon,
    /// Forward only until across the river, then also sideways
    Soldier,
}

impl PieceKind {
    const fn index(self) -> usize {
        match self {
            Self::General => 0,
            Self::Advisor => 1,
            Self::Elephant => 2,
            Self::Horse => 3,
            Self::Chariot => 4,
            Self::Cannon => 5,
            Self::Soldier => 6,
        }
    }
}

/// A piece and its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    /// Owner
    pub side: Player,
    /// Kind
    pub kind: PieceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Square {
    row: isize,
    col: isize,
}

impl Square {
    fn new(row: u8, col: u8) -> Self {
        Self { row: isize::from(row), col: isize::from(col) }
    }

    fn offset(self, dr: isize, dc: isize) -> Self {
        Self { row: self.row + dr, col: self.col + dc }
    }
}

/// Grid-chess board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChessBoard {
    cells: [[Option<Piece>; COLS]; ROWS],
    to_move: Player,
    winner: Option<Player>,
}

const BACK_RANK: [PieceKind; COLS] = [
    PieceKind::Chariot,
    PieceKind::Horse,
    PieceKind::Elephant,
    PieceKind::Advisor,
    PieceKind::General,
    PieceKind::Advisor,
    PieceKind::Elephant,
    PieceKind::Horse,
    PieceKind::Chariot,
];

impl ChessBoard {
    /// Board with no pieces, red to move. Useful for setting up positions.
    #[must_use]
    pub fn empty() -> Self {
        Self { cells: [[None; COLS]; ROWS], to_move: Player::First, winner: None }
    }

    /// Standard starting position.
    #[must_use]
    pub fn standard() -> Self {
        let mut board = Self::empty();
        for (side, back, cannons, soldiers) in [(Player::Second, 0, 2, 3), (Player::First, 9, 7, 6)]
        {
            for (col, kind) in BACK_RANK.iter().enumerate() {
                board.cells[back][col] = Some(Piece { side, kind: *kind });
            }
            for col in [1, 7] {
                board.cells[cannons][col] = Some(Piece { side, kind: PieceKind::Cannon });
            }
            for col in [0, 2, 4, 6, 8] {
                board.cells[soldiers][col] = Some(Piece { side, kind: PieceKind::Soldier });
            }
        }
        board
    }

    /// Piece at `(row, col)`. `None` when empty or off the board.
    #[must_use]
    pub fn piece_at(&self, row: usize, col: usize) -> Option<Piece> {
        self.cells.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    /// Put `piece` on `(row, col)`, replacing whatever was there. Off-board
    /// coordinates are ignored.
    pub fn place(&mut self, row: usize, col: usize, piece: Option<Piece>) {
        if let Some(cell) = self.cells.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = piece;
        }
    }

    /// Side to move.
    #[must_use]
    pub fn to_move(&self) -> Player {
        self.to_move
    }

    /// Override the side to move when setting up a position.
    pub fn set_to_move(&mut self, side: Player) {
        self.to_move = side;
    }

    /// Winner, once a general has been captured.
    #[must_use]
    pub fn winner(&self) -> Option<Player> {
        self.winner
    }

    fn at(&self, square: Square) -> Option<Piece> {
        let row = usize::try_from(square.row).ok()?;
        let col = usize::try_from(square.col).ok()?;
        self.piece_at(row, col)
    }

    fn is_empty(&self, square: Square) -> bool {
        self.at(square).is_none()
    }

    /// Pieces strictly between two squares on the same row or column.
    fn pieces_between(&self, from: Square, to: Square) -> usize {
        let (dr, dc) = ((to.row - from.row).signum(), (to.col - from.col).signum());
        let steps = (to.row - from.row).abs().max((to.col - from.col).abs());
        (1..steps).filter(|step| !self.is_empty(from.offset(dr * step, dc * step))).count()
    }
}

fn on_board(square: Square) -> bool {
    (0..ROWS as isize).contains(&square.row) && (0..COLS as isize).contains(&square.col)
}

fn in_palace(side: Player, square: Square) -> bool {
    let rows = match side {
        Player::First => 7..=9,
        Player::Second => 0..=2,
    };
    rows.contains(&square.row) && (3..=5).contains(&square.col)
}

fn on_own_half(side: Player, square: Square) -> bool {
    match side {
        Player::First => square.row >= 5,
        Player::Second => square.row <= 4,
    }
}

fn forward(side: Player) -> isize {
    match side {
        Player::First => -1,
        Player::Second => 1,
    }
}

type MoveRule = fn(&ChessBoard, Player, Square, Square) -> bool;

const MOVE_RULES: [MoveRule; 7] = [
    general_move,
    advisor_move,
    elephant_move,
    horse_move,
    chariot_move,
    cannon_move,
    soldier_move,
];

fn general_move(_: &ChessBoard, side: Player, from: Square, to: Square) -> bool {
    in_palace(side, to) && (to.row - from.row).abs() + (to.col - from.col).abs() == 1
}

fn advisor_move(_: &ChessBoard, side: Player, from: Square, to: Square) -> bool {
    in_palace(side, to) && (to.row - from.row).abs() == 1 && (to.col - from.col).abs() == 1
}

fn elephant_move(board: &ChessBoard, side: Player, from: Square, to: Square) -> bool {
    let (dr, dc) = (to.row - from.row, to.col - from.col);
    dr.abs() == 2
        && dc.abs() == 2
        && board.is_empty(from.offset(dr / 2, dc / 2))
        && on_own_half(side, to)
}

fn horse_move(board: &ChessBoard, _: Player, from: Square, to: Square) -> bool {
    let (dr, dc) = (to.row - from.row, to.col - from.col);
    let leg = match (dr.abs(), dc.abs()) {
        (2, 1) => from.offset(dr / 2, 0),
        (1, 2) => from.offset(0, dc / 2),
        _ => return false,
    };
    board.is_empty(leg)
}

fn chariot_move(board: &ChessBoard, _: Player, from: Square, to: Square) -> bool {
    (from.row == to.row) != (from.col == to.col) && board.pieces_between(from, to) == 0
}

fn cannon_move(board: &ChessBoard, _: Player, from: Square, to: Square) -> bool {
    if (from.row == to.row) == (from.col == to.col) {
        return false;
    }
    let screens = board.pieces_between(from, to);
    if board.is_empty(to) { screens == 0 } else { screens == 1 }
}

fn soldier_move(_: &ChessBoard, side: Player, from: Square, to: Square) -> bool {
    let (dr, dc) = (to.row - from.row, to.col - from.col);
    let crossed = !on_own_half(side, from);
    (dr == forward(side) && dc == 0) || (crossed && dr == 0 && dc.abs() == 1)
}

/// Rule engine for grid chess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridChess;

impl RuleEngine for GridChess {
    type Move = GridChessMove;
    type State = ChessBoard;

    fn initial_state() -> ChessBoard {
        ChessBoard::standard()
    }

    fn in_bounds(mv: &GridChessMove) -> bool {
        on_board(Square::new(mv.from_row, mv.from_col))
            && on_board(Square::new(mv.to_row, mv.to_col))
    }

    /// Legal iff the source holds a piece of the side to move, the
    /// destination does not hold one of its own pieces, and the piece's
    /// movement rule allows it.
    fn is_legal(state: &ChessBoard, mv: &GridChessMove) -> bool {
        if !Self::in_bounds(mv) {
            return false;
        }
        let (from, to) = (Square::new(mv.from_row, mv.from_col), Square::new(mv.to_row, mv.to_col));

        let Some(piece) = state.at(from) else {
            return false;
        };
        if piece.side != state.to_move {
            return false;
        }
        if state.at(to).is_some_and(|target| target.side == piece.side) {
            return false;
        }

        MOVE_RULES[piece.kind.index()](state, piece.side, from, to)
    }

    fn apply_and_check_win(state: &ChessBoard, mv: &GridChessMove) -> (ChessBoard, Option<Player>) {
        let (from, to) = (Square::new(mv.from_row, mv.from_col), Square::new(mv.to_row, mv.to_col));
        let mut next = state.clone();

        let moving = next.at(from);
        let captured = next.at(to);
        let mover = moving.map_or(state.to_move, |piece| piece.side);

        if moving.is_some() {
            next.place(usize::from(mv.to_row), usize::from(mv.to_col), moving);
            next.place(usize::from(mv.from_row), usize::from(mv.from_col), None);
        }
        next.to_move = mover.opponent();

        if let Some(target) = captured
            && moving.is_some()
            && target.kind == PieceKind::General
            && target.side != mover
            && next.winner.is_none()
        {
            next.winner = Some(mover);
        }

        let winner = next.winner;
        (next, winner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(from_row: u8, from_col: u8, to_row: u8, to_col: u8) -> GridChessMove {
        GridChessMove { from_row, from_col, to_row, to_col }
    }

    fn red(kind: PieceKind) -> Option<Piece> {
        Some(Piece { side: Player::First, kind })
    }

    fn black(kind: PieceKind) -> Option<Piece> {
        Some(Piece { side: Player::Second, kind })
    }

    fn board_with(pieces: &[(usize, usize, Option<Piece>)]) -> ChessBoard {
        let mut board = ChessBoard::empty();
        for (row, col, piece) in pieces {
            board.place(*row, *col, *piece);
        }
        board
    }

    #[test]
    fn standard_layout() {
        let board = ChessBoard::standard();
        assert_eq!(board.piece_at(9, 4), red(PieceKind::General));
        assert_eq!(board.piece_at(0, 4), black(PieceKind::General));
        assert_eq!(board.piece_at(7, 1), red(PieceKind::Cannon));
        assert_eq!(board.piece_at(2, 7), black(PieceKind::Cannon));
        assert_eq!(board.piece_at(6, 8), red(PieceKind::Soldier));
        assert_eq!(board.piece_at(3, 0), black(PieceKind::Soldier));
        assert_eq!(board.piece_at(5, 4), None);
        assert_eq!(board.to_move(), Player::First);
    }

    #[test]
    fn chariot_opening_move() {
        let board = ChessBoard::standard();
        assert!(GridChess::is_legal(&board, &mv(9, 0, 7, 0)));
        // Blocked by own soldier at (6, 0).
        assert!(!GridChess::is_legal(&board, &mv(9, 0, 5, 0)));
    }

    #[test]
    fn chariot_must_move_straight() {
        let board = board_with(&[(5, 5, red(PieceKind::Chariot))]);
        assert!(GridChess::is_legal(&board, &mv(5, 5, 5, 0)));
        assert!(!GridChess::is_legal(&board, &mv(5, 5, 4, 4)));
        assert!(!GridChess::is_legal(&board, &mv(5, 5, 5, 5)));
    }

    #[test]
    fn chariot_stops_at_piece_on_its_row() {
        let board = board_with(&[(9, 0, red(PieceKind::Chariot)), (9, 4, red(PieceKind::General))]);
        assert!(GridChess::is_legal(&board, &mv(9, 0, 9, 3)));
        assert!(!GridChess::is_legal(&board, &mv(9, 0, 9, 4)));
        assert!(!GridChess::is_legal(&board, &mv(9, 0, 9, 6)));
    }

    #[test]
    fn cannon_needs_screen_to_capture_only() {
        let board = board_with(&[
            (7, 1, red(PieceKind::Cannon)),
            (5, 1, black(PieceKind::Soldier)),
            (2, 1, black(PieceKind::Horse)),
        ]);
        // Jumping one piece onto an empty square.
        assert!(!GridChess::is_legal(&board, &mv(7, 1, 3, 1)));
        // Capturing over exactly one piece.
        assert!(GridChess::is_legal(&board, &mv(7, 1, 2, 1)));
        // Capturing with no screen.
        assert!(!GridChess::is_legal(&board, &mv(7, 1, 5, 1)));
        // Plain move with clear path.
        assert!(GridChess::is_legal(&board, &mv(7, 1, 6, 1)));
    }

    #[test]
    fn cannon_capture_over_two_is_illegal() {
        let board = board_with(&[
            (7, 1, red(PieceKind::Cannon)),
            (5, 1, black(PieceKind::Soldier)),
            (4, 1, black(PieceKind::Soldier)),
            (2, 1, black(PieceKind::Horse)),
        ]);
        assert!(!GridChess::is_legal(&board, &mv(7, 1, 2, 1)));
    }

    #[test]
    fn horse_leg_can_be_blocked() {
        let board = ChessBoard::standard();
        // Red horse at (9,1): leg (8,1) empty, so (7,2) and (7,0) are reachable.
        assert!(GridChess::is_legal(&board, &mv(9, 1, 7, 2)));
        assert!(GridChess::is_legal(&board, &mv(9, 1, 7, 0)));
        // Sideways hop needs leg (9,2), occupied by the elephant.
        assert!(!GridChess::is_legal(&board, &mv(9, 1, 8, 3)));
    }

    #[test]
    fn elephant_blocked_and_river_bound() {
        let board = board_with(&[(5, 2, red(PieceKind::Elephant))]);
        assert!(GridChess::is_legal(&board, &mv(5, 2, 7, 4)));
        assert!(!GridChess::is_legal(&board, &mv(5, 2, 3, 4)), "may not cross the river");

        let blocked = board_with(&[(5, 2, red(PieceKind::Elephant)), (6, 3, red(PieceKind::Soldier))]);
        assert!(!GridChess::is_legal(&blocked, &mv(5, 2, 7, 4)));
    }

    #[test]
    fn general_and_advisor_stay_in_palace() {
        let board = board_with(&[(9, 4, red(PieceKind::General)), (9, 3, red(PieceKind::Advisor))]);
        assert!(GridChess::is_legal(&board, &mv(9, 4, 8, 4)));
        assert!(!GridChess::is_legal(&board, &mv(9, 4, 8, 5)), "general moves orthogonally");
        assert!(GridChess::is_legal(&board, &mv(9, 3, 8, 4)));

        let edge = board_with(&[(8, 3, red(PieceKind::General))]);
        assert!(!GridChess::is_legal(&edge, &mv(8, 3, 8, 2)));
    }

    #[test]
    fn soldier_before_and_after_river() {
        let board = board_with(&[(6, 4, red(PieceKind::Soldier)), (4, 0, red(PieceKind::Soldier))]);
        assert!(GridChess::is_legal(&board, &mv(6, 4, 5, 4)));
        assert!(!GridChess::is_legal(&board, &mv(6, 4, 6, 5)), "no sideways before crossing");
        assert!(!GridChess::is_legal(&board, &mv(6, 4, 7, 4)), "never backward");

        assert!(GridChess::is_legal(&board, &mv(4, 0, 4, 1)));
        assert!(GridChess::is_legal(&board, &mv(4, 0, 3, 0)));
        assert!(!GridChess::is_legal(&board, &mv(4, 0, 5, 0)));
    }

    #[test]
    fn black_soldier_moves_down() {
        let mut board = board_with(&[(3, 4, black(PieceKind::Soldier))]);
        board.set_to_move(Player::Second);
        assert!(GridChess::is_legal(&board, &mv(3, 4, 4, 4)));
        assert!(!GridChess::is_legal(&board, &mv(3, 4, 2, 4)));
    }

    #[test]
    fn cannot_capture_own_piece_or_move_opponent() {
        let board = ChessBoard::standard();
        assert!(!GridChess::is_legal(&board, &mv(9, 0, 9, 1)));
        assert!(!GridChess::is_legal(&board, &mv(0, 0, 1, 0)), "black piece on red's turn");
        assert!(!GridChess::is_legal(&board, &mv(5, 5, 4, 5)), "empty source");
    }

    #[test]
    fn capturing_the_general_wins() {
        let board = board_with(&[
            (5, 4, red(PieceKind::Chariot)),
            (0, 4, black(PieceKind::General)),
            (9, 4, red(PieceKind::General)),
        ]);
        assert!(GridChess::is_legal(&board, &mv(5, 4, 0, 4)));

        let (next, winner) = GridChess::apply_and_check_win(&board, &mv(5, 4, 0, 4));
        assert_eq!(winner, Some(Player::First));
        assert_eq!(next.piece_at(0, 4), red(PieceKind::Chariot));
        assert_eq!(next.piece_at(5, 4), None);
        assert_eq!(next.to_move(), Player::Second);
    }

    #[test]
    fn ordinary_capture_does_not_win() {
        let board = ChessBoard::standard();
        let (next, winner) = GridChess::apply_and_check_win(&board, &mv(7, 1, 0, 1));
        assert_eq!(winner, None);
        assert_eq!(next.piece_at(0, 1), red(PieceKind::Cannon));
    }
}
