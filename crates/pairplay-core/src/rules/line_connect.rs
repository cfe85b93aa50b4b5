//! Line-connect: five in a row on a 15×15 grid.

use pairplay_proto::payloads::moves::{LineConnectMove, Player};

use super::RuleEngine;

/// Rows and columns on the board.
pub const BOARD_SIZE: usize = 15;

/// Stones in a line needed to win.
pub const WIN_LENGTH: usize = 5;

/// The four axes through a cell: horizontal, vertical and both diagonals.
const AXES: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// Line-connect board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineBoard {
    cells: [[Option<Player>; BOARD_SIZE]; BOARD_SIZE],
    to_move: Player,
    winner: Option<Player>,
    stones: u16,
}

impl LineBoard {
    /// Stone at `(row, col)`. `None` when empty or off the board.
    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> Option<Player> {
        self.cells.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    /// Side whose stone goes down next.
    #[must_use]
    pub fn to_move(&self) -> Player {
        self.to_move
    }

    /// Winner, once five are connected.
    #[must_use]
    pub fn winner(&self) -> Option<Player> {
        self.winner
    }

    /// Stones placed so far.
    #[must_use]
    pub fn stones(&self) -> u16 {
        self.stones
    }

    fn stone_at(&self, row: isize, col: isize) -> Option<Player> {
        let row = usize::try_from(row).ok()?;
        let col = usize::try_from(col).ok()?;
        self.cell(row, col)
    }

    /// Length of the run of `player`'s stones through `(row, col)` along
    /// `(dr, dc)`, counting both directions and the cell itself.
    fn run_length(
        &self,
        row: usize,
        col: usize,
        player: Player,
        (dr, dc): (isize, isize),
    ) -> usize {
        let count = |sign: isize| {
            (1..WIN_LENGTH as isize)
                .take_while(|step| {
                    self.stone_at(row as isize + sign * step * dr, col as isize + sign * step * dc)
                        == Some(player)
                })
                .count()
        };
        1 + count(1) + count(-1)
    }
}

/// Rule engine for line-connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineConnect;

impl RuleEngine for LineConnect {
    type Move = LineConnectMove;
    type State = LineBoard;

    fn initial_state() -> LineBoard {
        LineBoard {
            cells: [[None; BOARD_SIZE]; BOARD_SIZE],
            to_move: Player::First,
            winner: None,
            stones: 0,
        }
    }

    fn in_bounds(mv: &LineConnectMove) -> bool {
        usize::from(mv.row) < BOARD_SIZE && usize::from(mv.col) < BOARD_SIZE
    }

    fn is_legal(state: &LineBoard, mv: &LineConnectMove) -> bool {
        Self::in_bounds(mv) && state.cell(mv.row.into(), mv.col.into()).is_none()
    }

    fn apply_and_check_win(state: &LineBoard, mv: &LineConnectMove) -> (LineBoard, Option<Player>) {
        let (row, col) = (usize::from(mv.row), usize::from(mv.col));
        let mut next = state.clone();

        if let Some(cell) = next.cells.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = Some(mv.player);
            next.stones += 1;
        }
        next.to_move = mv.player.opponent();

        let won = AXES.iter().any(|axis| next.run_length(row, col, mv.player, *axis) >= WIN_LENGTH);
        if won && next.winner.is_none() {
            next.winner = Some(mv.player);
        }

        let winner = next.winner;
        (next, winner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stone(row: u8, col: u8, player: Player) -> LineConnectMove {
        LineConnectMove { row, col, player }
    }

    fn play(moves: &[LineConnectMove]) -> (LineBoard, Option<Player>) {
        let mut state = LineConnect::initial_state();
        let mut winner = None;
        for mv in moves {
            (state, winner) = LineConnect::apply_and_check_win(&state, mv);
        }
        (state, winner)
    }

    #[test]
    fn occupied_cell_is_illegal() {
        let (state, _) = play(&[stone(7, 7, Player::First)]);
        assert!(!LineConnect::is_legal(&state, &stone(7, 7, Player::Second)));
        assert!(LineConnect::is_legal(&state, &stone(7, 8, Player::Second)));
    }

    #[test]
    fn off_board_is_illegal() {
        let state = LineConnect::initial_state();
        assert!(!LineConnect::is_legal(&state, &stone(15, 0, Player::First)));
        assert!(!LineConnect::is_legal(&state, &stone(0, 15, Player::First)));
    }

    #[test]
    fn four_in_a_row_does_not_win() {
        let moves: Vec<_> = (0..4).map(|c| stone(0, c, Player::First)).collect();
        assert_eq!(play(&moves).1, None);
    }

    #[test]
    fn diagonal_five_wins() {
        let moves: Vec<_> = (0..5).map(|i| stone(i, i, Player::First)).collect();
        let (state, winner) = play(&moves);
        assert_eq!(winner, Some(Player::First));
        assert_eq!(state.winner(), Some(Player::First));
    }

    #[test]
    fn anti_diagonal_five_wins() {
        let moves: Vec<_> = (0..5).map(|i| stone(4 + i, 10 - i, Player::Second)).collect();
        assert_eq!(play(&moves).1, Some(Player::Second));
    }

    #[test]
    fn filling_a_gap_counts_both_directions() {
        let mut moves: Vec<_> =
            [0u8, 1, 3, 4].iter().map(|c| stone(9, *c, Player::First)).collect();
        assert_eq!(play(&moves).1, None);
        moves.push(stone(9, 2, Player::First));
        assert_eq!(play(&moves).1, Some(Player::First));
    }

    #[test]
    fn six_in_a_row_also_wins() {
        let mut moves: Vec<_> = (0..3).map(|c| stone(2, c, Player::Second)).collect();
        moves.extend((4..7).map(|c| stone(2, c, Player::Second)));
        moves.push(stone(2, 3, Player::Second));
        assert_eq!(play(&moves).1, Some(Player::Second));
    }

    #[test]
    fn mixed_colors_break_the_line() {
        let moves = [
            stone(5, 0, Player::First),
            stone(5, 1, Player::First),
            stone(5, 2, Player::Second),
            stone(5, 3, Player::First),
            stone(5, 4, Player::First),
            stone(5, 5, Player::First),
        ];
        assert_eq!(play(&moves).1, None);
    }

    #[test]
    fn apply_flips_side_to_move() {
        let (state, _) = play(&[stone(0, 0, Player::First)]);
        assert_eq!(state.to_move(), Player::Second);
        assert_eq!(state.stones(), 1);
    }
}
