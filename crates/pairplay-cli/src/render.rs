//! Plain-text rendering of status snapshots and boards.

use std::fmt::Write as _;

use pairplay_app::StatusSnapshot;
use pairplay_core::{
    ActiveGame, Role,
    rules::{
        grid_chess::{self, ChessBoard, PieceKind},
        line_connect::{self, LineBoard},
    },
};
use pairplay_proto::payloads::moves::Player;

/// Column labels, one character per column.
const COLUMN_LABELS: &str = "0123456789abcde";

/// Multi-line summary of a snapshot.
pub fn status(snapshot: &StatusSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", snapshot.local, snapshot.local.id());
    let _ = writeln!(out, "status: {}", snapshot.status);
    let role = match snapshot.role {
        Some(Role::Host) => "host",
        Some(Role::Guest) => "guest",
        None => "none",
    };
    let _ = writeln!(out, "role:   {role}");

    if let Some(peer) = &snapshot.peer {
        let _ = writeln!(out, "peer:   {peer}");
    }
    if let Some(offer) = &snapshot.pending_invitation {
        let _ = writeln!(out, "request from {offer}: accept or decline");
    }
    if snapshot.browsing {
        if snapshot.discovered.is_empty() {
            let _ = writeln!(out, "no rooms yet");
        }
        for (index, room) in snapshot.discovered.iter().enumerate() {
            let _ = writeln!(out, "  [{}] {} at {}", index + 1, room.identity, room.addr);
        }
    }
    if let Some(error) = &snapshot.last_error {
        let _ = writeln!(out, "error:  {error}");
    }
    out
}

/// The board of `game`, with whose turn it is underneath.
pub fn board(game: &ActiveGame) -> String {
    let mut out = match game {
        ActiveGame::LineConnect(game) => line_board(game.state()),
        ActiveGame::GridChess(game) => chess_board(game.state()),
    };

    let footer = match game.winner() {
        Some(winner) if winner == game.seat() => "you win".to_string(),
        Some(_) => "you lose".to_string(),
        None if game.is_my_turn() => format!("your move ({})", side_name(game.seat())),
        None => "waiting for the opponent".to_string(),
    };
    out.push_str(&footer);
    out.push('\n');
    out
}

fn side_name(side: Player) -> &'static str {
    match side {
        Player::First => "first",
        Player::Second => "second",
    }
}

fn header(columns: usize) -> String {
    let labels: String = COLUMN_LABELS.chars().take(columns).flat_map(|c| [' ', c]).collect();
    format!("  {labels}\n")
}

fn line_board(board: &LineBoard) -> String {
    let mut out = header(line_connect::BOARD_SIZE);
    for row in 0..line_connect::BOARD_SIZE {
        let _ = write!(out, "{row:>2}");
        for col in 0..line_connect::BOARD_SIZE {
            let cell = match board.cell(row, col) {
                Some(Player::First) => 'X',
                Some(Player::Second) => 'O',
                None => '.',
            };
            let _ = write!(out, " {cell}");
        }
        out.push('\n');
    }
    out
}

fn piece_letter(kind: PieceKind) -> char {
    match kind {
        PieceKind::General => 'g',
        PieceKind::Advisor => 'a',
        PieceKind::Elephant => 'e',
        PieceKind::Horse => 'h',
        PieceKind::Chariot => 'r',
        PieceKind::Cannon => 'c',
        PieceKind::Soldier => 's',
    }
}

fn chess_board(board: &ChessBoard) -> String {
    let mut out = header(grid_chess::COLS);
    for row in 0..grid_chess::ROWS {
        let _ = write!(out, "{row:>2}");
        for col in 0..grid_chess::COLS {
            // First player's pieces in upper case
            let cell = board.piece_at(row, col).map_or('.', |piece| {
                let letter = piece_letter(piece.kind);
                match piece.side {
                    Player::First => letter.to_ascii_uppercase(),
                    Player::Second => letter,
                }
            });
            let _ = write!(out, " {cell}");
        }
        out.push('\n');
        if row == 4 {
            out.push_str("  ~~~~~~~~~~~~~~~~~~\n");
        }
    }
    out
}
