//! Console line parsing.
//!
//! Each line is one command. A leading `/` is accepted and ignored so the
//! chat-style habit works too.

use pairplay_app::{Command, StatusSnapshot};
use pairplay_core::PeerId;
use pairplay_proto::payloads::moves::{GameKind, GridChessMove};
use thiserror::Error;

/// Printed for `help`.
pub const HELP: &str = "\
commands:
  host                      advertise a room (you move first)
  join                      look for rooms (you move second)
  stop-host | stop-join     stop advertising / browsing
  connect <n>               invite room <n> from `status`
  accept | decline          answer a connection request
  disconnect                leave the session
  reset                     drop the link and restart discovery
  reset-role                forget host/guest
  open line | open chess    open a game
  close                     close the game
  place <row> <col>         line-connect stone (0-14)
  move <r1> <c1> <r2> <c2>  grid chess move (rows 0-9, cols 0-8)
  restart                   fresh board
  status | board | help | quit";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Forward to the runtime as is
    Run(Command),
    /// Invite the nth room (1-based) from the discovered list
    Connect(usize),
    /// Print the full status
    Status,
    /// Print the open board
    Board,
    /// Print [`HELP`]
    Help,
    /// Leave and exit
    Quit,
}

/// A line that is not a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// First word matched nothing
    #[error("unknown command `{0}`, try `help`")]
    Unknown(String),

    /// Right command, wrong arguments
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parse one line. Blank lines yield `Ok(None)`.
///
/// # Errors
///
/// [`ParseError`] when the line names no command or its arguments don't
/// parse.
pub fn parse(line: &str) -> Result<Option<Input>, ParseError> {
    let line = line.trim();
    let line = line.strip_prefix('/').unwrap_or(line);
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let input = match (command, args.as_slice()) {
        ("host", []) => Input::Run(Command::Host),
        ("join", []) => Input::Run(Command::Join),
        ("stop-host", []) => Input::Run(Command::StopHosting),
        ("stop-join", []) => Input::Run(Command::StopBrowsing),
        ("connect", [index]) => {
            let index = index.parse().map_err(|_| ParseError::Usage("connect <n>"))?;
            if index == 0 {
                return Err(ParseError::Usage("connect <n>"));
            }
            Input::Connect(index)
        },
        ("accept", []) => Input::Run(Command::Accept),
        ("decline", []) => Input::Run(Command::Decline),
        ("disconnect", []) => Input::Run(Command::Disconnect),
        ("reset", []) => Input::Run(Command::ResetConnection),
        ("reset-role", []) => Input::Run(Command::ResetRole),
        ("open", ["line"]) => Input::Run(Command::OpenGame(GameKind::LineConnect)),
        ("open", ["chess"]) => Input::Run(Command::OpenGame(GameKind::GridChess)),
        ("close", []) => Input::Run(Command::CloseGame),
        ("place", [row, col]) => {
            let usage = || ParseError::Usage("place <row> <col>");
            Input::Run(Command::PlaceStone {
                row: row.parse().map_err(|_| usage())?,
                col: col.parse().map_err(|_| usage())?,
            })
        },
        ("move", [from_row, from_col, to_row, to_col]) => {
            let usage = || ParseError::Usage("move <r1> <c1> <r2> <c2>");
            Input::Run(Command::MovePiece(GridChessMove {
                from_row: from_row.parse().map_err(|_| usage())?,
                from_col: from_col.parse().map_err(|_| usage())?,
                to_row: to_row.parse().map_err(|_| usage())?,
                to_col: to_col.parse().map_err(|_| usage())?,
            }))
        },
        ("restart", []) => Input::Run(Command::RestartGame),
        ("status", []) => Input::Status,
        ("board", []) => Input::Board,
        ("help" | "?", _) => Input::Help,
        ("quit" | "q" | "exit", []) => Input::Quit,
        ("connect", _) => return Err(ParseError::Usage("connect <n>")),
        ("open", _) => return Err(ParseError::Usage("open line | open chess")),
        ("place", _) => return Err(ParseError::Usage("place <row> <col>")),
        ("move", _) => return Err(ParseError::Usage("move <r1> <c1> <r2> <c2>")),
        (other, _) => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(input))
}

/// Peer behind the nth (1-based) entry of the discovered list.
pub fn resolve_room(status: &StatusSnapshot, index: usize) -> Option<PeerId> {
    let slot = index.checked_sub(1)?;
    status.discovered.get(slot).map(|room| room.identity.id())
}
