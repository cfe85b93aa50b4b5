//! Move envelope and per-game move records.
//!
//! Moves travel in two layers: an outer [`MoveEnvelope`] tagged with the
//! [`GameKind`], and an inner CBOR record specific to that game. Receivers
//! look at the tag before touching the inner bytes, so a peer showing a
//! different game can drop the envelope without understanding it.
//!
//! The field names (`gameKind`, `payload`, `row`, `col`, `player`,
//! `fromRow`, `fromCol`, `toRow`, `toCol`) are the compatibility contract.

use bytes::Bytes;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::errors::{ProtocolError, Result};

/// Which game a move belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameKind {
    /// Five-in-a-row on a 15×15 grid
    LineConnect,
    /// Xiangqi-style chess on a 10×9 grid
    GridChess,
}

impl std::fmt::Display for GameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LineConnect => f.write_str("line-connect"),
            Self::GridChess => f.write_str("grid-chess"),
        }
    }
}

/// Seat in a two-player game.
///
/// The host always plays [`Player::First`] and moves first. On the wire the
/// seats are the integers 1 and 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Player {
    /// Host seat (line-connect mark 1, red in grid chess)
    First,
    /// Guest seat (line-connect mark 2, black in grid chess)
    Second,
}

impl Player {
    /// The other seat.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

impl From<Player> for u8 {
    fn from(player: Player) -> Self {
        match player {
            Player::First => 1,
            Player::Second => 2,
        }
    }
}

impl TryFrom<u8> for Player {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::First),
            2 => Ok(Self::Second),
            other => Err(format!("invalid player seat {other}")),
        }
    }
}

/// A move record that can ride inside a [`MoveEnvelope`].
pub trait GameMove: Serialize + DeserializeOwned {
    /// Tag written into the envelope.
    const KIND: GameKind;
}

/// Stone placement in line-connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineConnectMove {
    /// 0-indexed row
    pub row: u8,
    /// 0-indexed column
    pub col: u8,
    /// Seat placing the stone
    pub player: Player,
}

impl GameMove for LineConnectMove {
    const KIND: GameKind = GameKind::LineConnect;
}

/// Piece move in grid chess. Captures are implied by the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridChessMove {
    /// Source row
    pub from_row: u8,
    /// Source column
    pub from_col: u8,
    /// Destination row
    pub to_row: u8,
    /// Destination column
    pub to_col: u8,
}

impl GameMove for GridChessMove {
    const KIND: GameKind = GameKind::GridChess;
}

/// Tagged wrapper around a serialized move record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveEnvelope {
    /// Game the inner record belongs to
    pub game_kind: GameKind,
    /// CBOR-encoded move record
    pub payload: Bytes,
}

impl MoveEnvelope {
    /// Serialize `mv` and tag it with its game kind.
    pub fn wrap<M: GameMove>(mv: &M) -> Result<Self> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(mv, &mut buf)
            .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
        Ok(Self { game_kind: M::KIND, payload: Bytes::from(buf) })
    }

    /// Decode the inner record as `M`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::GameKindMismatch` if the envelope is tagged for
    ///   another game
    /// - `ProtocolError::CborDecode` if the inner bytes do not match `M`
    pub fn unwrap_move<M: GameMove>(&self) -> Result<M> {
        if self.game_kind != M::KIND {
            return Err(ProtocolError::GameKindMismatch {
                expected: M::KIND,
                actual: self.game_kind,
            });
        }
        ciborium::de::from_reader(self.payload.as_ref())
            .map_err(|e| ProtocolError::CborDecode(e.to_string()))
    }
}
