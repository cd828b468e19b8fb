//! Snapshot of a player's match and its compact wire form
//!
//! The wire form is a JSON object with short keys, every one optional:
//!
//! | key | meaning                                   | default     |
//! |-----|-------------------------------------------|-------------|
//! | `t` | sender timestamp (unix ms)                | 0           |
//! | `b` | board, row-major `[run, tag, run, tag..]` | empty board |
//! | `c` | active piece `{t, r, x, y}`               | none        |
//! | `x` | next piece letter                         | none        |
//! | `s` | score                                     | 0           |
//! | `l` | level                                     | 1           |
//! | `n` | cleared lines                             | 0           |
//! | `a` | garbage rows sent with this snapshot      | 0           |
//! | `o` | game over                                 | false       |

use serde::{Deserialize, Serialize};
use zenoh_duel::Snapshot;

use crate::board::{BOARD_HEIGHT, BOARD_WIDTH, Board, Cell};
use crate::engine::MatchState;
use crate::tetromino::{Rotation, TetrominoKind};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unknown piece letter '{0}'")]
    UnknownPiece(String),
}

/// Falling piece as seen by the opponent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceSnapshot {
    pub kind: TetrominoKind,
    pub rotation: Rotation,
    pub x: i32,
    pub y: i32,
}

/// Read-only projection of a [`MatchState`] sent to the opponent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub timestamp: u64,
    pub board: Board,
    pub piece: Option<PieceSnapshot>,
    pub next: Option<TetrominoKind>,
    pub score: u64,
    pub level: u32,
    pub lines: u32,
    pub attack: u32,
    pub game_over: bool,
}

impl Default for SyncSnapshot {
    fn default() -> Self {
        Self {
            timestamp: 0,
            board: Board::default(),
            piece: None,
            next: None,
            score: 0,
            level: 1,
            lines: 0,
            attack: 0,
            game_over: false,
        }
    }
}

impl SyncSnapshot {
    /// Draft from the local state; the timestamp is set at transmission
    pub fn from_state(state: &MatchState, attack: u32) -> Self {
        Self {
            timestamp: 0,
            board: state.board.clone(),
            piece: state.active.as_ref().map(|piece| PieceSnapshot {
                kind: piece.kind,
                rotation: piece.rotation,
                x: piece.x,
                y: piece.y,
            }),
            next: Some(state.next),
            score: state.score,
            level: state.level,
            lines: state.lines,
            attack,
            game_over: state.game_over,
        }
    }
}

fn is_zero_u64(value: &u64) -> bool {
    *value == 0
}

fn is_zero_u32(value: &u32) -> bool {
    *value == 0
}

fn is_first_level(value: &u32) -> bool {
    *value == 1
}

fn first_level() -> u32 {
    1
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Serialize, Deserialize)]
struct WirePiece {
    t: String,
    #[serde(default)]
    r: u32,
    #[serde(default)]
    x: i32,
    #[serde(default)]
    y: i32,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireSnapshot {
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    t: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    b: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    c: Option<WirePiece>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x: Option<String>,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    s: u64,
    #[serde(default = "first_level", skip_serializing_if = "is_first_level")]
    l: u32,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    n: u32,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    a: u32,
    #[serde(default, skip_serializing_if = "is_false")]
    o: bool,
}

/// Row-major run-length encoding as alternating run/tag pairs
///
/// An empty board encodes as no runs at all.
pub fn encode_board(board: &Board) -> Vec<u32> {
    if board.is_empty() {
        return Vec::new();
    }
    let mut runs: Vec<u32> = Vec::new();
    for tag in board.iter().map(|cell| cell.tag() as u32) {
        match runs.len() {
            len if len >= 2 && runs[len - 1] == tag => runs[len - 2] += 1,
            _ => runs.extend([1, tag]),
        }
    }
    runs
}

/// Inverse of [`encode_board`], always producing a 10×20 board
///
/// Runs past the last cell are dropped, missing cells stay empty, and a
/// trailing run without a tag is ignored.
pub fn decode_board(runs: &[u32]) -> Board {
    let mut board = Board::new(BOARD_WIDTH, BOARD_HEIGHT);
    let total = BOARD_WIDTH * BOARD_HEIGHT;
    let mut index = 0usize;
    for pair in runs.chunks_exact(2) {
        let cell = Cell::from_tag(pair[1].min(u8::MAX as u32) as u8);
        for _ in 0..pair[0] {
            if index >= total {
                return board;
            }
            board.set(index % BOARD_WIDTH, index / BOARD_WIDTH, cell);
            index += 1;
        }
    }
    board
}

fn parse_kind(letter: &str) -> Result<TetrominoKind, CodecError> {
    let mut chars = letter.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => TetrominoKind::from_letter(c),
        _ => None,
    }
    .ok_or_else(|| CodecError::UnknownPiece(letter.to_string()))
}

impl From<&SyncSnapshot> for WireSnapshot {
    fn from(snapshot: &SyncSnapshot) -> Self {
        WireSnapshot {
            t: snapshot.timestamp,
            b: encode_board(&snapshot.board),
            c: snapshot.piece.map(|piece| WirePiece {
                t: piece.kind.letter().to_string(),
                r: piece.rotation.index() as u32,
                x: piece.x,
                y: piece.y,
            }),
            x: snapshot.next.map(|kind| kind.letter().to_string()),
            s: snapshot.score,
            l: snapshot.level,
            n: snapshot.lines,
            a: snapshot.attack,
            o: snapshot.game_over,
        }
    }
}

impl TryFrom<WireSnapshot> for SyncSnapshot {
    type Error = CodecError;

    fn try_from(wire: WireSnapshot) -> Result<Self, Self::Error> {
        let piece = match wire.c {
            Some(piece) => Some(PieceSnapshot {
                kind: parse_kind(&piece.t)?,
                rotation: Rotation::new(piece.r),
                x: piece.x,
                y: piece.y,
            }),
            None => None,
        };
        let next = wire.x.as_deref().map(parse_kind).transpose()?;
        Ok(SyncSnapshot {
            timestamp: wire.t,
            board: decode_board(&wire.b),
            piece,
            next,
            score: wire.s,
            level: wire.l,
            lines: wire.n,
            attack: wire.a,
            game_over: wire.o,
        })
    }
}

impl Snapshot for SyncSnapshot {
    type Error = CodecError;

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn with_timestamp(self, timestamp: u64) -> Self {
        Self { timestamp, ..self }
    }

    fn absorb(self, older: Self) -> Self {
        Self {
            attack: self.attack.saturating_add(older.attack),
            game_over: self.game_over || older.game_over,
            ..self
        }
    }

    fn encode(&self) -> Result<Vec<u8>, Self::Error> {
        Ok(serde_json::to_vec(&WireSnapshot::from(self))?)
    }

    fn decode(payload: &[u8]) -> Result<Self, Self::Error> {
        let wire: WireSnapshot = serde_json::from_slice(payload)?;
        SyncSnapshot::try_from(wire)
    }
}
