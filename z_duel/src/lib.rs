//! # z_duel
//!
//! Two-player falling-block duel on top of `zenoh-duel`.
//!
//! Each player runs a [`MatchEngine`] locally. A [`MatchSession`] drives it,
//! publishes throttled [`SyncSnapshot`]s of the local state and applies the
//! opponent's ones to an [`OpponentView`]. Line clears send garbage rows to
//! the opponent, which receives them after a fixed delay.

pub mod board;
pub mod codec;
pub mod engine;
pub mod garbage;
pub mod opponent;
pub mod scoring;
pub mod session;
pub mod term_render;
pub mod tetromino;

pub use board::{Board, Cell, BOARD_HEIGHT, BOARD_WIDTH};
pub use codec::{CodecError, PieceSnapshot, SyncSnapshot};
pub use engine::{Action, ActivePiece, FinalReport, MatchConfig, MatchEngine, MatchEvent, MatchState};
pub use garbage::{garbage_for, GarbageQueue};
pub use opponent::OpponentView;
pub use session::{resolve_winner, MatchCommand, MatchOutcome, MatchSession, StepResult};
pub use term_render::{AnsiTermStyle, DuelScreen, PlainTermStyle, TermRender};
pub use tetromino::{rotate_clockwise, Rotation, Shape, TetrominoKind};
