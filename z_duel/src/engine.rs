use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::board::{BOARD_HEIGHT, BOARD_WIDTH, Board};
use crate::garbage::{GarbageQueue, garbage_for};
use crate::scoring;
use crate::tetromino::{Rotation, Shape, TetrominoKind};

/// Timing and rules of one player's match
#[derive(Debug, Clone)]
pub struct MatchConfig {
    pub width: usize,
    pub height: usize,
    /// Gravity interval at level 1
    pub initial_drop_ms: u64,
    /// Gravity interval never goes below this
    pub min_drop_ms: u64,
    /// Interval factor applied on every level-up
    pub level_speedup: f64,
    /// Interval factor applied every `time_speedup_every_ms` of play
    pub time_speedup: f64,
    pub time_speedup_every_ms: u64,
    /// Clears closer than this keep the combo running
    pub combo_window_ms: u64,
    /// Delay between receiving an attack and its garbage rows appearing
    pub garbage_delay_ms: u64,
    /// Fixed RNG seed, random if None
    pub seed: Option<u64>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            width: BOARD_WIDTH,
            height: BOARD_HEIGHT,
            initial_drop_ms: 600,
            min_drop_ms: 100,
            level_speedup: 0.9,
            time_speedup: 0.95,
            time_speedup_every_ms: 30_000,
            combo_window_ms: 3000,
            garbage_delay_ms: 2000,
            seed: None,
        }
    }
}

impl MatchConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_garbage_delay_ms(mut self, delay_ms: u64) -> Self {
        self.garbage_delay_ms = delay_ms;
        self
    }

    pub fn with_initial_drop_ms(mut self, drop_ms: u64) -> Self {
        self.initial_drop_ms = drop_ms;
        self
    }
}

// Enum with all possible player inputs
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Action {
    MoveLeft,
    MoveRight,
    SoftDrop,
    Rotate,
    HardDrop,
}

/// The falling piece
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePiece {
    pub kind: TetrominoKind,
    pub rotation: Rotation,
    pub shape: Shape,
    pub x: i32,
    pub y: i32,
}

impl ActivePiece {
    /// Horizontally centered on the top row, rotation 0
    pub fn spawn(kind: TetrominoKind, board_width: usize) -> Self {
        let shape = kind.base_shape();
        let x = (board_width.saturating_sub(shape.width()) / 2) as i32;
        Self {
            kind,
            rotation: Rotation::default(),
            shape,
            x,
            y: 0,
        }
    }

    /// Rebuild a piece from its kind, rotation index and position
    pub fn placed(kind: TetrominoKind, rotation: Rotation, x: i32, y: i32) -> Self {
        Self {
            kind,
            rotation,
            shape: kind.shape(rotation),
            x,
            y,
        }
    }

    fn moved(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self.clone()
        }
    }

    fn rotated(&self) -> Self {
        let rotation = self.rotation.clockwise();
        Self {
            rotation,
            shape: crate::tetromino::rotate_clockwise(&self.shape),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalReport {
    pub score: u64,
    pub level: u32,
    pub lines: u32,
}

/// Things that happened, for presentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEvent {
    Spawned(TetrominoKind),
    Locked,
    LinesCleared { rows: u32 },
    Combo(u32),
    AttackSent(u32),
    AttackReceived(u32),
    GarbageApplied(u32),
    LevelUp(u32),
    GameOver(FinalReport),
}

/// Live state of one player's match
#[derive(Debug, Clone)]
pub struct MatchState {
    pub board: Board,
    pub active: Option<ActivePiece>,
    pub next: TetrominoKind,
    pub score: u64,
    pub level: u32,
    pub lines: u32,
    pub combo: u32,
    pub last_clear_ms: Option<u64>,
    pub drop_interval_ms: u64,
    pub game_over: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    Gravity(u64),
    SpeedUp(u64),
    Garbage(u64),
}

impl Timer {
    fn at(self) -> u64 {
        match self {
            Timer::Gravity(at) | Timer::SpeedUp(at) | Timer::Garbage(at) => at,
        }
    }
}

/// One player's simulation
///
/// Time is passed in explicitly as milliseconds since match start, so the
/// engine is fully deterministic for a given seed and input sequence.
pub struct MatchEngine {
    config: MatchConfig,
    state: MatchState,
    rng: StdRng,
    garbage: GarbageQueue,
    events: Vec<MatchEvent>,
    started: bool,
    next_gravity_ms: u64,
    next_speedup_ms: u64,
    outbound_attack: u32,
    final_report: Option<FinalReport>,
}

impl std::fmt::Debug for MatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchEngine")
            .field("score", &self.state.score)
            .field("level", &self.state.level)
            .field("lines", &self.state.lines)
            .field("game_over", &self.state.game_over)
            .finish()
    }
}

impl MatchEngine {
    pub fn new(config: MatchConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let state = MatchState {
            board: Board::new(config.width, config.height),
            active: None,
            next: TetrominoKind::random(&mut rng),
            score: 0,
            level: 1,
            lines: 0,
            combo: 0,
            last_clear_ms: None,
            drop_interval_ms: config.initial_drop_ms,
            game_over: false,
        };
        Self {
            garbage: GarbageQueue::new(config.garbage_delay_ms),
            config,
            state,
            rng,
            events: Vec::new(),
            started: false,
            next_gravity_ms: 0,
            next_speedup_ms: 0,
            outbound_attack: 0,
            final_report: None,
        }
    }

    /// Start the clocks and spawn the first piece
    pub fn start(&mut self, now_ms: u64) {
        if self.started {
            return;
        }
        self.started = true;
        self.next_gravity_ms = now_ms + self.state.drop_interval_ms;
        self.next_speedup_ms = now_ms + self.config.time_speedup_every_ms;
        self.spawn();
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_over(&self) -> bool {
        self.state.game_over
    }

    /// Apply a player input; returns true if the visible state changed
    pub fn apply(&mut self, action: Action, now_ms: u64) -> bool {
        if self.state.game_over {
            return false;
        }
        let Some(active) = self.state.active.clone() else {
            return false;
        };
        match action {
            Action::MoveLeft => self.try_replace(active.moved(-1, 0)),
            Action::MoveRight => self.try_replace(active.moved(1, 0)),
            Action::Rotate => self.try_replace(active.rotated()),
            Action::SoftDrop => self.gravity_step(now_ms),
            Action::HardDrop => {
                let distance = self.state.board.drop_distance(active.x, active.y, &active.shape);
                let landed = active.moved(0, distance);
                self.state.active = Some(landed);
                self.lock(now_ms);
                true
            }
        }
    }

    fn try_replace(&mut self, candidate: ActivePiece) -> bool {
        if self.state.board.collides(candidate.x, candidate.y, &candidate.shape) {
            return false;
        }
        self.state.active = Some(candidate);
        true
    }

    /// Move the piece down one row, locking it if it cannot move
    pub fn gravity_step(&mut self, now_ms: u64) -> bool {
        if self.state.game_over {
            return false;
        }
        let Some(active) = self.state.active.clone() else {
            return false;
        };
        let down = active.moved(0, 1);
        if !self.try_replace(down) {
            self.lock(now_ms);
        }
        true
    }

    fn due_timer(&self, now_ms: u64) -> Option<Timer> {
        [
            Some(Timer::Gravity(self.next_gravity_ms)),
            Some(Timer::SpeedUp(self.next_speedup_ms)),
            self.garbage.next_due().map(Timer::Garbage),
        ]
        .into_iter()
        .flatten()
        .filter(|timer| timer.at() <= now_ms)
        .min_by_key(|timer| timer.at())
    }

    /// Run every timer due at `now_ms`: gravity, speed-up and deferred garbage
    ///
    /// Returns true if the visible state changed.
    pub fn advance(&mut self, now_ms: u64) -> bool {
        if !self.started {
            return false;
        }
        let mut changed = false;
        while !self.state.game_over {
            let Some(timer) = self.due_timer(now_ms) else {
                break;
            };
            match timer {
                Timer::Gravity(at) => {
                    changed |= self.gravity_step(at);
                    self.next_gravity_ms = at + self.state.drop_interval_ms;
                }
                Timer::SpeedUp(at) => {
                    self.state.drop_interval_ms = scoring::scale_interval(
                        self.state.drop_interval_ms,
                        self.config.time_speedup,
                        self.config.min_drop_ms,
                    );
                    self.next_speedup_ms = at + self.config.time_speedup_every_ms;
                }
                Timer::Garbage(at) => {
                    let rows = self.garbage.take_due(at);
                    self.apply_garbage(rows);
                    changed = true;
                }
            }
        }
        changed
    }

    /// Next instant (ms since start) at which [`MatchEngine::advance`] has work
    pub fn next_deadline(&self) -> Option<u64> {
        if !self.started || self.state.game_over {
            return None;
        }
        let mut deadline = self.next_gravity_ms.min(self.next_speedup_ms);
        if let Some(due) = self.garbage.next_due() {
            deadline = deadline.min(due);
        }
        Some(deadline)
    }

    /// Schedule garbage sent by the opponent
    pub fn receive_attack(&mut self, now_ms: u64, rows: u32) {
        if self.state.game_over || rows == 0 {
            return;
        }
        self.garbage.schedule(now_ms, rows);
        self.events.push(MatchEvent::AttackReceived(rows));
    }

    fn apply_garbage(&mut self, rows: u32) {
        if rows == 0 {
            return;
        }
        self.state.board.push_garbage(rows as usize, &mut self.rng);
        self.events.push(MatchEvent::GarbageApplied(rows));

        if let Some(active) = self.state.active.clone() {
            let board = &self.state.board;
            if board.collides(active.x, active.y, &active.shape) {
                let lifted = active.moved(0, -(rows as i32));
                if board.collides(lifted.x, lifted.y, &lifted.shape) {
                    self.game_over();
                } else {
                    self.state.active = Some(lifted);
                }
            }
        }
    }

    fn lock(&mut self, now_ms: u64) {
        let Some(piece) = self.state.active.take() else {
            return;
        };
        self.state.board.stamp(piece.x, piece.y, &piece.shape, piece.kind);
        self.events.push(MatchEvent::Locked);

        let cleared = self.state.board.clear_full_rows() as u32;
        if cleared == 0 {
            self.state.combo = 0;
        } else {
            self.score_clear(cleared, now_ms);
        }
        self.spawn();
    }

    fn score_clear(&mut self, cleared: u32, now_ms: u64) {
        let state = &mut self.state;
        state.combo = scoring::next_combo(
            state.combo,
            state.last_clear_ms,
            now_ms,
            self.config.combo_window_ms,
        );
        state.last_clear_ms = Some(now_ms);
        state.score += scoring::points(cleared, state.combo, state.level);
        state.lines += cleared;
        self.events.push(MatchEvent::LinesCleared { rows: cleared });
        if state.combo > 1 {
            self.events.push(MatchEvent::Combo(state.combo));
        }

        let attack = garbage_for(cleared, state.combo);
        if attack > 0 {
            self.outbound_attack = self.outbound_attack.saturating_add(attack);
            self.events.push(MatchEvent::AttackSent(attack));
        }

        let level = scoring::level_for(state.lines);
        while state.level < level {
            state.level += 1;
            state.drop_interval_ms = scoring::scale_interval(
                state.drop_interval_ms,
                self.config.level_speedup,
                self.config.min_drop_ms,
            );
            self.events.push(MatchEvent::LevelUp(state.level));
        }
    }

    fn spawn(&mut self) {
        let kind = self.state.next;
        let piece = ActivePiece::spawn(kind, self.state.board.width());
        self.state.next = TetrominoKind::random(&mut self.rng);
        if self.state.board.collides(piece.x, piece.y, &piece.shape) {
            self.game_over();
            return;
        }
        self.state.active = Some(piece);
        self.events.push(MatchEvent::Spawned(kind));
    }

    /// End the match now, as when the room finished on the other side
    pub fn end(&mut self) {
        self.game_over();
    }

    fn game_over(&mut self) {
        if self.state.game_over {
            return;
        }
        self.state.game_over = true;
        self.state.active = None;
        self.garbage.clear();
        let report = FinalReport {
            score: self.state.score,
            level: self.state.level,
            lines: self.state.lines,
        };
        self.final_report = Some(report);
        self.events.push(MatchEvent::GameOver(report));
    }

    /// Final score, level and lines; `Some` exactly once after game over
    pub fn take_final_report(&mut self) -> Option<FinalReport> {
        self.final_report.take()
    }

    pub fn take_events(&mut self) -> Vec<MatchEvent> {
        std::mem::take(&mut self.events)
    }

    /// Garbage sent since the last call
    pub fn take_outbound_attack(&mut self) -> u32 {
        std::mem::take(&mut self.outbound_attack)
    }

    /// Row the active piece would rest on after a hard drop
    pub fn ghost_row(&self) -> Option<i32> {
        self.state.active.as_ref().map(|piece| {
            piece.y + self.state.board.drop_distance(piece.x, piece.y, &piece.shape)
        })
    }

    /// Rows received but not applied yet
    pub fn pending_garbage(&self) -> u32 {
        self.garbage.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Cell;

    fn engine() -> MatchEngine {
        MatchEngine::new(MatchConfig::default().with_seed(42))
    }

    fn give(engine: &mut MatchEngine, kind: TetrominoKind) {
        engine.state.active = Some(ActivePiece::spawn(kind, engine.state.board.width()));
    }

    fn fill_row_except(engine: &mut MatchEngine, y: usize, gap: std::ops::RangeInclusive<usize>) {
        for x in 0..engine.state.board.width() {
            if !gap.contains(&x) {
                engine.state.board.set(x, y, Cell::Garbage);
            }
        }
    }

    #[test]
    fn test_i_piece_hard_drop_lands_on_bottom_row() {
        let mut engine = engine();
        engine.state.next = TetrominoKind::I;
        engine.start(0);

        let active = engine.state().active.clone().unwrap();
        assert_eq!(active.kind, TetrominoKind::I);
        assert_eq!((active.x, active.y), (3, 0));

        assert!(engine.apply(Action::HardDrop, 100));
        let board = &engine.state().board;
        for x in 0..BOARD_WIDTH {
            let expected = if (3..=6).contains(&x) {
                Cell::Piece(TetrominoKind::I)
            } else {
                Cell::Empty
            };
            assert_eq!(board.get(x, 19), expected, "column {}", x);
        }
        assert_eq!(board.iter().filter(|c| !c.is_empty()).count(), 4);
        assert_eq!(engine.state().score, 0);
        // The next piece is already falling
        assert!(engine.state().active.is_some());
        assert!(engine.take_events().contains(&MatchEvent::Locked));
    }

    #[test]
    fn test_hard_drop_equals_repeated_soft_drops() {
        let mut hard = engine();
        let mut soft = engine();
        hard.start(0);
        soft.start(0);
        for e in [&mut hard, &mut soft] {
            e.apply(Action::Rotate, 0);
            e.apply(Action::MoveLeft, 0);
            e.apply(Action::MoveLeft, 0);
        }

        hard.apply(Action::HardDrop, 0);
        while !soft.take_events().contains(&MatchEvent::Locked) {
            assert!(soft.apply(Action::SoftDrop, 0));
        }

        assert_eq!(hard.state().board, soft.state().board);
        assert_eq!(hard.state().next, soft.state().next);
    }

    #[test]
    fn test_rotation_rejected_on_collision_keeps_shape() {
        let mut engine = engine();
        engine.start(0);
        give(&mut engine, TetrominoKind::I);
        // Vertical I against the left wall cannot rotate back inside
        engine.state.active = Some(ActivePiece::placed(TetrominoKind::I, Rotation::new(1), 0, 0));
        for y in 0..4 {
            engine.state.board.set(1, y, Cell::Garbage);
        }
        let before = engine.state().active.clone();
        assert!(!engine.apply(Action::Rotate, 0));
        assert_eq!(engine.state().active, before);
    }

    #[test]
    fn test_single_line_clear_scores_and_starts_combo() {
        let mut engine = engine();
        engine.start(0);
        fill_row_except(&mut engine, 19, 3..=6);
        give(&mut engine, TetrominoKind::I);

        engine.apply(Action::HardDrop, 1000);
        let state = engine.state();
        assert_eq!(state.lines, 1);
        assert_eq!(state.combo, 1);
        assert_eq!(state.score, 160);
        assert!(state.board.is_empty());
        assert_eq!(engine.take_outbound_attack(), 0);
    }

    #[test]
    fn test_combo_grows_then_resets() {
        let mut engine = engine();
        engine.start(0);

        fill_row_except(&mut engine, 19, 3..=6);
        give(&mut engine, TetrominoKind::I);
        engine.apply(Action::HardDrop, 1000);
        assert_eq!(engine.state().combo, 1);

        fill_row_except(&mut engine, 19, 3..=6);
        give(&mut engine, TetrominoKind::I);
        engine.apply(Action::HardDrop, 2000);
        assert_eq!(engine.state().combo, 2);
        // 100 + 50 * 2 + 10 * 1, plus one combo row of garbage
        assert_eq!(engine.state().score, 160 + 210);
        assert_eq!(engine.take_outbound_attack(), 1);
        assert!(engine.take_events().contains(&MatchEvent::Combo(2)));

        // Lock without clear
        give(&mut engine, TetrominoKind::O);
        engine.apply(Action::HardDrop, 2500);
        assert_eq!(engine.state().combo, 0);

        // Late clear restarts at 1
        let mut engine = self::engine();
        engine.start(0);
        fill_row_except(&mut engine, 19, 3..=6);
        give(&mut engine, TetrominoKind::I);
        engine.apply(Action::HardDrop, 1000);
        fill_row_except(&mut engine, 19, 3..=6);
        give(&mut engine, TetrominoKind::I);
        engine.apply(Action::HardDrop, 4000);
        assert_eq!(engine.state().combo, 1);
    }

    #[test]
    fn test_double_clear_sends_garbage() {
        let mut engine = engine();
        engine.start(0);
        fill_row_except(&mut engine, 18, 4..=5);
        fill_row_except(&mut engine, 19, 4..=5);
        give(&mut engine, TetrominoKind::O);
        engine.apply(Action::HardDrop, 500);

        assert_eq!(engine.state().lines, 2);
        assert_eq!(engine.take_outbound_attack(), 1);
        let events = engine.take_events();
        assert!(events.contains(&MatchEvent::LinesCleared { rows: 2 }));
        assert!(events.contains(&MatchEvent::AttackSent(1)));
    }

    #[test]
    fn test_level_up_speeds_gravity() {
        let mut engine = engine();
        engine.start(0);
        engine.state.lines = 9;
        fill_row_except(&mut engine, 19, 3..=6);
        give(&mut engine, TetrominoKind::I);
        engine.apply(Action::HardDrop, 100);

        assert_eq!(engine.state().level, 2);
        assert_eq!(engine.state().drop_interval_ms, 540);
        // Points use the level before the level-up
        assert_eq!(engine.state().score, 160);
        assert!(engine.take_events().contains(&MatchEvent::LevelUp(2)));
    }

    #[test]
    fn test_time_speedup_every_30_seconds() {
        let mut engine = engine();
        engine.start(0);
        engine.advance(29_999);
        assert_eq!(engine.state().drop_interval_ms, 600);
        engine.advance(30_000);
        assert_eq!(engine.state().drop_interval_ms, 570);
    }

    #[test]
    fn test_gravity_follows_drop_interval() {
        let mut engine = engine();
        engine.start(0);
        let y0 = engine.state().active.as_ref().unwrap().y;
        assert!(!engine.advance(599));
        assert!(engine.advance(600));
        assert_eq!(engine.state().active.as_ref().unwrap().y, y0 + 1);
        assert_eq!(engine.next_deadline(), Some(1200));
    }

    fn landed(engine: &mut MatchEngine, kind: TetrominoKind) -> ActivePiece {
        give(engine, kind);
        let active = engine.state.active.clone().unwrap();
        let distance = engine.state.board.drop_distance(active.x, active.y, &active.shape);
        let landed = active.moved(0, distance);
        engine.state.active = Some(landed.clone());
        landed
    }

    #[test]
    fn test_garbage_lifts_colliding_piece() {
        let mut engine = engine();
        engine.start(0);
        let resting = landed(&mut engine, TetrominoKind::I);

        engine.apply_garbage(2);
        let active = engine.state().active.clone().unwrap();
        assert_eq!(active.y, resting.y - 2);
        assert_eq!(active.x, resting.x);
        assert!(!engine.is_over());
        assert!(engine.take_final_report().is_none());
    }

    #[test]
    fn test_garbage_ends_match_when_lift_still_collides() {
        let mut engine = engine();
        engine.start(0);
        let resting = landed(&mut engine, TetrominoKind::I);
        // Occupy the cells under the active piece so no lift can free it
        engine
            .state
            .board
            .stamp(resting.x, resting.y, &resting.shape, TetrominoKind::O);

        engine.apply_garbage(1);
        assert!(engine.is_over());
        assert!(engine.state().active.is_none());
        assert!(engine.take_final_report().is_some());
        assert!(engine.take_final_report().is_none());
    }

    #[test]
    fn test_received_garbage_applies_after_delay() {
        let mut engine = engine();
        engine.start(0);
        engine.receive_attack(100, 2);
        assert_eq!(engine.pending_garbage(), 2);
        assert_eq!(engine.next_deadline(), Some(600));

        engine.advance(2099);
        assert_eq!(engine.pending_garbage(), 2);
        engine.advance(2100);
        assert_eq!(engine.pending_garbage(), 0);

        let board = &engine.state().board;
        for y in 18..20 {
            let garbage = (0..BOARD_WIDTH)
                .filter(|&x| board.get(x, y) == Cell::Garbage)
                .count();
            assert_eq!(garbage, BOARD_WIDTH - 1);
        }
        let events = engine.take_events();
        assert!(events.contains(&MatchEvent::AttackReceived(2)));
        assert!(events.contains(&MatchEvent::GarbageApplied(2)));
    }

    #[test]
    fn test_spawn_collision_ends_match_once() {
        let mut engine = engine();
        engine.start(0);
        engine.state.score = 1234;
        for x in 0..BOARD_WIDTH {
            engine.state.board.set(x, 0, Cell::Garbage);
        }
        engine.state.active = None;
        engine.spawn();

        assert!(engine.is_over());
        let report = engine.take_final_report().unwrap();
        assert_eq!(report.score, 1234);
        assert_eq!(engine.take_final_report(), None);

        // Further input and ticks are no-ops
        assert!(!engine.apply(Action::MoveLeft, 10));
        assert!(!engine.advance(100_000));
        engine.end();
        assert_eq!(engine.take_final_report(), None);
        let over_events = engine
            .take_events()
            .into_iter()
            .filter(|e| matches!(e, MatchEvent::GameOver(_)))
            .count();
        assert_eq!(over_events, 1);
    }

    #[test]
    fn test_ghost_row() {
        let mut engine = engine();
        engine.start(0);
        give(&mut engine, TetrominoKind::I);
        assert_eq!(engine.ghost_row(), Some(19));
    }
}
