use crate::board::{Board, Cell};
use crate::engine::{ActivePiece, MatchEngine};
use crate::opponent::OpponentView;
use crate::tetromino::TetrominoKind;

#[derive(Debug, Clone, PartialEq)]
pub enum TermCell {
    BoardCell(Cell),
    /// Landing position of the active piece
    Ghost,
    BorderVertical,
    BorderHorizontal,
    BorderTopLeft,
    BorderTopRight,
    BorderBottomLeft,
    BorderBottomRight,
    Space,
    Message(String),
}

pub trait TermStyle {
    fn display<'a>(&self, cell: &'a TermCell) -> &'a str;

    fn width(&self, cell: &TermCell) -> usize {
        match cell {
            TermCell::BoardCell(_) | TermCell::Ghost | TermCell::BorderHorizontal => 2,
            TermCell::Message(s) => s.chars().count(),
            _ => 1,
        }
    }
}

pub trait TermRender {
    fn output(&self, style: &impl TermStyle) -> Vec<Vec<TermCell>>;

    fn render(&self, style: &impl TermStyle) -> Vec<String> {
        self.output(style)
            .iter()
            .map(|row| row.iter().map(|cell| style.display(cell)).collect())
            .collect()
    }
}

fn line_width(line: &[TermCell], style: &impl TermStyle) -> usize {
    line.iter().map(|cell| style.width(cell)).sum()
}

/// Pad every line of the block with spaces to the width of the widest one
pub fn pad_block_right(block: &mut [Vec<TermCell>], style: &impl TermStyle) {
    let width = block
        .iter()
        .map(|line| line_width(line, style))
        .max()
        .unwrap_or(0);
    for line in block.iter_mut() {
        let padding = width - line_width(line, style);
        line.extend(std::iter::repeat_n(TermCell::Space, padding));
    }
}

/// Place blocks side by side, separated by `gap` spaces
pub fn join_columns(
    blocks: Vec<Vec<Vec<TermCell>>>,
    gap: usize,
    style: &impl TermStyle,
) -> Vec<Vec<TermCell>> {
    let height = blocks.iter().map(Vec::len).max().unwrap_or(0);
    let mut lines = vec![Vec::new(); height];
    let last = blocks.len().saturating_sub(1);
    for (index, mut block) in blocks.into_iter().enumerate() {
        block.resize(height, Vec::new());
        pad_block_right(&mut block, style);
        for (line, mut part) in lines.iter_mut().zip(block) {
            line.append(&mut part);
            if index != last {
                line.extend(std::iter::repeat_n(TermCell::Space, gap));
            }
        }
    }
    lines
}

fn frame(mut lines: Vec<Vec<TermCell>>, inner_cols: usize, top: bool) -> Vec<Vec<TermCell>> {
    for line in &mut lines {
        line.insert(0, TermCell::BorderVertical);
        line.push(TermCell::BorderVertical);
    }
    let edge = |left: TermCell, right: TermCell| {
        let mut line = vec![left];
        line.extend(std::iter::repeat_n(TermCell::BorderHorizontal, inner_cols));
        line.push(right);
        line
    };
    if top {
        lines.insert(0, edge(TermCell::BorderTopLeft, TermCell::BorderTopRight));
    }
    lines.push(edge(TermCell::BorderBottomLeft, TermCell::BorderBottomRight));
    lines
}

pub struct PlainTermStyle;

impl TermStyle for PlainTermStyle {
    fn display<'a>(&self, cell: &'a TermCell) -> &'a str {
        match cell {
            TermCell::BoardCell(Cell::Empty) => "  ",
            TermCell::BoardCell(Cell::Garbage) => "##",
            TermCell::BoardCell(Cell::Piece(_)) => "[]",
            TermCell::Ghost => "::",
            TermCell::BorderVertical => "|",
            TermCell::BorderHorizontal => "--",
            TermCell::BorderTopLeft
            | TermCell::BorderTopRight
            | TermCell::BorderBottomLeft
            | TermCell::BorderBottomRight => "+",
            TermCell::Space => " ",
            TermCell::Message(s) => s.as_str(),
        }
    }
}

pub struct AnsiTermStyle;

impl TermStyle for AnsiTermStyle {
    fn display<'a>(&self, cell: &'a TermCell) -> &'a str {
        match cell {
            TermCell::BoardCell(Cell::Empty) => "\x1b[0m  ",
            TermCell::BoardCell(Cell::Garbage) => "\x1b[0;90m##",
            TermCell::BoardCell(Cell::Piece(kind)) => match kind {
                TetrominoKind::I => "\x1b[0;36m[]",
                TetrominoKind::J => "\x1b[0;34m[]",
                TetrominoKind::L => "\x1b[0;33m[]",
                TetrominoKind::O => "\x1b[0;93m[]",
                TetrominoKind::S => "\x1b[0;32m[]",
                TetrominoKind::T => "\x1b[0;35m[]",
                TetrominoKind::Z => "\x1b[0;31m[]",
            },
            TermCell::Ghost => "\x1b[2m::\x1b[0m",
            TermCell::BorderVertical => "\x1b[0m│",
            TermCell::BorderHorizontal => "\x1b[0m──",
            TermCell::BorderTopLeft => "\x1b[0m┌",
            TermCell::BorderTopRight => "\x1b[0m┐",
            TermCell::BorderBottomLeft => "\x1b[0m└",
            TermCell::BorderBottomRight => "\x1b[0m┘",
            TermCell::Space => " ",
            TermCell::Message(s) => s.as_str(),
        }
    }
}

/// One player's board inside a frame, with an optional centered overlay
pub struct BoardView {
    cells: Vec<Vec<TermCell>>,
    cols: usize,
    overlay: Option<String>,
}

impl BoardView {
    fn from_board(board: &Board) -> Self {
        let cells = (0..board.height())
            .map(|y| {
                (0..board.width())
                    .map(|x| TermCell::BoardCell(board.get(x, y)))
                    .collect()
            })
            .collect();
        Self {
            cells,
            cols: board.width(),
            overlay: None,
        }
    }

    fn paint(&mut self, piece: &ActivePiece, y: i32, cell: TermCell) {
        for (dx, dy) in piece.shape.cells() {
            let (col, row) = (piece.x + dx, y + dy);
            if col < 0 || row < 0 {
                continue;
            }
            if let Some(slot) = self
                .cells
                .get_mut(row as usize)
                .and_then(|line| line.get_mut(col as usize))
            {
                *slot = cell.clone();
            }
        }
    }

    /// Local board with the falling piece and its ghost
    pub fn player(engine: &MatchEngine) -> Self {
        let state = engine.state();
        let mut view = Self::from_board(&state.board);
        if let Some(piece) = &state.active {
            if let Some(ghost) = engine.ghost_row() {
                view.paint(piece, ghost, TermCell::Ghost);
            }
            view.paint(piece, piece.y, TermCell::BoardCell(Cell::Piece(piece.kind)));
        }
        if state.game_over {
            view.overlay = Some("Game Over".to_string());
        }
        view
    }

    /// Reconciled opponent board
    pub fn opponent(opponent: &OpponentView) -> Self {
        let mut view = Self::from_board(&opponent.board_with_piece());
        if !opponent.is_known() {
            view.overlay = Some("Waiting...".to_string());
        } else if opponent.is_over() {
            view.overlay = Some("Game Over".to_string());
        }
        view
    }

    pub fn with_overlay(mut self, overlay: Option<String>) -> Self {
        if overlay.is_some() {
            self.overlay = overlay;
        }
        self
    }
}

impl TermRender for BoardView {
    fn output(&self, style: &impl TermStyle) -> Vec<Vec<TermCell>> {
        let mut lines = self.cells.clone();
        if let Some(overlay) = &self.overlay {
            let inner = self.cols * style.width(&TermCell::BoardCell(Cell::Empty));
            let text = overlay.chars().take(inner).collect::<String>();
            let left = (inner - text.chars().count()) / 2;
            let mut line = vec![TermCell::Space; left];
            line.push(TermCell::Message(text));
            let middle = lines.len() / 2;
            if let Some(slot) = lines.get_mut(middle) {
                *slot = line;
            }
            pad_block_right(&mut lines, style);
        }
        frame(lines, self.cols, false)
    }
}

/// Next piece in a small frame
pub struct NextPreview(Option<TetrominoKind>);

impl TermRender for NextPreview {
    fn output(&self, _style: &impl TermStyle) -> Vec<Vec<TermCell>> {
        let mut lines = vec![vec![TermCell::BoardCell(Cell::Empty); 4]; 2];
        if let Some(kind) = self.0 {
            for (dx, dy) in kind.base_shape().cells() {
                lines[dy as usize][dx as usize] = TermCell::BoardCell(Cell::Piece(kind));
            }
        }
        frame(lines, 4, true)
    }
}

/// Everything the player sees: opponent board, status column, own board
pub struct DuelScreen {
    opponent: BoardView,
    opponent_next: NextPreview,
    player: BoardView,
    player_next: NextPreview,
    status: Vec<String>,
}

impl DuelScreen {
    pub fn new(
        engine: &MatchEngine,
        opponent: &OpponentView,
        player_name: &str,
        opponent_name: Option<&str>,
        messages: &[String],
        degraded: bool,
    ) -> Self {
        let state = engine.state();
        let mut status = vec![
            format!("You: {}", player_name),
            format!("Score: {}", state.score),
            format!("Level: {}", state.level),
            format!("Lines: {}", state.lines),
        ];
        if state.combo > 1 {
            status.push(format!("Combo x{}", state.combo));
        }
        let pending = engine.pending_garbage();
        if pending > 0 {
            status.push(format!("Incoming: {}", pending));
        }
        status.push(String::new());
        status.push(format!("Opponent: {}", opponent_name.unwrap_or("-")));
        match opponent.latest() {
            Some(snapshot) => {
                status.push(format!("Score: {}", snapshot.score));
                status.push(format!("Level: {}", snapshot.level));
                status.push(format!("Lines: {}", snapshot.lines));
            }
            None => status.push("Score: -".to_string()),
        }
        if degraded {
            status.push(String::new());
            status.push("! connection degraded".to_string());
        }
        status.push(String::new());
        status.extend(messages.iter().cloned());

        Self {
            opponent: BoardView::opponent(opponent),
            opponent_next: NextPreview(opponent.latest().and_then(|snapshot| snapshot.next)),
            player: BoardView::player(engine),
            player_next: NextPreview(Some(state.next)),
            status,
        }
    }
}

impl TermRender for DuelScreen {
    fn output(&self, style: &impl TermStyle) -> Vec<Vec<TermCell>> {
        let previews = join_columns(
            vec![self.opponent_next.output(style), self.player_next.output(style)],
            2,
            style,
        );
        let mut middle = previews;
        middle.push(Vec::new());
        middle.extend(
            self.status
                .iter()
                .map(|line| vec![TermCell::Message(line.clone())]),
        );
        join_columns(
            vec![self.opponent.output(style), middle, self.player.output(style)],
            1,
            style,
        )
    }
}
