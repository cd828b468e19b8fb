use crate::board::{Board, Cell};
use crate::codec::{PieceSnapshot, SyncSnapshot};
use crate::engine::ActivePiece;

/// Last reconciled state of the opponent, read-only for rendering
#[derive(Debug, Clone, Default)]
pub struct OpponentView {
    latest: Option<SyncSnapshot>,
}

impl OpponentView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the view with a newer snapshot
    pub fn apply(&mut self, snapshot: SyncSnapshot) {
        self.latest = Some(snapshot);
    }

    /// Whether any snapshot has been reconciled yet
    pub fn is_known(&self) -> bool {
        self.latest.is_some()
    }

    pub fn latest(&self) -> Option<&SyncSnapshot> {
        self.latest.as_ref()
    }

    pub fn score(&self) -> Option<u64> {
        self.latest.as_ref().map(|snapshot| snapshot.score)
    }

    pub fn is_over(&self) -> bool {
        self.latest.as_ref().is_some_and(|snapshot| snapshot.game_over)
    }

    /// Opponent board with its falling piece drawn in
    pub fn board_with_piece(&self) -> Board {
        let Some(snapshot) = &self.latest else {
            return Board::default();
        };
        let mut board = snapshot.board.clone();
        if let Some(PieceSnapshot { kind, rotation, x, y }) = snapshot.piece {
            let piece = ActivePiece::placed(kind, rotation, x, y);
            for (dx, dy) in piece.shape.cells() {
                let (col, row) = (x + dx, y + dy);
                if col >= 0 && row >= 0 {
                    board.set(col as usize, row as usize, Cell::Piece(kind));
                }
            }
        }
        board
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tetromino::{Rotation, TetrominoKind};

    #[test]
    fn test_unknown_opponent() {
        let view = OpponentView::new();
        assert!(!view.is_known());
        assert_eq!(view.score(), None);
        assert!(!view.is_over());
        assert!(view.board_with_piece().is_empty());
    }

    #[test]
    fn test_piece_drawn_over_board() {
        let mut snapshot = SyncSnapshot::default();
        snapshot.score = 420;
        snapshot.board.set(0, 19, Cell::Garbage);
        snapshot.piece = Some(PieceSnapshot {
            kind: TetrominoKind::I,
            rotation: Rotation::new(1),
            x: 5,
            y: -1,
        });
        let mut view = OpponentView::new();
        view.apply(snapshot);

        let board = view.board_with_piece();
        assert_eq!(board.get(0, 19), Cell::Garbage);
        // Vertical I from row -1 shows three cells
        let shown: Vec<usize> = (0..20)
            .filter(|&y| board.get(5, y) == Cell::Piece(TetrominoKind::I))
            .collect();
        assert_eq!(shown, vec![0, 1, 2]);
        assert_eq!(view.score(), Some(420));
        // Piece is not part of the stored board
        assert!(view.latest().unwrap().board.get(5, 0).is_empty());
    }
}
