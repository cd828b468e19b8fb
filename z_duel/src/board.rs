use rand::Rng;

use crate::tetromino::{Shape, TetrominoKind};

pub const BOARD_WIDTH: usize = 10;
pub const BOARD_HEIGHT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cell {
    #[default]
    Empty,
    Piece(TetrominoKind),
    Garbage,
}

impl Cell {
    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }

    /// Wire tag: 0 empty, 1 garbage, 2..=8 piece kinds
    pub fn tag(self) -> u8 {
        match self {
            Cell::Empty => 0,
            Cell::Garbage => 1,
            Cell::Piece(kind) => kind.tag(),
        }
    }

    /// Unknown non-zero tags are treated as occupied garbage
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0 => Cell::Empty,
            tag => TetrominoKind::from_tag(tag).map(Cell::Piece).unwrap_or(Cell::Garbage),
        }
    }
}

/// Fixed-size grid; rows are shifted, never resized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    width: usize,
    height: usize,
    cells: Vec<Vec<Cell>>,
}

impl Default for Board {
    fn default() -> Self {
        Board::new(BOARD_WIDTH, BOARD_HEIGHT)
    }
}

impl Board {
    pub fn new(width: usize, height: usize) -> Self {
        Board {
            width,
            height,
            cells: vec![vec![Cell::Empty; width]; height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> Cell {
        self.cells
            .get(y)
            .and_then(|row| row.get(x))
            .copied()
            .unwrap_or(Cell::Empty)
    }

    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if let Some(slot) = self.cells.get_mut(y).and_then(|row| row.get_mut(x)) {
            *slot = cell;
        }
    }

    /// Cells in row-major order
    pub fn iter(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells.iter().flat_map(|row| row.iter().copied())
    }

    pub fn is_empty(&self) -> bool {
        self.iter().all(Cell::is_empty)
    }

    /// A shape at `(x, y)` collides if one of its occupied cells falls
    /// outside the columns, at or below the bottom row, or onto an occupied
    /// cell. Cells above the top row never collide.
    pub fn collides(&self, x: i32, y: i32, shape: &Shape) -> bool {
        shape.cells().any(|(dx, dy)| {
            let col = x + dx;
            let row = y + dy;
            if col < 0 || col >= self.width as i32 || row >= self.height as i32 {
                return true;
            }
            row >= 0 && !self.get(col as usize, row as usize).is_empty()
        })
    }

    /// Write the shape cells with the kind tag; cells above the top are lost
    pub fn stamp(&mut self, x: i32, y: i32, shape: &Shape, kind: TetrominoKind) {
        for (dx, dy) in shape.cells() {
            let col = x + dx;
            let row = y + dy;
            if col >= 0 && row >= 0 {
                self.set(col as usize, row as usize, Cell::Piece(kind));
            }
        }
    }

    /// Rows the shape can still fall from `(x, y)` before it rests
    pub fn drop_distance(&self, x: i32, y: i32, shape: &Shape) -> i32 {
        let mut distance = 0;
        while !self.collides(x, y + distance + 1, shape) {
            distance += 1;
        }
        distance
    }

    /// Row indices where every cell is occupied (garbage counts)
    pub fn full_rows(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().all(|cell| !cell.is_empty()))
            .map(|(y, _)| y)
            .collect()
    }

    /// Clear every full row at once, shifting the rows above down
    ///
    /// Returns the number of cleared rows.
    pub fn clear_full_rows(&mut self) -> usize {
        let before = self.cells.len();
        self.cells.retain(|row| row.iter().any(|cell| cell.is_empty()));
        let cleared = before - self.cells.len();
        for _ in 0..cleared {
            self.cells.insert(0, vec![Cell::Empty; self.width]);
        }
        cleared
    }

    /// Discard the top `rows` rows and append as many garbage rows at the
    /// bottom, each with a single hole in a random column
    pub fn push_garbage(&mut self, rows: usize, rng: &mut impl Rng) {
        let rows = rows.min(self.height);
        self.cells.drain(..rows);
        for _ in 0..rows {
            let hole = rng.random_range(0..self.width);
            let row = (0..self.width)
                .map(|x| if x == hole { Cell::Empty } else { Cell::Garbage })
                .collect();
            self.cells.push(row);
        }
    }
}

/// Free-standing form of [`Board::collides`]
pub fn collides(x: i32, y: i32, shape: &Shape, board: &Board) -> bool {
    board.collides(x, y, shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tetromino::Rotation;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_collides_with_bounds() {
        let board = Board::default();
        let o = TetrominoKind::O.base_shape();
        assert!(!collides(0, 0, &o, &board));
        assert!(!collides(8, 18, &o, &board));
        // Left and right walls
        assert!(collides(-1, 0, &o, &board));
        assert!(collides(9, 0, &o, &board));
        // Bottom
        assert!(collides(0, 19, &o, &board));
    }

    #[test]
    fn test_cells_above_top_never_collide() {
        let board = Board::default();
        let i = TetrominoKind::I.shape(Rotation::new(1));
        assert!(!collides(0, -3, &i, &board));
        assert!(!collides(0, -10, &i, &board));
        // Out of columns still collides above the top
        assert!(collides(-1, -3, &i, &board));
    }

    #[test]
    fn test_collides_with_occupied_cells() {
        let mut board = Board::default();
        board.set(5, 10, Cell::Garbage);
        let o = TetrominoKind::O.base_shape();
        assert!(collides(4, 9, &o, &board));
        assert!(collides(5, 10, &o, &board));
        assert!(!collides(6, 10, &o, &board));
    }

    #[test]
    fn test_stamp_discards_cells_above_top() {
        let mut board = Board::default();
        let i = TetrominoKind::I.shape(Rotation::new(1));
        board.stamp(2, -2, &i, TetrominoKind::I);
        assert_eq!(board.get(2, 0), Cell::Piece(TetrominoKind::I));
        assert_eq!(board.get(2, 1), Cell::Piece(TetrominoKind::I));
        assert_eq!(board.iter().filter(|c| !c.is_empty()).count(), 2);
    }

    #[test]
    fn test_clear_full_rows_shifts_down() {
        let mut board = Board::default();
        for x in 0..BOARD_WIDTH {
            board.set(x, 19, Cell::Garbage);
            board.set(x, 17, Cell::Piece(TetrominoKind::T));
        }
        board.set(3, 18, Cell::Piece(TetrominoKind::L));
        board.set(0, 16, Cell::Piece(TetrominoKind::S));

        assert_eq!(board.full_rows(), vec![17, 19]);
        assert_eq!(board.clear_full_rows(), 2);
        assert_eq!(board.height(), BOARD_HEIGHT);
        assert_eq!(board.get(3, 19), Cell::Piece(TetrominoKind::L));
        assert_eq!(board.get(0, 18), Cell::Piece(TetrominoKind::S));
        assert_eq!(board.iter().filter(|c| !c.is_empty()).count(), 2);
    }

    #[test]
    fn test_push_garbage_has_single_hole() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut board = Board::default();
        board.set(0, 0, Cell::Piece(TetrominoKind::Z));
        board.set(0, 19, Cell::Piece(TetrominoKind::J));
        board.push_garbage(2, &mut rng);

        assert_eq!(board.height(), BOARD_HEIGHT);
        // Top row was discarded, old bottom row moved up by two
        assert_eq!(board.get(0, 0), Cell::Empty);
        assert_eq!(board.get(0, 17), Cell::Piece(TetrominoKind::J));
        for y in 18..20 {
            let holes = (0..BOARD_WIDTH).filter(|&x| board.get(x, y).is_empty()).count();
            assert_eq!(holes, 1);
        }
    }

    #[test]
    fn test_drop_distance() {
        let mut board = Board::default();
        let i = TetrominoKind::I.base_shape();
        assert_eq!(board.drop_distance(3, 0, &i), 19);
        board.set(4, 10, Cell::Garbage);
        assert_eq!(board.drop_distance(3, 0, &i), 9);
    }

    #[test]
    fn test_unknown_tags_decode_as_garbage() {
        assert_eq!(Cell::from_tag(0), Cell::Empty);
        assert_eq!(Cell::from_tag(1), Cell::Garbage);
        assert_eq!(Cell::from_tag(2), Cell::Piece(TetrominoKind::I));
        assert_eq!(Cell::from_tag(42), Cell::Garbage);
    }
}
