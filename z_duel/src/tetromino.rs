use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TetrominoKind {
    I,
    J,
    L,
    O,
    S,
    T,
    Z,
}

impl TetrominoKind {
    pub const ALL: [TetrominoKind; 7] = [
        TetrominoKind::I,
        TetrominoKind::J,
        TetrominoKind::L,
        TetrominoKind::O,
        TetrominoKind::S,
        TetrominoKind::T,
        TetrominoKind::Z,
    ];

    /// Uniform draw, every spawn independent of the previous ones
    pub fn random(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }

    pub fn letter(self) -> char {
        match self {
            TetrominoKind::I => 'I',
            TetrominoKind::J => 'J',
            TetrominoKind::L => 'L',
            TetrominoKind::O => 'O',
            TetrominoKind::S => 'S',
            TetrominoKind::T => 'T',
            TetrominoKind::Z => 'Z',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.letter() == letter)
    }

    /// Board cell tag: 2..=8 in I, J, L, O, S, T, Z order
    pub fn tag(self) -> u8 {
        match self {
            TetrominoKind::I => 2,
            TetrominoKind::J => 3,
            TetrominoKind::L => 4,
            TetrominoKind::O => 5,
            TetrominoKind::S => 6,
            TetrominoKind::T => 7,
            TetrominoKind::Z => 8,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Shape in rotation 0
    pub fn base_shape(self) -> Shape {
        let rows: &[&[u8]] = match self {
            TetrominoKind::I => &[&[1, 1, 1, 1]],
            TetrominoKind::J => &[&[1, 0, 0], &[1, 1, 1]],
            TetrominoKind::L => &[&[0, 0, 1], &[1, 1, 1]],
            TetrominoKind::O => &[&[1, 1], &[1, 1]],
            TetrominoKind::S => &[&[0, 1, 1], &[1, 1, 0]],
            TetrominoKind::T => &[&[0, 1, 0], &[1, 1, 1]],
            TetrominoKind::Z => &[&[1, 1, 0], &[0, 1, 1]],
        };
        Shape::from_rows(rows)
    }

    /// Shape after `rotation` clockwise quarter turns
    pub fn shape(self, rotation: Rotation) -> Shape {
        (0..rotation.index()).fold(self.base_shape(), |shape, _| rotate_clockwise(&shape))
    }
}

/// Clockwise rotation index, 0..=3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rotation(u8);

impl Rotation {
    /// Any index is accepted and taken modulo 4
    pub fn new(index: u32) -> Self {
        Rotation((index % 4) as u8)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn clockwise(self) -> Self {
        Rotation((self.0 + 1) % 4)
    }
}

/// Occupancy matrix, rows top to bottom
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    rows: Vec<Vec<bool>>,
}

impl Shape {
    pub fn from_rows(rows: &[&[u8]]) -> Self {
        Shape {
            rows: rows
                .iter()
                .map(|row| row.iter().map(|&cell| cell != 0).collect())
                .collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.rows.first().map(|row| row.len()).unwrap_or(0)
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn is_filled(&self, x: usize, y: usize) -> bool {
        self.rows
            .get(y)
            .and_then(|row| row.get(x))
            .copied()
            .unwrap_or(false)
    }

    /// Offsets `(dx, dy)` of the occupied cells
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.rows.iter().enumerate().flat_map(|(y, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, filled)| **filled)
                .map(move |(x, _)| (x as i32, y as i32))
        })
    }
}

/// Transpose then reverse each row
pub fn rotate_clockwise(shape: &Shape) -> Shape {
    let height = shape.height();
    let rows = (0..shape.width())
        .map(|x| (0..height).rev().map(|y| shape.is_filled(x, y)).collect())
        .collect();
    Shape { rows }
}
