//! Grid coordinates and a dense square grid keyed by linear index.
//!
//! North is `+y`, east is `+x`. An agent with `x >= size` has left the grid
//! through the east edge.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Neighbouring tile one step in `dir`. May lie outside the grid.
    #[inline]
    pub fn step(self, dir: Direction) -> Coord {
        let (dx, dy) = dir.delta();
        Coord::new(self.x + dx, self.y + dy)
    }

    #[inline]
    pub fn manhattan(self, other: Coord) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    #[inline]
    pub fn euclidean(self, other: Coord) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<(i32, i32)> for Coord {
    fn from((x, y): (i32, i32)) -> Self {
        Coord::new(x, y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// Action order shared by moves and pushes.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    #[inline]
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, 1),
            Direction::South => (0, -1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::South => 1,
            Direction::East => 2,
            Direction::West => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Direction> {
        Direction::ALL.get(index).copied()
    }
}

/// Dense `size × size` grid addressed by coordinate or linear index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid<T> {
    size: i32,
    cells: Vec<T>,
}

impl<T: Clone> Grid<T> {
    pub fn new(size: i32, fill: T) -> Self {
        let n = (size.max(0) as usize).pow(2);
        Self {
            size,
            cells: vec![fill; n],
        }
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    #[inline]
    pub fn inside(&self, c: Coord) -> bool {
        c.x >= 0 && c.y >= 0 && c.x < self.size && c.y < self.size
    }

    #[inline]
    pub fn index(&self, c: Coord) -> Option<usize> {
        self.inside(c)
            .then(|| (c.y as usize) * (self.size as usize) + c.x as usize)
    }

    pub fn coord(&self, index: usize) -> Coord {
        let size = self.size as usize;
        Coord::new((index % size) as i32, (index / size) as i32)
    }

    pub fn get(&self, c: Coord) -> Option<&T> {
        self.index(c).map(|i| &self.cells[i])
    }

    /// Writes `value` at `c`; returns false when `c` is off-grid.
    pub fn set(&mut self, c: Coord, value: T) -> bool {
        match self.index(c) {
            Some(i) => {
                self.cells[i] = value;
                true
            }
            None => false,
        }
    }

    pub fn coords(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..self.cells.len()).map(|i| self.coord(i))
    }
}
