//! Cell coordinates on the square battle grid
//!
//! Coordinates are signed so that out-of-bounds positions proposed by the
//! generator stay representable until the validator rejects them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// (row, col) coordinate of a grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct CellCoord {
    pub row: i32,
    pub col: i32,
}

impl CellCoord {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Step distance allowing diagonal moves (Chebyshev / king-move metric)
    pub fn distance(&self, other: &Self) -> u32 {
        let dr = (self.row - other.row).unsigned_abs();
        let dc = (self.col - other.col).unsigned_abs();
        dr.max(dc)
    }

    /// Is this coordinate inside a grid of the given size?
    pub fn in_bounds(&self, width: u32, height: u32) -> bool {
        self.row >= 0
            && self.col >= 0
            && (self.row as i64) < height as i64
            && (self.col as i64) < width as i64
    }

    /// All 8 surrounding coordinates (may fall outside the grid)
    pub fn neighbors(&self) -> [CellCoord; 8] {
        [
            CellCoord::new(self.row - 1, self.col - 1),
            CellCoord::new(self.row - 1, self.col),
            CellCoord::new(self.row - 1, self.col + 1),
            CellCoord::new(self.row, self.col - 1),
            CellCoord::new(self.row, self.col + 1),
            CellCoord::new(self.row + 1, self.col - 1),
            CellCoord::new(self.row + 1, self.col),
            CellCoord::new(self.row + 1, self.col + 1),
        ]
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_same() {
        let a = CellCoord::new(2, 2);
        assert_eq!(a.distance(&a), 0);
    }

    #[test]
    fn test_distance_diagonal_counts_one_step() {
        let a = CellCoord::new(2, 2);
        assert_eq!(a.distance(&CellCoord::new(3, 3)), 1);
        assert_eq!(a.distance(&CellCoord::new(4, 4)), 2);
        assert_eq!(a.distance(&CellCoord::new(2, 5)), 3);
    }

    #[test]
    fn test_in_bounds() {
        assert!(CellCoord::new(0, 0).in_bounds(5, 5));
        assert!(CellCoord::new(4, 4).in_bounds(5, 5));
        assert!(!CellCoord::new(5, 0).in_bounds(5, 5));
        assert!(!CellCoord::new(0, -1).in_bounds(5, 5));
    }

    #[test]
    fn test_in_bounds_non_square() {
        // 3 columns wide, 2 rows high
        assert!(CellCoord::new(1, 2).in_bounds(3, 2));
        assert!(!CellCoord::new(2, 1).in_bounds(3, 2));
    }

    #[test]
    fn test_neighbors_all_adjacent() {
        let center = CellCoord::new(3, 3);
        assert!(center.neighbors().iter().all(|n| center.distance(n) == 1));
    }
}
