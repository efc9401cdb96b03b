//! Terrain grid for the battlefield
//!
//! Stored as the row-major matrix the generator emits. Rows are not forced to
//! equal length here; dimension checks belong to the validator.

use serde::{Deserialize, Serialize};

use crate::battle::coord::CellCoord;
use crate::battle::terrain::TerrainType;

/// Terrain classification for every cell of the battlefield
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TerrainGrid {
    rows: Vec<Vec<TerrainType>>,
}

impl TerrainGrid {
    /// Create a grid filled with open terrain
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, TerrainType::Open)
    }

    pub fn filled(width: u32, height: u32, terrain: TerrainType) -> Self {
        Self {
            rows: vec![vec![terrain; width as usize]; height as usize],
        }
    }

    pub fn from_rows(rows: Vec<Vec<TerrainType>>) -> Self {
        Self { rows }
    }

    /// Build from raw integer codes (unknown codes become `Undefined`)
    pub fn from_codes(codes: &[Vec<u8>]) -> Self {
        Self {
            rows: codes
                .iter()
                .map(|row| row.iter().map(|&c| TerrainType::from_code(c)).collect())
                .collect(),
        }
    }

    pub fn rows(&self) -> &[Vec<TerrainType>] {
        &self.rows
    }

    /// Number of rows
    pub fn height(&self) -> u32 {
        self.rows.len() as u32
    }

    /// Width of the first row (0 for an empty grid)
    pub fn width(&self) -> u32 {
        self.rows.first().map(|r| r.len() as u32).unwrap_or(0)
    }

    /// Does every row have the same width?
    pub fn is_rectangular(&self) -> bool {
        let width = self.width() as usize;
        self.rows.iter().all(|r| r.len() == width)
    }

    pub fn get(&self, coord: CellCoord) -> Option<TerrainType> {
        if coord.row < 0 || coord.col < 0 {
            return None;
        }
        self.rows
            .get(coord.row as usize)
            .and_then(|row| row.get(coord.col as usize))
            .copied()
    }

    /// Copy of this grid with one cell replaced (no-op when out of range)
    pub fn with_cell(&self, coord: CellCoord, terrain: TerrainType) -> Self {
        let mut grid = self.clone();
        if coord.row >= 0 && coord.col >= 0 {
            if let Some(cell) = grid
                .rows
                .get_mut(coord.row as usize)
                .and_then(|row| row.get_mut(coord.col as usize))
            {
                *cell = terrain;
            }
        }
        grid
    }

    /// Iterate all cells with their coordinates
    pub fn cells(&self) -> impl Iterator<Item = (CellCoord, TerrainType)> + '_ {
        self.rows.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .map(move |(c, t)| (CellCoord::new(r as i32, c as i32), *t))
        })
    }

    /// Raw integer codes, row-major
    pub fn to_codes(&self) -> Vec<Vec<u8>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|t| t.code()).collect())
            .collect()
    }
}
