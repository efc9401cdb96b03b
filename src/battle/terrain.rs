//! Terrain classification for grid cells
//!
//! On the wire terrain is an integer code (0 Open, 1 Water, 2 Urban,
//! 3 Forest). Unknown codes decode to `Undefined` so a malformed map reaches
//! the validator instead of failing deserialization.

use serde::{Deserialize, Serialize};

/// Terrain type of a single cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "u8", into = "u8")]
pub enum TerrainType {
    #[default]
    Open,   // Plains, desert
    Water,  // Rivers, lakes; impassable without amphibious capability
    Urban,  // Buildings, towns
    Forest, // Woods, jungle
    Undefined,
}

impl TerrainType {
    /// Code written for cells that carry no defined terrain
    pub const UNDEFINED_CODE: u8 = u8::MAX;

    pub fn code(&self) -> u8 {
        match self {
            TerrainType::Open => 0,
            TerrainType::Water => 1,
            TerrainType::Urban => 2,
            TerrainType::Forest => 3,
            TerrainType::Undefined => Self::UNDEFINED_CODE,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => TerrainType::Open,
            1 => TerrainType::Water,
            2 => TerrainType::Urban,
            3 => TerrainType::Forest,
            _ => TerrainType::Undefined,
        }
    }

    pub fn is_defined(&self) -> bool {
        !matches!(self, TerrainType::Undefined)
    }

    /// Can a ground unit without amphibious capability stand here?
    pub fn passable_on_foot(&self) -> bool {
        matches!(
            self,
            TerrainType::Open | TerrainType::Urban | TerrainType::Forest
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            TerrainType::Open => "Open",
            TerrainType::Water => "Water",
            TerrainType::Urban => "Urban",
            TerrainType::Forest => "Forest",
            TerrainType::Undefined => "Undefined",
        }
    }

    /// Legend used in generator prompts
    pub fn legend() -> &'static str {
        "0: Open Ground (plains, desert), 1: Water (rivers, lakes), \
         2: Urban (buildings, towns), 3: Forest (woods, jungle)"
    }
}

impl From<u8> for TerrainType {
    fn from(code: u8) -> Self {
        Self::from_code(code)
    }
}

impl From<TerrainType> for u8 {
    fn from(terrain: TerrainType) -> Self {
        terrain.code()
    }
}
