//! Battlefield model - grid, terrain, units, and per-turn snapshots
//!
//! Everything here is plain data. Snapshots are immutable; advancing a turn
//! always builds a new `BattlefieldState`.

pub mod coord;
pub mod grid;
pub mod state;
pub mod terrain;
pub mod units;

// Re-exports for convenient access
pub use coord::CellCoord;
pub use grid::TerrainGrid;
pub use state::BattlefieldState;
pub use terrain::TerrainType;
pub use units::{CombatAction, CombatEvent, Unit, DEFAULT_MAX_HEALTH};
