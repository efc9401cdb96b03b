//! Immutable battlefield snapshots
//!
//! A `BattlefieldState` is never edited in place. Every editor helper returns
//! a new state; terrain is held behind an `Arc` so consecutive turns share it
//! until a proposal explicitly replaces it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::battle::coord::CellCoord;
use crate::battle::grid::TerrainGrid;
use crate::battle::terrain::TerrainType;
use crate::battle::units::{CombatEvent, Unit};
use crate::core::types::{TurnIndex, UnitId};

/// Terrain plus units at one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattlefieldState {
    turn: TurnIndex,
    terrain: Arc<TerrainGrid>,
    units: BTreeMap<UnitId, Unit>,
    /// Units explicitly introduced this turn (the opt-in creation event)
    #[serde(default)]
    reinforcements: BTreeSet<UnitId>,
    #[serde(default)]
    narrative: Option<String>,
    #[serde(default)]
    events: Vec<CombatEvent>,
}

impl BattlefieldState {
    /// Empty state at the given turn
    pub fn new(turn: TurnIndex, terrain: Arc<TerrainGrid>) -> Self {
        Self {
            turn,
            terrain,
            units: BTreeMap::new(),
            reinforcements: BTreeSet::new(),
            narrative: None,
            events: Vec::new(),
        }
    }

    /// Turn-0 state for a new scenario
    pub fn initial(terrain: TerrainGrid, units: impl IntoIterator<Item = Unit>) -> Self {
        units
            .into_iter()
            .fold(Self::new(0, Arc::new(terrain)), |state, unit| state.with_unit(unit))
    }

    /// Reassemble a state from stored parts (document loading)
    pub(crate) fn from_parts(
        turn: TurnIndex,
        terrain: Arc<TerrainGrid>,
        units: BTreeMap<UnitId, Unit>,
        reinforcements: BTreeSet<UnitId>,
        narrative: Option<String>,
        events: Vec<CombatEvent>,
    ) -> Self {
        Self {
            turn,
            terrain,
            units,
            reinforcements,
            narrative,
            events,
        }
    }

    /// Next-turn copy: same terrain (shared) and units, turn + 1, no events
    pub fn successor(&self) -> Self {
        Self {
            turn: self.turn + 1,
            terrain: Arc::clone(&self.terrain),
            units: self.units.clone(),
            reinforcements: BTreeSet::new(),
            narrative: None,
            events: Vec::new(),
        }
    }

    pub fn turn(&self) -> TurnIndex {
        self.turn
    }

    pub fn terrain(&self) -> &Arc<TerrainGrid> {
        &self.terrain
    }

    pub fn terrain_at(&self, coord: CellCoord) -> Option<TerrainType> {
        self.terrain.get(coord)
    }

    /// Do both states reference the very same terrain allocation?
    pub fn shares_terrain_with(&self, other: &BattlefieldState) -> bool {
        Arc::ptr_eq(&self.terrain, &other.terrain)
    }

    pub fn unit(&self, id: &UnitId) -> Option<&Unit> {
        self.units.get(id)
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Units keyed by identity (keys may disagree with `Unit::id` only in
    /// hand-written documents; the validator reports that)
    pub fn unit_map(&self) -> &BTreeMap<UnitId, Unit> {
        &self.units
    }

    pub fn live_units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values().filter(|u| u.is_alive())
    }

    pub fn unit_ids(&self) -> impl Iterator<Item = &UnitId> {
        self.units.keys()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn reinforcements(&self) -> &BTreeSet<UnitId> {
        &self.reinforcements
    }

    pub fn is_reinforcement(&self, id: &UnitId) -> bool {
        self.reinforcements.contains(id)
    }

    pub fn narrative(&self) -> Option<&str> {
        self.narrative.as_deref()
    }

    pub fn events(&self) -> &[CombatEvent] {
        &self.events
    }

    /// Same terrain and units as `other` (narrative and turn ignored)
    pub fn same_battlefield(&self, other: &BattlefieldState) -> bool {
        self.units == other.units && *self.terrain == *other.terrain
    }

    // === Editor operations: each returns a new state ===

    pub fn with_turn(&self, turn: TurnIndex) -> Self {
        Self {
            turn,
            ..self.clone()
        }
    }

    /// Insert or replace a unit by identity
    pub fn with_unit(&self, unit: Unit) -> Self {
        let mut next = self.clone();
        next.units.insert(unit.id.clone(), unit);
        next
    }

    /// Insert a unit and flag it as an explicit reinforcement
    pub fn with_reinforcement(&self, unit: Unit) -> Self {
        let mut next = self.with_unit(unit.clone());
        next.reinforcements.insert(unit.id);
        next
    }

    pub fn without_unit(&self, id: &UnitId) -> Self {
        let mut next = self.clone();
        next.units.remove(id);
        next.reinforcements.remove(id);
        next
    }

    /// Move a unit; `None` when the unit is unknown
    pub fn with_unit_moved(&self, id: &UnitId, to: CellCoord) -> Option<Self> {
        let unit = self.units.get(id)?.moved_to(to);
        Some(self.with_unit(unit))
    }

    pub fn with_terrain(&self, terrain: TerrainGrid) -> Self {
        Self {
            terrain: Arc::new(terrain),
            ..self.clone()
        }
    }

    /// Reuse an existing terrain allocation
    pub fn with_shared_terrain(&self, terrain: Arc<TerrainGrid>) -> Self {
        Self {
            terrain,
            ..self.clone()
        }
    }

    pub fn with_terrain_cell(&self, coord: CellCoord, terrain: TerrainType) -> Self {
        self.with_terrain(self.terrain.with_cell(coord, terrain))
    }

    pub fn with_narrative(&self, narrative: impl Into<String>) -> Self {
        Self {
            narrative: Some(narrative.into()),
            ..self.clone()
        }
    }

    pub fn with_events(&self, events: Vec<CombatEvent>) -> Self {
        Self {
            events,
            ..self.clone()
        }
    }
}
