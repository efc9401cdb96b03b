//! Candidate payloads returned by a gateway
//!
//! A payload is untrusted. Converting it into a `BattlefieldState` only
//! catches what the state shape itself cannot express (duplicate ids,
//! dangling reinforcement declarations); everything else is the
//! validator's job.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::battle::{BattlefieldState, CombatEvent, TerrainGrid, Unit};
use crate::core::types::UnitId;
use crate::validation::Violation;

/// Proposed contents of the next turn
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CandidatePayload {
    /// Narrative of the maneuver
    #[serde(default, alias = "frame_description")]
    pub description: String,
    #[serde(alias = "unit_positions")]
    pub units: Vec<Unit>,
    /// Replacement terrain; `None` keeps the predecessor's grid
    #[serde(default, alias = "terrain_map")]
    pub terrain: Option<TerrainGrid>,
    /// Ids of units introduced this turn
    #[serde(default)]
    pub reinforcements: Vec<UnitId>,
    #[serde(default)]
    pub combat_log: Vec<CombatEvent>,
}

impl CandidatePayload {
    /// Payload describing exactly `state` (terrain included)
    pub fn from_state(state: &BattlefieldState) -> Self {
        Self {
            description: state.narrative().unwrap_or_default().to_owned(),
            units: state.units().cloned().collect(),
            terrain: Some(state.terrain().as_ref().clone()),
            reinforcements: state.reinforcements().iter().cloned().collect(),
            combat_log: state.events().to_vec(),
        }
    }

    /// Build the candidate that would follow `predecessor`
    ///
    /// Terrain equal to the predecessor's keeps sharing its allocation.
    pub fn into_state(self, predecessor: &BattlefieldState) -> Result<BattlefieldState, Vec<Violation>> {
        let terrain = match self.terrain {
            Some(grid) if grid != **predecessor.terrain() => Arc::new(grid),
            _ => Arc::clone(predecessor.terrain()),
        };
        let base = BattlefieldState::new(predecessor.turn() + 1, terrain);
        Self::assemble(
            base,
            self.units,
            self.reinforcements,
            self.description,
            self.combat_log,
        )
    }

    /// Build a turn-0 state; the payload must carry terrain
    pub fn into_root_state(self) -> Result<BattlefieldState, Vec<Violation>> {
        let Some(grid) = self.terrain else {
            return Err(vec![Violation::MalformedPayload {
                reason: "initial scenario has no terrain".into(),
            }]);
        };
        let base = BattlefieldState::new(0, Arc::new(grid));
        Self::assemble(
            base,
            self.units,
            self.reinforcements,
            self.description,
            self.combat_log,
        )
    }

    fn assemble(
        base: BattlefieldState,
        units: Vec<Unit>,
        reinforcements: Vec<UnitId>,
        description: String,
        combat_log: Vec<CombatEvent>,
    ) -> Result<BattlefieldState, Vec<Violation>> {
        let declared: BTreeSet<UnitId> = reinforcements.into_iter().collect();
        let mut violations = Vec::new();
        let mut seen = BTreeSet::new();
        let mut state = base;

        for unit in units {
            if !seen.insert(unit.id.clone()) {
                violations.push(Violation::DuplicateUnit { unit: unit.id });
                continue;
            }
            state = if declared.contains(&unit.id) {
                state.with_reinforcement(unit)
            } else {
                state.with_unit(unit)
            };
        }

        for id in declared.iter().filter(|id| !seen.contains(*id)) {
            violations.push(Violation::MalformedPayload {
                reason: format!("reinforcement {} is not among the units", id),
            });
        }

        if !violations.is_empty() {
            return Err(violations);
        }

        if !description.trim().is_empty() {
            state = state.with_narrative(description);
        }
        Ok(state.with_events(combat_log))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::{CellCoord, TerrainType};
    use crate::core::types::Faction;

    fn predecessor() -> BattlefieldState {
        BattlefieldState::initial(
            TerrainGrid::new(5, 5),
            vec![Unit::new("A", Faction::blue(), CellCoord::new(2, 2))],
        )
    }

    #[test]
    fn test_into_state_advances_turn_and_shares_terrain() {
        let prev = predecessor();
        let payload = CandidatePayload {
            description: "A pushes east".into(),
            units: vec![Unit::new("A", Faction::blue(), CellCoord::new(2, 3))],
            terrain: Some(TerrainGrid::new(5, 5)),
            ..Default::default()
        };
        let next = payload.into_state(&prev).unwrap();
        assert_eq!(next.turn(), 1);
        assert!(next.shares_terrain_with(&prev));
        assert_eq!(next.narrative(), Some("A pushes east"));
    }

    #[test]
    fn test_changed_terrain_gets_new_allocation() {
        let prev = predecessor();
        let payload = CandidatePayload {
            units: vec![Unit::new("A", Faction::blue(), CellCoord::new(2, 2))],
            terrain: Some(TerrainGrid::filled(5, 5, TerrainType::Forest)),
            ..Default::default()
        };
        let next = payload.into_state(&prev).unwrap();
        assert!(!next.shares_terrain_with(&prev));
        assert_eq!(next.terrain_at(CellCoord::new(0, 0)), Some(TerrainType::Forest));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let payload = CandidatePayload {
            units: vec![
                Unit::new("A", Faction::blue(), CellCoord::new(2, 2)),
                Unit::new("A", Faction::blue(), CellCoord::new(3, 3)),
            ],
            ..Default::default()
        };
        assert_eq!(
            payload.into_state(&predecessor()).unwrap_err(),
            vec![Violation::DuplicateUnit {
                unit: UnitId::new("A")
            }]
        );
    }

    #[test]
    fn test_reinforcement_flagged() {
        let payload = CandidatePayload {
            units: vec![
                Unit::new("A", Faction::blue(), CellCoord::new(2, 2)),
                Unit::new("B", Faction::blue(), CellCoord::new(0, 0)),
            ],
            reinforcements: vec![UnitId::new("B")],
            ..Default::default()
        };
        let next = payload.into_state(&predecessor()).unwrap();
        assert!(next.is_reinforcement(&UnitId::new("B")));
        assert!(!next.is_reinforcement(&UnitId::new("A")));
    }

    #[test]
    fn test_dangling_reinforcement_rejected() {
        let payload = CandidatePayload {
            units: vec![Unit::new("A", Faction::blue(), CellCoord::new(2, 2))],
            reinforcements: vec![UnitId::new("Z")],
            ..Default::default()
        };
        let violations = payload.into_state(&predecessor()).unwrap_err();
        assert!(matches!(violations[0], Violation::MalformedPayload { .. }));
    }

    #[test]
    fn test_root_requires_terrain() {
        assert!(CandidatePayload::default().into_root_state().is_err());
    }

    #[test]
    fn test_reads_frame_field_aliases() {
        let json = r#"{
            "frame_description": "Red scouts the forest",
            "unit_positions": [
                {"id": "R-1", "faction": "Red", "position": {"row": 1, "col": 1}}
            ],
            "terrain_map": [[0, 3], [1, 2]]
        }"#;
        let payload: CandidatePayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.units.len(), 1);
        assert_eq!(payload.units[0].health, 100);
        let root = payload.into_root_state().unwrap();
        assert_eq!(root.terrain_at(CellCoord::new(1, 0)), Some(TerrainType::Water));
        assert_eq!(root.narrative(), Some("Red scouts the forest"));
    }

    #[test]
    fn test_reads_flat_generator_frame() {
        let json = r#"{
            "frame_description": "Blue fixes Red at the ford",
            "unit_positions": [
                {"unit_id": "B-1", "side": "Blue", "type": "Infantry", "x": 4, "y": 1},
                {"unit_id": "R-1", "side": "Red", "type": "Tank", "x": 0, "y": 0, "health": 60}
            ],
            "combat_log": [
                {"source_unit_id": "B-1", "target_unit_id": "R-1", "action_type": "Suppression",
                 "details": "Pinned the tank", "outcome": null}
            ],
            "terrain_map": [[0, 0, 0, 0, 0], [0, 0, 1, 0, 0]]
        }"#;
        let payload: CandidatePayload = serde_json::from_str(json).unwrap();
        let root = payload.into_root_state().unwrap();
        assert_eq!(
            root.unit(&UnitId::new("B-1")).unwrap().position,
            CellCoord::new(1, 4)
        );
        assert_eq!(root.unit(&UnitId::new("R-1")).unwrap().health, 60);
        assert_eq!(root.events()[0].source, UnitId::new("B-1"));
        assert_eq!(root.terrain_at(CellCoord::new(1, 2)), Some(TerrainType::Water));
    }

    #[test]
    fn test_from_state_round_trips() {
        let prev = predecessor();
        let payload = CandidatePayload::from_state(&prev);
        let rebuilt = payload.into_root_state().unwrap();
        assert_eq!(rebuilt, prev);
    }
}
