//! Terrain placement: living ground units must stand on passable terrain

use super::Violation;
use crate::battle::BattlefieldState;
use crate::core::config::RuleConfig;

pub struct PlacementValidator;

impl PlacementValidator {
    pub fn validate(candidate: &BattlefieldState, rules: &RuleConfig) -> Vec<Violation> {
        if !rules.enforce_terrain {
            return Vec::new();
        }

        candidate
            .live_units()
            .filter(|unit| !rules.is_amphibious(&unit.capabilities))
            .filter_map(|unit| {
                let terrain = candidate.terrain_at(unit.position)?;
                (!terrain.passable_on_foot()).then(|| Violation::ImpassableTerrain {
                    unit: unit.id.clone(),
                    position: unit.position,
                    terrain: terrain.name().to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::{CellCoord, TerrainGrid, TerrainType, Unit};
    use crate::core::types::Faction;

    fn lake() -> TerrainGrid {
        TerrainGrid::new(20, 20).with_cell(CellCoord::new(1, 1), TerrainType::Water)
    }

    #[test]
    fn test_unit_in_water_rejected() {
        let state = BattlefieldState::initial(
            lake(),
            vec![Unit::new("U1", Faction::red(), CellCoord::new(1, 1)).with_kind("Infantry")],
        );
        let errors = PlacementValidator::validate(&state, &RuleConfig::default());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("impassable Water"));
    }

    #[test]
    fn test_amphibious_unit_may_swim() {
        let state = BattlefieldState::initial(
            lake(),
            vec![Unit::new("U1", Faction::red(), CellCoord::new(1, 1)).with_capability("amphibious")],
        );
        assert!(PlacementValidator::validate(&state, &RuleConfig::default()).is_empty());
    }

    #[test]
    fn test_wreck_in_water_ignored() {
        let state = BattlefieldState::initial(
            lake(),
            vec![Unit::new("U1", Faction::red(), CellCoord::new(1, 1)).with_health(0, 100)],
        );
        assert!(PlacementValidator::validate(&state, &RuleConfig::default()).is_empty());
    }

    #[test]
    fn test_disabled_by_config() {
        let state = BattlefieldState::initial(
            lake(),
            vec![Unit::new("U1", Faction::red(), CellCoord::new(1, 1))],
        );
        let rules = RuleConfig {
            enforce_terrain: false,
            ..RuleConfig::default()
        };
        assert!(PlacementValidator::validate(&state, &rules).is_empty());
    }
}
