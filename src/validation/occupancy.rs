//! Occupancy validation: at most one living unit per cell unless all may stack

use ahash::AHashMap;

use super::Violation;
use crate::battle::{BattlefieldState, CellCoord, Unit};
use crate::core::config::RuleConfig;

pub struct OccupancyValidator;

impl OccupancyValidator {
    pub fn validate(candidate: &BattlefieldState, rules: &RuleConfig) -> Vec<Violation> {
        let mut cells: AHashMap<CellCoord, Vec<&Unit>> = AHashMap::new();
        for unit in candidate.live_units() {
            cells.entry(unit.position).or_default().push(unit);
        }

        let mut errors: Vec<Violation> = cells
            .into_iter()
            .filter(|(_, units)| units.len() > 1)
            .filter(|(_, units)| !units.iter().all(|u| rules.permits_stacking(&u.capabilities)))
            .map(|(position, units)| {
                let mut ids: Vec<_> = units.iter().map(|u| u.id.clone()).collect();
                ids.sort();
                Violation::CellCollision {
                    position,
                    units: ids,
                }
            })
            .collect();

        // Hash order is unstable; feedback must be deterministic
        errors.sort_by_key(|e| match e {
            Violation::CellCollision { position, .. } => *position,
            _ => CellCoord::default(),
        });
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::TerrainGrid;
    use crate::core::types::{Faction, UnitId};

    fn state(units: Vec<Unit>) -> BattlefieldState {
        BattlefieldState::initial(TerrainGrid::new(5, 5), units)
    }

    #[test]
    fn test_two_units_same_cell_rejected() {
        let state = state(vec![
            Unit::new("A", Faction::blue(), CellCoord::new(1, 1)),
            Unit::new("B", Faction::red(), CellCoord::new(1, 1)),
        ]);
        assert_eq!(
            OccupancyValidator::validate(&state, &RuleConfig::default()),
            vec![Violation::CellCollision {
                position: CellCoord::new(1, 1),
                units: vec![UnitId::new("A"), UnitId::new("B")],
            }]
        );
    }

    #[test]
    fn test_stacking_requires_both_tags() {
        let one_tagged = state(vec![
            Unit::new("A", Faction::blue(), CellCoord::new(1, 1)).with_capability("embarked"),
            Unit::new("B", Faction::blue(), CellCoord::new(1, 1)),
        ]);
        assert_eq!(
            OccupancyValidator::validate(&one_tagged, &RuleConfig::default()).len(),
            1
        );

        let both_tagged = state(vec![
            Unit::new("A", Faction::blue(), CellCoord::new(1, 1)).with_capability("embarked"),
            Unit::new("B", Faction::blue(), CellCoord::new(1, 1)).with_capability("transported"),
        ]);
        assert!(OccupancyValidator::validate(&both_tagged, &RuleConfig::default()).is_empty());
    }

    #[test]
    fn test_destroyed_units_do_not_collide() {
        let state = state(vec![
            Unit::new("A", Faction::blue(), CellCoord::new(1, 1)).with_health(0, 100),
            Unit::new("B", Faction::red(), CellCoord::new(1, 1)),
        ]);
        assert!(OccupancyValidator::validate(&state, &RuleConfig::default()).is_empty());
    }

    #[test]
    fn test_collisions_sorted_by_cell() {
        let state = state(vec![
            Unit::new("A", Faction::blue(), CellCoord::new(3, 3)),
            Unit::new("B", Faction::red(), CellCoord::new(3, 3)),
            Unit::new("C", Faction::blue(), CellCoord::new(0, 4)),
            Unit::new("D", Faction::red(), CellCoord::new(0, 4)),
        ]);
        let errors = OccupancyValidator::validate(&state, &RuleConfig::default());
        assert!(matches!(
            errors[0],
            Violation::CellCollision { position: CellCoord { row: 0, col: 4 }, .. }
        ));
        assert_eq!(errors.len(), 2);
    }
}
