//! Continuity validation: movement budgets and destroyed-unit permanence

use super::Violation;
use crate::battle::BattlefieldState;
use crate::core::config::MovementConfig;

pub struct ContinuityValidator;

impl ContinuityValidator {
    /// Check every unit present in both states
    ///
    /// The budget comes from the unit's capabilities at the start of the turn,
    /// so a candidate cannot buy extra movement by adding a mobility tag.
    pub fn validate(
        candidate: &BattlefieldState,
        predecessor: &BattlefieldState,
        movement: &MovementConfig,
    ) -> Vec<Violation> {
        let mut errors = Vec::new();

        for unit in candidate.units() {
            let Some(previous) = predecessor.unit(&unit.id) else {
                continue;
            };

            let distance = previous.position.distance(&unit.position);

            if previous.is_destroyed() {
                if unit.is_alive() {
                    errors.push(Violation::UnitRevived {
                        unit: unit.id.clone(),
                    });
                }
                if distance > 0 {
                    errors.push(Violation::DestroyedUnitMoved {
                        unit: unit.id.clone(),
                        from: previous.position,
                        to: unit.position,
                    });
                }
                continue;
            }

            let budget = movement.budget_for(&previous.capabilities);
            if distance > budget {
                errors.push(Violation::ExcessiveMovement {
                    unit: unit.id.clone(),
                    from: previous.position,
                    to: unit.position,
                    distance,
                    budget,
                });
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::{CellCoord, TerrainGrid, Unit};
    use crate::core::types::{Faction, UnitId};

    fn state_with(unit: Unit) -> BattlefieldState {
        BattlefieldState::initial(TerrainGrid::new(10, 10), vec![unit])
    }

    fn moved(prev: &BattlefieldState, to: CellCoord) -> BattlefieldState {
        prev.successor()
            .with_unit_moved(&UnitId::new("A"), to)
            .expect("unit A exists")
    }

    #[test]
    fn test_single_step_within_default_budget() {
        let prev = state_with(Unit::new("A", Faction::blue(), CellCoord::new(2, 2)));
        let next = moved(&prev, CellCoord::new(2, 3));
        assert!(ContinuityValidator::validate(&next, &prev, &MovementConfig::default()).is_empty());
    }

    #[test]
    fn test_excessive_move_rejected() {
        let prev = state_with(Unit::new("A", Faction::blue(), CellCoord::new(2, 2)));
        let next = moved(&prev, CellCoord::new(4, 4));
        let errors = ContinuityValidator::validate(&next, &prev, &MovementConfig::default());
        assert_eq!(
            errors,
            vec![Violation::ExcessiveMovement {
                unit: UnitId::new("A"),
                from: CellCoord::new(2, 2),
                to: CellCoord::new(4, 4),
                distance: 2,
                budget: 1,
            }]
        );
    }

    #[test]
    fn test_armor_has_larger_budget() {
        let prev = state_with(
            Unit::new("A", Faction::blue(), CellCoord::new(2, 2)).with_capability("armor"),
        );
        let next = moved(&prev, CellCoord::new(5, 4));
        assert!(ContinuityValidator::validate(&next, &prev, &MovementConfig::default()).is_empty());
    }

    #[test]
    fn test_tag_added_mid_turn_does_not_extend_budget() {
        let prev = state_with(Unit::new("A", Faction::blue(), CellCoord::new(2, 2)));
        let next = prev.successor().with_unit(
            Unit::new("A", Faction::blue(), CellCoord::new(5, 2)).with_capability("armor"),
        );
        assert_eq!(
            ContinuityValidator::validate(&next, &prev, &MovementConfig::default()).len(),
            1
        );
    }

    #[test]
    fn test_destroyed_unit_cannot_move_or_revive() {
        let prev = state_with(
            Unit::new("A", Faction::blue(), CellCoord::new(2, 2)).with_health(0, 100),
        );
        let next = prev.successor().with_unit(
            Unit::new("A", Faction::blue(), CellCoord::new(2, 3)).with_health(40, 100),
        );
        let errors = ContinuityValidator::validate(&next, &prev, &MovementConfig::default());
        assert!(errors.contains(&Violation::UnitRevived {
            unit: UnitId::new("A")
        }));
        assert!(errors
            .iter()
            .any(|e| matches!(e, Violation::DestroyedUnitMoved { .. })));
    }

    #[test]
    fn test_stationary_destroyed_unit_passes() {
        let prev = state_with(
            Unit::new("A", Faction::blue(), CellCoord::new(2, 2)).with_health(0, 100),
        );
        assert!(
            ContinuityValidator::validate(&prev.successor(), &prev, &MovementConfig::default())
                .is_empty()
        );
    }
}
