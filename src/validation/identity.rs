//! Identity integrity: units neither appear nor vanish without an explicit event

use super::Violation;
use crate::battle::BattlefieldState;

pub struct IdentityValidator;

impl IdentityValidator {
    /// Compare unit identities against the predecessor
    ///
    /// New identities must be flagged as reinforcements, reinforcements must
    /// be genuinely new, and no identity may be dropped. A root candidate has
    /// nothing to compare against and always passes.
    pub fn validate(
        candidate: &BattlefieldState,
        predecessor: Option<&BattlefieldState>,
    ) -> Vec<Violation> {
        let Some(previous) = predecessor else {
            return Vec::new();
        };

        let mut errors = Vec::new();

        for id in candidate.unit_ids() {
            let existed = previous.unit(id).is_some();
            let declared = candidate.is_reinforcement(id);

            if !existed && !declared {
                errors.push(Violation::UnexplainedAppearance { unit: id.clone() });
            } else if existed && declared {
                errors.push(Violation::ReinforcementNotNew { unit: id.clone() });
            }
        }

        errors.extend(
            previous
                .unit_ids()
                .filter(|id| candidate.unit(id).is_none())
                .map(|id| Violation::Disappearance { unit: id.clone() }),
        );

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::{CellCoord, TerrainGrid, Unit};
    use crate::core::types::{Faction, UnitId};

    fn root() -> BattlefieldState {
        BattlefieldState::initial(
            TerrainGrid::new(5, 5),
            vec![Unit::new("A", Faction::blue(), CellCoord::new(2, 2))],
        )
    }

    #[test]
    fn test_root_always_passes() {
        assert!(IdentityValidator::validate(&root(), None).is_empty());
    }

    #[test]
    fn test_unexplained_newcomer() {
        let prev = root();
        let next = prev
            .successor()
            .with_unit(Unit::new("B", Faction::red(), CellCoord::new(0, 0)));
        assert_eq!(
            IdentityValidator::validate(&next, Some(&prev)),
            vec![Violation::UnexplainedAppearance {
                unit: UnitId::new("B")
            }]
        );
    }

    #[test]
    fn test_declared_reinforcement_passes() {
        let prev = root();
        let next = prev
            .successor()
            .with_reinforcement(Unit::new("B", Faction::red(), CellCoord::new(0, 0)));
        assert!(IdentityValidator::validate(&next, Some(&prev)).is_empty());
    }

    #[test]
    fn test_reinforcement_must_be_new() {
        let prev = root();
        let next = prev
            .successor()
            .with_reinforcement(Unit::new("A", Faction::blue(), CellCoord::new(2, 2)));
        assert_eq!(
            IdentityValidator::validate(&next, Some(&prev)),
            vec![Violation::ReinforcementNotNew {
                unit: UnitId::new("A")
            }]
        );
    }

    #[test]
    fn test_disappearance() {
        let prev = root();
        let next = prev.successor().without_unit(&UnitId::new("A"));
        assert_eq!(
            IdentityValidator::validate(&next, Some(&prev)),
            vec![Violation::Disappearance {
                unit: UnitId::new("A")
            }]
        );
    }
}
