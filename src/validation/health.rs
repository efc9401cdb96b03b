//! Health monotonicity: attrition-only unless supply or repair is present

use super::Violation;
use crate::battle::BattlefieldState;
use crate::core::config::RuleConfig;

pub struct HealthValidator;

impl HealthValidator {
    /// Report living units whose health rose without a repair capability
    ///
    /// Revival of destroyed units is a continuity error and is not repeated here.
    pub fn validate(
        candidate: &BattlefieldState,
        predecessor: &BattlefieldState,
        rules: &RuleConfig,
    ) -> Vec<Violation> {
        candidate
            .units()
            .filter_map(|unit| {
                let previous = predecessor.unit(&unit.id)?;
                let gained = previous.is_alive() && unit.health > previous.health;
                let explained = rules.permits_repair(&previous.capabilities)
                    || rules.permits_repair(&unit.capabilities);
                (gained && !explained).then(|| Violation::UnexplainedHealthGain {
                    unit: unit.id.clone(),
                    from: previous.health,
                    to: unit.health,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::{CellCoord, TerrainGrid, Unit};
    use crate::core::types::Faction;

    fn pair(before: Unit, after: Unit) -> (BattlefieldState, BattlefieldState) {
        let prev = BattlefieldState::initial(TerrainGrid::new(5, 5), vec![before]);
        let next = prev.successor().with_unit(after);
        (prev, next)
    }

    #[test]
    fn test_attrition_allowed() {
        let base = Unit::new("A", Faction::blue(), CellCoord::new(0, 0));
        let (prev, next) = pair(base.clone().with_health(80, 100), base.with_health(50, 100));
        assert!(HealthValidator::validate(&next, &prev, &RuleConfig::default()).is_empty());
    }

    #[test]
    fn test_unexplained_gain_reported() {
        let base = Unit::new("A", Faction::blue(), CellCoord::new(0, 0));
        let (prev, next) = pair(base.clone().with_health(50, 100), base.with_health(70, 100));
        assert!(matches!(
            HealthValidator::validate(&next, &prev, &RuleConfig::default())[0],
            Violation::UnexplainedHealthGain { from: 50, to: 70, .. }
        ));
    }

    #[test]
    fn test_repair_tag_explains_gain() {
        let base = Unit::new("A", Faction::blue(), CellCoord::new(0, 0)).with_capability("supply");
        let (prev, next) = pair(base.clone().with_health(50, 100), base.with_health(70, 100));
        assert!(HealthValidator::validate(&next, &prev, &RuleConfig::default()).is_empty());
    }
}
