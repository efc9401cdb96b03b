//! Combat log references must name units on the battlefield

use super::Violation;
use crate::battle::BattlefieldState;

pub struct EventValidator;

impl EventValidator {
    pub fn validate(candidate: &BattlefieldState) -> Vec<Violation> {
        candidate
            .events()
            .iter()
            .enumerate()
            .flat_map(move |(index, event)| {
                event
                    .referenced_units()
                    .filter(move |id| candidate.unit(id).is_none())
                    .map(move |id| Violation::UnknownEventUnit {
                        event: index,
                        unit: id.clone(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::{CellCoord, CombatAction, CombatEvent, TerrainGrid, Unit};
    use crate::core::types::{Faction, UnitId};

    #[test]
    fn test_event_with_unknown_target() {
        let state = BattlefieldState::initial(
            TerrainGrid::new(5, 5),
            vec![Unit::new("A", Faction::blue(), CellCoord::new(0, 0))],
        )
        .with_events(vec![CombatEvent {
            source: UnitId::new("A"),
            target: Some(UnitId::new("GHOST")),
            action: CombatAction::Fire,
            details: "Fired on suspected position".into(),
            outcome: Some("Missed".into()),
        }]);

        assert_eq!(
            EventValidator::validate(&state),
            vec![Violation::UnknownEventUnit {
                event: 0,
                unit: UnitId::new("GHOST")
            }]
        );
    }

    #[test]
    fn test_no_events_passes() {
        let state = BattlefieldState::initial(TerrainGrid::new(5, 5), Vec::new());
        assert!(EventValidator::validate(&state).is_empty());
    }
}
