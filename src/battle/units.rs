//! Units and the combat events that describe a turn
//!
//! A unit keeps its identity for the whole scenario. Destroyed units stay in
//! the state with zero health so history remains queryable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::battle::coord::CellCoord;
use crate::core::types::{Faction, UnitId};

/// Default health ceiling (health is a percentage in generated scenarios)
pub const DEFAULT_MAX_HEALTH: u32 = 100;

fn default_health() -> u32 {
    DEFAULT_MAX_HEALTH
}

fn default_range() -> u32 {
    1
}

fn default_status() -> String {
    "Active".into()
}

/// A unit on the battlefield at one turn
///
/// Also reads the flat generator shape (`unit_id`, `side`, `type`, `x`, `y`),
/// where `x` is the column and `y` the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UnitRecord")]
pub struct Unit {
    pub id: UnitId,
    pub faction: Faction,
    /// Unit type as named by the generator ("Infantry", "Tank", ...)
    #[serde(default)]
    pub kind: String,
    pub position: CellCoord,
    #[serde(default = "default_health")]
    pub health: u32,
    #[serde(default = "default_health")]
    pub max_health: u32,
    /// Effective firing range in cells
    #[serde(default = "default_range")]
    pub range: u32,
    /// Free-text tactical status ("Moving", "Engaged", "Digging In")
    #[serde(default = "default_status")]
    pub status: String,
    /// Capability tags (mobility class, stacking, repair, amphibious)
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
}

impl Unit {
    pub fn new(id: impl Into<UnitId>, faction: Faction, position: CellCoord) -> Self {
        Self {
            id: id.into(),
            faction,
            kind: String::new(),
            position,
            health: DEFAULT_MAX_HEALTH,
            max_health: DEFAULT_MAX_HEALTH,
            range: default_range(),
            status: default_status(),
            capabilities: BTreeSet::new(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_health(mut self, health: u32, max_health: u32) -> Self {
        self.health = health;
        self.max_health = max_health;
        self
    }

    pub fn with_capability(mut self, tag: impl Into<String>) -> Self {
        self.capabilities.insert(tag.into());
        self
    }

    /// Copy of this unit at another cell
    pub fn moved_to(&self, position: CellCoord) -> Self {
        Self {
            position,
            ..self.clone()
        }
    }

    /// Zero health means destroyed; the unit is kept, never removed
    pub fn is_destroyed(&self) -> bool {
        self.health == 0
    }

    pub fn is_alive(&self) -> bool {
        !self.is_destroyed()
    }

    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c.eq_ignore_ascii_case(tag))
    }
}

/// Accepted input shapes for a unit
#[derive(Deserialize)]
struct UnitRecord {
    #[serde(alias = "unit_id")]
    id: UnitId,
    #[serde(alias = "side")]
    faction: Faction,
    #[serde(default, alias = "type")]
    kind: String,
    #[serde(default)]
    position: Option<CellCoord>,
    #[serde(default)]
    x: Option<i32>,
    #[serde(default)]
    y: Option<i32>,
    #[serde(default = "default_health")]
    health: u32,
    #[serde(default = "default_health")]
    max_health: u32,
    #[serde(default = "default_range")]
    range: u32,
    #[serde(default = "default_status")]
    status: String,
    #[serde(default)]
    capabilities: BTreeSet<String>,
}

impl TryFrom<UnitRecord> for Unit {
    type Error = String;

    fn try_from(record: UnitRecord) -> Result<Self, Self::Error> {
        let position = match (record.position, record.x, record.y) {
            (Some(position), None, None) => position,
            (None, Some(x), Some(y)) => CellCoord::new(y, x),
            (None, _, _) => return Err(format!("unit {} has no position", record.id)),
            (Some(_), _, _) => {
                return Err(format!(
                    "unit {} gives both a position and x/y coordinates",
                    record.id
                ))
            }
        };
        Ok(Self {
            id: record.id,
            faction: record.faction,
            kind: record.kind,
            position,
            health: record.health,
            max_health: record.max_health,
            range: record.range,
            status: record.status,
            capabilities: record.capabilities,
        })
    }
}

/// Kind of action recorded in a turn's combat log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatAction {
    Move,
    Fire,
    Suppression,
    Retreat,
    Reinforce,
    Intel,
}

/// One tactical event narrated for a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatEvent {
    #[serde(alias = "source_unit_id")]
    pub source: UnitId,
    #[serde(default, alias = "target_unit_id")]
    pub target: Option<UnitId>,
    #[serde(alias = "action_type")]
    pub action: CombatAction,
    pub details: String,
    #[serde(default)]
    pub outcome: Option<String>,
}

impl CombatEvent {
    /// Unit ids this event refers to
    pub fn referenced_units(&self) -> impl Iterator<Item = &UnitId> {
        std::iter::once(&self.source).chain(self.target.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_unit_defaults() {
        let unit = Unit::new("A", Faction::blue(), CellCoord::new(2, 2));
        assert_eq!(unit.health, 100);
        assert_eq!(unit.max_health, 100);
        assert!(unit.is_alive());
    }

    #[test]
    fn test_zero_health_is_destroyed() {
        let unit = Unit::new("A", Faction::red(), CellCoord::new(0, 0)).with_health(0, 10);
        assert!(unit.is_destroyed());
    }

    #[test]
    fn test_moved_to_keeps_identity() {
        let unit = Unit::new("A", Faction::blue(), CellCoord::new(2, 2)).with_capability("armor");
        let moved = unit.moved_to(CellCoord::new(2, 3));
        assert_eq!(moved.id, unit.id);
        assert_eq!(moved.position, CellCoord::new(2, 3));
        assert_eq!(unit.position, CellCoord::new(2, 2));
        assert!(moved.has_capability("Armor"));
    }

    #[test]
    fn test_deserialize_minimal_unit() {
        let unit: Unit = serde_json::from_str(
            r#"{"id":"B-1","faction":"Red","position":{"row":1,"col":4}}"#,
        )
        .unwrap();
        assert_eq!(unit.health, 100);
        assert_eq!(unit.status, "Active");
        assert!(unit.capabilities.is_empty());
    }

    #[test]
    fn test_deserialize_flat_generator_unit() {
        let unit: Unit = serde_json::from_str(
            r#"{"unit_id":"R-2","side":"Red","type":"Tank","x":7,"y":3,"health":80}"#,
        )
        .unwrap();
        assert_eq!(unit.id, UnitId::new("R-2"));
        assert_eq!(unit.faction, Faction::red());
        assert_eq!(unit.kind, "Tank");
        assert_eq!(unit.position, CellCoord::new(3, 7));
        assert_eq!(unit.health, 80);
    }

    #[test]
    fn test_unit_without_coordinates_rejected() {
        let err = serde_json::from_str::<Unit>(r#"{"unit_id":"R-2","side":"Red","x":7}"#)
            .unwrap_err();
        assert!(err.to_string().contains("R-2 has no position"));

        let both = r#"{"id":"A","faction":"Blue","position":{"row":1,"col":1},"x":1,"y":1}"#;
        assert!(serde_json::from_str::<Unit>(both).is_err());
    }

    #[test]
    fn test_serialized_unit_reads_back() {
        let unit = Unit::new("A", Faction::blue(), CellCoord::new(4, 1))
            .with_kind("Recon")
            .with_capability("recon");
        let json = serde_json::to_string(&unit).unwrap();
        assert_eq!(serde_json::from_str::<Unit>(&json).unwrap(), unit);
    }

    #[test]
    fn test_deserialize_flat_generator_event() {
        let event: CombatEvent = serde_json::from_str(
            r#"{"source_unit_id":"B-1","target_unit_id":"R-1","action_type":"Fire",
                "details":"Fired 120mm shell","outcome":"Target Hit (15 dmg)"}"#,
        )
        .unwrap();
        assert_eq!(event.source, UnitId::new("B-1"));
        assert_eq!(event.target, Some(UnitId::new("R-1")));
        assert_eq!(event.action, CombatAction::Fire);
    }

    #[test]
    fn test_event_references() {
        let event = CombatEvent {
            source: UnitId::new("A"),
            target: Some(UnitId::new("B")),
            action: CombatAction::Fire,
            details: "Fired 120mm shell".into(),
            outcome: None,
        };
        let refs: Vec<_> = event.referenced_units().map(|u| u.as_str()).collect();
        assert_eq!(refs, vec!["A", "B"]);
    }
}
