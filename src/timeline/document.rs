//! Save and load a timeline plus its active pointer as a JSON document
//!
//! Terrain grids are stored once and referenced by index from each state,
//! so states that shared a terrain allocation before saving share one again
//! after loading. Timelines superseded by a terrain regeneration are saved
//! alongside the live one and share the same terrain table.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use crate::battle::{BattlefieldState, CombatEvent, TerrainGrid, Unit};
use crate::core::error::TimelineError;
use crate::core::types::{NodeId, ScenarioId, TurnIndex, UnitId};
use crate::timeline::{SupersededTimeline, Timeline};

/// Current document layout
pub const FORMAT_VERSION: u32 = 1;

type Result<T> = std::result::Result<T, TimelineError>;

/// Identity of a saved scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMeta {
    pub id: ScenarioId,
    #[serde(default)]
    pub title: String,
}

impl ScenarioMeta {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: ScenarioId::new(),
            title: title.into(),
        }
    }
}

/// A battlefield state with its terrain replaced by an index into `terrains`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub turn: TurnIndex,
    pub terrain: usize,
    pub units: BTreeMap<UnitId, Unit>,
    #[serde(default)]
    pub reinforcements: BTreeSet<UnitId>,
    #[serde(default)]
    pub narrative: Option<String>,
    #[serde(default)]
    pub events: Vec<CombatEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub state: StateRecord,
}

/// A superseded timeline in stored form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub nodes: Vec<NodeRecord>,
    pub active: NodeId,
    pub next_id: NodeId,
}

/// Plain structured form of a scenario session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineDocument {
    pub format_version: u32,
    pub scenario: ScenarioMeta,
    pub terrains: Vec<TerrainGrid>,
    pub nodes: Vec<NodeRecord>,
    pub active: NodeId,
    pub next_id: NodeId,
    /// Earlier timelines, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub archive: Vec<ArchiveRecord>,
}

/// Everything a document restores into
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredSession {
    pub timeline: Timeline,
    pub active: NodeId,
    pub scenario: ScenarioMeta,
    pub archive: Vec<SupersededTimeline>,
}

/// Terrain grids interned by allocation
#[derive(Default)]
struct TerrainTable {
    grids: Vec<TerrainGrid>,
    // Keyed by address so Arc identity, not equality, decides sharing
    index: AHashMap<*const TerrainGrid, usize>,
}

impl TerrainTable {
    fn intern(&mut self, grid: &Arc<TerrainGrid>) -> usize {
        let grids = &mut self.grids;
        *self.index.entry(Arc::as_ptr(grid)).or_insert_with(|| {
            grids.push(grid.as_ref().clone());
            grids.len() - 1
        })
    }

    fn records(&mut self, timeline: &Timeline) -> Vec<NodeRecord> {
        timeline
            .nodes()
            .map(|node| {
                let state = node.state();
                NodeRecord {
                    id: node.id(),
                    parent: node.parent(),
                    state: StateRecord {
                        turn: state.turn(),
                        terrain: self.intern(state.terrain()),
                        units: state.unit_map().clone(),
                        reinforcements: state.reinforcements().clone(),
                        narrative: state.narrative().map(str::to_owned),
                        events: state.events().to_vec(),
                    },
                }
            })
            .collect()
    }
}

impl TimelineDocument {
    /// Snapshot a timeline and its active pointer
    pub fn capture(timeline: &Timeline, active: NodeId, scenario: ScenarioMeta) -> Result<Self> {
        Self::capture_session(timeline, active, &[], scenario)
    }

    /// Snapshot a timeline, its active pointer and every superseded timeline
    pub fn capture_session(
        timeline: &Timeline,
        active: NodeId,
        archive: &[SupersededTimeline],
        scenario: ScenarioMeta,
    ) -> Result<Self> {
        timeline.node(active)?;

        let mut table = TerrainTable::default();
        let archive = archive
            .iter()
            .map(|old| ArchiveRecord {
                nodes: table.records(&old.timeline),
                active: old.active,
                next_id: old.timeline.next_id(),
            })
            .collect();
        let nodes = table.records(timeline);

        Ok(Self {
            format_version: FORMAT_VERSION,
            scenario,
            terrains: table.grids,
            nodes,
            active,
            next_id: timeline.next_id(),
            archive,
        })
    }

    /// Rebuild the timelines and active pointers, re-checking every invariant
    pub fn restore(self) -> Result<RestoredSession> {
        if self.format_version != FORMAT_VERSION {
            return Err(TimelineError::CorruptDocument(format!(
                "unsupported format version {}",
                self.format_version
            )));
        }

        let terrains: Vec<Arc<TerrainGrid>> = self.terrains.into_iter().map(Arc::new).collect();

        let mut archive = Vec::with_capacity(self.archive.len());
        for record in self.archive {
            let timeline = rebuild(&terrains, record.nodes, record.next_id, record.active)?;
            archive.push(SupersededTimeline {
                timeline,
                active: record.active,
            });
        }
        let timeline = rebuild(&terrains, self.nodes, self.next_id, self.active)?;

        // Each timeline's ids start at or after the previous one's next id
        let mut floor = NodeId::new(0);
        for current in archive.iter().map(|a| &a.timeline).chain(std::iter::once(&timeline)) {
            let first = current.root().ok_or(TimelineError::MissingRoot)?;
            if first < floor {
                return Err(TimelineError::CorruptDocument(format!(
                    "timeline rooted at {} reuses ids below {}",
                    first, floor
                )));
            }
            floor = current.next_id();
        }

        Ok(RestoredSession {
            timeline,
            active: self.active,
            scenario: self.scenario,
            archive,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        tracing::info!("Saved {} timeline nodes to {}", self.nodes.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let document = Self::from_json(&content)?;
        tracing::info!("Loaded {} timeline nodes from {}", document.nodes.len(), path.display());
        Ok(document)
    }
}

/// Self-consistency of a stored state, independent of any engine configuration
fn rebuild(
    terrains: &[Arc<TerrainGrid>],
    nodes: Vec<NodeRecord>,
    next_id: NodeId,
    active: NodeId,
) -> Result<Timeline> {
    let mut records = Vec::with_capacity(nodes.len());

    for node in nodes {
        let StateRecord {
            turn,
            terrain,
            units,
            reinforcements,
            narrative,
            events,
        } = node.state;
        let grid = terrains.get(terrain).ok_or_else(|| {
            TimelineError::CorruptDocument(format!(
                "node {} references missing terrain {}",
                node.id, terrain
            ))
        })?;
        let state = BattlefieldState::from_parts(
            turn,
            Arc::clone(grid),
            units,
            reinforcements,
            narrative,
            events,
        );
        check_state(node.id, &state)?;
        records.push((node.id, node.parent, state));
    }

    let timeline = Timeline::restore(records, next_id)?;
    if !timeline.contains(active) {
        return Err(TimelineError::CorruptDocument(format!(
            "active node {} is not in the timeline",
            active
        )));
    }
    Ok(timeline)
}

fn check_state(id: NodeId, state: &BattlefieldState) -> Result<()> {
    let corrupt = |msg: String| Err(TimelineError::CorruptDocument(format!("node {}: {}", id, msg)));
    let terrain = state.terrain();

    if !terrain.is_rectangular() {
        return corrupt("terrain rows differ in length".into());
    }
    if let Some((cell, _)) = terrain.cells().find(|(_, t)| !t.is_defined()) {
        return corrupt(format!("undefined terrain at {}", cell));
    }

    for (key, unit) in state.unit_map() {
        if *key != unit.id {
            return corrupt(format!("unit stored under {} claims id {}", key, unit.id));
        }
        if unit.health > unit.max_health {
            return corrupt(format!(
                "unit {} has health {} above {}",
                key, unit.health, unit.max_health
            ));
        }
        if !unit.position.in_bounds(terrain.width(), terrain.height()) {
            return corrupt(format!("unit {} is outside the grid at {}", key, unit.position));
        }
    }

    for id in state.reinforcements() {
        if state.unit(id).is_none() {
            return corrupt(format!("reinforcement {} is not on the battlefield", id));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::{CellCoord, TerrainType};
    use crate::core::types::Faction;

    fn sample() -> (Timeline, NodeId) {
        let mut timeline = Timeline::new();
        let root = timeline
            .commit_root(BattlefieldState::initial(
                TerrainGrid::new(5, 5),
                vec![Unit::new("A", Faction::blue(), CellCoord::new(2, 2))],
            ))
            .unwrap();
        let next = timeline
            .state(root)
            .unwrap()
            .successor()
            .with_unit_moved(&UnitId::new("A"), CellCoord::new(2, 3))
            .unwrap()
            .with_narrative("A advances east");
        let first = timeline.commit(root, next).unwrap();
        let flooded = timeline
            .state(root)
            .unwrap()
            .successor()
            .with_terrain_cell(CellCoord::new(0, 0), TerrainType::Water);
        timeline.commit(root, flooded).unwrap();
        (timeline, first)
    }

    #[test]
    fn test_round_trip_identical() {
        let (timeline, active) = sample();
        let meta = ScenarioMeta::new("Round trip");
        let document = TimelineDocument::capture(&timeline, active, meta.clone()).unwrap();
        let json = document.to_json().unwrap();

        let restored = TimelineDocument::from_json(&json).unwrap().restore().unwrap();
        assert_eq!(restored.timeline, timeline);
        assert_eq!(restored.active, active);
        assert_eq!(restored.scenario, meta);
        assert_eq!(restored.timeline.next_id(), timeline.next_id());
        assert!(restored.archive.is_empty());
        assert!(!json.contains("\"archive\""));
    }

    #[test]
    fn test_terrain_deduplicated_and_shared() {
        let (timeline, active) = sample();
        let document = TimelineDocument::capture(&timeline, active, ScenarioMeta::new("")).unwrap();
        // root and first child share one grid; the flooded sibling has its own
        assert_eq!(document.terrains.len(), 2);

        let restored = document.restore().unwrap().timeline;
        let ids: Vec<_> = restored.nodes().map(|n| n.id()).collect();
        let root = restored.state(ids[0]).unwrap();
        assert!(root.shares_terrain_with(restored.state(ids[1]).unwrap()));
        assert!(!root.shares_terrain_with(restored.state(ids[2]).unwrap()));
    }

    #[test]
    fn test_missing_active_rejected() {
        let (timeline, active) = sample();
        let mut document =
            TimelineDocument::capture(&timeline, active, ScenarioMeta::new("")).unwrap();
        document.active = NodeId::new(77);
        assert!(matches!(
            document.restore(),
            Err(TimelineError::CorruptDocument(_))
        ));
    }

    #[test]
    fn test_bad_terrain_index_rejected() {
        let (timeline, active) = sample();
        let mut document =
            TimelineDocument::capture(&timeline, active, ScenarioMeta::new("")).unwrap();
        document.nodes[1].state.terrain = 9;
        assert!(matches!(
            document.restore(),
            Err(TimelineError::CorruptDocument(_))
        ));
    }

    #[test]
    fn test_broken_turn_sequence_rejected() {
        let (timeline, active) = sample();
        let mut document =
            TimelineDocument::capture(&timeline, active, ScenarioMeta::new("")).unwrap();
        document.nodes[1].state.turn = 4;
        assert!(matches!(
            document.restore(),
            Err(TimelineError::CorruptDocument(_))
        ));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let (timeline, active) = sample();
        let mut document =
            TimelineDocument::capture(&timeline, active, ScenarioMeta::new("")).unwrap();
        document.format_version = 99;
        assert!(document.restore().is_err());
    }

    #[test]
    fn test_capture_unknown_active() {
        let (timeline, _) = sample();
        assert!(matches!(
            TimelineDocument::capture(&timeline, NodeId::new(50), ScenarioMeta::new("")),
            Err(TimelineError::UnknownNode(_))
        ));
    }

    /// Sample timeline superseded by a fresh root on forest terrain
    fn superseded() -> (Vec<SupersededTimeline>, Timeline, NodeId) {
        let (old, old_active) = sample();
        let mut timeline = Timeline::continuing(&old);
        let root = timeline
            .commit_root(BattlefieldState::initial(
                TerrainGrid::filled(5, 5, TerrainType::Forest),
                vec![Unit::new("A", Faction::blue(), CellCoord::new(2, 3))],
            ))
            .unwrap();
        let archive = vec![SupersededTimeline {
            timeline: old,
            active: old_active,
        }];
        (archive, timeline, root)
    }

    #[test]
    fn test_archive_round_trip() {
        let (archive, timeline, root) = superseded();
        let document =
            TimelineDocument::capture_session(&timeline, root, &archive, ScenarioMeta::new("arc"))
                .unwrap();
        // Two grids from the old timeline plus the forest
        assert_eq!(document.terrains.len(), 3);
        assert_eq!(document.archive[0].nodes.len(), 3);

        let json = document.to_json().unwrap();
        let restored = TimelineDocument::from_json(&json).unwrap().restore().unwrap();
        assert_eq!(restored.archive, archive);
        assert_eq!(restored.timeline, timeline);
        assert_eq!(restored.active, root);
    }

    #[test]
    fn test_archive_reusing_live_ids_rejected() {
        let (archive, timeline, root) = superseded();
        let mut document =
            TimelineDocument::capture_session(&timeline, root, &archive, ScenarioMeta::new(""))
                .unwrap();
        document.archive[0].next_id = NodeId::new(10);
        assert!(matches!(
            document.restore(),
            Err(TimelineError::CorruptDocument(_))
        ));
    }

    #[test]
    fn test_save_and_load_file() {
        let (timeline, active) = sample();
        let document = TimelineDocument::capture(&timeline, active, ScenarioMeta::new("file")).unwrap();
        let path = std::env::temp_dir().join(format!("timeline-{}.json", document.scenario.id));
        document.save(&path).unwrap();
        let loaded = TimelineDocument::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, document);
    }
}
