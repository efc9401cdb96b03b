//! Save / reload of whole sessions

use wargame_timeline::battle::{BattlefieldState, CellCoord, TerrainGrid, TerrainType, Unit};
use wargame_timeline::core::config::{EngineConfig, GridConfig};
use wargame_timeline::core::types::{Faction, NodeId};
use wargame_timeline::gateway::{CandidatePayload, DoctrineParams, ScriptedGateway};
use wargame_timeline::session::{BranchManager, ScenarioSession};
use wargame_timeline::timeline::{ScenarioMeta, TimelineDocument};

fn config() -> EngineConfig {
    EngineConfig {
        grid: GridConfig {
            width: 6,
            height: 6,
        },
        ..EngineConfig::default()
    }
}

fn at(row: i32, col: i32) -> CandidatePayload {
    CandidatePayload {
        description: format!("A to ({row},{col})"),
        units: vec![
            Unit::new("A", Faction::blue(), CellCoord::new(row, col)).with_capability("armor"),
            Unit::new("R", Faction::red(), CellCoord::new(5, 5)),
        ],
        ..Default::default()
    }
}

async fn branched_session() -> ScenarioSession {
    let mut flooded = at(1, 2);
    flooded.terrain = Some(TerrainGrid::new(6, 6).with_cell(CellCoord::new(0, 5), TerrainType::Water));

    let gateway = ScriptedGateway::from_payloads(vec![at(1, 1), at(2, 3), at(4, 4), flooded]);
    let initial = BattlefieldState::initial(
        TerrainGrid::new(6, 6),
        vec![
            Unit::new("A", Faction::blue(), CellCoord::new(0, 0)).with_capability("armor"),
            Unit::new("R", Faction::red(), CellCoord::new(5, 5)),
        ],
    );
    let manager = BranchManager::new(
        initial,
        config(),
        Box::new(gateway),
        ScenarioMeta::new("River crossing"),
    )
    .unwrap();
    let session = ScenarioSession::new(manager);

    let params = DoctrineParams::new("Advance");
    let first = session.advance(&params).await.unwrap();
    session.advance(&params).await.unwrap();
    session.advance(&params).await.unwrap();
    session.branch_from(first, &params).await.unwrap();
    session.rewind(first).await.unwrap();
    session
}

#[tokio::test]
async fn test_round_trip_is_node_and_pointer_identical() {
    let session = branched_session().await;
    let document = session.document().await.unwrap();
    let json = document.to_json().unwrap();

    let reloaded = BranchManager::from_document(
        TimelineDocument::from_json(&json).unwrap(),
        config(),
        Box::new(ScriptedGateway::default()),
    )
    .unwrap();

    let view = session.view();
    assert_eq!(reloaded.timeline(), &view.timeline);
    assert_eq!(reloaded.active(), view.active);
    assert_eq!(reloaded.scenario().title, "River crossing");
    assert_eq!(reloaded.to_document().unwrap(), document);
}

#[tokio::test]
async fn test_terrain_versions_survive_reload() {
    let session = branched_session().await;
    let document = session.document().await.unwrap();
    // One grid shared by the main line, one for the flooded branch
    assert_eq!(document.terrains.len(), 2);

    let timeline = document.restore().unwrap().timeline;
    let root = timeline.root().unwrap();
    let root_state = timeline.state(root).unwrap();
    let shared = timeline
        .nodes()
        .filter(|n| n.state().shares_terrain_with(root_state))
        .count();
    assert_eq!(shared, timeline.len() - 1);
}

#[tokio::test]
async fn test_save_and_resume_from_file() {
    let session = branched_session().await;
    let path = std::env::temp_dir().join(format!(
        "wargame-session-{}.json",
        session.document().await.unwrap().scenario.id
    ));
    session.save(&path).await.unwrap();

    let document = TimelineDocument::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let resumed = ScenarioSession::new(
        BranchManager::from_document(
            document,
            config(),
            Box::new(ScriptedGateway::from_payloads(vec![at(2, 2)])),
        )
        .unwrap(),
    );
    assert_eq!(*resumed.view(), *session.view());

    // Growth continues with fresh ids after the reload
    let id = resumed.advance(&DoctrineParams::default()).await.unwrap();
    assert!(session.view().timeline.get(id).is_none());
    assert_eq!(resumed.view().timeline.len(), session.view().timeline.len() + 1);
}

#[tokio::test]
async fn test_terrain_regeneration_keeps_history_on_disk() {
    let session = branched_session().await;
    let before = session.view();
    let old_nodes: Vec<(NodeId, u32)> = before
        .timeline
        .nodes()
        .map(|n| (n.id(), n.turn()))
        .collect();

    let root = session
        .regenerate_terrain(TerrainGrid::filled(6, 6, TerrainType::Forest))
        .await
        .unwrap();
    let path = std::env::temp_dir().join(format!(
        "wargame-terrain-{}.json",
        session.document().await.unwrap().scenario.id
    ));
    session.save(&path).await.unwrap();

    let document = TimelineDocument::load(&path).unwrap();
    std::fs::remove_file(&path).ok();
    let resumed =
        BranchManager::from_document(document, config(), Box::new(ScriptedGateway::default()))
            .unwrap();

    assert_eq!(resumed.active(), root);
    assert_eq!(resumed.timeline().len(), 1);
    assert_eq!(resumed.archive().len(), 1);
    assert_eq!(resumed.archive()[0].active, before.active);
    for (id, turn) in old_nodes {
        assert_eq!(resumed.find_node(id).map(|n| n.turn()), Some(turn));
    }
}
