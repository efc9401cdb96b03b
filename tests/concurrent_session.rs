//! Concurrent callers against one scenario session

use std::sync::Arc;

use wargame_timeline::battle::{BattlefieldState, CellCoord, TerrainGrid, Unit};
use wargame_timeline::core::config::{EngineConfig, GridConfig};
use wargame_timeline::core::types::Faction;
use wargame_timeline::gateway::{CandidatePayload, DoctrineParams, ScriptStep, ScriptedGateway};
use wargame_timeline::session::{BranchManager, ScenarioSession};
use wargame_timeline::timeline::ScenarioMeta;

fn payload(col: i32) -> CandidatePayload {
    CandidatePayload {
        units: vec![Unit::new("A", Faction::blue(), CellCoord::new(0, col))],
        ..Default::default()
    }
}

fn session(steps: Vec<ScriptStep>) -> Arc<ScenarioSession> {
    let config = EngineConfig {
        grid: GridConfig {
            width: 10,
            height: 1,
        },
        ..EngineConfig::default()
    };
    let initial = BattlefieldState::initial(
        TerrainGrid::new(10, 1),
        vec![Unit::new("A", Faction::blue(), CellCoord::new(0, 0))],
    );
    let manager = BranchManager::new(
        initial,
        config,
        Box::new(ScriptedGateway::new(steps)),
        ScenarioMeta::new("concurrent"),
    )
    .unwrap();
    Arc::new(ScenarioSession::new(manager))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_advances_form_one_chain() {
    // Each step is delayed so the callers genuinely overlap
    let steps = (1..=4)
        .map(|col| ScriptStep::Delayed {
            millis: 20,
            payload: payload(col),
        })
        .collect();
    let session = session(steps);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.advance(&DoctrineParams::default()).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let view = session.view();
    assert_eq!(view.timeline.len(), 5);
    // Serialized commits never fork the active branch
    assert!(view.timeline.branch_points().is_empty());
    let turns: Vec<_> = view.active_path().unwrap().iter().map(|n| n.turn()).collect();
    assert_eq!(turns, vec![0, 1, 2, 3, 4]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_independent_sessions_run_in_parallel() {
    let first = session(vec![payload(1).into(), payload(2).into()]);
    let second = session(vec![payload(1).into()]);

    let a = {
        let first = Arc::clone(&first);
        tokio::spawn(async move {
            first.advance(&DoctrineParams::default()).await?;
            first.advance(&DoctrineParams::default()).await
        })
    };
    let b = {
        let second = Arc::clone(&second);
        tokio::spawn(async move { second.advance(&DoctrineParams::default()).await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_eq!(first.view().timeline.len(), 3);
    assert_eq!(second.view().timeline.len(), 2);
}
