//! Scenario sessions
//!
//! A session serializes every mutation behind one async mutex (held across
//! the gateway call) and publishes an immutable view after each successful
//! mutation, so readers never wait on an in-flight generation.

pub mod manager;

pub use manager::{AuditEntry, BranchManager, ManagerPhase};

use std::path::Path;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

use crate::battle::{BattlefieldState, TerrainGrid};
use crate::core::error::{AdvanceError, TimelineError};
use crate::core::types::NodeId;
use crate::gateway::DoctrineParams;
use crate::timeline::{SupersededTimeline, Timeline, TimelineDocument, TimelineNode};

/// Read-only snapshot of a session's timeline and active pointer
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineView {
    pub timeline: Timeline,
    pub active: NodeId,
    /// Timelines superseded by terrain regeneration, oldest first
    pub archive: Vec<SupersededTimeline>,
}

impl TimelineView {
    fn of(manager: &BranchManager) -> Self {
        Self {
            timeline: manager.timeline().clone(),
            active: manager.active(),
            archive: manager.archive().to_vec(),
        }
    }

    pub fn path_to_root(&self, node: NodeId) -> Result<Vec<&TimelineNode>, TimelineError> {
        self.timeline.path_to_root(node)
    }

    pub fn children(&self, node: NodeId) -> Result<&[NodeId], TimelineError> {
        self.timeline.children(node)
    }

    pub fn active_path(&self) -> Result<Vec<&TimelineNode>, TimelineError> {
        self.timeline.path_to_root(self.active)
    }

    pub fn active_state(&self) -> Result<&BattlefieldState, TimelineError> {
        self.timeline.state(self.active)
    }
}

pub struct ScenarioSession {
    manager: Mutex<BranchManager>,
    view: RwLock<Arc<TimelineView>>,
}

impl ScenarioSession {
    pub fn new(manager: BranchManager) -> Self {
        let view = Arc::new(TimelineView::of(&manager));
        Self {
            manager: Mutex::new(manager),
            view: RwLock::new(view),
        }
    }

    /// Latest published view; never blocks on a running generation
    pub fn view(&self) -> Arc<TimelineView> {
        let guard = self
            .view
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&*guard)
    }

    fn publish(&self, manager: &BranchManager) {
        let next = Arc::new(TimelineView::of(manager));
        let mut guard = self
            .view
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = next;
    }

    pub async fn advance(&self, params: &DoctrineParams) -> Result<NodeId, AdvanceError> {
        let mut manager = self.manager.lock().await;
        let id = manager.advance(params).await?;
        self.publish(&manager);
        Ok(id)
    }

    pub async fn branch_from(
        &self,
        node: NodeId,
        params: &DoctrineParams,
    ) -> Result<NodeId, AdvanceError> {
        let mut manager = self.manager.lock().await;
        let id = manager.branch_from(node, params).await?;
        self.publish(&manager);
        Ok(id)
    }

    pub async fn regenerate(
        &self,
        node: NodeId,
        params: &DoctrineParams,
    ) -> Result<NodeId, AdvanceError> {
        let mut manager = self.manager.lock().await;
        let id = manager.regenerate(node, params).await?;
        self.publish(&manager);
        Ok(id)
    }

    pub async fn submit_edit(&self, state: BattlefieldState) -> Result<NodeId, AdvanceError> {
        let mut manager = self.manager.lock().await;
        let id = manager.submit_edit(state)?;
        self.publish(&manager);
        Ok(id)
    }

    pub async fn rewind(&self, node: NodeId) -> Result<(), TimelineError> {
        let mut manager = self.manager.lock().await;
        manager.rewind(node)?;
        self.publish(&manager);
        Ok(())
    }

    pub async fn step_back(&self) -> Result<Option<NodeId>, TimelineError> {
        let mut manager = self.manager.lock().await;
        let moved = manager.step_back()?;
        self.publish(&manager);
        Ok(moved)
    }

    pub async fn step_forward(&self) -> Result<Option<NodeId>, TimelineError> {
        let mut manager = self.manager.lock().await;
        let moved = manager.step_forward()?;
        self.publish(&manager);
        Ok(moved)
    }

    pub async fn prune(&self, node: NodeId) -> Result<Vec<NodeId>, TimelineError> {
        let mut manager = self.manager.lock().await;
        let removed = manager.prune(node)?;
        self.publish(&manager);
        Ok(removed)
    }

    pub async fn regenerate_terrain(&self, terrain: TerrainGrid) -> Result<NodeId, AdvanceError> {
        let mut manager = self.manager.lock().await;
        let root = manager.regenerate_terrain(terrain)?;
        self.publish(&manager);
        Ok(root)
    }

    pub async fn audit(&self, node: NodeId) -> Result<Vec<AuditEntry>, TimelineError> {
        self.manager.lock().await.audit(node)
    }

    pub async fn document(&self) -> Result<TimelineDocument, TimelineError> {
        self.manager.lock().await.to_document()
    }

    pub async fn save(&self, path: &Path) -> Result<(), TimelineError> {
        self.document().await?.save(path)
    }

    pub fn into_manager(self) -> BranchManager {
        self.manager.into_inner()
    }
}
