//! Timeline nodes

use std::sync::Arc;

use crate::battle::BattlefieldState;
use crate::core::types::{NodeId, TurnIndex};

/// A committed battlefield state plus its ancestry link
///
/// Children are kept in the timeline's index rather than in the node, so a
/// node never changes after it is committed.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineNode {
    id: NodeId,
    parent: Option<NodeId>,
    state: Arc<BattlefieldState>,
}

impl TimelineNode {
    pub(crate) fn new(id: NodeId, parent: Option<NodeId>, state: Arc<BattlefieldState>) -> Self {
        Self { id, parent, state }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn state(&self) -> &BattlefieldState {
        &self.state
    }

    /// Shared handle to the state, for consumers that outlive the timeline borrow
    pub fn shared_state(&self) -> Arc<BattlefieldState> {
        Arc::clone(&self.state)
    }

    pub fn turn(&self) -> TurnIndex {
        self.state.turn()
    }
}
