//! Append-only forest of battlefield states
//!
//! Nodes live in an arena keyed by `NodeId`, with parent links on the nodes
//! and a separate children index. Nothing here deletes a node except the
//! explicit `prune` operation.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::battle::BattlefieldState;
use crate::core::error::TimelineError;
use crate::core::types::NodeId;
use crate::timeline::node::TimelineNode;

type Result<T> = std::result::Result<T, TimelineError>;

/// Branchable history of one scenario
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Timeline {
    nodes: BTreeMap<NodeId, Arc<TimelineNode>>,
    children: BTreeMap<NodeId, Vec<NodeId>>,
    root: Option<NodeId>,
    next_id: u64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty timeline whose ids continue after `previous`
    pub fn continuing(previous: &Timeline) -> Self {
        Self {
            next_id: previous.next_id,
            ..Self::default()
        }
    }

    /// Commit the scenario root (turn 0, no parent)
    pub fn commit_root(&mut self, state: BattlefieldState) -> Result<NodeId> {
        if self.root.is_some() {
            return Err(TimelineError::RootExists);
        }
        if state.turn() != 0 {
            return Err(TimelineError::RootTurn(state.turn()));
        }

        let id = self.insert(None, state);
        self.root = Some(id);
        Ok(id)
    }

    /// Commit a state as a new child of `parent`
    pub fn commit(&mut self, parent: NodeId, state: BattlefieldState) -> Result<NodeId> {
        let parent_turn = self.node(parent)?.turn();
        let expected = parent_turn + 1;
        if state.turn() != expected {
            return Err(TimelineError::TurnMismatch {
                parent,
                expected,
                found: state.turn(),
            });
        }

        Ok(self.insert(Some(parent), state))
    }

    fn insert(&mut self, parent: Option<NodeId>, state: BattlefieldState) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        self.attach(TimelineNode::new(id, parent, Arc::new(state)));
        id
    }

    fn attach(&mut self, node: TimelineNode) {
        let id = node.id();
        if let Some(parent) = node.parent() {
            self.children.entry(parent).or_default().push(id);
        }
        self.children.entry(id).or_default();
        self.nodes.insert(id, Arc::new(node));
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&TimelineNode> {
        self.nodes.get(&id).map(|n| n.as_ref())
    }

    /// Like `get`, but unknown ids are an error
    pub fn node(&self, id: NodeId) -> Result<&TimelineNode> {
        self.get(id).ok_or(TimelineError::UnknownNode(id))
    }

    pub fn state(&self, id: NodeId) -> Result<&BattlefieldState> {
        Ok(self.node(id)?.state())
    }

    /// Children of a node in commit order
    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        self.children
            .get(&id)
            .map(|c| c.as_slice())
            .ok_or(TimelineError::UnknownNode(id))
    }

    /// Most recently committed child
    pub fn latest_child(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.children(id)?.last().copied())
    }

    /// Walk from a node up to the root (node first)
    pub fn ancestors(&self, id: NodeId) -> Result<Ancestors<'_>> {
        self.node(id)?;
        Ok(Ancestors {
            timeline: self,
            next: Some(id),
        })
    }

    /// Nodes from the root down to `id` (root first): one branch's visible history
    pub fn path_to_root(&self, id: NodeId) -> Result<Vec<&TimelineNode>> {
        let mut path: Vec<_> = self.ancestors(id)?.collect();
        path.reverse();
        Ok(path)
    }

    /// States along the branch ending at `id`, root first
    pub fn lineage_states(&self, id: NodeId) -> Result<Vec<Arc<BattlefieldState>>> {
        Ok(self
            .path_to_root(id)?
            .into_iter()
            .map(|n| n.shared_state())
            .collect())
    }

    /// Is `ancestor` on the path from the root to `id` (inclusive)?
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> Result<bool> {
        Ok(self.ancestors(id)?.any(|n| n.id() == ancestor))
    }

    /// `id` and everything below it, pre-order
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.node(id)?;
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(kids) = self.children.get(&current) {
                stack.extend(kids.iter().rev());
            }
        }
        Ok(out)
    }

    /// Nodes with no children (branch tips)
    pub fn leaves(&self) -> Vec<NodeId> {
        self.children
            .iter()
            .filter(|(_, kids)| kids.is_empty())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Nodes with more than one child
    pub fn branch_points(&self) -> Vec<NodeId> {
        self.children
            .iter()
            .filter(|(_, kids)| kids.len() > 1)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Remove `id` and its whole subtree; returns the removed ids
    ///
    /// Explicit only: normal advancement never prunes.
    pub fn prune(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        let node = self.node(id)?;
        let Some(parent) = node.parent() else {
            return Err(TimelineError::PruneRoot);
        };

        let removed = self.descendants(id)?;
        for gone in &removed {
            self.nodes.remove(gone);
            self.children.remove(gone);
        }
        if let Some(siblings) = self.children.get_mut(&parent) {
            siblings.retain(|c| *c != id);
        }

        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in id (commit) order
    pub fn nodes(&self) -> impl Iterator<Item = &TimelineNode> {
        self.nodes.values().map(|n| n.as_ref())
    }

    /// Id the next commit will receive
    pub fn next_id(&self) -> NodeId {
        NodeId::new(self.next_id)
    }

    /// Rebuild a timeline from stored nodes, checking every forest invariant
    ///
    /// Nodes must be supplied in increasing id order (parents precede
    /// children), as `nodes()` yields them.
    pub fn restore(
        nodes: impl IntoIterator<Item = (NodeId, Option<NodeId>, BattlefieldState)>,
        next_id: NodeId,
    ) -> Result<Self> {
        let mut timeline = Timeline::new();
        let mut last: Option<NodeId> = None;

        for (id, parent, state) in nodes {
            let corrupt = |msg: String| TimelineError::CorruptDocument(msg);

            if last.is_some_and(|prev| id <= prev) {
                return Err(corrupt(format!("node {} is out of order", id)));
            }
            if id >= next_id {
                return Err(corrupt(format!("node {} is not below next id {}", id, next_id)));
            }

            match parent {
                None => {
                    if timeline.root.is_some() {
                        return Err(corrupt(format!("second root {}", id)));
                    }
                    if state.turn() != 0 {
                        return Err(corrupt(format!("root {} has turn {}", id, state.turn())));
                    }
                    timeline.root = Some(id);
                }
                Some(parent_id) => {
                    let parent_turn = timeline
                        .get(parent_id)
                        .ok_or_else(|| {
                            corrupt(format!("node {} references missing parent {}", id, parent_id))
                        })?
                        .turn();
                    if state.turn() != parent_turn + 1 {
                        return Err(corrupt(format!(
                            "node {} has turn {} under parent turn {}",
                            id,
                            state.turn(),
                            parent_turn
                        )));
                    }
                }
            }

            timeline.attach(TimelineNode::new(id, parent, Arc::new(state)));
            last = Some(id);
        }

        if timeline.root.is_none() {
            return Err(TimelineError::MissingRoot);
        }
        timeline.next_id = next_id.0;
        Ok(timeline)
    }
}

/// A whole timeline replaced when its scenario restarted on new terrain
#[derive(Debug, Clone, PartialEq)]
pub struct SupersededTimeline {
    pub timeline: Timeline,
    /// Active pointer at the moment it was superseded
    pub active: NodeId,
}

/// Iterator from a node up to the scenario root
pub struct Ancestors<'a> {
    timeline: &'a Timeline,
    next: Option<NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a TimelineNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.timeline.get(self.next?)?;
        self.next = node.parent();
        Some(node)
    }
}
