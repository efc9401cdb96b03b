//! Branch manager: the only writer of the timeline and the active pointer
//!
//! Every growth path (advance, branch, regenerate) runs the same loop:
//! request a candidate, validate it against its parent, commit on accept,
//! otherwise retry with the violations as feedback until the retry budget
//! is spent. A failed call leaves the timeline and pointer untouched.
//! Generating the opening scenario runs the same loop before any timeline
//! exists.

use std::mem;
use std::sync::Arc;
use tokio::time::error::Elapsed;

use crate::battle::{BattlefieldState, TerrainGrid};
use crate::core::config::{EngineConfig, RetryConfig};
use crate::core::error::{AdvanceError, TimelineError};
use crate::core::types::NodeId;
use crate::gateway::{
    CandidatePayload, DoctrineParams, GatewayError, GenerationGateway, GenerationRequest,
    ScenarioRequest,
};
use crate::timeline::{
    ScenarioMeta, SupersededTimeline, Timeline, TimelineDocument, TimelineNode,
};
use crate::validation::{ValidationResult, Validator, Violation};

/// Where the manager is within one growth call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagerPhase {
    Idle,
    Requesting,
    Validating,
    Committed,
    RetryRequesting,
    Exhausted,
}

/// Validation outcome for one node of an audited branch
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub node: NodeId,
    pub result: ValidationResult,
}

pub struct BranchManager {
    timeline: Timeline,
    active: NodeId,
    validator: Validator,
    gateway: Box<dyn GenerationGateway>,
    scenario: ScenarioMeta,
    archive: Vec<SupersededTimeline>,
    transitions: Vec<ManagerPhase>,
}

impl BranchManager {
    /// Start a scenario from a validated turn-0 state
    pub fn new(
        initial: BattlefieldState,
        config: EngineConfig,
        gateway: Box<dyn GenerationGateway>,
        scenario: ScenarioMeta,
    ) -> Result<Self, AdvanceError> {
        let validator = Validator::new(config);
        let (timeline, root) = Self::found(&validator, initial, Timeline::new())?;

        tracing::info!(
            "Scenario '{}' ({}) started with {} units",
            scenario.title,
            scenario.id,
            timeline.state(root)?.unit_count()
        );

        Ok(Self {
            timeline,
            active: root,
            validator,
            gateway,
            scenario,
            archive: Vec::new(),
            transitions: vec![ManagerPhase::Idle],
        })
    }

    /// Start a scenario from a generated opening turn
    ///
    /// The gateway builds terrain and forces from the doctrine's research
    /// context. Rejected openings are fed back under the same retry budget
    /// as `advance`.
    pub async fn generate(
        config: EngineConfig,
        gateway: Box<dyn GenerationGateway>,
        params: &DoctrineParams,
        scenario: ScenarioMeta,
    ) -> Result<Self, AdvanceError> {
        let validator = Validator::new(config);
        let retry = validator.config().retry.clone();
        let attempts = retry.max_attempts();
        let mut transitions = vec![ManagerPhase::Idle];
        let mut feedback: Vec<Violation> = Vec::new();

        for attempt in 1..=attempts {
            transitions.push(if attempt == 1 {
                ManagerPhase::Requesting
            } else {
                ManagerPhase::RetryRequesting
            });

            let request = ScenarioRequest {
                doctrine: params,
                feedback: &feedback,
                attempt,
            };
            let outcome =
                tokio::time::timeout(retry.gateway_timeout(), gateway.generate_initial(request)).await;
            let candidate = settle(outcome, &retry, attempt)?.and_then(CandidatePayload::into_root_state);

            transitions.push(ManagerPhase::Validating);
            let violations = match candidate.map(|state| {
                let result = judge(&validator, &state, None);
                (state, result)
            }) {
                Ok((state, ValidationResult::Accept { warnings })) => {
                    for warning in &warnings {
                        tracing::warn!("Opening accepted with advisory finding: {}", warning);
                    }
                    let mut timeline = Timeline::new();
                    let root = timeline.commit_root(state)?;
                    transitions.extend([ManagerPhase::Committed, ManagerPhase::Idle]);
                    tracing::info!(
                        "Scenario '{}' ({}) generated with {} units after {} attempt(s)",
                        scenario.title,
                        scenario.id,
                        timeline.state(root)?.unit_count(),
                        attempt
                    );
                    return Ok(Self {
                        timeline,
                        active: root,
                        validator,
                        gateway,
                        scenario,
                        archive: Vec::new(),
                        transitions,
                    });
                }
                Ok((_, ValidationResult::Reject(violations))) | Err(violations) => violations,
            };

            tracing::warn!(
                "Opening attempt {}/{} rejected with {} violations",
                attempt,
                attempts,
                violations.len()
            );
            feedback = violations;
        }

        tracing::warn!("Opening scenario exhausted after {} attempts", attempts);
        Err(AdvanceError::ValidationExhausted {
            attempts,
            violations: feedback,
        })
    }

    /// Resume a saved session
    pub fn from_document(
        document: TimelineDocument,
        config: EngineConfig,
        gateway: Box<dyn GenerationGateway>,
    ) -> Result<Self, TimelineError> {
        let restored = document.restore()?;
        tracing::info!(
            "Resumed scenario '{}' with {} nodes ({} archived timelines), active {}",
            restored.scenario.title,
            restored.timeline.len(),
            restored.archive.len(),
            restored.active
        );
        Ok(Self {
            timeline: restored.timeline,
            active: restored.active,
            validator: Validator::new(config),
            gateway,
            scenario: restored.scenario,
            archive: restored.archive,
            transitions: vec![ManagerPhase::Idle],
        })
    }

    fn found(
        validator: &Validator,
        initial: BattlefieldState,
        mut timeline: Timeline,
    ) -> Result<(Timeline, NodeId), AdvanceError> {
        if let ValidationResult::Reject(violations) = validator.validate(&initial, None) {
            tracing::warn!("Initial state rejected with {} violations", violations.len());
            return Err(AdvanceError::InvalidRoot(violations));
        }
        let root = timeline.commit_root(initial)?;
        Ok((timeline, root))
    }

    // === Read access ===

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn active(&self) -> NodeId {
        self.active
    }

    pub fn active_node(&self) -> Result<&TimelineNode, TimelineError> {
        self.timeline.node(self.active)
    }

    pub fn active_state(&self) -> Result<Arc<BattlefieldState>, TimelineError> {
        Ok(self.active_node()?.shared_state())
    }

    /// The visible branch: root to the active node
    pub fn active_path(&self) -> Result<Vec<&TimelineNode>, TimelineError> {
        self.timeline.path_to_root(self.active)
    }

    pub fn config(&self) -> &EngineConfig {
        self.validator.config()
    }

    pub fn scenario(&self) -> &ScenarioMeta {
        &self.scenario
    }

    /// Phases visited by the most recent growth call, ending in `Idle`
    pub fn last_transitions(&self) -> &[ManagerPhase] {
        &self.transitions
    }

    /// Timelines replaced by `regenerate_terrain`, oldest first
    pub fn archive(&self) -> &[SupersededTimeline] {
        &self.archive
    }

    /// A node of the live timeline or of any archived one
    pub fn find_node(&self, id: NodeId) -> Option<&TimelineNode> {
        self.timeline
            .get(id)
            .or_else(|| self.archive.iter().find_map(|old| old.timeline.get(id)))
    }

    pub fn to_document(&self) -> Result<TimelineDocument, TimelineError> {
        TimelineDocument::capture_session(
            &self.timeline,
            self.active,
            &self.archive,
            self.scenario.clone(),
        )
    }

    // === Growth ===

    /// Generate the next turn after the active node and move onto it
    pub async fn advance(&mut self, params: &DoctrineParams) -> Result<NodeId, AdvanceError> {
        let parent = self.active;
        self.grow(parent, params).await
    }

    /// Generate a new child of `node`, alongside any existing children
    pub async fn branch_from(
        &mut self,
        node: NodeId,
        params: &DoctrineParams,
    ) -> Result<NodeId, AdvanceError> {
        self.timeline.node(node)?;
        tracing::info!("Branching from {}", node);
        self.grow(node, params).await
    }

    /// Generate a fresh sibling of `node`
    ///
    /// The root has no parent to grow from; use `regenerate_terrain` instead.
    pub async fn regenerate(
        &mut self,
        node: NodeId,
        params: &DoctrineParams,
    ) -> Result<NodeId, AdvanceError> {
        let parent = self
            .timeline
            .node(node)?
            .parent()
            .ok_or(AdvanceError::RegenerateRoot(node))?;
        tracing::info!("Regenerating {} from its parent {}", node, parent);
        self.grow(parent, params).await
    }

    async fn grow(&mut self, parent: NodeId, params: &DoctrineParams) -> Result<NodeId, AdvanceError> {
        self.transitions.clear();
        self.enter(ManagerPhase::Idle);

        let predecessor = self.timeline.node(parent)?.shared_state();
        let retry = self.config().retry.clone();
        let attempts = retry.max_attempts();
        let mut feedback: Vec<Violation> = Vec::new();

        for attempt in 1..=attempts {
            self.enter(if attempt == 1 {
                ManagerPhase::Requesting
            } else {
                ManagerPhase::RetryRequesting
            });

            let request = GenerationRequest {
                current: &predecessor,
                doctrine: params,
                feedback: &feedback,
                attempt,
            };
            let outcome =
                tokio::time::timeout(retry.gateway_timeout(), self.gateway.generate(request)).await;

            let candidate = match settle(outcome, &retry, attempt) {
                Ok(payload) => payload.and_then(|payload| payload.into_state(&predecessor)),
                Err(err) => {
                    self.enter(ManagerPhase::Idle);
                    return Err(err);
                }
            };

            self.enter(ManagerPhase::Validating);
            let violations = match candidate.map(|state| {
                let result = judge(&self.validator, &state, Some(&*predecessor));
                (state, result)
            }) {
                Ok((state, ValidationResult::Accept { warnings })) => {
                    for warning in &warnings {
                        tracing::warn!("Accepted with advisory finding: {}", warning);
                    }
                    let id = self.timeline.commit(parent, state)?;
                    self.active = id;
                    self.enter(ManagerPhase::Committed);
                    self.enter(ManagerPhase::Idle);
                    tracing::info!(
                        "Committed {} (turn {}) under {} after {} attempt(s)",
                        id,
                        predecessor.turn() + 1,
                        parent,
                        attempt
                    );
                    return Ok(id);
                }
                Ok((_, ValidationResult::Reject(violations))) | Err(violations) => violations,
            };

            tracing::warn!(
                "Attempt {}/{} rejected with {} violations",
                attempt,
                attempts,
                violations.len()
            );
            for violation in &violations {
                tracing::debug!("  {:?}: {}", violation.kind(), violation);
            }
            feedback = violations;
        }

        self.enter(ManagerPhase::Exhausted);
        self.enter(ManagerPhase::Idle);
        tracing::warn!("Validation exhausted after {} attempts under {}", attempts, parent);
        Err(AdvanceError::ValidationExhausted {
            attempts,
            violations: feedback,
        })
    }

    fn enter(&mut self, phase: ManagerPhase) {
        tracing::debug!("Branch manager phase: {:?}", phase);
        self.transitions.push(phase);
    }

    /// Commit a user-authored next turn after the active node
    pub fn submit_edit(&mut self, state: BattlefieldState) -> Result<NodeId, AdvanceError> {
        let parent = self.active;
        let predecessor = self.timeline.node(parent)?.shared_state();

        match judge(&self.validator, &state, Some(&*predecessor)) {
            ValidationResult::Reject(violations) => {
                tracing::warn!("Edit rejected with {} violations", violations.len());
                Err(AdvanceError::EditRejected(violations))
            }
            ValidationResult::Accept { warnings } => {
                for warning in &warnings {
                    tracing::warn!("Edit accepted with advisory finding: {}", warning);
                }
                let id = self.timeline.commit(parent, state)?;
                self.active = id;
                tracing::info!("Committed edit {} under {}", id, parent);
                Ok(id)
            }
        }
    }

    // === Navigation ===

    /// Move the active pointer to an existing node
    pub fn rewind(&mut self, node: NodeId) -> Result<(), TimelineError> {
        self.timeline.node(node)?;
        tracing::info!("Active pointer {} -> {}", self.active, node);
        self.active = node;
        Ok(())
    }

    /// Move to the parent; `None` at the root
    pub fn step_back(&mut self) -> Result<Option<NodeId>, TimelineError> {
        match self.active_node()?.parent() {
            Some(parent) => {
                self.rewind(parent)?;
                Ok(Some(parent))
            }
            None => Ok(None),
        }
    }

    /// Move to the most recently created child; `None` at a tip
    pub fn step_forward(&mut self) -> Result<Option<NodeId>, TimelineError> {
        match self.timeline.latest_child(self.active)? {
            Some(child) => {
                self.rewind(child)?;
                Ok(Some(child))
            }
            None => Ok(None),
        }
    }

    // === Maintenance ===

    /// Remove a subtree that does not hold the active pointer
    pub fn prune(&mut self, node: NodeId) -> Result<Vec<NodeId>, TimelineError> {
        if self.timeline.node(node)?.is_root() {
            return Err(TimelineError::PruneRoot);
        }
        if self.timeline.is_ancestor(node, self.active)? {
            return Err(TimelineError::PruneActive(node));
        }
        let removed = self.timeline.prune(node)?;
        tracing::info!("Pruned {} nodes starting at {}", removed.len(), node);
        Ok(removed)
    }

    /// Start over on new terrain with the active units as turn 0
    ///
    /// The current timeline moves to the archive, where it stays readable
    /// and is saved with the session. Ids keep counting up, so a node id
    /// names one node across the live timeline and the archive.
    pub fn regenerate_terrain(&mut self, terrain: TerrainGrid) -> Result<NodeId, AdvanceError> {
        let units = self.active_state()?.units().cloned().collect::<Vec<_>>();
        let initial = BattlefieldState::initial(terrain, units);
        let (timeline, root) =
            Self::found(&self.validator, initial, Timeline::continuing(&self.timeline))?;

        let previous = mem::replace(&mut self.timeline, timeline);
        let active = mem::replace(&mut self.active, root);
        tracing::info!(
            "Terrain regenerated; new root {} supersedes a timeline of {} nodes",
            root,
            previous.len()
        );
        self.archive.push(SupersededTimeline {
            timeline: previous,
            active,
        });
        Ok(root)
    }

    /// Re-validate every node from the root down to `node`
    pub fn audit(&self, node: NodeId) -> Result<Vec<AuditEntry>, TimelineError> {
        let path = self.timeline.path_to_root(node)?;
        let mut entries = Vec::with_capacity(path.len());
        let mut predecessor: Option<&BattlefieldState> = None;

        for current in path {
            let result = self.validator.validate(current.state(), predecessor);
            if !result.is_accept() {
                tracing::warn!("Audit: {} fails re-validation", current.id());
            }
            entries.push(AuditEntry {
                node: current.id(),
                result,
            });
            predecessor = Some(current.state());
        }

        Ok(entries)
    }
}

/// Sort a gateway outcome into a candidate, a rejection to feed back, or a
/// failure that ends the call without consuming a retry
fn settle(
    outcome: Result<Result<CandidatePayload, GatewayError>, Elapsed>,
    retry: &RetryConfig,
    attempt: u32,
) -> Result<Result<CandidatePayload, Vec<Violation>>, AdvanceError> {
    match outcome {
        Err(_) | Ok(Err(GatewayError::Timeout)) => {
            tracing::warn!(
                "Gateway timed out after {} ms on attempt {}",
                retry.gateway_timeout_ms,
                attempt
            );
            Err(AdvanceError::GatewayTimeout {
                timeout_ms: retry.gateway_timeout_ms,
            })
        }
        Ok(Err(GatewayError::Transport(message))) => {
            tracing::warn!("Gateway transport failure on attempt {}: {}", attempt, message);
            Err(AdvanceError::GatewayTransportFailure(message))
        }
        Ok(Err(GatewayError::MalformedPayload(reason))) => {
            Ok(Err(vec![Violation::MalformedPayload { reason }]))
        }
        Ok(Ok(payload)) => Ok(Ok(payload)),
    }
}

/// Validator verdict plus the manager's dead-end policy
fn judge(
    validator: &Validator,
    candidate: &BattlefieldState,
    predecessor: Option<&BattlefieldState>,
) -> ValidationResult {
    let result = validator.validate(candidate, predecessor);
    if !(validator.config().rules.refuse_empty_turns && candidate.is_empty()) {
        return result;
    }
    match result {
        ValidationResult::Accept { .. } => ValidationResult::Reject(vec![Violation::EmptyBattlefield]),
        ValidationResult::Reject(mut violations) => {
            violations.push(Violation::EmptyBattlefield);
            ValidationResult::Reject(violations)
        }
    }
}
