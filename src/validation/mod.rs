//! Consistency validation for generated battlefield candidates
//!
//! Structural checks short-circuit; identity and logical checks accumulate so
//! the generator can be handed the full list of problems as feedback.

mod composite;
mod continuity;
mod events;
mod health;
mod identity;
mod occupancy;
mod placement;
mod structural;

pub use composite::{validate, ValidationReport, Validator};
pub use continuity::ContinuityValidator;
pub use events::EventValidator;
pub use health::HealthValidator;
pub use identity::IdentityValidator;
pub use occupancy::OccupancyValidator;
pub use placement::PlacementValidator;
pub use structural::StructuralValidator;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::battle::CellCoord;
use crate::core::types::{TurnIndex, UnitId};

/// Rule family a violation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// Malformed candidate: dimensions, bounds, undefined terrain
    Structural,
    /// Unexplained unit appearance or disappearance
    Identity,
    /// Movement, occupancy, terrain, health, and event rules
    Logical,
}

/// A single violated rule, rendered as generator feedback via `Display`
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Violation {
    // === Structural ===
    #[error("grid is {found_width}x{found_height} but the scenario is {expected_width}x{expected_height}")]
    GridDimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        found_width: u32,
        found_height: u32,
    },

    #[error("terrain row {row} has {found} cells, expected {expected}")]
    RaggedTerrainRow { row: u32, expected: u32, found: u32 },

    #[error("terrain cell {cell} has no defined type")]
    UndefinedTerrain { cell: CellCoord },

    #[error("unit {unit} is out of bounds at {position}")]
    OutOfBounds { unit: UnitId, position: CellCoord },

    #[error("unit {unit} has health {health} above its maximum {max_health}")]
    HealthOutOfRange {
        unit: UnitId,
        health: u32,
        max_health: u32,
    },

    #[error("unit stored under id {key} reports id {unit}")]
    UnitKeyMismatch { key: UnitId, unit: UnitId },

    #[error("unit id {unit} appears more than once")]
    DuplicateUnit { unit: UnitId },

    #[error("turn {found} does not follow turn {expected}")]
    TurnSequence { expected: TurnIndex, found: TurnIndex },

    #[error("payload could not be read: {reason}")]
    MalformedPayload { reason: String },

    // === Identity ===
    #[error("unit {unit} appeared without being declared a reinforcement")]
    UnexplainedAppearance { unit: UnitId },

    #[error("unit {unit} disappeared; destroyed units must stay with health 0")]
    Disappearance { unit: UnitId },

    #[error("unit {unit} is declared a reinforcement but already exists")]
    ReinforcementNotNew { unit: UnitId },

    // === Logical ===
    #[error("unit {unit} moved {distance} cells from {from} to {to}, budget is {budget}")]
    ExcessiveMovement {
        unit: UnitId,
        from: CellCoord,
        to: CellCoord,
        distance: u32,
        budget: u32,
    },

    #[error("destroyed unit {unit} moved from {from} to {to}")]
    DestroyedUnitMoved {
        unit: UnitId,
        from: CellCoord,
        to: CellCoord,
    },

    #[error("destroyed unit {unit} came back to life")]
    UnitRevived { unit: UnitId },

    #[error("unit {unit} stands on impassable {terrain} at {position}")]
    ImpassableTerrain {
        unit: UnitId,
        position: CellCoord,
        terrain: String,
    },

    #[error("cell {position} is occupied by {} without stacking capability", join_ids(.units))]
    CellCollision {
        position: CellCoord,
        units: Vec<UnitId>,
    },

    #[error("unit {unit} regained health from {from} to {to} without supply or repair")]
    UnexplainedHealthGain { unit: UnitId, from: u32, to: u32 },

    #[error("combat event {event} references unit {unit} which is not on the battlefield")]
    UnknownEventUnit { event: usize, unit: UnitId },

    #[error("candidate has no units; the timeline would dead-end")]
    EmptyBattlefield,
}

fn join_ids(ids: &[UnitId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Violation {
    pub fn kind(&self) -> ViolationKind {
        match self {
            Violation::GridDimensionMismatch { .. }
            | Violation::RaggedTerrainRow { .. }
            | Violation::UndefinedTerrain { .. }
            | Violation::OutOfBounds { .. }
            | Violation::HealthOutOfRange { .. }
            | Violation::UnitKeyMismatch { .. }
            | Violation::DuplicateUnit { .. }
            | Violation::TurnSequence { .. }
            | Violation::MalformedPayload { .. } => ViolationKind::Structural,

            Violation::UnexplainedAppearance { .. }
            | Violation::Disappearance { .. }
            | Violation::ReinforcementNotNew { .. } => ViolationKind::Identity,

            Violation::ExcessiveMovement { .. }
            | Violation::DestroyedUnitMoved { .. }
            | Violation::UnitRevived { .. }
            | Violation::ImpassableTerrain { .. }
            | Violation::CellCollision { .. }
            | Violation::UnexplainedHealthGain { .. }
            | Violation::UnknownEventUnit { .. }
            | Violation::EmptyBattlefield => ViolationKind::Logical,
        }
    }
}

/// Outcome of validating one candidate
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    /// Candidate may be committed; advisory findings are carried along
    Accept { warnings: Vec<Violation> },
    /// Candidate must be discarded
    Reject(Vec<Violation>),
}

impl ValidationResult {
    pub fn is_accept(&self) -> bool {
        matches!(self, ValidationResult::Accept { .. })
    }

    /// Violations that caused a rejection (empty on accept)
    pub fn violations(&self) -> &[Violation] {
        match self {
            ValidationResult::Accept { .. } => &[],
            ValidationResult::Reject(violations) => violations,
        }
    }

    pub fn warnings(&self) -> &[Violation] {
        match self {
            ValidationResult::Accept { warnings } => warnings,
            ValidationResult::Reject(_) => &[],
        }
    }

    pub fn has_kind(&self, kind: ViolationKind) -> bool {
        self.violations().iter().any(|v| v.kind() == kind)
    }
}
