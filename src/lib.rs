//! Wargame Timeline - branchable, validated turn history for grid battles

pub mod battle;
pub mod core;
pub mod gateway;
pub mod session;
pub mod timeline;
pub mod validation;

pub use crate::battle::{BattlefieldState, CellCoord, TerrainGrid, TerrainType, Unit};
pub use crate::core::config::EngineConfig;
pub use crate::core::error::{AdvanceError, EngineError, TimelineError};
pub use crate::core::types::{Faction, NodeId, UnitId};
pub use crate::gateway::{CandidatePayload, DoctrineParams, GenerationGateway};
pub use crate::session::{BranchManager, ScenarioSession};
pub use crate::timeline::{Timeline, TimelineDocument};
pub use crate::validation::{validate, ValidationResult, Violation};
