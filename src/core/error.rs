use thiserror::Error;

use crate::core::types::{NodeId, TurnIndex};
use crate::validation::Violation;

/// Failures of the timeline forest itself (commit, lookup, pruning, documents)
#[derive(Error, Debug)]
pub enum TimelineError {
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Timeline already has a root")]
    RootExists,

    #[error("Timeline has no root")]
    MissingRoot,

    #[error("Root state must be turn 0, found turn {0}")]
    RootTurn(TurnIndex),

    #[error("Turn mismatch under parent {parent}: expected turn {expected}, found {found}")]
    TurnMismatch {
        parent: NodeId,
        expected: TurnIndex,
        found: TurnIndex,
    },

    #[error("The scenario root cannot be pruned")]
    PruneRoot,

    #[error("Cannot prune {0}: the active node lies inside that subtree")]
    PruneActive(NodeId),

    #[error("Corrupt timeline document: {0}")]
    CorruptDocument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Failures surfaced by the branch manager's advance / branch / edit paths
#[derive(Error, Debug)]
pub enum AdvanceError {
    #[error("Generation gateway timed out after {timeout_ms} ms")]
    GatewayTimeout { timeout_ms: u64 },

    #[error("Generation gateway transport failure: {0}")]
    GatewayTransportFailure(String),

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Validation exhausted after {attempts} attempts ({} violations on the last candidate)", violations.len())]
    ValidationExhausted {
        attempts: u32,
        violations: Vec<Violation>,
    },

    #[error("Edited state rejected ({} violations)", .0.len())]
    EditRejected(Vec<Violation>),

    #[error("Initial state rejected ({} violations)", .0.len())]
    InvalidRoot(Vec<Violation>),

    #[error("{0} is the scenario root and has no parent to regenerate from; regenerate the terrain instead")]
    RegenerateRoot(NodeId),

    #[error("Timeline error: {0}")]
    Timeline(TimelineError),
}

impl From<TimelineError> for AdvanceError {
    fn from(err: TimelineError) -> Self {
        match err {
            TimelineError::UnknownNode(id) => AdvanceError::UnknownNode(id),
            other => AdvanceError::Timeline(other),
        }
    }
}

/// Top-level error for the binary and configuration surface
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error(transparent)]
    Advance(#[from] AdvanceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_node_maps_to_advance_variant() {
        let err: AdvanceError = TimelineError::UnknownNode(NodeId::new(9)).into();
        assert!(matches!(err, AdvanceError::UnknownNode(NodeId(9))));
    }

    #[test]
    fn test_other_timeline_errors_are_wrapped() {
        let err: AdvanceError = TimelineError::RootExists.into();
        assert!(matches!(err, AdvanceError::Timeline(TimelineError::RootExists)));
    }

    #[test]
    fn test_regenerate_root_message_names_node() {
        let err = AdvanceError::RegenerateRoot(NodeId::new(0));
        assert!(err.to_string().starts_with("#0 is the scenario root"));
    }

    #[test]
    fn test_exhausted_message_counts_violations() {
        let err = AdvanceError::ValidationExhausted {
            attempts: 4,
            violations: Vec::new(),
        };
        assert_eq!(
            err.to_string(),
            "Validation exhausted after 4 attempts (0 violations on the last candidate)"
        );
    }
}
