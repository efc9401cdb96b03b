//! Structural validation: grid dimensions, terrain definition, unit bounds

use super::Violation;
use crate::battle::{BattlefieldState, TerrainGrid};
use crate::core::config::GridConfig;

pub struct StructuralValidator;

impl StructuralValidator {
    /// Run every structural check on a candidate
    pub fn validate(
        candidate: &BattlefieldState,
        predecessor: Option<&BattlefieldState>,
        grid: &GridConfig,
    ) -> Vec<Violation> {
        let mut errors = Self::validate_grid(candidate.terrain(), grid);
        errors.extend(Self::validate_units(candidate, grid));
        errors.extend(Self::validate_turn(candidate, predecessor));
        errors
    }

    /// Terrain matrix must match the configured size with every cell defined
    pub fn validate_grid(terrain: &TerrainGrid, grid: &GridConfig) -> Vec<Violation> {
        let mut errors = Vec::new();

        if terrain.height() != grid.height || terrain.width() != grid.width {
            errors.push(Violation::GridDimensionMismatch {
                expected_width: grid.width,
                expected_height: grid.height,
                found_width: terrain.width(),
                found_height: terrain.height(),
            });
        }

        for (row, cells) in terrain.rows().iter().enumerate() {
            if cells.len() as u32 != grid.width {
                errors.push(Violation::RaggedTerrainRow {
                    row: row as u32,
                    expected: grid.width,
                    found: cells.len() as u32,
                });
            }
        }

        errors.extend(
            terrain
                .cells()
                .filter(|(_, terrain)| !terrain.is_defined())
                .map(|(cell, _)| Violation::UndefinedTerrain { cell }),
        );

        errors
    }

    /// Unit map keys must agree with unit ids; positions and health in range
    pub fn validate_units(candidate: &BattlefieldState, grid: &GridConfig) -> Vec<Violation> {
        let mut errors = Vec::new();

        for (key, unit) in candidate.unit_map() {
            if *key != unit.id {
                errors.push(Violation::UnitKeyMismatch {
                    key: key.clone(),
                    unit: unit.id.clone(),
                });
            }

            if !unit.position.in_bounds(grid.width, grid.height) {
                errors.push(Violation::OutOfBounds {
                    unit: unit.id.clone(),
                    position: unit.position,
                });
            }

            if unit.health > unit.max_health {
                errors.push(Violation::HealthOutOfRange {
                    unit: unit.id.clone(),
                    health: unit.health,
                    max_health: unit.max_health,
                });
            }
        }

        errors
    }

    /// Turn index must be 0 for a root and predecessor + 1 otherwise
    pub fn validate_turn(
        candidate: &BattlefieldState,
        predecessor: Option<&BattlefieldState>,
    ) -> Vec<Violation> {
        let expected = predecessor.map(|p| p.turn() + 1).unwrap_or(0);
        if candidate.turn() != expected {
            vec![Violation::TurnSequence {
                expected,
                found: candidate.turn(),
            }]
        } else {
            Vec::new()
        }
    }
}
