//! Composite validator that runs all checks in order

use super::{
    ContinuityValidator, EventValidator, HealthValidator, IdentityValidator, OccupancyValidator,
    PlacementValidator, StructuralValidator, ValidationResult, Violation,
};
use crate::battle::BattlefieldState;
use crate::core::config::{EngineConfig, HealthPolicy};

/// Result of running every validator, with a pass flag per rule family
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<Violation>,
    pub warnings: Vec<Violation>,
    pub passed_structural: bool,
    pub passed_identity: bool,
    pub passed_continuity: bool,
    pub passed_placement: bool,
    pub passed_occupancy: bool,
    pub passed_health: bool,
    pub passed_events: bool,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            passed_structural: true,
            passed_identity: true,
            passed_continuity: true,
            passed_placement: true,
            passed_occupancy: true,
            passed_health: true,
            passed_events: true,
        }
    }

    fn add_errors(&mut self, errors: Vec<Violation>) -> bool {
        if errors.is_empty() {
            return true;
        }
        self.is_valid = false;
        self.errors.extend(errors);
        false
    }

    pub fn add_structural_errors(&mut self, errors: Vec<Violation>) {
        self.passed_structural = self.add_errors(errors);
    }

    pub fn add_identity_errors(&mut self, errors: Vec<Violation>) {
        self.passed_identity = self.add_errors(errors);
    }

    pub fn add_continuity_errors(&mut self, errors: Vec<Violation>) {
        self.passed_continuity = self.add_errors(errors);
    }

    pub fn add_placement_errors(&mut self, errors: Vec<Violation>) {
        self.passed_placement = self.add_errors(errors);
    }

    pub fn add_occupancy_errors(&mut self, errors: Vec<Violation>) {
        self.passed_occupancy = self.add_errors(errors);
    }

    pub fn add_event_errors(&mut self, errors: Vec<Violation>) {
        self.passed_events = self.add_errors(errors);
    }

    /// Health findings are errors or warnings depending on policy
    pub fn add_health_findings(&mut self, findings: Vec<Violation>, policy: HealthPolicy) {
        match policy {
            HealthPolicy::Enforce => self.passed_health = self.add_errors(findings),
            HealthPolicy::Advisory => {
                self.passed_health = findings.is_empty();
                self.warnings.extend(findings);
            }
            HealthPolicy::Off => {}
        }
    }

    pub fn into_result(self) -> ValidationResult {
        if self.is_valid {
            ValidationResult::Accept {
                warnings: self.warnings,
            }
        } else {
            ValidationResult::Reject(self.errors)
        }
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Pure, deterministic candidate validator for one scenario configuration
#[derive(Debug, Clone)]
pub struct Validator {
    config: EngineConfig,
}

impl Validator {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run every check and keep the per-family breakdown
    pub fn report(
        &self,
        candidate: &BattlefieldState,
        predecessor: Option<&BattlefieldState>,
    ) -> ValidationReport {
        let mut report = ValidationReport::new();

        // Structural failures make the remaining checks meaningless
        report.add_structural_errors(StructuralValidator::validate(
            candidate,
            predecessor,
            &self.config.grid,
        ));
        if !report.passed_structural {
            return report;
        }

        report.add_identity_errors(IdentityValidator::validate(candidate, predecessor));

        if let Some(previous) = predecessor {
            report.add_continuity_errors(ContinuityValidator::validate(
                candidate,
                previous,
                &self.config.movement,
            ));
        }

        report.add_placement_errors(PlacementValidator::validate(candidate, &self.config.rules));
        report.add_occupancy_errors(OccupancyValidator::validate(candidate, &self.config.rules));
        report.add_event_errors(EventValidator::validate(candidate));

        if let Some(previous) = predecessor {
            report.add_health_findings(
                HealthValidator::validate(candidate, previous, &self.config.rules),
                self.config.rules.health_policy,
            );
        }

        report
    }

    pub fn validate(
        &self,
        candidate: &BattlefieldState,
        predecessor: Option<&BattlefieldState>,
    ) -> ValidationResult {
        self.report(candidate, predecessor).into_result()
    }
}

/// Validate a candidate against its predecessor under the given configuration
pub fn validate(
    candidate: &BattlefieldState,
    predecessor: Option<&BattlefieldState>,
    config: &EngineConfig,
) -> ValidationResult {
    Validator::new(config.clone()).validate(candidate, predecessor)
}
