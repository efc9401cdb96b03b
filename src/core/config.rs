//! Engine configuration with documented defaults
//!
//! Every rule threshold the validator and branch manager consult lives here.
//! Sections are `#[serde(default)]` so a TOML file only needs to name the
//! values it overrides.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::core::error::{EngineError, Result};

/// Complete configuration for one scenario session
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub grid: GridConfig,
    pub retry: RetryConfig,
    pub movement: MovementConfig,
    pub rules: RuleConfig,
}

/// Battlefield dimensions every candidate must match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Number of columns
    pub width: u32,
    /// Number of rows
    pub height: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 20,
            height: 20,
        }
    }
}

/// Generation retry budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first rejected candidate (R). Total attempts = R + 1.
    pub max_retries: u32,

    /// Upper bound on a single gateway call, in milliseconds
    ///
    /// Timeouts are surfaced immediately and never consume a retry.
    pub gateway_timeout_ms: u64,
}

impl RetryConfig {
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            gateway_timeout_ms: 60_000,
        }
    }
}

/// Per-turn movement budgets, in Chebyshev steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Budget for units carrying no mobility tag
    pub default_budget: u32,

    /// Budget per mobility tag; a unit uses the largest budget among its tags
    pub budgets: BTreeMap<String, u32>,
}

impl MovementConfig {
    /// Movement budget for a unit carrying the given capability tags
    pub fn budget_for<'a>(&self, tags: impl IntoIterator<Item = &'a String>) -> u32 {
        tags.into_iter()
            .filter_map(|tag| self.budgets.get(&tag.to_lowercase()))
            .copied()
            .max()
            .unwrap_or(self.default_budget)
    }
}

impl Default for MovementConfig {
    fn default() -> Self {
        let budgets = [
            ("infantry", 1),
            ("artillery", 1),
            ("recon", 2),
            ("mechanized", 2),
            ("armor", 3),
        ]
        .into_iter()
        .map(|(tag, budget)| (tag.to_string(), budget))
        .collect();

        Self {
            default_budget: 1,
            budgets,
        }
    }
}

/// How the health-monotonicity check reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthPolicy {
    /// Unexplained health gains reject the candidate
    Enforce,
    /// Unexplained health gains are reported as warnings only
    #[default]
    Advisory,
    /// Check disabled
    Off,
}

/// Tag sets and toggles for the logical checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Units may share a cell only when every unit there carries one of these
    pub stacking_tags: BTreeSet<String>,
    /// Units carrying one of these may regain health between turns
    pub repair_tags: BTreeSet<String>,
    /// Units carrying one of these may stand on water
    pub amphibious_tags: BTreeSet<String>,
    pub health_policy: HealthPolicy,
    /// Reject living units standing on impassable terrain
    pub enforce_terrain: bool,
    /// Refuse candidates with no units at all (timeline dead-end)
    pub refuse_empty_turns: bool,
}

impl RuleConfig {
    pub fn permits_stacking(&self, tags: &BTreeSet<String>) -> bool {
        has_any_tag(tags, &self.stacking_tags)
    }

    pub fn permits_repair(&self, tags: &BTreeSet<String>) -> bool {
        has_any_tag(tags, &self.repair_tags)
    }

    pub fn is_amphibious(&self, tags: &BTreeSet<String>) -> bool {
        has_any_tag(tags, &self.amphibious_tags)
    }
}

fn has_any_tag(tags: &BTreeSet<String>, wanted: &BTreeSet<String>) -> bool {
    tags.iter().any(|tag| wanted.contains(&tag.to_lowercase()))
}

fn has_uppercase<'a>(mut tags: impl Iterator<Item = &'a String>) -> bool {
    tags.any(|t| t.chars().any(|c| c.is_uppercase()))
}

fn tag_set(tags: &[&str]) -> BTreeSet<String> {
    tags.iter().map(|t| t.to_string()).collect()
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            stacking_tags: tag_set(&["embarked", "transported"]),
            repair_tags: tag_set(&["supply", "repair"]),
            amphibious_tags: tag_set(&["amphibious", "naval"]),
            health_policy: HealthPolicy::Advisory,
            enforce_terrain: true,
            refuse_empty_turns: true,
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(contents)?;
        config.validate().map_err(EngineError::Config)?;
        Ok(config)
    }

    /// Load a config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.grid.width == 0 || self.grid.height == 0 {
            return Err(format!(
                "grid must be non-empty (got {}x{})",
                self.grid.width, self.grid.height
            ));
        }

        if self.movement.default_budget == 0 {
            return Err("movement.default_budget must be at least 1".into());
        }

        if self.retry.gateway_timeout_ms == 0 {
            return Err("retry.gateway_timeout_ms must be positive".into());
        }

        // Tags are matched case-insensitively against lowercase keys
        if has_uppercase(self.movement.budgets.keys())
            || has_uppercase(self.rules.stacking_tags.iter())
            || has_uppercase(self.rules.repair_tags.iter())
            || has_uppercase(self.rules.amphibious_tags.iter())
        {
            return Err("capability tags in config must be lowercase".into());
        }

        Ok(())
    }
}
