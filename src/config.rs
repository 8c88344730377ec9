//! Engine configuration
//!
//! Configuration is supplied by the embedder as a serde value with sensible
//! defaults; the engine itself reads no environment or files.

use crate::error::{EngineError, Result};
use crate::rating::PointTable;
use crate::types::PointExchangeRule;
use serde::{Deserialize, Serialize};

/// Tunables for a [`crate::engine::TournamentEngine`] instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default number of fixed anchor seeds when a playoff config does not
    /// specify one; None seeds every participant deterministically.
    pub default_seed_count: Option<usize>,
    /// Upper bound on parent/child nesting when propagating completion.
    /// Observed formats nest at most two levels.
    pub max_nesting_depth: u32,
    /// Point-exchange table override; falls back to the store's effective
    /// rules, then to the standard table.
    pub point_rules: Option<Vec<PointExchangeRule>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_seed_count: None,
            max_nesting_depth: 3,
            point_rules: None,
        }
    }
}

impl EngineConfig {
    /// Validate the configuration before handing it to an engine.
    pub fn validate(&self) -> Result<()> {
        if self.max_nesting_depth == 0 {
            return Err(EngineError::config("max_nesting_depth must be at least 1").into());
        }
        if let Some(rules) = &self.point_rules {
            // Surfaces gaps or overlaps in the override table up front
            PointTable::new(rules.clone())?;
        }
        Ok(())
    }
}
