//! Scheduler configuration

use crate::error::{SchedulerError, SchedulerResult};
use crate::state_key::Incarnation;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default ceiling on re-executions of a single transaction
pub const DEFAULT_MAX_INCARNATIONS: Incarnation = 100;

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Concurrent workers per round. Zero or negative means one per pending task.
    #[serde(default)]
    pub workers: i64,
    /// Highest incarnation a transaction may reach before the batch fails.
    /// `None` disables the ceiling.
    #[serde(default = "default_max_incarnations")]
    pub max_incarnations: Option<Incarnation>,
}

fn default_max_incarnations() -> Option<Incarnation> {
    Some(DEFAULT_MAX_INCARNATIONS)
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            max_incarnations: default_max_incarnations(),
        }
    }
}

impl SchedulerConfig {
    /// Config with a fixed worker count and default ceiling
    pub fn with_workers(workers: i64) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    /// Set the incarnation ceiling
    pub fn max_incarnations(mut self, limit: Option<Incarnation>) -> Self {
        self.max_incarnations = limit;
        self
    }

    /// Parse config from JSON
    pub fn from_json_str(s: &str) -> SchedulerResult<Self> {
        let config: Self =
            serde_json::from_str(s).map_err(|e| SchedulerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> SchedulerResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SchedulerError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    /// Check the config for values the scheduler cannot run with
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.max_incarnations == Some(0) {
            return Err(SchedulerError::InvalidConfig(
                "max_incarnations must allow at least one retry".to_string(),
            ));
        }
        Ok(())
    }
}
