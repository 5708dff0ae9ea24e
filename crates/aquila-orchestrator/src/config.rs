use crate::types::DEFAULT_PRIORITY;
use aquila_core::{AquilaError, AquilaResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduler settings, usually read from the `[scheduler]` table of `aquila.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of tasks in the running state at once.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
    /// Per-execution timeout. Unset means executions may run forever and a
    /// stuck execution keeps its concurrency slot.
    #[serde(default)]
    pub execution_timeout_ms: Option<u64>,
    /// Priority given to tasks created without one.
    #[serde(default = "default_priority")]
    pub default_priority: i64,
}

fn default_max_concurrent_tasks() -> usize {
    5
}

fn default_priority() -> i64 {
    DEFAULT_PRIORITY
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            execution_timeout_ms: None,
            default_priority: default_priority(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max;
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_default_priority(mut self, priority: i64) -> Self {
        self.default_priority = priority;
        self
    }

    pub fn execution_timeout(&self) -> Option<Duration> {
        self.execution_timeout_ms.map(Duration::from_millis)
    }

    /// Reject settings the scheduler cannot run with.
    pub fn validate(&self) -> AquilaResult<()> {
        if self.max_concurrent_tasks == 0 {
            return Err(AquilaError::Config(
                "max_concurrent_tasks must be at least 1".to_string(),
            ));
        }
        if self.execution_timeout_ms == Some(0) {
            return Err(AquilaError::Config(
                "execution_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
