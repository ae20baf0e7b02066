//! Orchestration layer: planning and the scheduling loop.
//!
//! A [`Planner`] turns a query into a task graph and the [`Orchestrator`]
//! runs that graph round by round through the agent registry.

mod planner;
mod scheduler;

pub use planner::{DefaultPlanner, Planner};
pub use scheduler::{Orchestrator, RunReport, RunState, SchedulerEvent};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bound on a single task, in seconds.
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 300;

/// Default bound on one text synthesis call, in seconds.
pub const DEFAULT_SYNTHESIS_TIMEOUT_SECS: u64 = 60;

/// Loaded from the `[orchestrator]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub task_timeout_secs: u64,
    pub synthesis_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            task_timeout_secs: DEFAULT_TASK_TIMEOUT_SECS,
            synthesis_timeout_secs: DEFAULT_SYNTHESIS_TIMEOUT_SECS,
        }
    }
}

impl OrchestratorConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    /// The synthesis budget, capped at half the task timeout so the
    /// template fallback always runs inside the task.
    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs).min(self.task_timeout() / 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesis_timeout_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.synthesis_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_synthesis_timeout_capped_below_task_timeout() {
        let config = OrchestratorConfig {
            task_timeout_secs: 10,
            synthesis_timeout_secs: 60,
        };
        assert_eq!(config.synthesis_timeout(), Duration::from_secs(5));
    }
}
