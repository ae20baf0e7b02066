//! Capabilities and the dispatch contract.
//!
//! A [`Capability`] does the work for one [`TaskType`]. The [`AgentRegistry`]
//! maps task types to capabilities and is the only place a capability is
//! invoked: it validates the task first, bounds `process` with a timeout and
//! turns every outcome into a [`TaskResult`]. Nothing a capability does can
//! unwind into the scheduler.

pub mod analysis;
pub mod compliance;
pub mod retriever;
pub mod synthesizer;
pub mod verifier;

pub use analysis::AnalysisCapability;
pub use compliance::ComplianceCapability;
pub use retriever::{InMemorySource, JsonFileSource, RecordSource, RetrievalCapability};
pub use synthesizer::{SynthesisCapability, SynthesisContext, TemplateSynthesizer, TextSynthesizer};
pub use verifier::VerificationCapability;

use crate::config::Config;
use crate::core::{Task, TaskError, TaskOutput, TaskResult, TaskType};
use crate::detection::DetectionEngine;
use crate::verification::ConsensusVerifier;
use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Agent name used for results the scheduler produces itself.
pub const SCHEDULER_AGENT: &str = "scheduler";

/// The work behind one task type.
///
/// Implementations must be safe to call concurrently; the registry may
/// dispatch several tasks of the same type in one round.
#[async_trait]
pub trait Capability: Send + Sync {
    fn name(&self) -> &str;

    fn task_type(&self) -> TaskType;

    /// Cheap structural check of the payload. Returning false means
    /// `process` is never called for this task.
    fn validate(&self, task: &Task) -> bool;

    async fn process(&self, task: &Task) -> Result<TaskOutput>;
}

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    failed: AtomicU64,
}

/// Per-capability counters reported by [`AgentRegistry::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityStatus {
    pub name: String,
    pub task_type: TaskType,
    pub processed: u64,
    pub failed: u64,
}

struct Entry {
    capability: Arc<dyn Capability>,
    counters: Counters,
}

/// Task type to capability map.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use std::time::Duration;
/// use verdict::agents::{AgentRegistry, InMemorySource, RetrievalCapability};
///
/// let mut registry = AgentRegistry::new(Duration::from_secs(30));
/// registry.register(Arc::new(RetrievalCapability::new(Arc::new(InMemorySource::default()))));
///
/// let result = registry.dispatch(&task).await;
/// assert!(result.success);
/// ```
pub struct AgentRegistry {
    entries: HashMap<TaskType, Entry>,
    task_timeout: Duration,
}

impl AgentRegistry {
    /// Create an empty registry.
    ///
    /// # Arguments
    ///
    /// * `task_timeout` - Upper bound on a single `process` call
    pub fn new(task_timeout: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            task_timeout,
        }
    }

    /// The five standard capabilities, configured from `config`.
    pub fn standard(
        config: &Config,
        source: Arc<dyn RecordSource>,
        synthesizer: Arc<dyn TextSynthesizer>,
    ) -> Self {
        let engine = Arc::new(DetectionEngine::from_config(&config.detection));
        let verifier = Arc::new(ConsensusVerifier::new(config.verification.clone()));

        let mut registry = Self::new(config.orchestrator.task_timeout());
        registry.register(Arc::new(RetrievalCapability::new(source)));
        registry.register(Arc::new(AnalysisCapability::new(engine)));
        registry.register(Arc::new(ComplianceCapability::new()));
        registry.register(Arc::new(VerificationCapability::new(verifier)));
        registry.register(Arc::new(
            SynthesisCapability::new(synthesizer)
                .with_timeout(config.orchestrator.synthesis_timeout()),
        ));
        registry
    }

    /// Register a capability under its task type.
    ///
    /// Returns the capability previously registered for that type, if any.
    pub fn register(&mut self, capability: Arc<dyn Capability>) -> Option<Arc<dyn Capability>> {
        let task_type = capability.task_type();
        debug!(capability = capability.name(), task_type = %task_type, "Registering capability");
        self.entries
            .insert(
                task_type,
                Entry {
                    capability,
                    counters: Counters::default(),
                },
            )
            .map(|old| old.capability)
    }

    pub fn get(&self, task_type: TaskType) -> Option<Arc<dyn Capability>> {
        self.entries
            .get(&task_type)
            .map(|e| Arc::clone(&e.capability))
    }

    /// Name of the capability that would handle `task_type`.
    pub fn agent_name(&self, task_type: TaskType) -> String {
        self.entries
            .get(&task_type)
            .map(|e| e.capability.name().to_string())
            .unwrap_or_else(|| SCHEDULER_AGENT.to_string())
    }

    pub fn task_timeout(&self) -> Duration {
        self.task_timeout
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run one task through its capability.
    ///
    /// Never fails: a missing capability, a rejected payload, an error from
    /// `process` and an exceeded timeout all come back as a failed
    /// [`TaskResult`].
    pub async fn dispatch(&self, task: &Task) -> TaskResult {
        let started = Instant::now();
        let task_type = task.task_type();

        let Some(entry) = self.entries.get(&task_type) else {
            warn!(task = %task.id, task_type = %task_type, "No capability registered");
            return TaskResult::failure(
                task.id,
                SCHEDULER_AGENT,
                TaskError::NoCapability { task_type },
                started.elapsed(),
            );
        };
        let name = entry.capability.name();

        if !entry.capability.validate(task) {
            warn!(task = %task.id, capability = name, "Task payload rejected");
            entry.counters.failed.fetch_add(1, Ordering::Relaxed);
            return TaskResult::failure(
                task.id,
                name,
                TaskError::InvalidInput {
                    reason: format!("payload for {} is missing required fields", task_type),
                },
                started.elapsed(),
            );
        }

        debug!(task = %task.id, capability = name, "Processing task");
        let outcome = match timeout(self.task_timeout, entry.capability.process(task)).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(TaskError::from(e)),
            Err(_) => Err(TaskError::timeout(self.task_timeout)),
        };

        match outcome {
            Ok(output) => {
                entry.counters.processed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    task = %task.id,
                    capability = name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Task succeeded"
                );
                TaskResult::success(task.id, name, output, started.elapsed())
            }
            Err(error) => {
                entry.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(task = %task.id, capability = name, error = %error, "Task failed");
                TaskResult::failure(task.id, name, error, started.elapsed())
            }
        }
    }

    /// Counters for every registered capability, ordered by task type.
    pub fn status(&self) -> Vec<CapabilityStatus> {
        let mut status: Vec<CapabilityStatus> = self
            .entries
            .iter()
            .map(|(task_type, entry)| CapabilityStatus {
                name: entry.capability.name().to_string(),
                task_type: *task_type,
                processed: entry.counters.processed.load(Ordering::Relaxed),
                failed: entry.counters.failed.load(Ordering::Relaxed),
            })
            .collect();
        status.sort_by_key(|s| s.task_type);
        status
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("capabilities", &self.status())
            .field("task_timeout", &self.task_timeout)
            .finish()
    }
}
