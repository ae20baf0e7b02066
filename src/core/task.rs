//! Task data model for the execution graph.
//!
//! Tasks are the atomic units of work routed to capabilities. Each task
//! carries a typed payload, a priority, its dependency ids and a status.
//! Every dispatched task produces exactly one [`TaskResult`].

use crate::core::payload::{TaskOutput, TaskPayload};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a task within a graph.
///
/// Uses UUID v4 for generation and provides a short form display
/// for human-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Create a new unique task identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The fixed set of task kinds a capability can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Retrieve,
    Analyze,
    ComplianceCheck,
    Verify,
    Synthesize,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Retrieve => "retrieve",
            TaskType::Analyze => "analyze",
            TaskType::ComplianceCheck => "compliance_check",
            TaskType::Verify => "verify",
            TaskType::Synthesize => "synthesize",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task status in its lifecycle.
///
/// Only the scheduler mutates status, and only between rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum TaskStatus {
    /// Task created but not yet dispatched.
    Pending,
    /// Task is currently being executed by a capability.
    Running,
    /// Task completed successfully.
    Completed,
    /// Task failed, either itself or through an upstream dependency.
    Failed {
        /// Error message describing the failure.
        error: String,
    },
    /// Run was cancelled before the task was dispatched.
    Cancelled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed { error } => write!(f, "failed: {}", error),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A single task in the execution graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier for this task.
    pub id: TaskId,
    /// Human-readable name for the task.
    pub name: String,
    /// Typed input; the variant determines the task type.
    pub payload: TaskPayload,
    /// Higher values are scheduled first within a round.
    pub priority: i32,
    /// Tasks that must complete before this one may run.
    pub dependencies: Vec<TaskId>,
    /// Current execution status.
    pub status: TaskStatus,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the task started execution.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new pending task with priority 0 and no dependencies.
    pub fn new(name: &str, payload: TaskPayload) -> Self {
        Self {
            id: TaskId::new(),
            name: name.to_string(),
            payload,
            priority: 0,
            dependencies: Vec::new(),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Add a dependency id, ignoring duplicates.
    pub fn depends_on(mut self, id: TaskId) -> Self {
        if !self.dependencies.contains(&id) {
            self.dependencies.push(id);
        }
        self
    }

    /// The task type implied by the payload variant.
    pub fn task_type(&self) -> TaskType {
        self.payload.task_type()
    }

    /// Transition to Running and record the start time.
    pub fn start(&mut self) {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Transition to Completed and record the completion time.
    pub fn complete(&mut self) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Transition to Failed with an error message.
    pub fn fail(&mut self, error: &str) {
        self.status = TaskStatus::Failed {
            error: error.to_string(),
        };
        self.completed_at = Some(Utc::now());
    }

    pub fn cancel(&mut self) {
        self.status = TaskStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }

    /// Check if the task is in a terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::Completed | TaskStatus::Failed { .. } | TaskStatus::Cancelled
        )
    }

    /// Check if the task can still be dispatched.
    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }
}

/// Why a task did not succeed. Stored in the task's result as ordinary data.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TaskError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("processing failed: {message}")]
    Processing { message: String },

    #[error("upstream dependency {dependency} failed")]
    DependencyFailure { dependency: TaskId },

    #[error("timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("cancelled before dispatch")]
    Cancelled,

    #[error("no capability registered for task type {task_type}")]
    NoCapability { task_type: TaskType },
}

impl TaskError {
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout {
            after_ms: after.as_millis() as u64,
        }
    }

    /// True when the task never ran because something upstream failed.
    pub fn is_propagated(&self) -> bool {
        matches!(self, TaskError::DependencyFailure { .. })
    }
}

impl From<crate::error::Error> for TaskError {
    fn from(err: crate::error::Error) -> Self {
        match err {
            crate::error::Error::Timeout(after) => TaskError::timeout(after),
            crate::error::Error::Validation(reason) => TaskError::InvalidInput { reason },
            other => TaskError::Processing {
                message: other.to_string(),
            },
        }
    }
}

/// Outcome of one task. Written once by the dispatcher, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub success: bool,
    /// Output payload; present exactly when `success` is true.
    pub output: Option<TaskOutput>,
    pub error: Option<TaskError>,
    /// Name of the capability (or "scheduler") that produced the result.
    pub agent: String,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl TaskResult {
    pub fn success(task_id: TaskId, agent: &str, output: TaskOutput, elapsed: Duration) -> Self {
        Self {
            task_id,
            success: true,
            output: Some(output),
            error: None,
            agent: agent.to_string(),
            completed_at: Utc::now(),
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn failure(task_id: TaskId, agent: &str, error: TaskError, elapsed: Duration) -> Self {
        Self {
            task_id,
            success: false,
            output: None,
            error: Some(error),
            agent: agent.to_string(),
            completed_at: Utc::now(),
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    /// Error text suitable for `TaskStatus::Failed`.
    pub fn error_message(&self) -> String {
        self.error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string())
    }
}
