use thiserror::Error;

use crate::core::task::TaskId;

/// Structural problems with a task graph. Fatal to a whole run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("dependency cycle detected at task {0}")]
    Cycle(TaskId),

    #[error("task {task} depends on {dependency}, which is not in the graph")]
    DanglingDependency { task: TaskId, dependency: TaskId },

    #[error("graph stalled with {pending} pending task(s) and none ready")]
    Stalled { pending: usize },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Task already exists: {0}")]
    DuplicateTask(TaskId),

    #[error("Task not found in graph: {0}")]
    UnknownTask(TaskId),

    #[error("Structural error: {0}")]
    Structural(#[from] StructuralError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Task join error: {0}")]
    TaskJoin(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Consensus needs at least {required} verification methods, got {given}")]
    InsufficientMethods { required: usize, given: usize },

    #[error("No home directory")]
    NoHomeDir,
}

impl Error {
    /// True for errors that invalidate the whole run rather than one task.
    pub fn is_structural(&self) -> bool {
        matches!(self, Error::Structural(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
