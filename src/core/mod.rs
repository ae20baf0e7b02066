//! Core domain models for the verdict pipeline.
//!
//! Tasks, their typed payloads and the execution graph that the
//! orchestrator consumes.

pub mod dag;
pub mod payload;
pub mod task;

pub use dag::{TaskGraph, TaskGraphSnapshot};
pub use payload::{
    AnalysisOutput, AnalyzeInput, ComplianceInput, ComplianceOutput, RetrieveInput,
    SynthesizeInput, TaskOutput, TaskPayload, VerificationOutput, VerifyInput,
};
pub use task::{Task, TaskError, TaskId, TaskResult, TaskStatus, TaskType};
