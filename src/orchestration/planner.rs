//! Builds the task graph for a query.

use crate::core::{
    AnalyzeInput, ComplianceInput, RetrieveInput, SynthesizeInput, Task, TaskGraph, TaskPayload,
    VerifyInput,
};
use crate::{Error, Result};
use tracing::debug;

/// Turns a query into a task graph.
pub trait Planner: Send + Sync {
    fn plan(&self, query: &str) -> Result<TaskGraph>;
}

/// The fixed analysis pipeline.
///
/// ```text
/// retrieve -> analyze -> compliance -> verify -> synthesize
/// ```
///
/// `verify` also depends on `analyze`; `synthesize` depends on every other
/// task so it sees all of their outputs.
#[derive(Debug, Clone)]
pub struct DefaultPlanner {
    /// Passed to the analyze task.
    pub min_pattern_confidence: Option<f64>,
    /// Passed to the verify task; the verifier's configured threshold
    /// applies when `None`.
    pub consensus_threshold: Option<f64>,
    pub regulations: Vec<String>,
    pub report_type: String,
}

impl Default for DefaultPlanner {
    fn default() -> Self {
        Self {
            min_pattern_confidence: None,
            consensus_threshold: None,
            regulations: ComplianceInput::default().regulations,
            report_type: SynthesizeInput::default().report_type,
        }
    }
}

impl DefaultPlanner {
    pub fn with_consensus_threshold(mut self, threshold: f64) -> Self {
        self.consensus_threshold = Some(threshold);
        self
    }
}

impl Planner for DefaultPlanner {
    fn plan(&self, query: &str) -> Result<TaskGraph> {
        if query.trim().is_empty() {
            return Err(Error::Validation("query must not be empty".to_string()));
        }

        let retrieve = Task::new(
            "Retrieve records",
            TaskPayload::Retrieve(RetrieveInput::new(query)),
        )
        .with_priority(5);

        let analyze = Task::new(
            "Detect anomalies",
            TaskPayload::Analyze(AnalyzeInput {
                records: None,
                min_pattern_confidence: self.min_pattern_confidence,
            }),
        )
        .with_priority(4)
        .depends_on(retrieve.id);

        let compliance = Task::new(
            "Check compliance",
            TaskPayload::ComplianceCheck(ComplianceInput {
                regulations: self.regulations.clone(),
                findings: None,
            }),
        )
        .with_priority(3)
        .depends_on(analyze.id);

        let verify = Task::new(
            "Verify findings",
            TaskPayload::Verify(VerifyInput {
                consensus_threshold: self.consensus_threshold,
                findings: None,
            }),
        )
        .with_priority(2)
        .depends_on(analyze.id)
        .depends_on(compliance.id);

        let synthesize = Task::new(
            "Synthesize report",
            TaskPayload::Synthesize(SynthesizeInput {
                report_type: self.report_type.clone(),
                ..SynthesizeInput::default()
            }),
        )
        .with_priority(1)
        .depends_on(retrieve.id)
        .depends_on(analyze.id)
        .depends_on(compliance.id)
        .depends_on(verify.id);

        let mut graph = TaskGraph::new();
        for task in [retrieve, analyze, compliance, verify, synthesize] {
            graph.add_task(task)?;
        }
        graph.validate()?;

        debug!(
            tasks = graph.task_count(),
            dependencies = graph.dependency_count(),
            "Plan built"
        );
        Ok(graph)
    }
}
