//! Analysis capability: runs the detection engine over retrieved records.

use crate::agents::Capability;
use crate::core::{AnalysisOutput, Task, TaskOutput, TaskPayload, TaskType};
use crate::detection::{AnalysisSummary, DetectionEngine, Record};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct AnalysisCapability {
    engine: Arc<DetectionEngine>,
}

impl AnalysisCapability {
    pub fn new(engine: Arc<DetectionEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Capability for AnalysisCapability {
    fn name(&self) -> &str {
        "analysis"
    }

    fn task_type(&self) -> TaskType {
        TaskType::Analyze
    }

    fn validate(&self, task: &Task) -> bool {
        matches!(&task.payload, TaskPayload::Analyze(input) if input.records.is_some())
    }

    async fn process(&self, task: &Task) -> Result<TaskOutput> {
        let TaskPayload::Analyze(input) = &task.payload else {
            return Err(Error::Validation("expected an analyze payload".to_string()));
        };
        let batch = input
            .records
            .as_ref()
            .ok_or_else(|| Error::Validation("no records to analyze".to_string()))?;
        if batch.is_empty() {
            return Err(Error::Processing("no records to analyze".to_string()));
        }

        let records: Arc<[Record]> = Arc::from(batch.records.as_slice());
        let findings = self
            .engine
            .detect_parallel(records, input.min_pattern_confidence)
            .await?;
        let summary = AnalysisSummary::from_findings(&findings, batch.len());

        info!(
            task = %task.id,
            records = batch.len(),
            findings = summary.total_findings,
            high_risk = summary.high_risk,
            "Analysis finished"
        );
        Ok(TaskOutput::Analysis(AnalysisOutput { findings, summary }))
    }
}
