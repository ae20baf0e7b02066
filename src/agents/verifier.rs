//! Verification capability: consensus over the findings of an analysis.

use crate::agents::Capability;
use crate::core::{Task, TaskOutput, TaskPayload, TaskType, VerificationOutput};
use crate::verification::{ConsensusVerifier, VerificationSummary};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct VerificationCapability {
    verifier: Arc<ConsensusVerifier>,
}

impl VerificationCapability {
    pub fn new(verifier: Arc<ConsensusVerifier>) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl Capability for VerificationCapability {
    fn name(&self) -> &str {
        "verifier"
    }

    fn task_type(&self) -> TaskType {
        TaskType::Verify
    }

    fn validate(&self, task: &Task) -> bool {
        match &task.payload {
            TaskPayload::Verify(input) => {
                input.findings.is_some()
                    && input
                        .consensus_threshold
                        .map_or(true, |t| (0.0..=1.0).contains(&t))
            }
            _ => false,
        }
    }

    async fn process(&self, task: &Task) -> Result<TaskOutput> {
        let TaskPayload::Verify(input) = &task.payload else {
            return Err(Error::Validation("expected a verify payload".to_string()));
        };
        let findings = input.findings.as_deref().unwrap_or_default();

        let results = self.verifier.verify_all(findings, input.consensus_threshold);
        let summary = VerificationSummary::from_results(&results);

        info!(
            task = %task.id,
            verified = summary.total,
            consensus = summary.consensus_reached,
            review = summary.human_review_needed,
            "Verification finished"
        );
        Ok(TaskOutput::Verification(VerificationOutput { results, summary }))
    }
}
