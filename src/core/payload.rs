//! Typed task inputs and outputs.
//!
//! Each task type has its own input struct. Fields that are filled in from
//! upstream results are `Option`s; a capability's validation checks that
//! the ones it needs are present. Outputs are merged into downstream inputs
//! with [`TaskPayload::absorb`].

use crate::core::task::TaskType;
use crate::detection::{AnalysisSummary, Finding, RecordBatch};
use crate::report::{ComplianceCheck, ComplianceSummary, Report};
use crate::verification::{VerificationResult, VerificationSummary};
use serde::{Deserialize, Serialize};

/// Input for fetching the record collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrieveInput {
    pub query: String,
    #[serde(default)]
    pub data_sources: Vec<String>,
    pub time_range: Option<String>,
}

impl RetrieveInput {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            data_sources: vec!["transactions".to_string()],
            time_range: None,
        }
    }
}

/// Input for the detection engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeInput {
    /// Filled from a retrieval dependency.
    pub records: Option<RecordBatch>,
    /// Drop rule-based findings below this confidence.
    pub min_pattern_confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceInput {
    #[serde(default)]
    pub regulations: Vec<String>,
    /// Filled from analysis dependencies.
    pub findings: Option<Vec<Finding>>,
}

impl Default for ComplianceInput {
    fn default() -> Self {
        Self {
            regulations: vec!["BSA".into(), "PATRIOT_Act".into(), "OFAC".into()],
            findings: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerifyInput {
    /// Overrides the configured consensus threshold for this task.
    pub consensus_threshold: Option<f64>,
    /// Filled from analysis dependencies.
    pub findings: Option<Vec<Finding>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizeInput {
    pub report_type: String,
    pub include_recommendations: bool,
    pub records: Option<RecordBatch>,
    pub findings: Option<Vec<Finding>>,
    pub compliance: Option<Vec<ComplianceCheck>>,
    pub verification: Option<Vec<VerificationResult>>,
}

impl Default for SynthesizeInput {
    fn default() -> Self {
        Self {
            report_type: "aml_analysis".to_string(),
            include_recommendations: true,
            records: None,
            findings: None,
            compliance: None,
            verification: None,
        }
    }
}

impl SynthesizeInput {
    /// True once at least one upstream result section has arrived.
    pub fn has_results(&self) -> bool {
        self.findings.is_some() || self.compliance.is_some() || self.verification.is_some()
    }
}

/// Input payload, one variant per task type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum TaskPayload {
    Retrieve(RetrieveInput),
    Analyze(AnalyzeInput),
    ComplianceCheck(ComplianceInput),
    Verify(VerifyInput),
    Synthesize(SynthesizeInput),
}

impl TaskPayload {
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskPayload::Retrieve(_) => TaskType::Retrieve,
            TaskPayload::Analyze(_) => TaskType::Analyze,
            TaskPayload::ComplianceCheck(_) => TaskType::ComplianceCheck,
            TaskPayload::Verify(_) => TaskType::Verify,
            TaskPayload::Synthesize(_) => TaskType::Synthesize,
        }
    }

    /// Merge one upstream output into this input.
    ///
    /// List-valued sections accumulate across several dependencies of the
    /// same kind; outputs a task type has no slot for are ignored.
    pub fn absorb(&mut self, output: &TaskOutput) {
        match (self, output) {
            (TaskPayload::Analyze(input), TaskOutput::Records(batch)) => {
                merge_batch(&mut input.records, batch);
            }
            (TaskPayload::ComplianceCheck(input), TaskOutput::Analysis(analysis)) => {
                extend(&mut input.findings, &analysis.findings);
            }
            (TaskPayload::Verify(input), TaskOutput::Analysis(analysis)) => {
                extend(&mut input.findings, &analysis.findings);
            }
            (TaskPayload::Synthesize(input), TaskOutput::Records(batch)) => {
                merge_batch(&mut input.records, batch);
            }
            (TaskPayload::Synthesize(input), TaskOutput::Analysis(analysis)) => {
                extend(&mut input.findings, &analysis.findings);
            }
            (TaskPayload::Synthesize(input), TaskOutput::Compliance(compliance)) => {
                extend(&mut input.compliance, &compliance.checks);
            }
            (TaskPayload::Synthesize(input), TaskOutput::Verification(verification)) => {
                extend(&mut input.verification, &verification.results);
            }
            _ => {}
        }
    }
}

fn extend<T: Clone>(slot: &mut Option<Vec<T>>, items: &[T]) {
    slot.get_or_insert_with(Vec::new).extend_from_slice(items);
}

fn merge_batch(slot: &mut Option<RecordBatch>, batch: &RecordBatch) {
    match slot {
        Some(existing) => existing.merge(batch),
        None => *slot = Some(batch.clone()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub findings: Vec<Finding>,
    pub summary: AnalysisSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceOutput {
    pub checks: Vec<ComplianceCheck>,
    pub summary: ComplianceSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutput {
    pub results: Vec<VerificationResult>,
    pub summary: VerificationSummary,
}

/// Output payload of a successful task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TaskOutput {
    Records(RecordBatch),
    Analysis(AnalysisOutput),
    Compliance(ComplianceOutput),
    Verification(VerificationOutput),
    Report(Box<Report>),
}

impl TaskOutput {
    pub fn as_report(&self) -> Option<&Report> {
        match self {
            TaskOutput::Report(report) => Some(report),
            _ => None,
        }
    }
}
