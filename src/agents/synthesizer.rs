//! Synthesis capability: assembles the final report.
//!
//! The report body is built from upstream results. Its free-text
//! description comes from a [`TextSynthesizer`]; if that collaborator fails
//! or runs past its own timeout the report falls back to
//! [`Report::fallback_summary`] instead of failing the task.

use crate::agents::Capability;
use crate::core::{Task, TaskOutput, TaskPayload, TaskType};
use crate::detection::{FindingKind, RiskTier};
use crate::orchestration::DEFAULT_SYNTHESIS_TIMEOUT_SECS;
use crate::report::{ComplianceStatus, Report, ReportStatus};
use crate::verification::{VerificationResult, VerificationSummary};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// Structured counts handed to the text synthesizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisContext {
    pub records_analyzed: usize,
    pub total_amount: f64,
    pub total_findings: usize,
    pub high_risk_findings: usize,
    pub violation_count: usize,
    pub findings_by_kind: BTreeMap<FindingKind, usize>,
    pub findings_by_risk: BTreeMap<RiskTier, usize>,
    pub compliance_by_status: BTreeMap<ComplianceStatus, usize>,
    pub verification: VerificationSummary,
}

impl SynthesisContext {
    pub fn from_report(report: &Report) -> Self {
        let mut findings_by_kind = BTreeMap::new();
        let mut findings_by_risk = BTreeMap::new();
        for finding in &report.findings {
            *findings_by_kind.entry(finding.kind).or_insert(0) += 1;
            *findings_by_risk.entry(finding.risk).or_insert(0) += 1;
        }

        let mut compliance_by_status = BTreeMap::new();
        for check in &report.compliance_checks {
            *compliance_by_status.entry(check.status).or_insert(0) += 1;
        }

        let results: Vec<VerificationResult> = report.verification.values().cloned().collect();

        Self {
            records_analyzed: report.records_analyzed,
            total_amount: report.total_amount,
            total_findings: report.findings.len(),
            high_risk_findings: report.high_risk_findings,
            violation_count: report.violation_count,
            findings_by_kind,
            findings_by_risk,
            compliance_by_status,
            verification: VerificationSummary::from_results(&results),
        }
    }
}

/// Turns a [`SynthesisContext`] into the report's description.
#[async_trait]
pub trait TextSynthesizer: Send + Sync {
    async fn synthesize(&self, context: &SynthesisContext) -> Result<String>;
}

/// Renders the context into a fixed sectioned layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateSynthesizer;

impl TemplateSynthesizer {
    pub fn render(context: &SynthesisContext) -> String {
        let mut out = String::from("Executive Summary\n\n");
        let _ = writeln!(
            out,
            "{} records totaling ${:.2} were analyzed. {} suspicious patterns were found, \
             {} of them high risk, with {} compliance violations.",
            context.records_analyzed,
            context.total_amount,
            context.total_findings,
            context.high_risk_findings,
            context.violation_count
        );

        out.push_str("\nPattern Types Found:\n");
        if context.findings_by_kind.is_empty() {
            out.push_str("No patterns detected\n");
        }
        for (kind, count) in &context.findings_by_kind {
            let _ = writeln!(out, "- {}: {}", kind, count);
        }

        out.push_str("\nRisk Tiers:\n");
        if context.findings_by_risk.is_empty() {
            out.push_str("No findings\n");
        }
        for (risk, count) in context.findings_by_risk.iter().rev() {
            let _ = writeln!(out, "- {}: {}", risk, count);
        }

        out.push_str("\nCompliance Status:\n");
        if context.compliance_by_status.is_empty() {
            out.push_str("No compliance checks performed\n");
        }
        for (status, count) in &context.compliance_by_status {
            let _ = writeln!(out, "- {}: {}", status, count);
        }

        let v = &context.verification;
        let _ = write!(
            out,
            "\nVerification Results:\n\
             - Total verifications: {}\n\
             - Consensus reached: {}\n\
             - Human review required: {}\n\
             - Average consensus score: {:.2}",
            v.total, v.consensus_reached, v.human_review_needed, v.average_consensus_score
        );
        out
    }
}

#[async_trait]
impl TextSynthesizer for TemplateSynthesizer {
    async fn synthesize(&self, context: &SynthesisContext) -> Result<String> {
        Ok(Self::render(context))
    }
}

pub struct SynthesisCapability {
    synthesizer: Arc<dyn TextSynthesizer>,
    synthesis_timeout: Duration,
}

impl SynthesisCapability {
    pub fn new(synthesizer: Arc<dyn TextSynthesizer>) -> Self {
        Self {
            synthesizer,
            synthesis_timeout: Duration::from_secs(DEFAULT_SYNTHESIS_TIMEOUT_SECS),
        }
    }

    /// Bound on the collaborator call. Must stay below the task timeout.
    pub fn with_timeout(mut self, synthesis_timeout: Duration) -> Self {
        self.synthesis_timeout = synthesis_timeout;
        self
    }

    async fn describe(&self, context: &SynthesisContext) -> Result<String> {
        timeout(self.synthesis_timeout, self.synthesizer.synthesize(context))
            .await
            .map_err(|_| Error::Timeout(self.synthesis_timeout))?
    }
}

#[async_trait]
impl Capability for SynthesisCapability {
    fn name(&self) -> &str {
        "synthesizer"
    }

    fn task_type(&self) -> TaskType {
        TaskType::Synthesize
    }

    fn validate(&self, task: &Task) -> bool {
        matches!(&task.payload, TaskPayload::Synthesize(input) if input.has_results())
    }

    async fn process(&self, task: &Task) -> Result<TaskOutput> {
        let TaskPayload::Synthesize(input) = &task.payload else {
            return Err(Error::Validation("expected a synthesize payload".to_string()));
        };

        let mut report = Report::new(&Report::title_for(&input.report_type));
        if let Some(batch) = &input.records {
            report.records_analyzed = batch.len();
            report.total_amount = batch.total_amount();
        }
        for finding in input.findings.iter().flatten() {
            report.add_finding(finding.clone());
        }
        for check in input.compliance.iter().flatten() {
            report.add_compliance_check(check.clone());
        }
        for result in input.verification.iter().flatten() {
            report.add_verification(result.clone());
        }
        if input.include_recommendations {
            report.recommendations = report.build_recommendations();
        }

        let context = SynthesisContext::from_report(&report);
        report.description = match self.describe(&context).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!(task = %task.id, "Text synthesis returned nothing, using template summary");
                report.fallback_summary()
            }
            Err(e) => {
                warn!(task = %task.id, error = %e, "Text synthesis failed, using template summary");
                report.fallback_summary()
            }
        };

        let status = if report.review_count() > 0 {
            ReportStatus::PendingReview
        } else {
            ReportStatus::Draft
        };
        report.set_status(status);

        info!(
            task = %task.id,
            report = %report.id,
            findings = report.findings.len(),
            violations = report.violation_count,
            status = ?report.status,
            "Report synthesized"
        );
        Ok(TaskOutput::Report(Box::new(report)))
    }
}
