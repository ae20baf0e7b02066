//! Compliance capability: rule-based regulatory assessment per finding.

use crate::agents::Capability;
use crate::core::{ComplianceOutput, Task, TaskOutput, TaskPayload, TaskType};
use crate::detection::{Finding, FindingKind};
use crate::report::{ComplianceCheck, ComplianceStatus, ComplianceSummary};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

const BSA: &str = "BSA";
const PATRIOT_ACT: &str = "PATRIOT_Act";
const OFAC: &str = "OFAC";

#[derive(Debug, Clone, Copy, Default)]
pub struct ComplianceCapability;

impl ComplianceCapability {
    pub fn new() -> Self {
        Self
    }
}

/// Regulations a finding falls under. BSA always applies.
///
/// When `requested` is non-empty the result is restricted to it, BSA
/// excepted.
pub fn relevant_regulations(finding: &Finding, requested: &[String]) -> Vec<String> {
    let mut patriot = false;
    let mut ofac = false;

    match finding.kind {
        FindingKind::Structuring | FindingKind::Integration => patriot = true,
        FindingKind::Layering => {
            patriot = true;
            ofac = true;
        }
        _ => {}
    }
    if finding.has_indicator("international") {
        ofac = true;
    }
    if finding.has_indicator("terrorist") {
        patriot = true;
        ofac = true;
    }

    let wanted = |name: &str| requested.is_empty() || requested.iter().any(|r| r == name);
    let mut regulations = vec![BSA.to_string()];
    if patriot && wanted(PATRIOT_ACT) {
        regulations.push(PATRIOT_ACT.to_string());
    }
    if ofac && wanted(OFAC) {
        regulations.push(OFAC.to_string());
    }
    regulations
}

/// Assess one finding.
pub fn assess(finding: &Finding, requested: &[String]) -> ComplianceCheck {
    let regulations = relevant_regulations(finding, requested);
    let confidence = finding.confidence;

    let status = if confidence > 0.8 {
        ComplianceStatus::NonCompliant
    } else if confidence > 0.6 {
        ComplianceStatus::RequiresReview
    } else {
        ComplianceStatus::InsufficientData
    };

    let justification = format!(
        "Pattern type '{}' detected with {:.2} confidence. Risk level: {}. Indicators: {}. \
         Relevant regulations: {}.",
        finding.kind,
        confidence,
        finding.risk,
        finding.indicators.join(", "),
        regulations.join(", ")
    );

    let mut risk_assessment = format!(
        "High risk due to {} pattern with {:.2} confidence.",
        finding.kind, confidence
    );
    match finding.kind {
        FindingKind::Structuring => {
            risk_assessment.push_str(" Potential BSA violation for structuring transactions.")
        }
        FindingKind::Layering => risk_assessment
            .push_str(" Complex transaction chain suggests money laundering attempt."),
        FindingKind::Integration => risk_assessment
            .push_str(" Large amounts from unknown sources require investigation."),
        _ => {}
    }

    let recommended_actions: &[&str] = match status {
        ComplianceStatus::NonCompliant => &[
            "File Suspicious Activity Report (SAR)",
            "Freeze affected accounts",
            "Conduct enhanced due diligence",
            "Report to regulatory authorities",
        ],
        ComplianceStatus::RequiresReview => &[
            "Conduct manual review",
            "Gather additional information",
            "Monitor account activity",
            "Consider enhanced monitoring",
        ],
        ComplianceStatus::Compliant | ComplianceStatus::InsufficientData => &[
            "Continue monitoring",
            "Document findings",
            "Update risk assessment",
        ],
    };

    ComplianceCheck {
        id: Uuid::new_v4(),
        finding_id: finding.id,
        regulations,
        status,
        justification,
        risk_assessment,
        recommended_actions: recommended_actions.iter().map(|a| a.to_string()).collect(),
        checked_at: Utc::now(),
    }
}

#[async_trait]
impl Capability for ComplianceCapability {
    fn name(&self) -> &str {
        "compliance"
    }

    fn task_type(&self) -> TaskType {
        TaskType::ComplianceCheck
    }

    fn validate(&self, task: &Task) -> bool {
        matches!(&task.payload, TaskPayload::ComplianceCheck(input) if input.findings.is_some())
    }

    async fn process(&self, task: &Task) -> Result<TaskOutput> {
        let TaskPayload::ComplianceCheck(input) = &task.payload else {
            return Err(Error::Validation("expected a compliance payload".to_string()));
        };
        let findings = input.findings.as_deref().unwrap_or_default();

        let checks: Vec<ComplianceCheck> = findings
            .iter()
            .map(|f| assess(f, &input.regulations))
            .collect();
        let summary = ComplianceSummary::from_checks(&checks);

        info!(
            task = %task.id,
            checks = summary.total_checks,
            non_compliant = summary.non_compliant,
            requires_review = summary.requires_review,
            "Compliance checks finished"
        );
        Ok(TaskOutput::Compliance(ComplianceOutput { checks, summary }))
    }
}
