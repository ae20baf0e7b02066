//! Compliance checks and the final analysis report.

use crate::detection::Finding;
use crate::verification::VerificationResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    RequiresReview,
    InsufficientData,
}

impl ComplianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceStatus::Compliant => "compliant",
            ComplianceStatus::NonCompliant => "non_compliant",
            ComplianceStatus::RequiresReview => "requires_review",
            ComplianceStatus::InsufficientData => "insufficient_data",
        }
    }
}

impl std::fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assessment of one finding against the regulations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceCheck {
    pub id: Uuid,
    pub finding_id: Uuid,
    pub regulations: Vec<String>,
    pub status: ComplianceStatus,
    pub justification: String,
    pub risk_assessment: String,
    pub recommended_actions: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    pub total_checks: usize,
    pub non_compliant: usize,
    pub requires_review: usize,
    pub compliant: usize,
    pub compliance_rate: f64,
    /// Non-compliant plus requires-review.
    pub high_risk_count: usize,
}

impl ComplianceSummary {
    pub fn from_checks(checks: &[ComplianceCheck]) -> Self {
        let count = |status: ComplianceStatus| checks.iter().filter(|c| c.status == status).count();
        let non_compliant = count(ComplianceStatus::NonCompliant);
        let requires_review = count(ComplianceStatus::RequiresReview);
        let compliant = count(ComplianceStatus::Compliant);

        Self {
            total_checks: checks.len(),
            non_compliant,
            requires_review,
            compliant,
            compliance_rate: if checks.is_empty() {
                0.0
            } else {
                compliant as f64 / checks.len() as f64
            },
            high_risk_count: non_compliant + requires_review,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    #[default]
    Draft,
    PendingReview,
    Approved,
    Rejected,
    Submitted,
}

/// The shape read by dashboards and exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub id: Uuid,
    pub title: String,
    pub status: ReportStatus,
    pub total_findings: usize,
    pub high_risk_findings: usize,
    pub violation_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything known about one finding.
#[derive(Debug, Clone, Serialize)]
pub struct FindingEntry<'a> {
    pub finding: &'a Finding,
    pub compliance: Option<&'a ComplianceCheck>,
    pub verification: Option<&'a VerificationResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub findings: Vec<Finding>,
    pub compliance_checks: Vec<ComplianceCheck>,
    /// Keyed by finding id.
    pub verification: BTreeMap<Uuid, VerificationResult>,
    pub records_analyzed: usize,
    pub total_amount: f64,
    pub high_risk_findings: usize,
    pub violation_count: usize,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl Report {
    pub fn new(title: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            status: ReportStatus::Draft,
            created_at: now,
            updated_at: now,
            findings: Vec::new(),
            compliance_checks: Vec::new(),
            verification: BTreeMap::new(),
            records_analyzed: 0,
            total_amount: 0.0,
            high_risk_findings: 0,
            violation_count: 0,
            recommendations: Vec::new(),
        }
    }

    /// Title for a report type such as `aml_analysis`.
    pub fn title_for(report_type: &str) -> String {
        let words: Vec<String> = report_type
            .split('_')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect();
        format!("AML Analysis Report - {}", words.join(" "))
    }

    pub fn add_finding(&mut self, finding: Finding) {
        if finding.risk.is_high() {
            self.high_risk_findings += 1;
        }
        self.findings.push(finding);
    }

    pub fn add_compliance_check(&mut self, check: ComplianceCheck) {
        if check.status == ComplianceStatus::NonCompliant {
            self.violation_count += 1;
        }
        self.compliance_checks.push(check);
    }

    pub fn add_verification(&mut self, result: VerificationResult) {
        self.verification.insert(result.finding_id, result);
    }

    pub fn set_status(&mut self, status: ReportStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn review_count(&self) -> usize {
        self.verification
            .values()
            .filter(|v| v.human_review_required)
            .count()
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            id: self.id,
            title: self.title.clone(),
            status: self.status,
            total_findings: self.findings.len(),
            high_risk_findings: self.high_risk_findings,
            violation_count: self.violation_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Findings with their compliance check and verification, keyed by
    /// finding id.
    pub fn listing(&self) -> BTreeMap<Uuid, FindingEntry<'_>> {
        self.findings
            .iter()
            .map(|finding| {
                let entry = FindingEntry {
                    finding,
                    compliance: self
                        .compliance_checks
                        .iter()
                        .find(|c| c.finding_id == finding.id),
                    verification: self.verification.get(&finding.id),
                };
                (finding.id, entry)
            })
            .collect()
    }

    /// Follow-up actions derived from the counts in the report.
    pub fn build_recommendations(&self) -> Vec<String> {
        let mut recommendations = Vec::new();

        if self.high_risk_findings > 0 {
            recommendations.extend([
                "Immediate action required: High-risk patterns detected".to_string(),
                "File Suspicious Activity Reports (SARs) for all high-risk patterns".to_string(),
                "Implement enhanced monitoring for affected entities".to_string(),
            ]);
        }

        if self.violation_count > 0 {
            recommendations.extend([
                "Address compliance violations immediately".to_string(),
                "Review and update compliance procedures".to_string(),
                "Conduct staff training on AML regulations".to_string(),
            ]);
        }

        let review = self.review_count();
        if review > 0 {
            recommendations.push(format!(
                "Conduct manual review for {} patterns requiring human oversight",
                review
            ));
        }

        recommendations.extend([
            "Continue monitoring for similar patterns".to_string(),
            "Update risk assessment models based on findings".to_string(),
            "Consider implementing additional detection algorithms".to_string(),
            "Review customer due diligence procedures".to_string(),
        ]);
        recommendations
    }

    /// Deterministic description used when text synthesis is unavailable.
    pub fn fallback_summary(&self) -> String {
        format!(
            "AML Analysis Report Summary\n\n\
             This report analyzes {} records totaling ${:.2}.\n\n\
             Key Findings:\n\
             - {} suspicious patterns detected\n\
             - {} high-risk patterns identified\n\
             - {} compliance violations found\n\
             - {} findings require human review\n\n\
             Findings were produced by anomaly detection, statistical analysis and pattern \
             rules, verified by multi-method consensus and checked against the relevant \
             AML regulations.",
            self.records_analyzed,
            self.total_amount,
            self.findings.len(),
            self.high_risk_findings,
            self.violation_count,
            self.review_count(),
        )
    }
}
