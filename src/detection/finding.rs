//! Candidate findings emitted by detectors.

use crate::detection::record::RiskTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

/// What a finding claims to have seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Record outside the isolation-forest decision boundary.
    Outlier,
    /// Amount more than k standard deviations from the batch mean.
    AmountAnomaly,
    /// Entity with an unusually high record count.
    FrequencyAnomaly,
    /// Amount beyond the stricter "unusual amount" rule.
    UnusualAmount,
    Structuring,
    RapidMovement,
    Integration,
    Layering,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::Outlier => "outlier",
            FindingKind::AmountAnomaly => "amount_anomaly",
            FindingKind::FrequencyAnomaly => "frequency_anomaly",
            FindingKind::UnusualAmount => "unusual_amount",
            FindingKind::Structuring => "structuring",
            FindingKind::RapidMovement => "rapid_movement",
            FindingKind::Integration => "integration",
            FindingKind::Layering => "layering",
        }
    }

    /// Human-readable label, e.g. "Rapid Movement".
    pub fn label(&self) -> &'static str {
        match self {
            FindingKind::Outlier => "Outlier",
            FindingKind::AmountAnomaly => "Amount Anomaly",
            FindingKind::FrequencyAnomaly => "Frequency Anomaly",
            FindingKind::UnusualAmount => "Unusual Amount",
            FindingKind::Structuring => "Structuring",
            FindingKind::RapidMovement => "Rapid Movement",
            FindingKind::Integration => "Integration",
            FindingKind::Layering => "Layering",
        }
    }
}

impl std::fmt::Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which family of detector produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    IsolationForest,
    StatisticalAnalysis,
    PatternRules,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::IsolationForest => "isolation_forest",
            DetectionMethod::StatisticalAnalysis => "statistical_analysis",
            DetectionMethod::PatternRules => "pattern_rules",
        }
    }
}

/// A suspected anomalous item with its supporting evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: Uuid,
    pub kind: FindingKind,
    pub description: String,
    /// In [0, 1].
    pub confidence: f64,
    pub risk: RiskTier,
    /// Ids of the affected records.
    pub records: Vec<String>,
    pub indicators: Vec<String>,
    pub method: DetectionMethod,
    /// Total amount involved.
    pub amount: f64,
    /// Entities involved, sorted and unique.
    pub entities: Vec<String>,
    pub detected_at: DateTime<Utc>,
}

impl Finding {
    /// Confidence is clamped into [0, 1].
    pub fn new(kind: FindingKind, confidence: f64, risk: RiskTier, method: DetectionMethod) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            description: format!("{} pattern detected", kind.label()),
            confidence: confidence.clamp(0.0, 1.0),
            risk,
            records: Vec::new(),
            indicators: Vec::new(),
            method,
            amount: 0.0,
            entities: Vec::new(),
            detected_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_records(mut self, records: Vec<String>) -> Self {
        self.records = records;
        self
    }

    pub fn with_indicators(mut self, indicators: &[&str]) -> Self {
        self.indicators = indicators.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entities: Vec<String> = entities.into_iter().map(Into::into).collect();
        entities.sort();
        entities.dedup();
        self.entities = entities;
        self
    }

    /// True if any indicator contains `needle`, ignoring case.
    pub fn has_indicator(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.indicators
            .iter()
            .any(|i| i.to_lowercase().contains(&needle))
    }
}

/// Per-run aggregate over the findings of one analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_findings: usize,
    pub by_kind: BTreeMap<FindingKind, usize>,
    /// Findings with high or critical risk.
    pub high_risk: usize,
    pub records_analyzed: usize,
    /// Fraction of records referenced by at least one finding.
    pub anomaly_rate: f64,
}

impl AnalysisSummary {
    pub fn from_findings(findings: &[Finding], records_analyzed: usize) -> Self {
        let mut by_kind = BTreeMap::new();
        for finding in findings {
            *by_kind.entry(finding.kind).or_insert(0) += 1;
        }

        let affected: HashSet<&str> = findings
            .iter()
            .flat_map(|f| f.records.iter().map(String::as_str))
            .collect();
        let anomaly_rate = if records_analyzed == 0 {
            0.0
        } else {
            affected.len() as f64 / records_analyzed as f64
        };

        Self {
            total_findings: findings.len(),
            by_kind,
            high_risk: findings.iter().filter(|f| f.risk.is_high()).count(),
            records_analyzed,
            anomaly_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(kind: FindingKind, risk: RiskTier, records: &[&str]) -> Finding {
        Finding::new(kind, 0.8, risk, DetectionMethod::PatternRules)
            .with_records(records.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_finding_new_clamps_confidence() {
        let f = Finding::new(
            FindingKind::Outlier,
            1.7,
            RiskTier::High,
            DetectionMethod::IsolationForest,
        );
        assert_eq!(f.confidence, 1.0);
        assert_eq!(f.description, "Outlier pattern detected");

        let f = Finding::new(
            FindingKind::Outlier,
            -0.2,
            RiskTier::Low,
            DetectionMethod::IsolationForest,
        );
        assert_eq!(f.confidence, 0.0);
    }

    #[test]
    fn test_finding_entities_sorted_unique() {
        let f = finding(FindingKind::Layering, RiskTier::High, &[]).with_entities(["c", "a", "c", "b"]);
        assert_eq!(f.entities, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_has_indicator_case_insensitive() {
        let f = finding(FindingKind::Structuring, RiskTier::Medium, &[])
            .with_indicators(&["Multiple transactions under reporting threshold"]);
        assert!(f.has_indicator("THRESHOLD"));
        assert!(!f.has_indicator("chain"));
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FindingKind::RapidMovement).unwrap();
        assert_eq!(json, "\"rapid_movement\"");
        assert_eq!(FindingKind::RapidMovement.label(), "Rapid Movement");
    }

    #[test]
    fn test_summary_counts_and_rate() {
        let findings = vec![
            finding(FindingKind::Structuring, RiskTier::Medium, &["r1", "r2"]),
            finding(FindingKind::Structuring, RiskTier::High, &["r2", "r3"]),
            finding(FindingKind::Integration, RiskTier::Critical, &["r4"]),
        ];

        let summary = AnalysisSummary::from_findings(&findings, 8);

        assert_eq!(summary.total_findings, 3);
        assert_eq!(summary.by_kind[&FindingKind::Structuring], 2);
        assert_eq!(summary.by_kind[&FindingKind::Integration], 1);
        assert_eq!(summary.high_risk, 2);
        assert!((summary.anomaly_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_summary_empty_batch() {
        let summary = AnalysisSummary::from_findings(&[], 0);
        assert_eq!(summary.total_findings, 0);
        assert_eq!(summary.anomaly_rate, 0.0);
    }

    #[test]
    fn test_summary_serializes_kind_keys() {
        let findings = vec![finding(FindingKind::Layering, RiskTier::High, &["r1"])];
        let json = serde_json::to_string(&AnalysisSummary::from_findings(&findings, 1)).unwrap();
        assert!(json.contains("\"layering\":1"));
    }
}
