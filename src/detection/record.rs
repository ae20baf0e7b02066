//! Normalized input records for the detectors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered risk tiers, shared by records and findings.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    /// Ordinal used in feature vectors (low = 0 .. critical = 3).
    pub fn ordinal(&self) -> f64 {
        match self {
            RiskTier::Low => 0.0,
            RiskTier::Medium => 1.0,
            RiskTier::High => 2.0,
            RiskTier::Critical => 3.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        }
    }

    /// High or critical.
    pub fn is_high(&self) -> bool {
        *self >= RiskTier::High
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorical record type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Deposit,
    Withdrawal,
    #[default]
    Transfer,
    Payment,
    Exchange,
    Wire,
    Ach,
    Card,
}

impl RecordKind {
    /// Ordinal used in feature vectors (deposit = 0 .. card = 7).
    pub fn ordinal(&self) -> f64 {
        match self {
            RecordKind::Deposit => 0.0,
            RecordKind::Withdrawal => 1.0,
            RecordKind::Transfer => 2.0,
            RecordKind::Payment => 3.0,
            RecordKind::Exchange => 4.0,
            RecordKind::Wire => 5.0,
            RecordKind::Ach => 6.0,
            RecordKind::Card => 7.0,
        }
    }
}

/// One timestamped movement of value from `source` to `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub amount: f64,
    #[serde(default)]
    pub kind: RecordKind,
    /// Originating entity.
    pub source: String,
    /// Receiving entity.
    pub target: String,
    #[serde(default)]
    pub risk: RiskTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Record {
    pub fn new(
        id: &str,
        timestamp: DateTime<Utc>,
        amount: f64,
        kind: RecordKind,
        source: &str,
        target: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            timestamp,
            amount,
            kind,
            source: source.to_string(),
            target: target.to_string(),
            risk: RiskTier::Low,
            reference: None,
        }
    }

    pub fn with_risk(mut self, risk: RiskTier) -> Self {
        self.risk = risk;
        self
    }

    pub fn with_reference(mut self, reference: &str) -> Self {
        self.reference = Some(reference.to_string());
        self
    }
}

/// A record collection plus free-form metadata from the retrieval source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordBatch {
    pub records: Vec<Record>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl RecordBatch {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append another batch. Existing metadata keys win.
    pub fn merge(&mut self, other: &RecordBatch) {
        self.records.extend(other.records.iter().cloned());
        for (key, value) in &other.metadata {
            self.metadata
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    pub fn total_amount(&self) -> f64 {
        self.records.iter().map(|r| r.amount).sum()
    }

    /// Records with high or critical risk.
    pub fn high_risk(&self) -> Vec<&Record> {
        self.records.iter().filter(|r| r.risk.is_high()).collect()
    }
}
