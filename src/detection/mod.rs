//! Anomaly and pattern detection over record batches.
//!
//! The `DetectionEngine` holds a set of independent [`Detector`]s. Each one
//! scans the same record slice and returns candidate findings; detectors keep
//! no state between calls, so the engine can run them in parallel on the
//! blocking pool and simply concatenate their output.

pub mod finding;
pub mod frequency;
pub mod outlier;
pub mod record;
pub mod rules;
pub mod stats;
pub mod threshold;

pub use finding::{AnalysisSummary, DetectionMethod, Finding, FindingKind};
pub use frequency::FrequencyDetector;
pub use outlier::IsolationForestDetector;
pub use record::{Record, RecordBatch, RecordKind, RiskTier};
pub use rules::{IntegrationDetector, LayeringDetector, RapidMovementDetector, StructuringDetector};
pub use threshold::{AmountThresholdDetector, UnusualAmountDetector};

use crate::util::blocking;
use crate::Result;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// A stateless scan over a record collection.
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, records: &[Record]) -> Vec<Finding>;
}

/// Tunables for the detectors. Loaded from the `[detection]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Expected share of outliers; sets the isolation-forest boundary.
    pub contamination: f64,
    pub forest_trees: usize,
    pub forest_sample_size: usize,
    pub forest_seed: u64,
    pub amount_sigma: f64,
    pub unusual_amount_sigma: f64,
    pub frequency_sigma: f64,
    pub reporting_threshold: f64,
    pub structuring_min_count: usize,
    pub rapid_movement_secs: i64,
    pub integration_amount: f64,
    pub layering_window_secs: i64,
    pub layering_min_chain: usize,
    pub layering_max_hops: usize,
    /// Rule findings below this confidence are dropped.
    pub pattern_min_confidence: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            contamination: 0.05,
            forest_trees: 100,
            forest_sample_size: 256,
            forest_seed: 42,
            amount_sigma: 2.0,
            unusual_amount_sigma: 3.0,
            frequency_sigma: 2.0,
            reporting_threshold: 10_000.0,
            structuring_min_count: 3,
            rapid_movement_secs: 300,
            integration_amount: 50_000.0,
            layering_window_secs: 3600,
            layering_min_chain: 3,
            layering_max_hops: 10,
            pattern_min_confidence: 0.0,
        }
    }
}

pub struct DetectionEngine {
    detectors: Vec<Arc<dyn Detector>>,
    min_pattern_confidence: f64,
}

impl DetectionEngine {
    pub fn new(detectors: Vec<Arc<dyn Detector>>) -> Self {
        Self {
            detectors,
            min_pattern_confidence: 0.0,
        }
    }

    /// The full detector set: isolation forest, the two amount rules,
    /// frequency and the four pattern rules.
    pub fn from_config(config: &DetectionConfig) -> Self {
        let mut detectors: Vec<Arc<dyn Detector>> = vec![
            Arc::new(IsolationForestDetector::from_config(config)),
            Arc::new(AmountThresholdDetector::new(config.amount_sigma)),
            Arc::new(FrequencyDetector::new(config.frequency_sigma)),
            Arc::new(UnusualAmountDetector::new(config.unusual_amount_sigma)),
        ];
        detectors.extend(rules::rule_detectors(config));

        Self {
            detectors,
            min_pattern_confidence: config.pattern_min_confidence,
        }
    }

    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Run every detector in sequence on the calling thread.
    pub fn detect(&self, records: &[Record]) -> Vec<Finding> {
        let findings = self
            .detectors
            .iter()
            .flat_map(|d| d.detect(records))
            .collect();
        self.filter_patterns(findings, self.min_pattern_confidence)
    }

    /// Run every detector on the blocking pool and merge the findings in
    /// detector order.
    ///
    /// `min_pattern_confidence` overrides the configured cutoff for rule
    /// findings.
    pub async fn detect_parallel(
        &self,
        records: Arc<[Record]>,
        min_pattern_confidence: Option<f64>,
    ) -> Result<Vec<Finding>> {
        let runs = self.detectors.iter().map(|detector| {
            let detector = Arc::clone(detector);
            let records = Arc::clone(&records);
            blocking(move || {
                let findings = detector.detect(&records);
                debug!(
                    detector = detector.name(),
                    findings = findings.len(),
                    "Detector finished"
                );
                Ok(findings)
            })
        });

        let mut findings = Vec::new();
        for result in join_all(runs).await {
            findings.extend(result?);
        }

        let cutoff = min_pattern_confidence.unwrap_or(self.min_pattern_confidence);
        Ok(self.filter_patterns(findings, cutoff))
    }

    fn filter_patterns(&self, findings: Vec<Finding>, cutoff: f64) -> Vec<Finding> {
        findings
            .into_iter()
            .filter(|f| f.method != DetectionMethod::PatternRules || f.confidence >= cutoff)
            .collect()
    }
}

impl std::fmt::Debug for DetectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionEngine")
            .field("detectors", &self.detector_names())
            .field("min_pattern_confidence", &self.min_pattern_confidence)
            .finish()
    }
}
