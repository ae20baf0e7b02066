//! Per-entity activity frequency detector.

use crate::detection::finding::{DetectionMethod, Finding, FindingKind};
use crate::detection::record::{Record, RiskTier};
use crate::detection::stats;
use crate::detection::Detector;
use std::collections::BTreeMap;

/// Flags every record of an entity whose record count exceeds
/// `mean + sigma * std` of the per-entity count distribution.
pub struct FrequencyDetector {
    sigma: f64,
}

impl FrequencyDetector {
    pub fn new(sigma: f64) -> Self {
        Self { sigma }
    }
}

impl Detector for FrequencyDetector {
    fn name(&self) -> &'static str {
        "frequency"
    }

    fn detect(&self, records: &[Record]) -> Vec<Finding> {
        let mut by_entity: BTreeMap<&str, Vec<&Record>> = BTreeMap::new();
        for record in records {
            by_entity.entry(record.source.as_str()).or_default().push(record);
        }

        let counts: Vec<f64> = by_entity.values().map(|rs| rs.len() as f64).collect();
        let mean = stats::mean(&counts);
        let std = stats::std_dev(&counts);
        let limit = mean + self.sigma * std;

        by_entity
            .into_iter()
            .filter(|(_, rs)| rs.len() as f64 > limit)
            .map(|(entity, rs)| {
                let z = stats::z_score(rs.len() as f64, mean, std);
                let confidence = stats::z_confidence(z);
                let risk = if confidence > 0.8 {
                    RiskTier::High
                } else {
                    RiskTier::Medium
                };
                Finding::new(
                    FindingKind::FrequencyAnomaly,
                    confidence,
                    risk,
                    DetectionMethod::StatisticalAnalysis,
                )
                .with_description(format!(
                    "Entity {} has {} records against a mean of {:.1}",
                    entity,
                    rs.len(),
                    mean
                ))
                .with_records(rs.iter().map(|r| r.id.clone()).collect())
                .with_indicators(&["Unusual transaction frequency"])
                .with_amount(rs.iter().map(|r| r.amount).sum())
                .with_entities([entity])
            })
            .collect()
    }
}
