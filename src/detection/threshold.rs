//! Z-score detectors over record amounts.

use crate::detection::finding::{DetectionMethod, Finding, FindingKind};
use crate::detection::record::{Record, RiskTier};
use crate::detection::stats;
use crate::detection::Detector;

/// Flags amounts more than `sigma` standard deviations from the batch mean.
pub struct AmountThresholdDetector {
    sigma: f64,
}

impl AmountThresholdDetector {
    pub fn new(sigma: f64) -> Self {
        Self { sigma }
    }
}

impl Detector for AmountThresholdDetector {
    fn name(&self) -> &'static str {
        "amount_threshold"
    }

    fn detect(&self, records: &[Record]) -> Vec<Finding> {
        outlying_amounts(records, self.sigma)
            .map(|(record, z)| {
                let confidence = stats::z_confidence(z);
                finding(FindingKind::AmountAnomaly, record, confidence)
                    .with_description(format!(
                        "Amount {:.2} is {:.1} standard deviations from the mean",
                        record.amount, z
                    ))
                    .with_indicators(&["Unusual transaction amount"])
            })
            .collect()
    }
}

/// The stricter "unusual amount" rule (default k = 3).
pub struct UnusualAmountDetector {
    sigma: f64,
}

impl UnusualAmountDetector {
    pub fn new(sigma: f64) -> Self {
        Self { sigma }
    }
}

impl Detector for UnusualAmountDetector {
    fn name(&self) -> &'static str {
        "unusual_amount"
    }

    fn detect(&self, records: &[Record]) -> Vec<Finding> {
        outlying_amounts(records, self.sigma)
            .map(|(record, z)| {
                finding(FindingKind::UnusualAmount, record, stats::z_confidence(z))
                    .with_indicators(&["Statistically significant amount", "High z-score"])
            })
            .collect()
    }
}

fn outlying_amounts(records: &[Record], sigma: f64) -> impl Iterator<Item = (&Record, f64)> {
    let amounts: Vec<f64> = records.iter().map(|r| r.amount).collect();
    let mean = stats::mean(&amounts);
    let std = stats::std_dev(&amounts);

    records
        .iter()
        .map(move |record| (record, stats::z_score(record.amount, mean, std)))
        .filter(move |(_, z)| std > 0.0 && *z > sigma)
}

fn finding(kind: FindingKind, record: &Record, confidence: f64) -> Finding {
    let risk = if confidence > 0.8 {
        RiskTier::High
    } else {
        RiskTier::Medium
    };
    Finding::new(kind, confidence, risk, DetectionMethod::StatisticalAnalysis)
        .with_records(vec![record.id.clone()])
        .with_amount(record.amount)
        .with_entities([record.source.as_str()])
}
