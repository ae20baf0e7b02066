//! Policy rules over record sequences.
//!
//! These are fixed-threshold rules rather than statistics, so each emits a
//! fixed (or chain-length scaled) confidence.

use crate::detection::finding::{DetectionMethod, Finding, FindingKind};
use crate::detection::record::{Record, RecordKind, RiskTier};
use crate::detection::{DetectionConfig, Detector};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub const STRUCTURING_CONFIDENCE: f64 = 0.8;
pub const RAPID_MOVEMENT_CONFIDENCE: f64 = 0.8;
pub const INTEGRATION_CONFIDENCE: f64 = 0.7;

fn pattern_risk(confidence: f64) -> RiskTier {
    if confidence > 0.8 {
        RiskTier::High
    } else {
        RiskTier::Medium
    }
}

fn pattern(kind: FindingKind, confidence: f64, records: &[&Record]) -> Finding {
    Finding::new(
        kind,
        confidence,
        pattern_risk(confidence),
        DetectionMethod::PatternRules,
    )
    .with_records(records.iter().map(|r| r.id.clone()).collect())
    .with_amount(records.iter().map(|r| r.amount).sum())
}

/// Several sub-threshold records from one sender on one calendar day
/// that add up to more than the threshold.
pub struct StructuringDetector {
    threshold: f64,
    min_count: usize,
}

impl StructuringDetector {
    pub fn new(threshold: f64, min_count: usize) -> Self {
        Self {
            threshold,
            min_count,
        }
    }
}

impl Detector for StructuringDetector {
    fn name(&self) -> &'static str {
        "structuring"
    }

    fn detect(&self, records: &[Record]) -> Vec<Finding> {
        let mut groups: BTreeMap<(&str, NaiveDate), Vec<&Record>> = BTreeMap::new();
        for record in records {
            groups
                .entry((record.source.as_str(), record.timestamp.date_naive()))
                .or_default()
                .push(record);
        }

        groups
            .into_iter()
            .filter(|(_, group)| group.len() >= self.min_count)
            .filter(|(_, group)| {
                let total: f64 = group.iter().map(|r| r.amount).sum();
                total > self.threshold && group.iter().all(|r| r.amount < self.threshold)
            })
            .map(|((sender, day), group)| {
                pattern(FindingKind::Structuring, STRUCTURING_CONFIDENCE, &group)
                    .with_description(format!(
                        "Structuring pattern detected: {} records from {} on {}",
                        group.len(),
                        sender,
                        day
                    ))
                    .with_indicators(&[
                        "Multiple transactions under reporting threshold",
                        "Same entity involved",
                        "Same day transactions",
                    ])
                    .with_entities([sender])
            })
            .collect()
    }
}

/// Consecutive records from the same sender closer together than the window.
pub struct RapidMovementDetector {
    window_secs: i64,
}

impl RapidMovementDetector {
    pub fn new(window_secs: i64) -> Self {
        Self { window_secs }
    }
}

impl Detector for RapidMovementDetector {
    fn name(&self) -> &'static str {
        "rapid_movement"
    }

    fn detect(&self, records: &[Record]) -> Vec<Finding> {
        let mut by_sender: BTreeMap<&str, Vec<&Record>> = BTreeMap::new();
        for record in records {
            by_sender
                .entry(record.source.as_str())
                .or_default()
                .push(record);
        }

        let mut findings = Vec::new();
        for (sender, mut group) in by_sender {
            group.sort_by_key(|r| r.timestamp);
            for pair in group.windows(2) {
                let gap = (pair[1].timestamp - pair[0].timestamp).num_seconds();
                if gap < self.window_secs {
                    findings.push(
                        pattern(FindingKind::RapidMovement, RAPID_MOVEMENT_CONFIDENCE, pair)
                            .with_description(format!(
                                "Rapid movement: {} sent twice within {}s",
                                sender, gap
                            ))
                            .with_indicators(&["Quick successive transactions", "Same entity involved"])
                            .with_entities([sender]),
                    );
                }
            }
        }
        findings
    }
}

/// A single large deposit.
pub struct IntegrationDetector {
    min_amount: f64,
}

impl IntegrationDetector {
    pub fn new(min_amount: f64) -> Self {
        Self { min_amount }
    }
}

impl Detector for IntegrationDetector {
    fn name(&self) -> &'static str {
        "integration"
    }

    fn detect(&self, records: &[Record]) -> Vec<Finding> {
        records
            .iter()
            .filter(|r| r.kind == RecordKind::Deposit && r.amount > self.min_amount)
            .map(|r| {
                pattern(FindingKind::Integration, INTEGRATION_CONFIDENCE, &[r])
                    .with_indicators(&["Large deposit from unknown source", "Unusual transaction amount"])
                    .with_entities([r.target.as_str()])
            })
            .collect()
    }
}

/// Chains where each record's target is the next record's source.
///
/// From every start record the chain follows the earliest unvisited record
/// sent by the current target within the window, for at most `max_hops`
/// hops. Chains reaching `min_chain` records are reported; sub-chains found
/// from later start records are reported too.
pub struct LayeringDetector {
    window_secs: i64,
    min_chain: usize,
    max_hops: usize,
}

impl LayeringDetector {
    pub fn new(window_secs: i64, min_chain: usize, max_hops: usize) -> Self {
        Self {
            window_secs,
            min_chain,
            max_hops,
        }
    }

    /// Record indices grouped by sender, each group in timestamp order.
    fn index_by_source(records: &[Record]) -> HashMap<&str, Vec<usize>> {
        let mut by_source: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, r) in records.iter().enumerate() {
            by_source.entry(r.source.as_str()).or_default().push(i);
        }
        for indices in by_source.values_mut() {
            // Stable, so equal timestamps keep input order.
            indices.sort_by_key(|&i| records[i].timestamp);
        }
        by_source
    }

    fn follow<'a>(
        &self,
        start: usize,
        records: &'a [Record],
        by_source: &HashMap<&str, Vec<usize>>,
    ) -> Vec<&'a Record> {
        let mut chain = vec![start];
        let mut current = start;

        for _ in 0..self.max_hops {
            let from = &records[current];
            let Some(candidates) = by_source.get(from.target.as_str()) else {
                break;
            };
            let gap = |i: usize| (records[i].timestamp - from.timestamp).num_seconds();

            let first = candidates.partition_point(|&i| gap(i) < 0);
            let next = candidates[first..]
                .iter()
                .copied()
                .take_while(|&i| gap(i) < self.window_secs)
                .find(|i| !chain.contains(i));

            match next {
                Some(i) => {
                    chain.push(i);
                    current = i;
                }
                None => break,
            }
        }

        chain.into_iter().map(|i| &records[i]).collect()
    }
}

impl Detector for LayeringDetector {
    fn name(&self) -> &'static str {
        "layering"
    }

    fn detect(&self, records: &[Record]) -> Vec<Finding> {
        let by_source = Self::index_by_source(records);
        (0..records.len())
            .map(|start| self.follow(start, records, &by_source))
            .filter(|chain| chain.len() >= self.min_chain)
            .map(|chain| {
                let confidence = (0.2 * chain.len() as f64).min(0.9);
                let entities = chain
                    .iter()
                    .flat_map(|r| [r.source.as_str(), r.target.as_str()]);
                pattern(FindingKind::Layering, confidence, &chain)
                    .with_description(format!(
                        "Layering chain of {} records detected",
                        chain.len()
                    ))
                    .with_indicators(&[
                        "Complex transaction chain",
                        "Multiple entities involved",
                        "Rapid movement of funds",
                    ])
                    .with_entities(entities)
            })
            .collect()
    }
}

/// All rule detectors configured from `config`.
pub fn rule_detectors(config: &DetectionConfig) -> Vec<Arc<dyn Detector>> {
    vec![
        Arc::new(StructuringDetector::new(
            config.reporting_threshold,
            config.structuring_min_count,
        )),
        Arc::new(LayeringDetector::new(
            config.layering_window_secs,
            config.layering_min_chain,
            config.layering_max_hops,
        )),
        Arc::new(IntegrationDetector::new(config.integration_amount)),
        Arc::new(RapidMovementDetector::new(config.rapid_movement_secs)),
    ]
}
