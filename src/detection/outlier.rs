//! Multivariate outlier detection with an isolation forest.
//!
//! Each record becomes a six-feature vector (amount, hour, weekday, month,
//! risk ordinal, kind ordinal), standardized per column. The forest is
//! fitted on the batch it scores, with a fixed seed, so the same batch always
//! yields the same findings.

use crate::detection::finding::{DetectionMethod, Finding, FindingKind};
use crate::detection::record::{Record, RiskTier};
use crate::detection::stats;
use crate::detection::{DetectionConfig, Detector};
use chrono::{Datelike, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const FEATURES: usize = 6;
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

type FeatureVector = [f64; FEATURES];

pub struct IsolationForestDetector {
    trees: usize,
    sample_size: usize,
    contamination: f64,
    seed: u64,
}

impl IsolationForestDetector {
    pub fn new(trees: usize, sample_size: usize, contamination: f64, seed: u64) -> Self {
        Self {
            trees: trees.max(1),
            sample_size: sample_size.max(2),
            contamination: contamination.clamp(0.0, 0.5),
            seed,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(
            config.forest_trees,
            config.forest_sample_size,
            config.contamination,
            config.forest_seed,
        )
    }

    /// Anomaly score per record, in (0, 1]. Higher is more anomalous.
    pub fn scores(&self, records: &[Record]) -> Vec<f64> {
        if records.len() < 2 {
            return vec![0.0; records.len()];
        }

        let data = standardize(records.iter().map(features).collect());
        let mut rng = StdRng::seed_from_u64(self.seed);
        let psi = self.sample_size.min(data.len());
        let limit = (psi as f64).log2().ceil() as usize;

        let forest: Vec<Node> = (0..self.trees)
            .map(|_| {
                let sample = rand::seq::index::sample(&mut rng, data.len(), psi).into_vec();
                build(&data, &sample, 0, limit, &mut rng)
            })
            .collect();

        let normalizer = average_path_length(psi);
        data.iter()
            .map(|point| {
                let mean_depth = forest
                    .iter()
                    .map(|tree| path_length(tree, point, 0))
                    .sum::<f64>()
                    / forest.len() as f64;
                2f64.powf(-mean_depth / normalizer)
            })
            .collect()
    }
}

impl Detector for IsolationForestDetector {
    fn name(&self) -> &'static str {
        "isolation_forest"
    }

    fn detect(&self, records: &[Record]) -> Vec<Finding> {
        if records.len() < 2 {
            return Vec::new();
        }

        let scores = self.scores(records);
        let boundary = stats::quantile(&scores, 1.0 - self.contamination);

        records
            .iter()
            .zip(scores)
            .filter(|(_, score)| *score > boundary)
            .map(|(record, score)| {
                let mut indicators = vec!["Isolation Forest anomaly"];
                if score > 0.8 {
                    indicators.push("High anomaly score");
                }
                let risk = if score > 0.7 {
                    RiskTier::High
                } else {
                    RiskTier::Medium
                };
                Finding::new(
                    FindingKind::Outlier,
                    score,
                    risk,
                    DetectionMethod::IsolationForest,
                )
                .with_description(format!(
                    "Anomalous record detected with score {:.3}",
                    score
                ))
                .with_records(vec![record.id.clone()])
                .with_indicators(&indicators)
                .with_amount(record.amount)
                .with_entities([record.source.as_str()])
            })
            .collect()
    }
}

fn features(record: &Record) -> FeatureVector {
    let ts = record.timestamp;
    [
        record.amount,
        ts.hour() as f64,
        ts.weekday().num_days_from_monday() as f64,
        ts.month() as f64,
        record.risk.ordinal(),
        record.kind.ordinal(),
    ]
}

/// Scale each column to zero mean and unit variance. Constant columns become 0.
fn standardize(mut data: Vec<FeatureVector>) -> Vec<FeatureVector> {
    for column in 0..FEATURES {
        let values: Vec<f64> = data.iter().map(|row| row[column]).collect();
        let mean = stats::mean(&values);
        let std = stats::std_dev(&values);
        for row in data.iter_mut() {
            row[column] = if std > 0.0 {
                (row[column] - mean) / std
            } else {
                0.0
            };
        }
    }
    data
}

enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

fn build(
    data: &[FeatureVector],
    indices: &[usize],
    depth: usize,
    limit: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= limit || indices.len() <= 1 {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    // Only columns with spread can split the node
    let candidates: Vec<(usize, f64, f64)> = (0..FEATURES)
        .filter_map(|feature| {
            let (lo, hi) = indices.iter().fold(
                (f64::INFINITY, f64::NEG_INFINITY),
                |(lo, hi), &i| (lo.min(data[i][feature]), hi.max(data[i][feature])),
            );
            (hi > lo).then_some((feature, lo, hi))
        })
        .collect();

    if candidates.is_empty() {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
    let threshold = rng.gen_range(lo..hi);
    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| data[i][feature] < threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build(data, &left, depth + 1, limit, rng)),
        right: Box::new(build(data, &right, depth + 1, limit, rng)),
    }
}

fn path_length(node: &Node, point: &FeatureVector, depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if point[*feature] < *threshold {
                path_length(left, point, depth + 1)
            } else {
                path_length(right, point, depth + 1)
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}
