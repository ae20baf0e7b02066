//! Multi-method consensus verification of candidate findings.
//!
//! Every finding is scored by at least three independent
//! [`VerificationMethod`]s. The consensus score is the mean of their
//! confidences; a fixed, ordered policy then decides whether a human has to
//! look at the finding.

pub mod methods;
pub mod noise;

pub use methods::{
    BehavioralMethod, MethodVerdict, RuleBasedMethod, StatisticalMethod, VerificationMethod,
};
pub use noise::{NoNoise, NoiseSource, SeededNoise};

use crate::detection::{Finding, FindingKind};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Fewest methods a verifier may be built with.
pub const MIN_METHODS: usize = 3;

/// Consensus constants. Loaded from the `[verification]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Mean confidence needed for consensus.
    pub consensus_threshold: f64,
    /// A method verifies a finding when its confidence is above this.
    pub verified_cutoff: f64,
    /// Consensus above this score clears a finding without review.
    pub auto_clear_score: f64,
    /// Detection confidence considered high.
    pub high_confidence: f64,
    /// Consensus below this is low for a high-confidence finding.
    pub low_consensus: f64,
    /// Finding kinds that always go to review unless auto-cleared.
    pub high_risk_kinds: Vec<FindingKind>,
    /// Add seeded noise to each method's confidence.
    pub jitter: bool,
    /// Seed for the noise; a random seed is drawn when absent.
    pub seed: Option<u64>,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            consensus_threshold: 0.8,
            verified_cutoff: 0.6,
            auto_clear_score: 0.8,
            high_confidence: 0.8,
            low_consensus: 0.7,
            high_risk_kinds: vec![
                FindingKind::Structuring,
                FindingKind::Layering,
                FindingKind::Integration,
            ],
            jitter: false,
            seed: None,
        }
    }
}

impl VerificationConfig {
    /// The noise source this config asks for.
    pub fn noise(&self) -> Arc<dyn NoiseSource> {
        match (self.jitter, self.seed) {
            (false, _) => Arc::new(NoNoise),
            (true, Some(seed)) => Arc::new(SeededNoise::new(seed)),
            (true, None) => Arc::new(SeededNoise::from_entropy()),
        }
    }
}

/// Outcome of verifying one finding. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub id: Uuid,
    pub finding_id: Uuid,
    pub finding_kind: FindingKind,
    /// Verdict per method name.
    pub method_results: BTreeMap<String, MethodVerdict>,
    pub consensus_reached: bool,
    pub consensus_score: f64,
    pub disagreement_reasons: Vec<String>,
    pub human_review_required: bool,
    pub verified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub consensus_reached: usize,
    pub human_review_needed: usize,
    pub average_consensus_score: f64,
    pub consensus_rate: f64,
}

impl VerificationSummary {
    pub fn from_results(results: &[VerificationResult]) -> Self {
        let total = results.len();
        if total == 0 {
            return Self::default();
        }
        let reached = results.iter().filter(|r| r.consensus_reached).count();
        Self {
            total,
            consensus_reached: reached,
            human_review_needed: results.iter().filter(|r| r.human_review_required).count(),
            average_consensus_score: results.iter().map(|r| r.consensus_score).sum::<f64>()
                / total as f64,
            consensus_rate: reached as f64 / total as f64,
        }
    }
}

/// Aggregate method verdicts into `(reached, score, disagreement reasons)`.
pub fn consensus(
    verdicts: &BTreeMap<String, MethodVerdict>,
    threshold: f64,
) -> (bool, f64, Vec<String>) {
    if verdicts.is_empty() {
        return (false, 0.0, vec!["No verification methods ran".to_string()]);
    }

    let score = verdicts.values().map(|v| v.confidence).sum::<f64>() / verdicts.len() as f64;
    let reached = score >= threshold;

    let mut reasons = Vec::new();
    if !reached {
        reasons.push(format!(
            "Consensus score {:.2} below threshold {}",
            score, threshold
        ));
    }
    let outcomes: HashSet<bool> = verdicts.values().map(|v| v.verified).collect();
    if outcomes.len() > 1 {
        reasons.push("Agents disagree on verification result".to_string());
    }

    (reached, score, reasons)
}

pub struct ConsensusVerifier {
    methods: Vec<Arc<dyn VerificationMethod>>,
    noise: Arc<dyn NoiseSource>,
    config: VerificationConfig,
}

impl ConsensusVerifier {
    /// Statistical, rule-based and behavioral methods with the noise the
    /// config asks for.
    pub fn new(config: VerificationConfig) -> Self {
        Self {
            methods: vec![
                Arc::new(StatisticalMethod),
                Arc::new(RuleBasedMethod),
                Arc::new(BehavioralMethod),
            ],
            noise: config.noise(),
            config,
        }
    }

    /// Build with a custom method set.
    ///
    /// # Errors
    /// Returns [`Error::InsufficientMethods`] if fewer than [`MIN_METHODS`]
    /// distinct method names are given.
    pub fn with_methods(
        methods: Vec<Arc<dyn VerificationMethod>>,
        noise: Arc<dyn NoiseSource>,
        config: VerificationConfig,
    ) -> Result<Self> {
        let distinct: HashSet<&str> = methods.iter().map(|m| m.name()).collect();
        if distinct.len() < MIN_METHODS {
            return Err(Error::InsufficientMethods {
                required: MIN_METHODS,
                given: distinct.len(),
            });
        }
        Ok(Self {
            methods,
            noise,
            config,
        })
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    pub fn method_names(&self) -> Vec<&'static str> {
        self.methods.iter().map(|m| m.name()).collect()
    }

    /// Verify against the configured consensus threshold.
    pub fn verify(&self, finding: &Finding) -> VerificationResult {
        self.verify_with_threshold(finding, self.config.consensus_threshold)
    }

    pub fn verify_with_threshold(&self, finding: &Finding, threshold: f64) -> VerificationResult {
        let method_results: BTreeMap<String, MethodVerdict> = self
            .methods
            .iter()
            .map(|method| {
                let verdict =
                    method.verify(finding, self.noise.as_ref(), self.config.verified_cutoff);
                (method.name().to_string(), verdict)
            })
            .collect();

        let (consensus_reached, consensus_score, disagreement_reasons) =
            consensus(&method_results, threshold);
        let human_review_required = self.requires_review(consensus_reached, consensus_score, finding);

        debug!(
            finding = %finding.id,
            kind = %finding.kind,
            score = consensus_score,
            reached = consensus_reached,
            review = human_review_required,
            "Finding verified"
        );

        VerificationResult {
            id: Uuid::new_v4(),
            finding_id: finding.id,
            finding_kind: finding.kind,
            method_results,
            consensus_reached,
            consensus_score,
            disagreement_reasons,
            human_review_required,
            verified_at: Utc::now(),
        }
    }

    /// Verify each finding in order.
    pub fn verify_all(&self, findings: &[Finding], threshold: Option<f64>) -> Vec<VerificationResult> {
        let threshold = threshold.unwrap_or(self.config.consensus_threshold);
        findings
            .iter()
            .map(|f| self.verify_with_threshold(f, threshold))
            .collect()
    }

    /// Review policy, first matching rule wins.
    fn requires_review(&self, reached: bool, score: f64, finding: &Finding) -> bool {
        let config = &self.config;
        if reached && score > config.auto_clear_score {
            return false;
        }
        if !reached {
            return true;
        }
        if config.high_risk_kinds.contains(&finding.kind) {
            return true;
        }
        finding.confidence > config.high_confidence && score < config.low_consensus
    }
}

impl std::fmt::Debug for ConsensusVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusVerifier")
            .field("methods", &self.method_names())
            .field("config", &self.config)
            .finish()
    }
}
