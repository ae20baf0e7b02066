//! Independent verification methods.
//!
//! Each method scores a finding from a different angle. Scores are plain
//! weighted rules; the verifier only relies on the resulting confidence.

use crate::detection::{DetectionMethod, Finding, FindingKind, RiskTier};
use crate::verification::noise::NoiseSource;
use serde::{Deserialize, Serialize};

/// One method's opinion of one finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodVerdict {
    pub verified: bool,
    /// In [0, 1].
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub factors: Vec<String>,
}

impl MethodVerdict {
    /// Clamp `confidence` and mark it verified if strictly above `cutoff`.
    pub fn new(confidence: f64, cutoff: f64, reasoning: String, factors: &[&str]) -> Self {
        let confidence = confidence.clamp(0.0, 1.0);
        Self {
            verified: confidence > cutoff,
            confidence,
            reasoning,
            factors: factors.iter().map(|f| f.to_string()).collect(),
        }
    }
}

pub trait VerificationMethod: Send + Sync {
    fn name(&self) -> &'static str;

    fn verify(&self, finding: &Finding, noise: &dyn NoiseSource, cutoff: f64) -> MethodVerdict;
}

/// Scales detection confidence by kind and amount.
pub struct StatisticalMethod;

impl VerificationMethod for StatisticalMethod {
    fn name(&self) -> &'static str {
        "statistical"
    }

    fn verify(&self, finding: &Finding, noise: &dyn NoiseSource, cutoff: f64) -> MethodVerdict {
        let mut score = finding.confidence * 0.8;

        match finding.kind {
            FindingKind::Structuring => score *= 1.2,
            FindingKind::Layering => score *= 0.9,
            _ => {}
        }

        if finding.amount > 100_000.0 {
            score *= 1.1;
        } else if finding.amount < 1000.0 {
            score *= 0.8;
        }

        let score = (score + noise.jitter(0.1)).clamp(0.0, 1.0);
        MethodVerdict::new(
            score,
            cutoff,
            format!(
                "Statistical analysis indicates {:.2} confidence in {} pattern",
                score, finding.kind
            ),
            &["amount_analysis", "frequency_analysis", "pattern_recognition"],
        )
    }
}

/// Counts indicators and weighs risk tier and kind-specific evidence.
pub struct RuleBasedMethod;

impl VerificationMethod for RuleBasedMethod {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    fn verify(&self, finding: &Finding, noise: &dyn NoiseSource, cutoff: f64) -> MethodVerdict {
        let mut score = 0.5;

        let indicators = finding.indicators.len();
        if indicators >= 3 {
            score += 0.2;
        } else if indicators >= 2 {
            score += 0.1;
        }

        match finding.risk {
            RiskTier::High => score += 0.2,
            RiskTier::Critical => score += 0.3,
            RiskTier::Low | RiskTier::Medium => {}
        }

        if finding.kind == FindingKind::Structuring && finding.has_indicator("threshold") {
            score += 0.2;
        }
        if finding.kind == FindingKind::Layering && finding.has_indicator("chain") {
            score += 0.2;
        }

        let score = (score + noise.jitter(0.05)).clamp(0.0, 1.0);
        MethodVerdict::new(
            score,
            cutoff,
            format!(
                "Rule-based analysis shows {:.2} confidence based on {} indicators",
                score, indicators
            ),
            &["indicator_count", "risk_level", "pattern_rules"],
        )
    }
}

/// Looks at how many entities are involved and how the finding was produced.
pub struct BehavioralMethod;

impl VerificationMethod for BehavioralMethod {
    fn name(&self) -> &'static str {
        "behavioral"
    }

    fn verify(&self, finding: &Finding, noise: &dyn NoiseSource, cutoff: f64) -> MethodVerdict {
        let mut score = 0.6;

        if finding.entities.len() > 1 {
            score += 0.1;
        }

        score += match finding.method {
            DetectionMethod::IsolationForest => 0.1,
            DetectionMethod::StatisticalAnalysis | DetectionMethod::PatternRules => 0.05,
        };

        match finding.kind {
            FindingKind::Structuring => score += 0.1,
            FindingKind::Layering => score += 0.15,
            _ => {}
        }

        let score = (score + noise.jitter(0.08)).clamp(0.0, 1.0);
        MethodVerdict::new(
            score,
            cutoff,
            format!(
                "Behavioral analysis indicates {:.2} confidence in suspicious behavior",
                score
            ),
            &["entity_behavior", "transaction_patterns", "temporal_analysis"],
        )
    }
}
