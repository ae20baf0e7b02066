//! Weighted composite supplier risk.
//!
//! Four factors, each in [0, 1] with higher meaning riskier:
//!
//! - country ESG: `1 - rating` of the supplier's country
//! - prior violations: reported count scaled to [0, 1], plus a fixed
//!   increment per known violation
//! - supply category: fixed level for high, medium and other categories
//! - financial stability: `1 - stability`
//!
//! The composite is their weighted sum; fixed cut points map it to a tier.

use crate::detection::RiskTier;
use crate::supply::{ReferenceData, Supplier};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub country_esg: f64,
    pub prior_violations: f64,
    pub supply_category: f64,
    pub financial_stability: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            country_esg: 0.25,
            prior_violations: 0.30,
            supply_category: 0.20,
            financial_stability: 0.25,
        }
    }
}

impl RiskWeights {
    fn all(&self) -> [f64; 4] {
        [
            self.country_esg,
            self.prior_violations,
            self.supply_category,
            self.financial_stability,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplierRiskConfig {
    /// Rating assumed for countries missing from the reference data.
    pub default_country_rating: f64,
    /// Reported violation count that alone saturates the violation factor.
    pub violation_saturation: f64,
    /// Added per violation listed in the reference data.
    pub known_violation_risk: f64,
    pub high_risk_categories: Vec<String>,
    pub medium_risk_categories: Vec<String>,
    pub high_category_risk: f64,
    pub medium_category_risk: f64,
    pub other_category_risk: f64,
    /// Tier cut points, inclusive lower bounds.
    pub critical_score: f64,
    pub high_score: f64,
    pub medium_score: f64,
    /// Composite score at which a supplier is reported as high risk.
    pub composite_threshold: f64,
    /// Flag thresholds on the supplier's own scores.
    pub low_esg_flag: f64,
    pub financial_instability_flag: f64,
    pub weights: RiskWeights,
}

impl Default for SupplierRiskConfig {
    fn default() -> Self {
        let names = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            default_country_rating: 0.5,
            violation_saturation: 10.0,
            known_violation_risk: 0.2,
            high_risk_categories: names(&["Chemicals", "Mining", "Steel", "Metals"]),
            medium_risk_categories: names(&["Textiles", "Plastics", "Construction", "Forestry"]),
            high_category_risk: 0.8,
            medium_category_risk: 0.5,
            other_category_risk: 0.3,
            critical_score: 0.8,
            high_score: 0.6,
            medium_score: 0.3,
            composite_threshold: 0.65,
            low_esg_flag: 0.3,
            financial_instability_flag: 0.4,
            weights: RiskWeights::default(),
        }
    }
}

impl SupplierRiskConfig {
    /// Weights must be non-negative with a positive sum and cut points must
    /// descend from critical to medium.
    pub fn validate(&self) -> Result<()> {
        let weights = self.weights.all();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::Validation(
                "supplier risk weights must be non-negative".to_string(),
            ));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(Error::Validation(
                "supplier risk weights must not all be zero".to_string(),
            ));
        }
        if !(self.critical_score >= self.high_score && self.high_score >= self.medium_score) {
            return Err(Error::Validation(format!(
                "risk cut points must descend, got critical {} high {} medium {}",
                self.critical_score, self.high_score, self.medium_score
            )));
        }
        if self.violation_saturation <= 0.0 {
            return Err(Error::Validation(
                "violation_saturation must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
    pub country_esg: f64,
    pub prior_violations: f64,
    pub supply_category: f64,
    pub financial_stability: f64,
}

impl RiskFactors {
    pub fn composite(&self, weights: &RiskWeights) -> f64 {
        self.country_esg * weights.country_esg
            + self.prior_violations * weights.prior_violations
            + self.supply_category * weights.supply_category
            + self.financial_stability * weights.financial_stability
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierRisk {
    pub supplier_id: String,
    pub supplier_name: String,
    pub country: String,
    pub industry: String,
    pub factors: RiskFactors,
    pub composite_score: f64,
    pub risk: RiskTier,
    /// True when the composite reaches the configured threshold.
    pub above_threshold: bool,
    pub flags: Vec<String>,
}

pub struct SupplierRiskScorer {
    config: SupplierRiskConfig,
}

impl SupplierRiskScorer {
    pub fn new(config: SupplierRiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SupplierRiskConfig {
        &self.config
    }

    pub fn factors(&self, supplier: &Supplier, reference: &ReferenceData) -> RiskFactors {
        let c = &self.config;
        let rating = reference
            .country_rating(&supplier.country)
            .unwrap_or(c.default_country_rating);

        let reported = (supplier.prior_violations as f64 / c.violation_saturation).min(1.0);
        let known = reference.violations_for(&supplier.name).len() as f64 * c.known_violation_risk;

        let category = &supplier.supply_category;
        let supply_category = if c.high_risk_categories.contains(category) {
            c.high_category_risk
        } else if c.medium_risk_categories.contains(category) {
            c.medium_category_risk
        } else {
            c.other_category_risk
        };

        RiskFactors {
            country_esg: (1.0 - rating).clamp(0.0, 1.0),
            prior_violations: (reported + known).min(1.0),
            supply_category,
            financial_stability: (1.0 - supplier.financial_stability).clamp(0.0, 1.0),
        }
    }

    pub fn tier(&self, composite: f64) -> RiskTier {
        if composite >= self.config.critical_score {
            RiskTier::Critical
        } else if composite >= self.config.high_score {
            RiskTier::High
        } else if composite >= self.config.medium_score {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    pub fn flags(&self, supplier: &Supplier, reference: &ReferenceData) -> Vec<String> {
        let mut flags: Vec<String> = reference
            .sanctions_for(supplier)
            .iter()
            .map(|s| format!("Sanctioned: {}", s.reason))
            .collect();

        let violations = reference.violations_for(&supplier.name);
        if !violations.is_empty() {
            flags.push(format!("Violations: {}", violations.join(", ")));
        }
        if supplier.esg_score < self.config.low_esg_flag {
            flags.push("Low ESG Score".to_string());
        }
        if supplier.financial_stability < self.config.financial_instability_flag {
            flags.push("Financial Instability".to_string());
        }
        flags
    }

    pub fn score(&self, supplier: &Supplier, reference: &ReferenceData) -> SupplierRisk {
        let factors = self.factors(supplier, reference);
        let composite_score = factors.composite(&self.config.weights);
        let risk = self.tier(composite_score);
        debug!(
            supplier = %supplier.id,
            composite = composite_score,
            risk = %risk,
            "Supplier scored"
        );

        SupplierRisk {
            supplier_id: supplier.id.clone(),
            supplier_name: supplier.name.clone(),
            country: supplier.country.clone(),
            industry: supplier.industry.clone(),
            factors,
            composite_score,
            risk,
            above_threshold: composite_score >= self.config.composite_threshold,
            flags: self.flags(supplier, reference),
        }
    }

    pub fn score_all(&self, suppliers: &[Supplier], reference: &ReferenceData) -> Vec<SupplierRisk> {
        suppliers.iter().map(|s| self.score(s, reference)).collect()
    }
}
