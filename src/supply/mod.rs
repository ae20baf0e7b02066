//! Supplier risk scoring and ESG compliance.
//!
//! Suppliers are scored with a weighted composite of four risk factors and
//! checked against three ESG pillars. Reference data (country ratings,
//! sanction lists, known violations) comes from the caller.

pub mod esg;
pub mod risk;

pub use esg::{EsgAssessment, EsgAssessor, EsgConfig, PillarAssessment};
pub use risk::{RiskFactors, RiskWeights, SupplierRisk, SupplierRiskConfig, SupplierRiskScorer};

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

fn neutral() -> f64 {
    0.5
}

/// One supplier as read from the supplier file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub country: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub supply_category: String,
    /// e.g. "Tier 1", "Tier 2"
    #[serde(default)]
    pub supplier_type: String,
    #[serde(default = "neutral")]
    pub esg_score: f64,
    #[serde(default = "neutral")]
    pub financial_stability: f64,
    #[serde(default)]
    pub prior_violations: u32,
}

impl Supplier {
    pub fn new(id: &str, name: &str, country: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            country: country.to_string(),
            industry: String::new(),
            supply_category: String::new(),
            supplier_type: String::new(),
            esg_score: neutral(),
            financial_stability: neutral(),
            prior_violations: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sanction {
    pub entity: String,
    pub country: String,
    pub reason: String,
}

/// External lookups shared by the risk scorer and the ESG assessor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceData {
    /// Country ESG rating in [0, 1]; higher is better.
    pub country_esg_ratings: BTreeMap<String, f64>,
    pub sanctions: Vec<Sanction>,
    /// Known violations keyed by supplier name.
    pub violations: BTreeMap<String, Vec<String>>,
}

impl ReferenceData {
    pub fn country_rating(&self, country: &str) -> Option<f64> {
        self.country_esg_ratings.get(country).copied()
    }

    /// Sanctions naming the supplier or its country.
    pub fn sanctions_for<'a>(&'a self, supplier: &Supplier) -> Vec<&'a Sanction> {
        self.sanctions
            .iter()
            .filter(|s| s.entity == supplier.name || s.country == supplier.country)
            .collect()
    }

    pub fn violations_for(&self, name: &str) -> &[String] {
        self.violations.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Loaded from the `[supply]` config section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplyConfig {
    pub risk: SupplierRiskConfig,
    pub esg: EsgConfig,
}

/// Risk and ESG results for every supplier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplyReport {
    pub risks: Vec<SupplierRisk>,
    pub compliance: Vec<EsgAssessment>,
    /// Ids of suppliers at or above the composite threshold.
    pub high_risk_suppliers: Vec<String>,
    /// Ids of suppliers failing any ESG pillar.
    pub non_compliant_suppliers: Vec<String>,
}

/// Score and assess every supplier.
///
/// # Errors
///
/// [`crate::Error::Validation`] if the risk weights or tier cut points are
/// unusable.
pub fn assess_suppliers(
    config: &SupplyConfig,
    suppliers: &[Supplier],
    reference: &ReferenceData,
) -> Result<SupplyReport> {
    config.risk.validate()?;
    let scorer = SupplierRiskScorer::new(config.risk.clone());
    let assessor = EsgAssessor::new(config.esg.clone());

    let risks = scorer.score_all(suppliers, reference);
    let compliance: Vec<EsgAssessment> = suppliers
        .iter()
        .map(|s| assessor.assess(s, reference))
        .collect();

    let high_risk_suppliers: Vec<String> = risks
        .iter()
        .filter(|r| r.above_threshold)
        .map(|r| r.supplier_id.clone())
        .collect();
    let non_compliant_suppliers: Vec<String> = compliance
        .iter()
        .filter(|a| !a.overall_compliant)
        .map(|a| a.supplier_id.clone())
        .collect();

    info!(
        suppliers = suppliers.len(),
        high_risk = high_risk_suppliers.len(),
        non_compliant = non_compliant_suppliers.len(),
        "Suppliers assessed"
    );

    Ok(SupplyReport {
        risks,
        compliance,
        high_risk_suppliers,
        non_compliant_suppliers,
    })
}
