//! ESG compliance per supplier: environmental, social and governance pillars.
//!
//! A supplier is compliant only if all three pillars are. The overall
//! compliance score is the mean of the pillar scores.

use crate::supply::{ReferenceData, Supplier};
use serde::{Deserialize, Serialize};

const LABOR_VIOLATION: &str = "Labor violations";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EsgConfig {
    /// Environmental pillar fails below this supplier ESG score.
    pub min_environmental_score: f64,
    pub high_impact_industries: Vec<String>,
    pub weak_environmental_countries: Vec<String>,
    pub labor_concern_countries: Vec<String>,
    /// Supplier type with too little visibility into labor practices.
    pub limited_visibility_type: String,
    pub social_compliant_score: f64,
    pub social_non_compliant_score: f64,
    /// Governance fails below this financial stability.
    pub min_financial_stability: f64,
    /// Governance fails below this supplier ESG score.
    pub min_transparency_score: f64,
}

impl Default for EsgConfig {
    fn default() -> Self {
        let names = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            min_environmental_score: 0.4,
            high_impact_industries: names(&["Chemicals", "Mining", "Steel"]),
            weak_environmental_countries: names(&["China", "Russia", "Iran"]),
            labor_concern_countries: names(&["Bangladesh", "Vietnam", "China"]),
            limited_visibility_type: "Tier 2".to_string(),
            social_compliant_score: 0.7,
            social_non_compliant_score: 0.3,
            min_financial_stability: 0.4,
            min_transparency_score: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PillarAssessment {
    pub compliant: bool,
    pub issues: Vec<String>,
    pub score: f64,
    /// Framework the pillar is judged against.
    pub framework: String,
}

impl PillarAssessment {
    fn new(issues: Vec<String>, score: f64, framework: &str) -> Self {
        Self {
            compliant: issues.is_empty(),
            issues,
            score,
            framework: framework.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsgAssessment {
    pub supplier_id: String,
    pub supplier_name: String,
    pub environmental: PillarAssessment,
    pub social: PillarAssessment,
    pub governance: PillarAssessment,
    pub overall_compliant: bool,
    pub compliance_score: f64,
    pub recommendations: Vec<String>,
}

pub struct EsgAssessor {
    config: EsgConfig,
}

impl EsgAssessor {
    pub fn new(config: EsgConfig) -> Self {
        Self { config }
    }

    pub fn environmental(&self, supplier: &Supplier) -> PillarAssessment {
        let c = &self.config;
        let mut issues = Vec::new();
        if supplier.esg_score < c.min_environmental_score {
            issues.push("Low environmental performance score".to_string());
        }
        if c.high_impact_industries.contains(&supplier.industry) {
            issues.push("High environmental impact industry".to_string());
        }
        if c.weak_environmental_countries.contains(&supplier.country) {
            issues.push("Country with weak environmental regulations".to_string());
        }
        PillarAssessment::new(issues, supplier.esg_score, "ISO_14001")
    }

    pub fn social(&self, supplier: &Supplier, reference: &ReferenceData) -> PillarAssessment {
        let c = &self.config;
        let mut issues = Vec::new();
        if reference
            .violations_for(&supplier.name)
            .iter()
            .any(|v| v == LABOR_VIOLATION)
        {
            issues.push("Labor rights violations detected".to_string());
        }
        if c.labor_concern_countries.contains(&supplier.country) {
            issues.push("Country with labor rights concerns".to_string());
        }
        if supplier.supplier_type == c.limited_visibility_type {
            issues.push(format!(
                "{} supplier - limited visibility into labor practices",
                supplier.supplier_type
            ));
        }
        let score = if issues.is_empty() {
            c.social_compliant_score
        } else {
            c.social_non_compliant_score
        };
        PillarAssessment::new(issues, score, "SA8000")
    }

    pub fn governance(&self, supplier: &Supplier, reference: &ReferenceData) -> PillarAssessment {
        let c = &self.config;
        let mut issues: Vec<String> = reference
            .sanctions_for(supplier)
            .iter()
            .map(|s| format!("Sanctioned entity: {}", s.reason))
            .collect();
        if supplier.financial_stability < c.min_financial_stability {
            issues.push("Financial instability - governance concerns".to_string());
        }
        if supplier.esg_score < c.min_transparency_score {
            issues.push("Low transparency in ESG reporting".to_string());
        }
        PillarAssessment::new(issues, supplier.financial_stability, "EU_CSDDD")
    }

    pub fn assess(&self, supplier: &Supplier, reference: &ReferenceData) -> EsgAssessment {
        let environmental = self.environmental(supplier);
        let social = self.social(supplier, reference);
        let governance = self.governance(supplier, reference);

        let overall_compliant = environmental.compliant && social.compliant && governance.compliant;
        let compliance_score = (environmental.score + social.score + governance.score) / 3.0;
        let recommendations = recommendations(&environmental, &social, &governance);

        EsgAssessment {
            supplier_id: supplier.id.clone(),
            supplier_name: supplier.name.clone(),
            environmental,
            social,
            governance,
            overall_compliant,
            compliance_score,
            recommendations,
        }
    }
}

fn recommendations(
    environmental: &PillarAssessment,
    social: &PillarAssessment,
    governance: &PillarAssessment,
) -> Vec<String> {
    let mut out = Vec::new();
    if !environmental.compliant {
        out.push("Implement environmental management system (ISO 14001)".to_string());
        out.push("Conduct environmental impact assessment".to_string());
    }
    if !social.compliant {
        out.push("Implement social responsibility program (SA8000)".to_string());
        out.push("Conduct labor rights audit".to_string());
    }
    if !governance.compliant {
        out.push("Implement corporate governance framework".to_string());
        out.push("Conduct due diligence assessment".to_string());
    }
    if out.is_empty() {
        out.push("Maintain current compliance standards".to_string());
    }
    out
}
