//! Supplier risk and ESG compliance tests.
//!
//! Suppliers and reference data are read from JSON the way the
//! `suppliers` subcommand reads them.

use std::io::Write;

use tempfile::NamedTempFile;

use verdict::config::Config;
use verdict::detection::RiskTier;
use verdict::supply::{assess_suppliers, ReferenceData, Supplier};

const SUPPLIERS: &str = r#"[
  {"id": "sup-1", "name": "GreenTech Solutions", "country": "Germany",
   "industry": "Electronics", "supply_category": "Components",
   "supplier_type": "Tier 1", "esg_score": 0.85, "financial_stability": 0.9},
  {"id": "sup-2", "name": "Textile Mills Ltd", "country": "Bangladesh",
   "industry": "Textiles", "supply_category": "Textiles",
   "supplier_type": "Tier 1", "esg_score": 0.45, "financial_stability": 0.6,
   "prior_violations": 2},
  {"id": "sup-3", "name": "Chemical Manufacturing", "country": "Iran",
   "industry": "Chemicals", "supply_category": "Chemicals",
   "supplier_type": "Tier 2", "esg_score": 0.1, "financial_stability": 0.2,
   "prior_violations": 6}
]"#;

const REFERENCE: &str = r#"{
  "country_esg_ratings": {"Germany": 0.85, "Bangladesh": 0.3, "Iran": 0.15},
  "sanctions": [
    {"entity": "Chemical Manufacturing", "country": "Iran", "reason": "Trade sanctions"}
  ],
  "violations": {"Textile Mills Ltd": ["Labor violations"]}
}"#;

fn read_inputs() -> (Vec<Supplier>, ReferenceData) {
    let mut suppliers = NamedTempFile::new().unwrap();
    suppliers.write_all(SUPPLIERS.as_bytes()).unwrap();
    let mut reference = NamedTempFile::new().unwrap();
    reference.write_all(REFERENCE.as_bytes()).unwrap();

    let suppliers =
        serde_json::from_str(&std::fs::read_to_string(suppliers.path()).unwrap()).unwrap();
    let reference =
        serde_json::from_str(&std::fs::read_to_string(reference.path()).unwrap()).unwrap();
    (suppliers, reference)
}

/// Test: Mixed supplier portfolio
/// Given a clean supplier, one with labor violations and a sanctioned one
/// When they are assessed with default config
/// Then tiers rise with risk and only the sanctioned supplier crosses the threshold
#[test]
fn test_portfolio_tiers_and_threshold() {
    let (suppliers, reference) = read_inputs();

    let report = assess_suppliers(&Config::default().supply, &suppliers, &reference).unwrap();

    let tiers: Vec<RiskTier> = report.risks.iter().map(|r| r.risk).collect();
    assert_eq!(tiers, vec![RiskTier::Low, RiskTier::Medium, RiskTier::High]);
    assert_eq!(report.high_risk_suppliers, vec!["sup-3"]);
    assert_eq!(report.non_compliant_suppliers, vec!["sup-2", "sup-3"]);

    let textile = &report.compliance[1];
    assert!(textile.environmental.compliant);
    assert!(!textile.social.compliant);
    assert!(textile
        .social
        .issues
        .contains(&"Labor rights violations detected".to_string()));
}

/// Test: Weights from the config file
/// Given a config that puts all weight on prior violations
/// When the same portfolio is assessed
/// Then scores follow the violation factor alone
#[test]
fn test_config_weights_change_scores() {
    let (suppliers, reference) = read_inputs();
    let config: Config = toml::from_str(
        r#"
[supply.risk.weights]
country_esg = 0.0
prior_violations = 1.0
supply_category = 0.0
financial_stability = 0.0
"#,
    )
    .unwrap();

    let report = assess_suppliers(&config.supply, &suppliers, &reference).unwrap();

    let scores: Vec<f64> = report.risks.iter().map(|r| r.composite_score).collect();
    assert_eq!(scores[0], 0.0);
    // 2/10 reported plus one known violation at 0.2
    assert!((scores[1] - 0.4).abs() < 1e-9);
    assert!((scores[2] - 0.6).abs() < 1e-9);
}
