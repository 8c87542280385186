// Pattern detectors, one per supported risk pattern
pub mod affiliate_chain;
pub mod career;
pub mod circular_investment;
pub mod excessive_issuance;
pub mod financial_distress;
pub mod investor_concentration;
pub mod officer_concentration;
pub mod officer_movement;
pub mod related_party;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use affiliate_chain::AffiliateChainDetector;
pub use circular_investment::CircularInvestmentDetector;
pub use excessive_issuance::ExcessiveIssuanceDetector;
pub use financial_distress::FinancialDistressDetector;
pub use investor_concentration::InvestorConcentrationDetector;
pub use officer_concentration::OfficerConcentrationDetector;
pub use officer_movement::OfficerMovementDetector;
pub use related_party::RelatedPartyDetector;

use crate::risk::{PatternDetector, PatternType, VERSION};

/// The standard detector set, keyed by the pattern each one evaluates.
pub fn default_detectors() -> BTreeMap<PatternType, Arc<dyn PatternDetector>> {
    let detectors: Vec<Arc<dyn PatternDetector>> = vec![
        Arc::new(CircularInvestmentDetector::new()),
        Arc::new(ExcessiveIssuanceDetector::new()),
        Arc::new(OfficerConcentrationDetector::new()),
        Arc::new(FinancialDistressDetector::new()),
        Arc::new(RelatedPartyDetector::new()),
        Arc::new(OfficerMovementDetector::new()),
        Arc::new(InvestorConcentrationDetector::new()),
        Arc::new(AffiliateChainDetector::new()),
    ];
    detectors.into_iter().map(|d| (d.pattern(), d)).collect()
}

/// Pattern catalog plus the version and inputs of each standard detector.
pub fn detector_catalog() -> serde_json::Value {
    let detectors: Vec<serde_json::Value> = default_detectors()
        .values()
        .map(|detector| detector.get_config())
        .collect();
    serde_json::json!({
        "version": VERSION,
        "patterns": PatternType::catalog(),
        "detectors": detectors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lists_every_detector_config() {
        let catalog = detector_catalog();
        assert_eq!(catalog["version"], VERSION);
        assert_eq!(catalog["patterns"].as_array().unwrap().len(), 8);

        let detectors = catalog["detectors"].as_array().unwrap();
        let names: Vec<&str> = detectors
            .iter()
            .map(|d| d["pattern"].as_str().unwrap())
            .collect();
        let expected: Vec<&str> = PatternType::ALL.iter().map(|p| p.as_str()).collect();
        assert_eq!(names, expected);
        assert!(detectors.iter().all(|d| d["version"] == VERSION));
        assert!(detectors
            .iter()
            .all(|d| !d["risk_factors"].as_array().unwrap().is_empty()));
    }
}
