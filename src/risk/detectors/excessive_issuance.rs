// Excessive convertible bond issuance detector
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use num_traits::Zero;
use tracing::debug;

use crate::risk::{
    DetectionContext, Finding, FindingDetail, IssuanceDetail, PatternDetector, PatternType,
    RiskError, RiskLevel,
};

pub const HIGH_BOND_COUNT: usize = 4;
pub const MEDIUM_BOND_COUNT: usize = 2;
pub const HIGH_TOTAL_AMOUNT: i64 = 5_000_000_000;
pub const MEDIUM_TOTAL_AMOUNT: i64 = 1_000_000_000;

#[derive(Debug, Default, Clone)]
pub struct ExcessiveIssuanceDetector;

impl ExcessiveIssuanceDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(bond_count: usize, total_amount: &BigDecimal) -> RiskLevel {
        if bond_count >= HIGH_BOND_COUNT || *total_amount > BigDecimal::from(HIGH_TOTAL_AMOUNT) {
            RiskLevel::High
        } else if bond_count >= MEDIUM_BOND_COUNT
            || *total_amount > BigDecimal::from(MEDIUM_TOTAL_AMOUNT)
        {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[async_trait]
impl PatternDetector for ExcessiveIssuanceDetector {
    fn pattern(&self) -> PatternType {
        PatternType::ExcessiveIssuance
    }

    async fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Finding, RiskError> {
        let window_months = ctx.params.issuance_window_months;
        let since = ctx.window_start(window_months);
        let bonds = ctx
            .graph
            .list_bonds_issued_since(ctx.company_id(), since)
            .await?;
        let bonds: Vec<_> = bonds.into_iter().filter(|b| b.issue_date <= ctx.as_of).collect();

        let bond_count = bonds.len();
        let total_amount = bonds
            .iter()
            .fold(BigDecimal::zero(), |acc, b| acc + &b.total_amount);
        let average_interval_days = (bond_count > 0)
            .then(|| f64::from(window_months) * 30.0 / bond_count as f64);
        let risk_level = Self::classify(bond_count, &total_amount);

        debug!(
            company_id = %ctx.company_id(),
            since = %since,
            bond_count = bond_count,
            total_amount = %total_amount,
            risk_level = %risk_level,
            "Evaluated bond issuance frequency"
        );

        Ok(Finding::new(
            self.pattern(),
            risk_level,
            FindingDetail::ExcessiveIssuance(IssuanceDetail {
                window_months,
                bond_count,
                total_amount,
                average_interval_days,
                bond_ids: bonds.into_iter().map(|b| b.id).collect(),
            }),
        ))
    }

    fn risk_factors(&self) -> Vec<&'static str> {
        vec!["bond_count", "total_issued_amount", "issuance_interval"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::detectors::test_support::Fixture;

    #[tokio::test]
    async fn test_four_bonds_in_window_is_high() {
        let mut fixture = Fixture::new("A");
        for (i, days) in [20, 80, 150, 300].iter().enumerate() {
            let date = fixture.days_ago(*days);
            fixture.bond(&format!("b{}", i), "A", date, 10_000_000);
        }
        // Outside the trailing 12 months.
        let old = fixture.days_ago(500);
        fixture.bond("b-old", "A", old, 10_000_000);

        let finding = fixture.run(&ExcessiveIssuanceDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::High);
        match &finding.detail {
            FindingDetail::ExcessiveIssuance(d) => {
                assert_eq!(d.bond_count, 4);
                assert_eq!(d.total_amount, BigDecimal::from(40_000_000));
                assert_eq!(d.average_interval_days, Some(90.0));
            }
            other => panic!("unexpected detail {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_single_large_bond_is_medium() {
        let mut fixture = Fixture::new("A");
        let date = fixture.days_ago(10);
        fixture.bond("b1", "A", date, 2_000_000_000);

        let finding = fixture.run(&ExcessiveIssuanceDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn test_no_bonds_is_empty_low() {
        let fixture = Fixture::new("A");
        let finding = fixture.run(&ExcessiveIssuanceDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::Low);
        assert!(finding.is_empty());
    }

    #[test]
    fn test_classification_thresholds() {
        let small = BigDecimal::from(1);
        assert_eq!(ExcessiveIssuanceDetector::classify(1, &small), RiskLevel::Low);
        assert_eq!(ExcessiveIssuanceDetector::classify(2, &small), RiskLevel::Medium);
        assert_eq!(ExcessiveIssuanceDetector::classify(4, &small), RiskLevel::High);
        assert_eq!(
            ExcessiveIssuanceDetector::classify(1, &BigDecimal::from(HIGH_TOTAL_AMOUNT + 1)),
            RiskLevel::High
        );
        assert_eq!(
            ExcessiveIssuanceDetector::classify(1, &BigDecimal::from(MEDIUM_TOTAL_AMOUNT)),
            RiskLevel::Low
        );
    }
}
