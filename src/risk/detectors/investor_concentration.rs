// Convertible bond investor concentration detector
use std::cmp::Ordering;

use async_trait::async_trait;
use tracing::debug;

use crate::models::SubscriberConcentration;
use crate::risk::{
    DetectionContext, Finding, FindingDetail, InvestorConcentrationDetail, PatternDetector,
    PatternType, RiskError, RiskLevel,
};

/// Investors above this ratio are reported.
pub const MIN_CONCENTRATION_RATIO: f64 = 0.2;
pub const HIGH_CONCENTRATION_RATIO: f64 = 0.4;

#[derive(Debug, Default, Clone)]
pub struct InvestorConcentrationDetector;

impl InvestorConcentrationDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(investors: &[SubscriberConcentration]) -> RiskLevel {
        if investors
            .iter()
            .any(|i| i.concentration_ratio > HIGH_CONCENTRATION_RATIO)
        {
            RiskLevel::High
        } else if !investors.is_empty() {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[async_trait]
impl PatternDetector for InvestorConcentrationDetector {
    fn pattern(&self) -> PatternType {
        PatternType::CbInvestorConcentration
    }

    async fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Finding, RiskError> {
        let subscribers = ctx
            .graph
            .list_subscriber_concentration(ctx.company_id())
            .await?;
        let subscriber_count = subscribers.len();

        let mut investors: Vec<SubscriberConcentration> = subscribers
            .into_iter()
            .filter(|s| s.concentration_ratio > MIN_CONCENTRATION_RATIO)
            .collect();
        investors.sort_by(|a, b| {
            b.concentration_ratio
                .partial_cmp(&a.concentration_ratio)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.total_amount.cmp(&a.total_amount))
                .then_with(|| a.subscriber_name.cmp(&b.subscriber_name))
        });
        investors.truncate(ctx.params.top_n);

        let risk_level = Self::classify(&investors);

        debug!(
            company_id = %ctx.company_id(),
            subscribers = subscriber_count,
            concentrated = investors.len(),
            risk_level = %risk_level,
            "Evaluated CB investor concentration"
        );

        Ok(Finding::new(
            self.pattern(),
            risk_level,
            FindingDetail::CbInvestorConcentration(InvestorConcentrationDetail {
                subscriber_count,
                investors,
            }),
        ))
    }

    fn risk_factors(&self) -> Vec<&'static str> {
        vec!["investor_bond_share", "related_party_subscribers"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::detectors::test_support::Fixture;

    #[tokio::test]
    async fn test_dominant_investor_is_high() {
        let mut fixture = Fixture::new("A");
        let date = fixture.days_ago(10);
        for i in 0..5 {
            fixture.bond(&format!("b{}", i), "A", date, 100);
        }
        // Fund X: 3/5 bonds, Fund Y: 1/5 bonds, Fund Z: 2/5 bonds.
        fixture
            .subscriber("b0", "Fund X", 10)
            .subscriber("b1", "Fund X", 10)
            .subscriber("b2", "Fund X", 10)
            .subscriber("b3", "Fund Y", 10)
            .subscriber("b3", "Fund Z", 10)
            .subscriber("b4", "Fund Z", 10);

        let finding = fixture.run(&InvestorConcentrationDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::High);
        match &finding.detail {
            FindingDetail::CbInvestorConcentration(d) => {
                assert_eq!(d.subscriber_count, 3);
                let names: Vec<&str> =
                    d.investors.iter().map(|i| i.subscriber_name.as_str()).collect();
                assert_eq!(names, vec!["Fund X", "Fund Z"]);
            }
            other => panic!("unexpected detail {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_moderate_concentration_is_medium() {
        let mut fixture = Fixture::new("A");
        let date = fixture.days_ago(10);
        for i in 0..4 {
            fixture.bond(&format!("b{}", i), "A", date, 100);
        }
        fixture.subscriber("b0", "Fund X", 10);
        fixture.subscriber("b1", "Fund Y", 10);

        let finding = fixture.run(&InvestorConcentrationDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn test_no_subscribers_is_empty() {
        let fixture = Fixture::new("A");
        let finding = fixture.run(&InvestorConcentrationDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::Low);
        assert!(finding.is_empty());
    }
}
