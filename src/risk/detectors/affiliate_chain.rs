// Affiliate chain risk detector
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use futures::future::join_all;
use num_traits::Zero;
use tracing::{debug, warn};

use crate::models::FinancialMetrics;
use crate::risk::{
    AffiliateChainDetail, DetectionContext, DistressedAffiliate, Finding, FindingDetail,
    PatternDetector, PatternType, RiskError, RiskLevel,
};

pub const MAX_DEBT_TO_EQUITY: f64 = 2.0;

#[derive(Debug, Default, Clone)]
pub struct AffiliateChainDetector;

impl AffiliateChainDetector {
    pub fn new() -> Self {
        Self
    }

    /// Reasons an affiliate counts as distressed; empty when it does not.
    pub fn distress_reasons(metrics: &FinancialMetrics) -> Vec<String> {
        let mut reasons = Vec::new();
        if let Some(ratio) = metrics.debt_to_equity {
            if ratio > MAX_DEBT_TO_EQUITY {
                reasons.push(format!("debt-to-equity {:.2}", ratio));
            }
        }
        let zero = BigDecimal::zero();
        if metrics.operating_income.as_ref().is_some_and(|v| *v < zero) {
            reasons.push("operating loss".to_string());
        }
        if metrics.net_income.as_ref().is_some_and(|v| *v < zero) {
            reasons.push("net loss".to_string());
        }
        reasons
    }

    pub fn classify(distress_ratio: f64) -> RiskLevel {
        if distress_ratio >= 0.5 {
            RiskLevel::Critical
        } else if distress_ratio >= 0.3 {
            RiskLevel::High
        } else if distress_ratio >= 0.1 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[async_trait]
impl PatternDetector for AffiliateChainDetector {
    fn pattern(&self) -> PatternType {
        PatternType::AffiliateChainRisk
    }

    async fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Finding, RiskError> {
        let affiliate_ids = ctx
            .graph
            .list_affiliate_company_ids(ctx.company_id())
            .await?;
        let total_affiliates = affiliate_ids.len();

        let lookups = join_all(
            affiliate_ids
                .iter()
                .map(|id| ctx.health.get_financial_metrics(id)),
        )
        .await;

        let mut distressed = Vec::new();
        let mut unassessed = Vec::new();
        let mut last_error = None;
        let mut failures = 0usize;
        for (affiliate_id, lookup) in affiliate_ids.into_iter().zip(lookups) {
            match lookup {
                Ok(Some(metrics)) => {
                    let reasons = Self::distress_reasons(&metrics);
                    if !reasons.is_empty() {
                        distressed.push(DistressedAffiliate {
                            company_id: affiliate_id,
                            reasons,
                        });
                    }
                }
                Ok(None) => unassessed.push(affiliate_id),
                Err(e) => {
                    warn!(
                        company_id = %ctx.company_id(),
                        affiliate_id = %affiliate_id,
                        error = %e,
                        "Financial metrics unavailable for affiliate"
                    );
                    failures += 1;
                    last_error = Some(e);
                    unassessed.push(affiliate_id);
                }
            }
        }

        // Degrade per affiliate, but an outage across the board is a failure.
        if let Some(e) = last_error {
            if failures == total_affiliates {
                return Err(e);
            }
        }

        let mut notes = Vec::new();
        if !unassessed.is_empty() {
            notes.push(format!(
                "{} affiliate(s) without financial metrics counted as not distressed",
                unassessed.len()
            ));
        }

        let distress_ratio = if total_affiliates == 0 {
            0.0
        } else {
            distressed.len() as f64 / total_affiliates as f64
        };
        let risk_level = Self::classify(distress_ratio);

        debug!(
            company_id = %ctx.company_id(),
            affiliates = total_affiliates,
            distressed = distressed.len(),
            distress_ratio = distress_ratio,
            risk_level = %risk_level,
            "Evaluated affiliate chain risk"
        );

        Ok(Finding::new(
            self.pattern(),
            risk_level,
            FindingDetail::AffiliateChainRisk(AffiliateChainDetail {
                total_affiliates,
                distressed,
                unassessed,
                distress_ratio,
            }),
        )
        .with_notes(notes))
    }

    fn risk_factors(&self) -> Vec<&'static str> {
        vec!["affiliate_leverage", "affiliate_losses"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::detectors::test_support::Fixture;

    fn metrics(company_id: &str, de: f64, operating: i64, net: i64) -> FinancialMetrics {
        FinancialMetrics {
            company_id: company_id.to_string(),
            debt_to_equity: Some(de),
            operating_income: Some(BigDecimal::from(operating)),
            net_income: Some(BigDecimal::from(net)),
        }
    }

    fn four_affiliates(fixture: &mut Fixture) {
        for id in ["B", "C", "D", "E"] {
            fixture.company(id).affiliate("A", id);
        }
        fixture
            .health
            .add_financials(metrics("B", 3.5, 100, 100))
            .add_financials(metrics("C", 0.5, -10, 5))
            .add_financials(metrics("D", 1.0, 100, 100))
            .add_financials(metrics("E", 2.0, 0, 0));
    }

    #[tokio::test]
    async fn test_half_distressed_is_critical() {
        let mut fixture = Fixture::new("A");
        four_affiliates(&mut fixture);

        let finding = fixture.run(&AffiliateChainDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::Critical);
        match &finding.detail {
            FindingDetail::AffiliateChainRisk(d) => {
                assert_eq!(d.total_affiliates, 4);
                assert_eq!(d.distress_ratio, 0.5);
                assert_eq!(d.distressed[0].company_id, "B");
                assert_eq!(d.distressed[1].reasons, vec!["operating loss".to_string()]);
            }
            other => panic!("unexpected detail {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_affiliates_is_low_with_zero_ratio() {
        let fixture = Fixture::new("A");
        let finding = fixture.run(&AffiliateChainDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::Low);
        assert!(finding.is_empty());
        match &finding.detail {
            FindingDetail::AffiliateChainRisk(d) => assert_eq!(d.distress_ratio, 0.0),
            other => panic!("unexpected detail {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_metrics_are_noted() {
        let mut fixture = Fixture::new("A");
        four_affiliates(&mut fixture);
        fixture.company("F").affiliate("F", "A");

        let finding = fixture.run(&AffiliateChainDetector::new()).await.unwrap();
        // 2 of 5 distressed.
        assert_eq!(finding.risk_level, RiskLevel::High);
        assert_eq!(finding.notes.len(), 1);
    }

    #[tokio::test]
    async fn test_metrics_outage_fails_detector() {
        let mut fixture = Fixture::new("A");
        four_affiliates(&mut fixture);
        fixture.health.fail_operation("get_financial_metrics");

        let err = fixture.run(&AffiliateChainDetector::new()).await.unwrap_err();
        assert!(matches!(err, RiskError::StoreUnavailable { .. }));
    }

    #[test]
    fn test_classification() {
        assert_eq!(AffiliateChainDetector::classify(0.0), RiskLevel::Low);
        assert_eq!(AffiliateChainDetector::classify(0.1), RiskLevel::Medium);
        assert_eq!(AffiliateChainDetector::classify(0.3), RiskLevel::High);
        assert_eq!(AffiliateChainDetector::classify(0.5), RiskLevel::Critical);
    }
}
