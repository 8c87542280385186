// Circular investment detector
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use tracing::debug;

use crate::models::Cycle;
use crate::risk::{
    CircularInvestmentDetail, CycleFinding, DetectionContext, Finding, FindingDetail,
    PatternDetector, PatternType, RiskError, RiskLevel,
};

/// Cycle totals above this amount are high risk.
pub const HIGH_CYCLE_AMOUNT: i64 = 1_000_000_000;

/// Flags directed investment cycles that start and end at the company.
#[derive(Debug, Default, Clone)]
pub struct CircularInvestmentDetector;

impl CircularInvestmentDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn classify_cycle(total_amount: &BigDecimal) -> RiskLevel {
        if *total_amount > BigDecimal::from(HIGH_CYCLE_AMOUNT) {
            RiskLevel::High
        } else {
            RiskLevel::Medium
        }
    }

    fn to_finding(cycle: Cycle) -> CycleFinding {
        CycleFinding {
            risk_level: Self::classify_cycle(&cycle.total_amount),
            company_ids: cycle.company_ids,
            company_names: cycle.company_names,
            total_amount: cycle.total_amount,
            length: cycle.length,
        }
    }
}

#[async_trait]
impl PatternDetector for CircularInvestmentDetector {
    fn pattern(&self) -> PatternType {
        PatternType::CircularInvestment
    }

    async fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Finding, RiskError> {
        let max_depth = ctx.params.cycle_max_depth;
        let cycles = ctx
            .graph
            .find_investment_cycles(ctx.company_id(), max_depth)
            .await?;

        let cycles: Vec<CycleFinding> = cycles
            .into_iter()
            .take(ctx.params.cycle_limit)
            .map(Self::to_finding)
            .collect();

        // An empty cycle list is a clean result, reported as low.
        let risk_level = cycles
            .iter()
            .map(|c| c.risk_level)
            .max()
            .unwrap_or(RiskLevel::Low);

        debug!(
            company_id = %ctx.company_id(),
            cycles = cycles.len(),
            risk_level = %risk_level,
            "Evaluated circular investment"
        );

        Ok(Finding::new(
            self.pattern(),
            risk_level,
            FindingDetail::CircularInvestment(CircularInvestmentDetail { max_depth, cycles }),
        ))
    }

    fn risk_factors(&self) -> Vec<&'static str> {
        vec!["investment_cycles", "cycle_amount", "cycle_length"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::detectors::test_support::Fixture;

    #[tokio::test]
    async fn test_large_three_node_cycle_is_high() {
        let mut fixture = Fixture::new("A");
        fixture
            .company("B")
            .company("C")
            .investment("A", "B", 400_000_000)
            .investment("B", "C", 400_000_000)
            .investment("C", "A", 400_000_000);

        let finding = fixture.run(&CircularInvestmentDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::High);
        match &finding.detail {
            FindingDetail::CircularInvestment(d) => {
                assert_eq!(d.cycles.len(), 1);
                assert_eq!(d.cycles[0].total_amount, BigDecimal::from(1_200_000_000));
                assert_eq!(d.cycles[0].length, 3);
            }
            other => panic!("unexpected detail {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_small_cycle_is_medium() {
        let mut fixture = Fixture::new("A");
        fixture
            .company("B")
            .company("C")
            .investment("A", "B", 100_000_000)
            .investment("B", "C", 150_000_000)
            .investment("C", "A", 150_000_000);

        let finding = fixture.run(&CircularInvestmentDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn test_no_cycles_is_empty_low() {
        let mut fixture = Fixture::new("A");
        fixture.company("B").investment("A", "B", 5_000_000_000);

        let finding = fixture.run(&CircularInvestmentDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::Low);
        assert!(finding.is_empty());
    }

    #[tokio::test]
    async fn test_cycle_limit_applies() {
        let mut fixture = Fixture::new("A");
        for i in 0..12 {
            let id = format!("P{:02}", i);
            fixture
                .company(&id)
                .investment("A", &id, 1_000 + i)
                .investment(&id, "A", 1_000);
        }

        let finding = fixture.run(&CircularInvestmentDetector::new()).await.unwrap();
        match &finding.detail {
            FindingDetail::CircularInvestment(d) => {
                assert_eq!(d.cycles.len(), 10);
                assert_eq!(d.cycles[0].company_ids[1], "P11");
            }
            other => panic!("unexpected detail {:?}", other),
        }
    }

    #[test]
    fn test_threshold_is_exclusive() {
        assert_eq!(
            CircularInvestmentDetector::classify_cycle(&BigDecimal::from(HIGH_CYCLE_AMOUNT)),
            RiskLevel::Medium
        );
        assert_eq!(
            CircularInvestmentDetector::classify_cycle(&BigDecimal::from(HIGH_CYCLE_AMOUNT + 1)),
            RiskLevel::High
        );
    }
}
