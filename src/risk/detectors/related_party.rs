// Related-party transaction detector
use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::debug;

use crate::models::InvestmentEdge;
use crate::risk::{
    DetectionContext, Finding, FindingDetail, PatternDetector, PatternType, RelatedInvestor,
    RelatedPartyDetail, RiskError, RiskLevel,
};

pub const HIGH_RELATED_COUNT: usize = 3;

#[derive(Debug, Default, Clone)]
pub struct RelatedPartyDetector;

impl RelatedPartyDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(total_related_count: usize) -> RiskLevel {
        if total_related_count >= HIGH_RELATED_COUNT {
            RiskLevel::High
        } else if total_related_count >= 1 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    fn investors(edges: Vec<InvestmentEdge>) -> Vec<RelatedInvestor> {
        let mut investors: Vec<RelatedInvestor> = edges
            .into_iter()
            .map(|edge| RelatedInvestor {
                company_id: edge.source_id,
                company_name: edge.source_name,
                investment_count: edge.investment_count,
                total_amount: edge.total_amount,
            })
            .collect();
        investors.sort_by(|a, b| a.company_id.cmp(&b.company_id));
        investors
    }
}

#[async_trait]
impl PatternDetector for RelatedPartyDetector {
    fn pattern(&self) -> PatternType {
        PatternType::RelatedPartyTransactions
    }

    async fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Finding, RiskError> {
        let (related, affiliates, officers) = tokio::try_join!(
            ctx.graph.find_related_investments(ctx.company_id()),
            ctx.graph.list_affiliate_company_ids(ctx.company_id()),
            ctx.graph.list_current_officers(ctx.company_id()),
        )?;

        let affiliate_investors = Self::investors(related.affiliate_investments);
        let officer_linked_investors = Self::investors(related.officer_linked_investments);

        // A company can appear in both lists; count it once.
        let distinct: BTreeSet<&str> = affiliate_investors
            .iter()
            .chain(officer_linked_investors.iter())
            .map(|i| i.company_id.as_str())
            .collect();
        let total_related_count = distinct.len();
        let risk_level = Self::classify(total_related_count);

        debug!(
            company_id = %ctx.company_id(),
            affiliate_investors = affiliate_investors.len(),
            officer_linked_investors = officer_linked_investors.len(),
            total_related = total_related_count,
            affiliates = affiliates.len(),
            current_officers = officers.len(),
            risk_level = %risk_level,
            "Evaluated related-party transactions"
        );

        Ok(Finding::new(
            self.pattern(),
            risk_level,
            FindingDetail::RelatedPartyTransactions(RelatedPartyDetail {
                affiliate_investors,
                officer_linked_investors,
                total_related_count,
                affiliate_count: affiliates.len(),
                current_officer_count: officers.len(),
            }),
        ))
    }

    fn risk_factors(&self) -> Vec<&'static str> {
        vec!["affiliate_investments", "officer_linked_investments"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::detectors::test_support::Fixture;

    #[tokio::test]
    async fn test_union_counts_distinct_companies() {
        let mut fixture = Fixture::new("A");
        fixture
            .company("B")
            .company("C")
            .company("D")
            .affiliate("A", "B")
            .affiliate("A", "C")
            .investment("B", "A", 1_000)
            .investment("C", "A", 2_000)
            // Shares officer o1 with A and is also an affiliate.
            .officer("o1", 0.0)
            .position("o1", "A")
            .position("o1", "B")
            // Shares officer o2 with A.
            .officer("o2", 0.0)
            .position("o2", "A")
            .position("o2", "D")
            .investment("D", "A", 500);

        let finding = fixture.run(&RelatedPartyDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::High);
        match &finding.detail {
            FindingDetail::RelatedPartyTransactions(d) => {
                assert_eq!(d.affiliate_investors.len(), 2);
                assert_eq!(d.officer_linked_investors.len(), 2);
                assert_eq!(d.total_related_count, 3);
            }
            other => panic!("unexpected detail {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_amount_affiliate_edge_is_ignored() {
        let mut fixture = Fixture::new("A");
        fixture
            .company("B")
            .affiliate("A", "B")
            .investment("B", "A", 0);

        let finding = fixture.run(&RelatedPartyDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::Low);
        // The affiliate was evaluated, so the low result still counts.
        assert!(!finding.is_empty());
    }

    #[tokio::test]
    async fn test_no_affiliates_or_officers_is_empty() {
        let mut fixture = Fixture::new("A");
        fixture.company("B").investment("B", "A", 1_000);

        let finding = fixture.run(&RelatedPartyDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::Low);
        assert!(finding.is_empty());
    }

    #[tokio::test]
    async fn test_officer_without_linked_investor_is_a_low_result() {
        let mut fixture = Fixture::new("A");
        fixture
            .company("B")
            .officer("o1", 0.0)
            .position("o1", "A")
            .position("o1", "B");

        let finding = fixture.run(&RelatedPartyDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::Low);
        match &finding.detail {
            FindingDetail::RelatedPartyTransactions(d) => {
                assert_eq!(d.total_related_count, 0);
                assert_eq!(d.current_officer_count, 1);
            }
            other => panic!("unexpected detail {:?}", other),
        }
        assert!(!finding.is_empty());
    }

    #[test]
    fn test_classification() {
        assert_eq!(RelatedPartyDetector::classify(0), RiskLevel::Low);
        assert_eq!(RelatedPartyDetector::classify(1), RiskLevel::Medium);
        assert_eq!(RelatedPartyDetector::classify(3), RiskLevel::High);
    }
}
