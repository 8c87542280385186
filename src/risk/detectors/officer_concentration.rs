// Officer concentration detector
use std::cmp::Ordering;

use async_trait::async_trait;
use tracing::debug;

use crate::risk::{
    ConcentratedOfficer, DetectionContext, Finding, FindingDetail, OfficerConcentrationDetail,
    PatternDetector, PatternType, RiskError, RiskLevel,
};

/// Officers serving at this many other companies qualify.
pub const MIN_OTHER_COMPANIES: usize = 3;
pub const HIGH_OTHER_COMPANIES: usize = 5;

#[derive(Debug, Default, Clone)]
pub struct OfficerConcentrationDetector;

impl OfficerConcentrationDetector {
    pub fn new() -> Self {
        Self
    }

    fn rank(a: &ConcentratedOfficer, b: &ConcentratedOfficer) -> Ordering {
        b.other_company_count
            .cmp(&a.other_company_count)
            .then_with(|| {
                b.influence_score
                    .partial_cmp(&a.influence_score)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.officer_id.cmp(&b.officer_id))
    }
}

#[async_trait]
impl PatternDetector for OfficerConcentrationDetector {
    fn pattern(&self) -> PatternType {
        PatternType::OfficerConcentration
    }

    async fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Finding, RiskError> {
        let officers = ctx.graph.list_current_officers(ctx.company_id()).await?;
        let current_officer_count = officers.len();

        let officer_ids: Vec<String> = officers.iter().map(|o| o.id.clone()).collect();
        let counts = if officer_ids.is_empty() {
            Default::default()
        } else {
            ctx.graph
                .count_other_current_companies(ctx.company_id(), &officer_ids)
                .await?
        };

        let mut qualifying: Vec<ConcentratedOfficer> = officers
            .into_iter()
            .filter_map(|officer| {
                let other_company_count = counts.get(&officer.id).copied().unwrap_or(0);
                (other_company_count >= MIN_OTHER_COMPANIES).then(|| ConcentratedOfficer {
                    officer_id: officer.id,
                    name: officer.name,
                    influence_score: officer.influence_score,
                    other_company_count,
                })
            })
            .collect();
        qualifying.sort_by(Self::rank);
        qualifying.truncate(ctx.params.top_n);

        let risk_level = if qualifying
            .iter()
            .any(|o| o.other_company_count >= HIGH_OTHER_COMPANIES)
        {
            RiskLevel::High
        } else if !qualifying.is_empty() {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        debug!(
            company_id = %ctx.company_id(),
            current_officers = current_officer_count,
            qualifying = qualifying.len(),
            risk_level = %risk_level,
            "Evaluated officer concentration"
        );

        Ok(Finding::new(
            self.pattern(),
            risk_level,
            FindingDetail::OfficerConcentration(OfficerConcentrationDetail {
                current_officer_count,
                officers: qualifying,
            }),
        ))
    }

    fn risk_factors(&self) -> Vec<&'static str> {
        vec!["concurrent_positions", "officer_influence"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::detectors::test_support::Fixture;

    fn serve(fixture: &mut Fixture, officer_id: &str, influence: f64, companies: usize) {
        fixture.officer(officer_id, influence).position(officer_id, "A");
        for i in 0..companies {
            fixture.position(officer_id, &format!("{}-other-{}", officer_id, i));
        }
    }

    #[tokio::test]
    async fn test_ranking_and_high_classification() {
        let mut fixture = Fixture::new("A");
        serve(&mut fixture, "o1", 0.2, 3);
        serve(&mut fixture, "o2", 0.9, 3);
        serve(&mut fixture, "o3", 0.1, 5);
        serve(&mut fixture, "o4", 1.0, 2);

        let finding = fixture.run(&OfficerConcentrationDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::High);
        match &finding.detail {
            FindingDetail::OfficerConcentration(d) => {
                assert_eq!(d.current_officer_count, 4);
                let ids: Vec<&str> = d.officers.iter().map(|o| o.officer_id.as_str()).collect();
                assert_eq!(ids, vec!["o3", "o2", "o1"]);
            }
            other => panic!("unexpected detail {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_three_other_companies_is_medium() {
        let mut fixture = Fixture::new("A");
        serve(&mut fixture, "o1", 0.5, 4);

        let finding = fixture.run(&OfficerConcentrationDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn test_officers_without_concentration_is_low() {
        let mut fixture = Fixture::new("A");
        serve(&mut fixture, "o1", 0.5, 2);

        let finding = fixture.run(&OfficerConcentrationDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::Low);
        assert!(!finding.is_empty());
    }

    #[tokio::test]
    async fn test_no_officers_is_empty() {
        let fixture = Fixture::new("A");
        let finding = fixture.run(&OfficerConcentrationDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::Low);
        assert!(finding.is_empty());
    }
}
