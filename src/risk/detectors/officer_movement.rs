// Officer movement from high-risk companies
use std::collections::BTreeSet;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, warn};

use crate::models::Officer;
use crate::risk::detectors::career::match_career_entry;
use crate::risk::{
    DetectionContext, Finding, FindingDetail, OfficerCareerRisk, OfficerMovementDetail,
    PatternDetector, PatternType, RiskError, RiskLevel,
};

/// Officers need this many career entries to be evaluated.
pub const MIN_CAREER_ENTRIES: usize = 4;
/// A career this long is notable on its own.
pub const LONG_CAREER_ENTRIES: usize = 6;
pub const HIGH_MATCH_COUNT: usize = 3;

#[derive(Debug, Default, Clone)]
pub struct OfficerMovementDetector;

impl OfficerMovementDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(total_high_risk_careers: usize, longest_career: usize) -> RiskLevel {
        if total_high_risk_careers >= HIGH_MATCH_COUNT {
            RiskLevel::High
        } else if total_high_risk_careers >= 1 || longest_career >= LONG_CAREER_ENTRIES {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    async fn high_risk_names(
        &self,
        ctx: &DetectionContext<'_>,
        notes: &mut Vec<String>,
    ) -> BTreeSet<String> {
        let Some(supplier) = ctx.high_risk_names else {
            notes.push("no high-risk company name source configured".to_string());
            return BTreeSet::new();
        };
        match supplier.high_risk_company_names().await {
            Ok(names) => names,
            Err(e) => {
                warn!(
                    company_id = %ctx.company_id(),
                    error = %e,
                    "High-risk company names unavailable, skipping career matching"
                );
                notes.push(format!("high-risk company names unavailable: {}", e));
                BTreeSet::new()
            }
        }
    }

    async fn evaluate_officer(
        ctx: &DetectionContext<'_>,
        officer: Officer,
        high_risk_names: &BTreeSet<String>,
    ) -> Result<Option<OfficerCareerRisk>, RiskError> {
        let careers = ctx.graph.list_officer_career_history(&officer.id).await?;
        if careers.len() < MIN_CAREER_ENTRIES {
            return Ok(None);
        }
        let matches = careers
            .iter()
            .flat_map(|entry| match_career_entry(&entry.text, high_risk_names, &ctx.company.name))
            .collect();
        Ok(Some(OfficerCareerRisk {
            officer_id: officer.id,
            name: officer.name,
            career_entry_count: careers.len(),
            matches,
        }))
    }
}

#[async_trait]
impl PatternDetector for OfficerMovementDetector {
    fn pattern(&self) -> PatternType {
        PatternType::OfficerMovement
    }

    async fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Finding, RiskError> {
        let officers = ctx.graph.list_current_officers(ctx.company_id()).await?;
        let current_officer_count = officers.len();

        let mut notes = Vec::new();
        let high_risk_names = if officers.is_empty() {
            BTreeSet::new()
        } else {
            self.high_risk_names(ctx, &mut notes).await
        };

        let evaluated = try_join_all(
            officers
                .into_iter()
                .map(|officer| Self::evaluate_officer(ctx, officer, &high_risk_names)),
        )
        .await?;
        let officers: Vec<OfficerCareerRisk> = evaluated.into_iter().flatten().collect();

        let total_high_risk_careers: usize = officers.iter().map(|o| o.matches.len()).sum();
        let longest_career = officers
            .iter()
            .map(|o| o.career_entry_count)
            .max()
            .unwrap_or(0);
        let risk_level = Self::classify(total_high_risk_careers, longest_career);

        debug!(
            company_id = %ctx.company_id(),
            evaluated_officers = officers.len(),
            high_risk_names = high_risk_names.len(),
            total_high_risk_careers = total_high_risk_careers,
            risk_level = %risk_level,
            "Evaluated officer movement"
        );

        Ok(Finding::new(
            self.pattern(),
            risk_level,
            FindingDetail::OfficerMovement(OfficerMovementDetail {
                current_officer_count,
                officers,
                total_high_risk_careers,
            }),
        )
        .with_notes(notes))
    }

    fn risk_factors(&self) -> Vec<&'static str> {
        vec!["career_history_length", "prior_high_risk_employers"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::detectors::test_support::Fixture;

    fn career(fixture: &mut Fixture, officer_id: &str, entries: &[&str]) {
        fixture.officer(officer_id, 0.0).position(officer_id, "A");
        for entry in entries {
            fixture.graph.add_career_entry(officer_id, entry);
        }
    }

    #[tokio::test]
    async fn test_three_matches_is_high() {
        let mut fixture = Fixture::new("A");
        fixture.high_risk(&["한빛전자", "Acme Holdings", "누리바이오"]);
        career(
            &mut fixture,
            "o1",
            &[
                "(전) 한빛전자 대표이사",
                "(전) Acme Holdings Director",
                "(전) 누리바이오 감사",
                "2001 서울대학교 졸업",
            ],
        );

        let finding = fixture.run(&OfficerMovementDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::High);
        match &finding.detail {
            FindingDetail::OfficerMovement(d) => {
                assert_eq!(d.total_high_risk_careers, 3);
                assert!(d.officers[0].matches.iter().all(|m| m.heuristic));
            }
            other => panic!("unexpected detail {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_short_careers_are_not_evaluated() {
        let mut fixture = Fixture::new("A");
        fixture.high_risk(&["한빛전자"]);
        career(&mut fixture, "o1", &["(전) 한빛전자 대표이사", "(전) 한빛전자 이사"]);

        let finding = fixture.run(&OfficerMovementDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::Low);
        match &finding.detail {
            FindingDetail::OfficerMovement(d) => assert!(d.officers.is_empty()),
            other => panic!("unexpected detail {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_long_career_without_matches_is_medium() {
        let mut fixture = Fixture::new("A");
        fixture.high_risk(&["Nowhere Ltd"]);
        career(
            &mut fixture,
            "o1",
            &["Alpha manager", "Beta manager", "Gamma manager", "Delta manager", "Echo manager", "Foxtrot manager"],
        );

        let finding = fixture.run(&OfficerMovementDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn test_missing_name_source_degrades_with_note() {
        let mut fixture = Fixture::new("A");
        career(&mut fixture, "o1", &["a", "b", "c", "d"]);

        let finding = fixture.run(&OfficerMovementDetector::new()).await.unwrap();
        assert_eq!(finding.risk_level, RiskLevel::Low);
        assert_eq!(finding.notes, vec!["no high-risk company name source configured".to_string()]);
    }

    #[test]
    fn test_classification() {
        assert_eq!(OfficerMovementDetector::classify(0, 5), RiskLevel::Low);
        assert_eq!(OfficerMovementDetector::classify(0, 6), RiskLevel::Medium);
        assert_eq!(OfficerMovementDetector::classify(2, 0), RiskLevel::Medium);
        assert_eq!(OfficerMovementDetector::classify(3, 0), RiskLevel::High);
    }
}
