// Financial distress combined with recent CB issuance
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::risk::{
    DetectionContext, DistressDetail, Finding, FindingDetail, PatternDetector, PatternType,
    RiskError, RiskLevel,
};

pub const HIGH_SCORE_CEILING: f64 = 50.0;
pub const MEDIUM_SCORE_CEILING: f64 = 60.0;

#[derive(Debug, Default, Clone)]
pub struct FinancialDistressDetector;

impl FinancialDistressDetector {
    pub fn new() -> Self {
        Self
    }

    /// Without a health score the combination cannot be established.
    pub fn classify(health_score: Option<f64>, recent_bond_count: usize) -> RiskLevel {
        match health_score {
            Some(score) if score < HIGH_SCORE_CEILING && recent_bond_count >= 2 => RiskLevel::High,
            Some(score) if score < MEDIUM_SCORE_CEILING && recent_bond_count >= 1 => {
                RiskLevel::Medium
            }
            _ => RiskLevel::Low,
        }
    }
}

#[async_trait]
impl PatternDetector for FinancialDistressDetector {
    fn pattern(&self) -> PatternType {
        PatternType::FinancialDistressWithCb
    }

    async fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Finding, RiskError> {
        let window_months = ctx.params.distress_window_months;
        let since = ctx.window_start(window_months);

        let (snapshot, bonds) = tokio::join!(
            ctx.health.get_health_snapshot(ctx.company_id()),
            ctx.graph.list_bonds_issued_since(ctx.company_id(), since),
        );
        let recent_bond_count = bonds?
            .iter()
            .filter(|b| b.issue_date <= ctx.as_of)
            .count();

        let mut notes = Vec::new();
        let snapshot = match snapshot {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    company_id = %ctx.company_id(),
                    provider = ctx.health.backend_name(),
                    error = %e,
                    "Health snapshot unavailable, evaluating without score"
                );
                notes.push(format!("health score unavailable: {}", e));
                None
            }
        };
        if snapshot.is_none() && notes.is_empty() {
            notes.push("no health score on record".to_string());
        }

        let health_score = snapshot.as_ref().map(|s| s.score);
        let risk_level = Self::classify(health_score, recent_bond_count);

        debug!(
            company_id = %ctx.company_id(),
            health_score = ?health_score,
            recent_bonds = recent_bond_count,
            risk_level = %risk_level,
            "Evaluated financial distress with CB issuance"
        );

        Ok(Finding::new(
            self.pattern(),
            risk_level,
            FindingDetail::FinancialDistressWithCb(DistressDetail {
                health_score,
                health_warnings: snapshot.map(|s| s.warnings).unwrap_or_default(),
                window_months,
                recent_bond_count,
            }),
        )
        .with_notes(notes))
    }

    fn risk_factors(&self) -> Vec<&'static str> {
        vec!["health_score", "recent_bond_count"]
    }
}
