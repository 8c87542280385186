// Composite risk aggregation
//
// Pure reduction of per-pattern findings into a single report. Never
// suspends and never touches a store.
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Company;
use crate::risk::{Finding, PatternType, RiskLevel};

pub const MAX_RISK_SCORE: f64 = 100.0;
pub const MIN_RISK_SCORE: f64 = 0.0;
pub const HIGH_SCORE_THRESHOLD: f64 = 60.0;
pub const MEDIUM_SCORE_THRESHOLD: f64 = 40.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRiskReport {
    pub company: Company,
    pub as_of: NaiveDate,
    pub overall_level: RiskLevel,
    pub score: f64,
    /// Findings that were neither unknown nor empty.
    pub valid_patterns: usize,
    pub evaluated_patterns: usize,
    pub level_counts: BTreeMap<RiskLevel, usize>,
    /// Findings in pattern order, after any severity filter.
    pub findings: Vec<Finding>,
    pub unevaluated_patterns: Vec<PatternType>,
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl CompanyRiskReport {
    pub fn finding(&self, pattern: PatternType) -> Option<&Finding> {
        self.findings.iter().find(|f| f.pattern == pattern)
    }

    /// Drop displayed findings below `min_severity`. Unknown findings stay
    /// visible so callers can see what was not evaluated.
    pub fn retain_min_severity(&mut self, min_severity: RiskLevel) {
        self.findings
            .retain(|f| f.risk_level == RiskLevel::Unknown || f.risk_level >= min_severity);
    }
}

/// Level a finding contributes to the score.
pub fn effective_level(finding: &Finding) -> RiskLevel {
    if finding.risk_level != RiskLevel::Unknown
        && finding.detail.is_list_shaped()
        && !finding.is_empty()
    {
        return finding.risk_level.max(RiskLevel::High);
    }
    finding.risk_level
}

fn is_valid(finding: &Finding) -> bool {
    finding.risk_level != RiskLevel::Unknown && !finding.is_empty()
}

/// Composite score in [0, 100] and the number of findings it was computed over.
pub fn composite_score<'a, I>(findings: I) -> (f64, usize)
where
    I: IntoIterator<Item = &'a Finding>,
{
    let (total_weight, valid) = findings
        .into_iter()
        .filter(|f| is_valid(f))
        .fold((0u32, 0usize), |(weight, count), f| {
            (weight + effective_level(f).weight(), count + 1)
        });

    if valid == 0 {
        return (MIN_RISK_SCORE, 0);
    }

    let raw = f64::from(total_weight) / (valid as f64 * 3.0) * 100.0;
    let rounded = (raw * 10.0).round() / 10.0;
    (rounded.clamp(MIN_RISK_SCORE, MAX_RISK_SCORE), valid)
}

pub fn overall_level(score: f64) -> RiskLevel {
    if score >= HIGH_SCORE_THRESHOLD {
        RiskLevel::High
    } else if score >= MEDIUM_SCORE_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn recommendation_for(pattern: PatternType) -> &'static str {
    match pattern {
        PatternType::CircularInvestment => {
            "Trace the funding chain of each cycle and confirm the economic substance of the investments"
        }
        PatternType::ExcessiveIssuance => {
            "Review use of proceeds and dilution from recent convertible bond issuance"
        }
        PatternType::OfficerConcentration => {
            "Check whether concurrently serving officers can exercise effective oversight"
        }
        PatternType::FinancialDistressWithCb => {
            "Assess refinancing risk before relying on further convertible bond funding"
        }
        PatternType::RelatedPartyTransactions => {
            "Verify pricing and disclosure of bond subscriptions by related companies"
        }
        PatternType::OfficerMovement => {
            "Review officers' prior roles at high-risk companies; matches are heuristic"
        }
        PatternType::CbInvestorConcentration => {
            "Identify the beneficial owners behind concentrated bond investors"
        }
        PatternType::AffiliateChainRisk => {
            "Monitor contagion from distressed affiliates and any guarantees given to them"
        }
    }
}

/// Fold findings into a report. `findings` may arrive in any order; output is
/// ordered by pattern.
pub fn aggregate(
    company: Company,
    as_of: NaiveDate,
    findings: BTreeMap<PatternType, Finding>,
    notes: Vec<String>,
) -> CompanyRiskReport {
    let (score, valid_patterns) = composite_score(findings.values());
    let overall_level = overall_level(score);

    let mut level_counts: BTreeMap<RiskLevel, usize> = BTreeMap::new();
    for finding in findings.values() {
        *level_counts.entry(finding.risk_level).or_insert(0) += 1;
    }

    let unevaluated_patterns: Vec<PatternType> = findings
        .values()
        .filter(|f| f.risk_level == RiskLevel::Unknown)
        .map(|f| f.pattern)
        .collect();

    let flagged: Vec<&Finding> = findings
        .values()
        .filter(|f| is_valid(f) && effective_level(f) >= RiskLevel::Medium)
        .collect();

    let risk_factors: Vec<String> = flagged
        .iter()
        .map(|f| format!("{} ({}): {}", f.pattern.display_name(), f.risk_level, f.summary()))
        .collect();

    let mut recommendations: Vec<String> = flagged
        .iter()
        .map(|f| recommendation_for(f.pattern).to_string())
        .collect();
    if !unevaluated_patterns.is_empty() {
        recommendations.push(format!(
            "Re-run the analysis once data sources recover; {} pattern(s) could not be evaluated",
            unevaluated_patterns.len()
        ));
    }

    CompanyRiskReport {
        company,
        as_of,
        overall_level,
        score,
        valid_patterns,
        evaluated_patterns: findings.len() - unevaluated_patterns.len(),
        level_counts,
        findings: findings.into_values().collect(),
        unevaluated_patterns,
        risk_factors,
        recommendations,
        notes,
        generated_at: Utc::now(),
    }
}
