// Peer comparison across several companies
use std::collections::BTreeSet;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::risk::{AnalysisOptions, RiskAnalysisEngine, RiskError, RiskLevel};

pub const MIN_COMPARISON_COMPANIES: usize = 2;
pub const MAX_COMPARISON_COMPANIES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyComparison {
    pub rank: usize,
    pub company_id: String,
    pub company_name: Option<String>,
    pub score: f64,
    pub overall_level: RiskLevel,
    pub valid_patterns: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Sorted by score descending, then company id.
    pub companies: Vec<CompanyComparison>,
    /// Mean score over companies scoring above zero.
    pub peer_average: f64,
    pub highest: Option<CompanyComparison>,
    pub lowest: Option<CompanyComparison>,
    /// Reference date shared by every analysis in the comparison.
    pub as_of: NaiveDate,
    pub generated_at: DateTime<Utc>,
}

fn validate_company_ids(company_ids: &[String]) -> Result<Vec<String>, RiskError> {
    let mut seen = BTreeSet::new();
    let unique: Vec<String> = company_ids
        .iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect();

    if unique.len() < MIN_COMPARISON_COMPANIES || unique.len() > MAX_COMPARISON_COMPANIES {
        return Err(RiskError::InvalidInput {
            message: format!(
                "comparison needs {} to {} distinct company ids, got {}",
                MIN_COMPARISON_COMPANIES,
                MAX_COMPARISON_COMPANIES,
                unique.len()
            ),
        });
    }
    Ok(unique)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl RiskAnalysisEngine {
    /// Analyse 2 to 10 companies and rank them by composite score.
    ///
    /// A company whose analysis fails is listed as unknown with score 0 and
    /// the error attached; it does not abort the comparison. Every company is
    /// analysed with the same `opts`; an unset `as_of` is pinned to today once.
    pub async fn compare_companies(
        &self,
        company_ids: &[String],
        opts: &AnalysisOptions,
    ) -> Result<ComparisonReport, RiskError> {
        let company_ids = validate_company_ids(company_ids)?;
        let started = Instant::now();
        let as_of = opts.as_of.unwrap_or_else(|| Utc::now().date_naive());
        let opts = opts.clone().with_as_of(as_of);

        info!(
            companies = company_ids.len(),
            as_of = %as_of,
            "Starting company comparison"
        );

        let opts = &opts;
        let mut companies: Vec<CompanyComparison> = stream::iter(company_ids)
            .map(|company_id| async move {
                match self.analyze_company_risk(&company_id, opts).await {
                    Ok(report) => CompanyComparison {
                        rank: 0,
                        company_name: Some(report.company.name),
                        company_id,
                        score: report.score,
                        overall_level: report.overall_level,
                        valid_patterns: report.valid_patterns,
                        error: None,
                    },
                    Err(e) => {
                        warn!(company_id = %company_id, error = %e, "Company analysis failed during comparison");
                        CompanyComparison {
                            rank: 0,
                            company_name: None,
                            company_id,
                            score: 0.0,
                            overall_level: RiskLevel::Unknown,
                            valid_patterns: 0,
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .buffer_unordered(self.config().max_concurrent_companies.max(1))
            .collect()
            .await;

        // Sort by composite score descending
        companies.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.company_id.cmp(&b.company_id))
        });

        // Assign ranks
        for (index, company) in companies.iter_mut().enumerate() {
            company.rank = index + 1;
        }

        let scored: Vec<f64> = companies
            .iter()
            .map(|c| c.score)
            .filter(|score| *score > 0.0)
            .collect();
        let peer_average = if scored.is_empty() {
            0.0
        } else {
            round1(scored.iter().sum::<f64>() / scored.len() as f64)
        };

        let successful: Vec<&CompanyComparison> =
            companies.iter().filter(|c| c.error.is_none()).collect();
        let highest = successful.first().map(|c| (*c).clone());
        let lowest = successful.last().map(|c| (*c).clone());

        info!(
            companies = companies.len(),
            failed = companies.len() - successful.len(),
            peer_average = peer_average,
            duration_ms = started.elapsed().as_millis() as u64,
            "Completed company comparison"
        );

        Ok(ComparisonReport {
            companies,
            peer_average,
            highest,
            lowest,
            as_of,
            generated_at: Utc::now(),
        })
    }
}
