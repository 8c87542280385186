// Pattern detector trait and the inputs every detector receives
use async_trait::async_trait;
use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::Company;
use crate::risk::{Finding, PatternType, RiskError};
use crate::store::{GraphStore, HealthMetricsProvider, HighRiskNameSupplier};

/// Tunable detection parameters shared by all detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorParams {
    /// Maximum number of edges in an investment cycle.
    pub cycle_max_depth: usize,
    pub cycle_limit: usize,
    pub issuance_window_months: u32,
    pub distress_window_months: u32,
    /// Cap on ranked lists (officers, investors).
    pub top_n: usize,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            cycle_max_depth: 3,
            cycle_limit: 10,
            issuance_window_months: 12,
            distress_window_months: 6,
            top_n: 10,
        }
    }
}

/// Everything a detector may read during one analysis call.
pub struct DetectionContext<'a> {
    pub company: &'a Company,
    /// Reference date for trailing windows.
    pub as_of: NaiveDate,
    pub graph: &'a dyn GraphStore,
    pub health: &'a dyn HealthMetricsProvider,
    pub high_risk_names: Option<&'a dyn HighRiskNameSupplier>,
    pub params: &'a DetectorParams,
}

impl<'a> DetectionContext<'a> {
    pub fn company_id(&self) -> &str {
        &self.company.id
    }

    /// First day of a trailing window of `months` ending at `as_of`.
    pub fn window_start(&self, months: u32) -> NaiveDate {
        self.as_of
            .checked_sub_months(Months::new(months))
            .unwrap_or_else(|| self.as_of - Duration::days(i64::from(months) * 30))
    }
}

/// Core trait that all risk pattern detectors implement
#[async_trait]
pub trait PatternDetector: Send + Sync {
    /// Pattern this detector evaluates
    fn pattern(&self) -> PatternType;

    /// Evaluate the pattern for `ctx.company`.
    ///
    /// Empty inputs yield a low, empty finding. Missing auxiliary signals
    /// degrade the finding with a note instead of failing.
    async fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Finding, RiskError>;

    /// Signals this detector looks at
    fn risk_factors(&self) -> Vec<&'static str>;

    fn version(&self) -> &'static str {
        crate::risk::VERSION
    }

    fn get_config(&self) -> serde_json::Value {
        serde_json::json!({
            "pattern": self.pattern().as_str(),
            "version": self.version(),
            "risk_factors": self.risk_factors(),
        })
    }
}
