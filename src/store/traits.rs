// Read-only store interfaces consumed by the pattern detectors
use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{
    Bond, CareerEntry, Company, Cycle, FinancialMetrics, HealthSnapshot, Officer,
    RelatedInvestments, SubscriberConcentration,
};
use crate::risk::RiskError;

/// Read-only view over the corporate relationship graph.
///
/// Every operation may fail with [`RiskError::StoreUnavailable`] or return an
/// empty result. Implementations must never mutate the underlying data.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Name used in logs and error messages.
    fn backend_name(&self) -> &'static str;

    async fn get_company(&self, company_id: &str) -> Result<Option<Company>, RiskError>;

    /// Directed investment cycles that start and end at `company_id`, at most
    /// `max_depth` edges long, deduplicated by node set and sorted by total
    /// amount descending.
    async fn find_investment_cycles(
        &self,
        company_id: &str,
        max_depth: usize,
    ) -> Result<Vec<Cycle>, RiskError>;

    async fn list_bonds_issued_since(
        &self,
        company_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<Bond>, RiskError>;

    async fn list_current_officers(&self, company_id: &str) -> Result<Vec<Officer>, RiskError>;

    /// For each officer, the number of distinct companies other than
    /// `company_id` where they currently hold a position.
    async fn count_other_current_companies(
        &self,
        company_id: &str,
        officer_ids: &[String],
    ) -> Result<BTreeMap<String, usize>, RiskError>;

    async fn list_affiliate_company_ids(&self, company_id: &str) -> Result<Vec<String>, RiskError>;

    async fn find_related_investments(
        &self,
        company_id: &str,
    ) -> Result<RelatedInvestments, RiskError>;

    async fn list_officer_career_history(
        &self,
        officer_id: &str,
    ) -> Result<Vec<CareerEntry>, RiskError>;

    async fn list_subscriber_concentration(
        &self,
        company_id: &str,
    ) -> Result<Vec<SubscriberConcentration>, RiskError>;
}

/// Read-only access to tabular financial-health data.
#[async_trait]
pub trait HealthMetricsProvider: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn get_health_snapshot(
        &self,
        company_id: &str,
    ) -> Result<Option<HealthSnapshot>, RiskError>;

    async fn get_financial_metrics(
        &self,
        company_id: &str,
    ) -> Result<Option<FinancialMetrics>, RiskError>;
}

/// Supplies names of companies whose health score marks them as high risk.
///
/// Matching is done on names, not ids, so renamed or same-named companies
/// can be missed or over-matched.
#[async_trait]
pub trait HighRiskNameSupplier: Send + Sync {
    async fn high_risk_company_names(&self) -> Result<BTreeSet<String>, RiskError>;
}

/// Fixed name set, for tests and batch jobs that compute the set up front.
#[derive(Debug, Clone, Default)]
pub struct StaticHighRiskNames {
    names: BTreeSet<String>,
}

impl StaticHighRiskNames {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl HighRiskNameSupplier for StaticHighRiskNames {
    async fn high_risk_company_names(&self) -> Result<BTreeSet<String>, RiskError> {
        Ok(self.names.clone())
    }
}
