// PostgreSQL store backends
//
// Queries run against the tables and the `investment_edges` view defined in
// migrations/0001_corporate_graph.sql. Every call is retried on transient
// failures before surfacing as `StoreUnavailable`.
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use moka::future::Cache;
use sqlx::{FromRow, PgPool};
use tracing::{debug, info};

use crate::models::{
    concentration_ratio, Bond, CareerEntry, Company, Cycle, FinancialMetrics, HealthSnapshot,
    InvestmentEdge, Officer, RelatedInvestments, SubscriberConcentration,
};
use crate::risk::RiskError;
use crate::store::{GraphStore, HealthMetricsProvider, HighRiskNameSupplier, InvestmentGraph};
use crate::utils::fault_tolerance::{retry_with_backoff, RetryConfig};

const INVESTMENT_EDGE_COLUMNS: &str =
    "source_id, source_name, target_id, target_name, investment_count, total_amount";

#[derive(Debug, FromRow)]
struct OfficerCompanyCount {
    officer_id: String,
    company_count: i64,
}

#[derive(Debug, FromRow)]
struct SubscriberExposureRow {
    subscriber_name: String,
    subscriber_type: Option<String>,
    is_related_party: bool,
    investment_count: i64,
    total_amount: BigDecimal,
    total_bonds: i64,
}

#[derive(Clone)]
pub struct PgGraphStore {
    pool: PgPool,
    retry: RetryConfig,
}

impl PgGraphStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_retry(pool, RetryConfig::default())
    }

    pub fn with_retry(pool: PgPool, retry: RetryConfig) -> Self {
        Self { pool, retry }
    }

    /// Loads outgoing investment edges breadth-first, one query per level.
    async fn load_reachable_edges(
        &self,
        company_id: &str,
        max_depth: usize,
    ) -> Result<Vec<InvestmentEdge>, RiskError> {
        let sql = format!(
            "SELECT {} FROM investment_edges WHERE source_id = ANY($1)",
            INVESTMENT_EDGE_COLUMNS
        );
        let sql = sql.as_str();
        let pool = &self.pool;
        let mut edges = Vec::new();
        let mut expanded: BTreeSet<String> = BTreeSet::new();
        let mut frontier = vec![company_id.to_string()];

        for _ in 0..max_depth {
            if frontier.is_empty() {
                break;
            }
            expanded.extend(frontier.iter().cloned());

            let sources = frontier.as_slice();
            let level: Vec<InvestmentEdge> = retry_with_backoff(
                || async move {
                    sqlx::query_as::<_, InvestmentEdge>(sql)
                        .bind(sources)
                        .fetch_all(pool)
                        .await
                        .into_risk()
                },
                &self.retry,
                "load_investment_edges",
            )
            .await?;

            let next: BTreeSet<String> = level
                .iter()
                .map(|edge| edge.target_id.clone())
                .filter(|id| !expanded.contains(id))
                .collect();
            frontier = next.into_iter().collect();
            edges.extend(level);
        }

        Ok(edges)
    }

    async fn fetch_inbound_edges(
        &self,
        sql: &str,
        company_id: &str,
        operation_name: &str,
    ) -> Result<Vec<InvestmentEdge>, RiskError> {
        let pool = &self.pool;
        retry_with_backoff(
            || async move {
                sqlx::query_as::<_, InvestmentEdge>(sql)
                    .bind(company_id)
                    .fetch_all(pool)
                    .await
                    .into_risk()
            },
            &self.retry,
            operation_name,
        )
        .await
    }
}

// sqlx errors convert into StoreUnavailable through `From`.
trait IntoRiskResult<T> {
    fn into_risk(self) -> Result<T, RiskError>;
}

impl<T> IntoRiskResult<T> for Result<T, sqlx::Error> {
    fn into_risk(self) -> Result<T, RiskError> {
        self.map_err(RiskError::from)
    }
}

#[async_trait]
impl GraphStore for PgGraphStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn get_company(&self, company_id: &str) -> Result<Option<Company>, RiskError> {
        let pool = &self.pool;
        retry_with_backoff(
            || async move {
                sqlx::query_as::<_, Company>(
                    "SELECT id, name, sector, market, listing_status, trading_status \
                     FROM companies WHERE id = $1",
                )
                .bind(company_id)
                .fetch_optional(pool)
                .await
                .into_risk()
            },
            &self.retry,
            "get_company",
        )
        .await
    }

    async fn find_investment_cycles(
        &self,
        company_id: &str,
        max_depth: usize,
    ) -> Result<Vec<Cycle>, RiskError> {
        let edges = self.load_reachable_edges(company_id, max_depth).await?;
        let graph = InvestmentGraph::from_edges(edges);
        debug!(
            company_id = %company_id,
            edges = graph.edge_count(),
            "Loaded investment subgraph"
        );
        Ok(graph.cycles_through(company_id, max_depth))
    }

    async fn list_bonds_issued_since(
        &self,
        company_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<Bond>, RiskError> {
        let pool = &self.pool;
        retry_with_backoff(
            || async move {
                sqlx::query_as::<_, Bond>(
                    "SELECT id, company_id, issue_date, total_amount, bond_type \
                     FROM bonds WHERE company_id = $1 AND issue_date >= $2 \
                     ORDER BY issue_date, id",
                )
                .bind(company_id)
                .bind(since)
                .fetch_all(pool)
                .await
                .into_risk()
            },
            &self.retry,
            "list_bonds_issued_since",
        )
        .await
    }

    async fn list_current_officers(&self, company_id: &str) -> Result<Vec<Officer>, RiskError> {
        let pool = &self.pool;
        retry_with_backoff(
            || async move {
                sqlx::query_as::<_, Officer>(
                    "SELECT DISTINCT o.id, o.name, o.birth_period, o.influence_score \
                     FROM officers o \
                     JOIN officer_positions p ON p.officer_id = o.id \
                     WHERE p.company_id = $1 AND p.is_current \
                     ORDER BY o.id",
                )
                .bind(company_id)
                .fetch_all(pool)
                .await
                .into_risk()
            },
            &self.retry,
            "list_current_officers",
        )
        .await
    }

    async fn count_other_current_companies(
        &self,
        company_id: &str,
        officer_ids: &[String],
    ) -> Result<BTreeMap<String, usize>, RiskError> {
        if officer_ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let pool = &self.pool;
        let rows: Vec<OfficerCompanyCount> = retry_with_backoff(
            || async move {
                sqlx::query_as::<_, OfficerCompanyCount>(
                    "SELECT officer_id, COUNT(DISTINCT company_id) AS company_count \
                     FROM officer_positions \
                     WHERE officer_id = ANY($1) AND is_current AND company_id <> $2 \
                     GROUP BY officer_id",
                )
                .bind(officer_ids)
                .bind(company_id)
                .fetch_all(pool)
                .await
                .into_risk()
            },
            &self.retry,
            "count_other_current_companies",
        )
        .await?;

        let mut counts: BTreeMap<String, usize> =
            officer_ids.iter().map(|id| (id.clone(), 0)).collect();
        for row in rows {
            counts.insert(row.officer_id, row.company_count.max(0) as usize);
        }
        Ok(counts)
    }

    async fn list_affiliate_company_ids(&self, company_id: &str) -> Result<Vec<String>, RiskError> {
        let pool = &self.pool;
        retry_with_backoff(
            || async move {
                sqlx::query_scalar::<_, String>(
                    "SELECT affiliate_id FROM affiliates WHERE company_id = $1 AND affiliate_id <> $1 \
                     UNION \
                     SELECT company_id FROM affiliates WHERE affiliate_id = $1 AND company_id <> $1 \
                     ORDER BY 1",
                )
                .bind(company_id)
                .fetch_all(pool)
                .await
                .into_risk()
            },
            &self.retry,
            "list_affiliate_company_ids",
        )
        .await
    }

    async fn find_related_investments(
        &self,
        company_id: &str,
    ) -> Result<RelatedInvestments, RiskError> {
        let affiliate_sql = format!(
            "SELECT {cols} FROM investment_edges e \
             WHERE e.target_id = $1 AND e.source_id <> $1 AND e.total_amount > 0 \
               AND e.source_id IN ( \
                 SELECT affiliate_id FROM affiliates WHERE company_id = $1 \
                 UNION SELECT company_id FROM affiliates WHERE affiliate_id = $1) \
             ORDER BY e.source_id",
            cols = INVESTMENT_EDGE_COLUMNS
        );
        let officer_sql = format!(
            "SELECT {cols} FROM investment_edges e \
             WHERE e.target_id = $1 AND e.source_id <> $1 \
               AND e.source_id IN ( \
                 SELECT other.company_id FROM officer_positions own \
                 JOIN officer_positions other ON other.officer_id = own.officer_id \
                 WHERE own.company_id = $1 AND own.is_current AND other.is_current \
                   AND other.company_id <> $1) \
             ORDER BY e.source_id",
            cols = INVESTMENT_EDGE_COLUMNS
        );

        let (affiliate_investments, officer_linked_investments) = tokio::try_join!(
            self.fetch_inbound_edges(&affiliate_sql, company_id, "find_affiliate_investments"),
            self.fetch_inbound_edges(&officer_sql, company_id, "find_officer_linked_investments"),
        )?;

        Ok(RelatedInvestments {
            affiliate_investments,
            officer_linked_investments,
        })
    }

    async fn list_officer_career_history(
        &self,
        officer_id: &str,
    ) -> Result<Vec<CareerEntry>, RiskError> {
        let pool = &self.pool;
        retry_with_backoff(
            || async move {
                sqlx::query_as::<_, CareerEntry>(
                    "SELECT officer_id, text FROM officer_careers \
                     WHERE officer_id = $1 ORDER BY seq",
                )
                .bind(officer_id)
                .fetch_all(pool)
                .await
                .into_risk()
            },
            &self.retry,
            "list_officer_career_history",
        )
        .await
    }

    async fn list_subscriber_concentration(
        &self,
        company_id: &str,
    ) -> Result<Vec<SubscriberConcentration>, RiskError> {
        let pool = &self.pool;
        let rows: Vec<SubscriberExposureRow> = retry_with_backoff(
            || async move {
                sqlx::query_as::<_, SubscriberExposureRow>(
                    "WITH company_bonds AS (SELECT id FROM bonds WHERE company_id = $1) \
                     SELECT s.name AS subscriber_name, \
                            MIN(s.subscriber_type) AS subscriber_type, \
                            BOOL_OR(s.is_related_party) AS is_related_party, \
                            COUNT(DISTINCT s.bond_id) AS investment_count, \
                            COALESCE(SUM(s.subscription_amount), 0) AS total_amount, \
                            (SELECT COUNT(*) FROM company_bonds) AS total_bonds \
                     FROM bond_subscribers s \
                     JOIN company_bonds b ON b.id = s.bond_id \
                     GROUP BY s.name \
                     ORDER BY s.name",
                )
                .bind(company_id)
                .fetch_all(pool)
                .await
                .into_risk()
            },
            &self.retry,
            "list_subscriber_concentration",
        )
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SubscriberConcentration {
                concentration_ratio: concentration_ratio(row.investment_count, row.total_bonds),
                subscriber_name: row.subscriber_name,
                subscriber_type: row.subscriber_type,
                is_related_party: row.is_related_party,
                investment_count: row.investment_count,
                total_amount: row.total_amount,
            })
            .collect())
    }
}

#[derive(Clone)]
pub struct PgHealthMetricsProvider {
    pool: PgPool,
    retry: RetryConfig,
}

impl PgHealthMetricsProvider {
    pub fn new(pool: PgPool) -> Self {
        Self::with_retry(pool, RetryConfig::default())
    }

    pub fn with_retry(pool: PgPool, retry: RetryConfig) -> Self {
        Self { pool, retry }
    }
}

#[async_trait]
impl HealthMetricsProvider for PgHealthMetricsProvider {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn get_health_snapshot(
        &self,
        company_id: &str,
    ) -> Result<Option<HealthSnapshot>, RiskError> {
        let pool = &self.pool;
        retry_with_backoff(
            || async move {
                sqlx::query_as::<_, HealthSnapshot>(
                    "SELECT company_id, score, warnings, strengths \
                     FROM company_health WHERE company_id = $1",
                )
                .bind(company_id)
                .fetch_optional(pool)
                .await
                .into_risk()
            },
            &self.retry,
            "get_health_snapshot",
        )
        .await
    }

    async fn get_financial_metrics(
        &self,
        company_id: &str,
    ) -> Result<Option<FinancialMetrics>, RiskError> {
        let pool = &self.pool;
        retry_with_backoff(
            || async move {
                sqlx::query_as::<_, FinancialMetrics>(
                    "SELECT company_id, debt_to_equity, operating_income, net_income \
                     FROM financial_metrics WHERE company_id = $1 \
                     ORDER BY fiscal_period DESC LIMIT 1",
                )
                .bind(company_id)
                .fetch_optional(pool)
                .await
                .into_risk()
            },
            &self.retry,
            "get_financial_metrics",
        )
        .await
    }
}

/// High-risk company names read from `company_health`, cached for a TTL.
#[derive(Clone)]
pub struct PgHighRiskNameSupplier {
    pool: PgPool,
    score_threshold: f64,
    retry: RetryConfig,
    cache: Cache<(), Arc<BTreeSet<String>>>,
}

impl PgHighRiskNameSupplier {
    pub fn new(pool: PgPool, score_threshold: f64, ttl: Duration) -> Self {
        Self {
            pool,
            score_threshold,
            retry: RetryConfig::default(),
            cache: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    async fn load(&self) -> Result<BTreeSet<String>, RiskError> {
        let pool = &self.pool;
        let threshold = self.score_threshold;
        let names: Vec<String> = retry_with_backoff(
            || async move {
                sqlx::query_scalar::<_, String>(
                    "SELECT DISTINCT c.name FROM company_health h \
                     JOIN companies c ON c.id = h.company_id \
                     WHERE h.score >= $1",
                )
                .bind(threshold)
                .fetch_all(pool)
                .await
                .into_risk()
            },
            &self.retry,
            "load_high_risk_company_names",
        )
        .await?;

        info!(
            names = names.len(),
            threshold = self.score_threshold,
            "Loaded high-risk company names"
        );
        Ok(names.into_iter().collect())
    }
}

#[async_trait]
impl HighRiskNameSupplier for PgHighRiskNameSupplier {
    async fn high_risk_company_names(&self) -> Result<BTreeSet<String>, RiskError> {
        let names = self
            .cache
            .try_get_with((), async { self.load().await.map(Arc::new) })
            .await
            .map_err(|e: Arc<RiskError>| (*e).clone())?;
        Ok((*names).clone())
    }
}
