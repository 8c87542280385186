// Risk Analysis Engine - runs pattern detectors concurrently and aggregates findings
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use metrics::{histogram, increment_counter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::Company;
use crate::risk::{
    aggregate, default_detectors, CompanyRiskReport, DetectionContext, DetectorParams, Finding,
    FindingDetail, PatternDetector, PatternInfo, PatternType, RiskError, RiskLevel,
};
use crate::store::{GraphStore, HealthMetricsProvider, HighRiskNameSupplier};
use crate::utils::fault_tolerance::with_timeout;

/// Configuration for the analysis engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Budget for a single detector; expiry only affects that detector.
    pub detector_timeout: Duration,
    /// Overall budget for one company analysis.
    pub analysis_deadline: Option<Duration>,
    pub max_concurrent_detectors: usize,
    /// Companies analysed at once by `compare_companies`.
    pub max_concurrent_companies: usize,
    pub params: DetectorParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            detector_timeout: Duration::from_secs(10),
            analysis_deadline: None,
            max_concurrent_detectors: PatternType::ALL.len(),
            max_concurrent_companies: 4,
            params: DetectorParams::default(),
        }
    }
}

/// Per-call analysis options.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    /// Patterns to evaluate; `None` or empty means all.
    pub include_patterns: Option<Vec<PatternType>>,
    /// Hide displayed findings below this level. Scoring is unaffected.
    pub min_severity: Option<RiskLevel>,
    /// Reference date for trailing windows; defaults to today (UTC).
    pub as_of: Option<NaiveDate>,
}

impl AnalysisOptions {
    /// Options restricted to the named patterns.
    pub fn for_pattern_names<S: AsRef<str>>(names: &[S]) -> Result<Self, RiskError> {
        let patterns = names
            .iter()
            .map(|name| name.as_ref().parse::<PatternType>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            include_patterns: Some(patterns),
            ..Self::default()
        })
    }

    pub fn with_min_severity(mut self, level: RiskLevel) -> Self {
        self.min_severity = Some(level);
        self
    }

    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    fn patterns(&self) -> Vec<PatternType> {
        match &self.include_patterns {
            Some(patterns) if !patterns.is_empty() => patterns
                .iter()
                .copied()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            _ => PatternType::ALL.to_vec(),
        }
    }
}

/// Main engine that resolves a company, fans out the detectors and folds the
/// findings into a report.
///
/// Holds no per-call state; one instance can serve concurrent calls.
#[derive(Clone)]
pub struct RiskAnalysisEngine {
    graph: Arc<dyn GraphStore>,
    health: Arc<dyn HealthMetricsProvider>,
    high_risk_names: Option<Arc<dyn HighRiskNameSupplier>>,
    detectors: BTreeMap<PatternType, Arc<dyn PatternDetector>>,
    config: EngineConfig,
}

impl RiskAnalysisEngine {
    /// Create an engine with the standard detector set
    pub fn new(graph: Arc<dyn GraphStore>, health: Arc<dyn HealthMetricsProvider>) -> Self {
        Self {
            graph,
            health,
            high_risk_names: None,
            detectors: default_detectors(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_high_risk_names(mut self, supplier: Arc<dyn HighRiskNameSupplier>) -> Self {
        self.high_risk_names = Some(supplier);
        self
    }

    /// Replace the detector registered for the detector's pattern
    pub fn with_detector(mut self, detector: Arc<dyn PatternDetector>) -> Self {
        info!(
            pattern = %detector.pattern(),
            version = detector.version(),
            "Registering pattern detector"
        );
        self.detectors.insert(detector.pattern(), detector);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Static catalog of the supported patterns; never touches a store.
    pub fn list_supported_patterns(&self) -> Vec<PatternInfo> {
        PatternType::catalog()
    }

    /// Full analysis of one company.
    pub async fn analyze_company_risk(
        &self,
        company_id: &str,
        opts: &AnalysisOptions,
    ) -> Result<CompanyRiskReport, RiskError> {
        self.analyze_company_risk_until(company_id, opts, &CancellationToken::new())
            .await
    }

    /// Full analysis that stops early when `cancel` fires or the configured
    /// deadline passes. Completed findings are kept; the rest are reported
    /// as unknown.
    pub async fn analyze_company_risk_until(
        &self,
        company_id: &str,
        opts: &AnalysisOptions,
        cancel: &CancellationToken,
    ) -> Result<CompanyRiskReport, RiskError> {
        let started = Instant::now();
        let analysis_id = Uuid::new_v4();
        let patterns = opts.patterns();
        let deadline_at = self
            .config
            .analysis_deadline
            .map(|budget| tokio::time::Instant::now() + budget);

        // The lookup shares the analysis budget; a ready result wins the race.
        let (company, mut notes) = tokio::select! {
            biased;
            resolved = self.resolve_company(company_id) => resolved?,
            reason = self.interrupted(cancel, deadline_at) => {
                let company_id = company_id.trim();
                warn!(
                    company_id = %company_id,
                    store = self.graph.backend_name(),
                    reason = %reason,
                    "Company lookup interrupted, continuing with id only"
                );
                (
                    Company::new(company_id, company_id),
                    vec!["company details unavailable: lookup interrupted".to_string()],
                )
            }
        };
        let as_of = opts.as_of.unwrap_or_else(|| Utc::now().date_naive());

        info!(
            analysis_id = %analysis_id,
            company_id = %company.id,
            patterns = patterns.len(),
            as_of = %as_of,
            "Starting company risk analysis"
        );

        let (findings, interruption) = self
            .run_detectors(&company, as_of, &patterns, cancel, deadline_at)
            .await;
        notes.extend(interruption);

        let mut report = aggregate(company, as_of, findings, notes);
        if let Some(min_severity) = opts.min_severity {
            report.retain_min_severity(min_severity);
        }

        histogram!(
            "risk_analysis_duration_seconds",
            started.elapsed().as_secs_f64()
        );
        info!(
            analysis_id = %analysis_id,
            company_id = %report.company.id,
            score = report.score,
            overall_level = %report.overall_level,
            valid_patterns = report.valid_patterns,
            unevaluated = report.unevaluated_patterns.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Completed company risk analysis"
        );

        Ok(report)
    }

    /// Run one named pattern for drill-down views.
    pub async fn run_single_pattern(
        &self,
        company_id: &str,
        pattern_name: &str,
    ) -> Result<Finding, RiskError> {
        let pattern: PatternType = pattern_name.parse()?;
        let (company, notes) = self.resolve_company(company_id).await?;
        let as_of = Utc::now().date_naive();
        let ctx = self.context(&company, as_of);

        let (_, finding) = self.run_isolated(pattern, &ctx).await;
        Ok(finding.with_notes(notes))
    }

    async fn resolve_company(&self, company_id: &str) -> Result<(Company, Vec<String>), RiskError> {
        let company_id = company_id.trim();
        if company_id.is_empty() {
            return Err(RiskError::InvalidInput {
                message: "company id must not be empty".to_string(),
            });
        }

        match self.graph.get_company(company_id).await {
            Ok(Some(company)) => Ok((company, Vec::new())),
            Ok(None) => {
                warn!(company_id = %company_id, "Company not found");
                Err(RiskError::CompanyNotFound {
                    company_id: company_id.to_string(),
                })
            }
            Err(e) => {
                // Existence cannot be confirmed; carry on and let detectors report.
                warn!(
                    company_id = %company_id,
                    store = self.graph.backend_name(),
                    error = %e,
                    "Company lookup failed, continuing with id only"
                );
                Ok((
                    Company::new(company_id, company_id),
                    vec![format!("company details unavailable: {}", e)],
                ))
            }
        }
    }

    fn context<'a>(&'a self, company: &'a Company, as_of: NaiveDate) -> DetectionContext<'a> {
        DetectionContext {
            company,
            as_of,
            graph: self.graph.as_ref(),
            health: self.health.as_ref(),
            high_risk_names: self.high_risk_names.as_deref(),
            params: &self.config.params,
        }
    }

    /// Resolves with the reason once the caller cancels or the deadline passes.
    async fn interrupted(
        &self,
        cancel: &CancellationToken,
        deadline_at: Option<tokio::time::Instant>,
    ) -> String {
        let deadline = async {
            match deadline_at {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => "analysis cancelled by caller".to_string(),
            _ = deadline => format!(
                "analysis deadline of {}ms reached",
                self.config.analysis_deadline.unwrap_or_default().as_millis()
            ),
        }
    }

    async fn run_detectors(
        &self,
        company: &Company,
        as_of: NaiveDate,
        patterns: &[PatternType],
        cancel: &CancellationToken,
        deadline_at: Option<tokio::time::Instant>,
    ) -> (BTreeMap<PatternType, Finding>, Option<String>) {
        let ctx = self.context(company, as_of);
        let mut findings: BTreeMap<PatternType, Finding> = BTreeMap::new();
        let mut interruption = None;

        {
            let mut results = stream::iter(patterns.iter().copied())
                .map(|pattern| self.run_isolated(pattern, &ctx))
                .buffer_unordered(self.config.max_concurrent_detectors.max(1));

            let collect = async {
                while let Some((pattern, finding)) = results.next().await {
                    findings.insert(pattern, finding);
                }
            };
            tokio::select! {
                biased;
                reason = self.interrupted(cancel, deadline_at) => interruption = Some(reason),
                _ = collect => {}
            }
        }

        let mut missing = 0usize;
        for pattern in patterns {
            findings.entry(*pattern).or_insert_with(|| {
                missing += 1;
                Finding::unavailable(
                    *pattern,
                    &RiskError::Cancelled {
                        pattern: pattern.as_str().to_string(),
                    },
                )
            });
        }
        if let Some(reason) = &interruption {
            warn!(
                company_id = %company.id,
                reason = %reason,
                completed = patterns.len() - missing,
                dropped = missing,
                "Analysis interrupted, returning partial report"
            );
        }

        (findings, interruption)
    }

    /// Run one detector under its own timeout, converting any failure into an
    /// unknown finding.
    async fn run_isolated(
        &self,
        pattern: PatternType,
        ctx: &DetectionContext<'_>,
    ) -> (PatternType, Finding) {
        let Some(detector) = self.detectors.get(&pattern) else {
            let err = RiskError::InvalidPatternName {
                name: pattern.as_str().to_string(),
            };
            return (pattern, Finding::unavailable(pattern, &err));
        };

        let started = Instant::now();
        let result = with_timeout(
            detector.detect(ctx),
            self.config.detector_timeout,
            pattern.as_str(),
        )
        .await;

        increment_counter!("risk_detector_runs_total", "pattern" => pattern.as_str());
        histogram!(
            "risk_detector_duration_seconds",
            started.elapsed().as_secs_f64(),
            "pattern" => pattern.as_str()
        );

        let finding = match result {
            Ok(mut finding) => {
                finding.pattern = pattern;
                finding
            }
            Err(RiskError::DataInsufficient { reason, .. }) => {
                debug!(pattern = %pattern, reason = %reason, "Insufficient data for pattern");
                Finding::new(pattern, RiskLevel::Low, FindingDetail::Unavailable)
                    .with_notes(vec![reason])
            }
            Err(e) => {
                warn!(
                    company_id = %ctx.company_id(),
                    pattern = %pattern,
                    error = %e,
                    "Pattern detector failed"
                );
                increment_counter!(
                    "risk_detector_failures_total",
                    "pattern" => pattern.as_str(),
                    "kind" => e.kind()
                );
                Finding::unavailable(pattern, &e)
            }
        };

        (pattern, finding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Company;
    use crate::store::{InMemoryGraphStore, InMemoryHealthProvider};
    use async_trait::async_trait;

    struct SlowDetector {
        pattern: PatternType,
        delay: Duration,
    }

    #[async_trait]
    impl PatternDetector for SlowDetector {
        fn pattern(&self) -> PatternType {
            self.pattern
        }

        async fn detect(&self, _ctx: &DetectionContext<'_>) -> Result<Finding, RiskError> {
            tokio::time::sleep(self.delay).await;
            Err(RiskError::DataInsufficient {
                pattern: self.pattern.as_str().to_string(),
                reason: "nothing to see".to_string(),
            })
        }

        fn risk_factors(&self) -> Vec<&'static str> {
            vec![]
        }
    }

    fn engine() -> RiskAnalysisEngine {
        let mut graph = InMemoryGraphStore::new();
        graph.add_company(Company::new("A", "Alpha"));
        RiskAnalysisEngine::new(Arc::new(graph), Arc::new(InMemoryHealthProvider::new()))
    }

    #[tokio::test]
    async fn test_unknown_company_is_fatal() {
        let err = engine()
            .analyze_company_risk("missing", &AnalysisOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RiskError::CompanyNotFound {
                company_id: "missing".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_blank_company_id_is_invalid() {
        let err = engine()
            .analyze_company_risk("  ", &AnalysisOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RiskError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_include_patterns_limits_findings() {
        let opts = AnalysisOptions::for_pattern_names(&["officer_movement", "excessive_issuance"]).unwrap();
        let report = engine().analyze_company_risk("A", &opts).await.unwrap();
        let patterns: Vec<PatternType> = report.findings.iter().map(|f| f.pattern).collect();
        assert_eq!(
            patterns,
            vec![PatternType::ExcessiveIssuance, PatternType::OfficerMovement]
        );
    }

    #[tokio::test]
    async fn test_data_insufficient_yields_low_empty_finding() {
        let engine = engine().with_detector(Arc::new(SlowDetector {
            pattern: PatternType::CircularInvestment,
            delay: Duration::from_millis(1),
        }));
        let finding = engine
            .run_single_pattern("A", "circular_investment")
            .await
            .unwrap();
        assert_eq!(finding.risk_level, RiskLevel::Low);
        assert!(finding.is_empty());
        assert_eq!(finding.notes, vec!["nothing to see".to_string()]);
    }

    #[tokio::test]
    async fn test_detector_timeout_is_isolated() {
        let config = EngineConfig {
            detector_timeout: Duration::from_millis(20),
            ..EngineConfig::default()
        };
        let engine = engine().with_config(config).with_detector(Arc::new(SlowDetector {
            pattern: PatternType::AffiliateChainRisk,
            delay: Duration::from_secs(5),
        }));

        let report = engine
            .analyze_company_risk("A", &AnalysisOptions::default())
            .await
            .unwrap();
        assert_eq!(report.unevaluated_patterns, vec![PatternType::AffiliateChainRisk]);
        let finding = report.finding(PatternType::AffiliateChainRisk).unwrap();
        assert!(finding.error.as_deref().unwrap().contains("timed out"));
        assert_eq!(report.evaluated_patterns, 7);
    }

    #[tokio::test]
    async fn test_cancelled_token_reports_every_pattern_unknown() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = engine()
            .analyze_company_risk_until("A", &AnalysisOptions::default(), &cancel)
            .await
            .unwrap();
        assert_eq!(report.unevaluated_patterns.len(), 8);
        assert_eq!(report.score, 0.0);
        assert_eq!(report.notes, vec!["analysis cancelled by caller".to_string()]);
    }

    fn engine_with_slow_lookup(delay: Duration) -> RiskAnalysisEngine {
        let mut graph = InMemoryGraphStore::new();
        graph.add_company(Company::new("A", "Alpha"));
        graph.delay_operation("get_company", delay);
        RiskAnalysisEngine::new(Arc::new(graph), Arc::new(InMemoryHealthProvider::new()))
    }

    #[tokio::test]
    async fn test_cancel_interrupts_hung_company_lookup() {
        let engine = engine_with_slow_lookup(Duration::from_secs(5));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let report = tokio::time::timeout(
            Duration::from_secs(1),
            engine.analyze_company_risk_until("A", &AnalysisOptions::default(), &cancel),
        )
        .await
        .expect("analysis should return promptly after cancel")
        .unwrap();

        assert_eq!(report.company.id, "A");
        assert_eq!(report.unevaluated_patterns.len(), 8);
        assert_eq!(report.score, 0.0);
        assert_eq!(
            report.notes,
            vec![
                "company details unavailable: lookup interrupted".to_string(),
                "analysis cancelled by caller".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_deadline_bounds_company_lookup() {
        let engine = engine_with_slow_lookup(Duration::from_secs(5)).with_config(EngineConfig {
            analysis_deadline: Some(Duration::from_millis(50)),
            ..EngineConfig::default()
        });

        let report = tokio::time::timeout(
            Duration::from_secs(1),
            engine.analyze_company_risk("A", &AnalysisOptions::default()),
        )
        .await
        .expect("analysis should return promptly at the deadline")
        .unwrap();

        assert_eq!(report.unevaluated_patterns.len(), 8);
        assert!(report.notes.iter().any(|n| n.contains("deadline of 50ms")));
    }

    #[test]
    fn test_supported_patterns_catalog() {
        let catalog = engine().list_supported_patterns();
        assert_eq!(catalog.len(), 8);
        assert!(catalog.iter().all(|p| !p.description.is_empty()));
    }
}
