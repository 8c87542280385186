#![allow(dead_code)]

use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use corporate_risk_monitor::models::{
    Bond, Company, FinancialMetrics, HealthSnapshot, Officer, OfficerPosition, Subscriber,
};
use corporate_risk_monitor::risk::{AnalysisOptions, EngineConfig, RiskAnalysisEngine};
use corporate_risk_monitor::store::{InMemoryGraphStore, InMemoryHealthProvider, StaticHighRiskNames};

pub fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn won(amount: i64) -> BigDecimal {
    BigDecimal::from(amount)
}

pub fn options() -> AnalysisOptions {
    AnalysisOptions::default().with_as_of(as_of())
}

/// Builder over the in-memory stores for end-to-end engine tests.
#[derive(Default)]
pub struct CorporateGraph {
    pub graph: InMemoryGraphStore,
    pub health: InMemoryHealthProvider,
    high_risk_names: Vec<String>,
}

impl CorporateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn company(&mut self, id: &str, name: &str) -> &mut Self {
        self.graph.add_company(Company::new(id, name));
        self
    }

    /// Add a fully described company.
    pub fn listed(&mut self, company: Company) -> &mut Self {
        self.graph.add_company(company);
        self
    }

    pub fn investment(&mut self, source: &str, target: &str, amount: i64) -> &mut Self {
        self.graph.add_investment(source, target, 1, won(amount));
        self
    }

    pub fn affiliate(&mut self, company: &str, affiliate: &str) -> &mut Self {
        self.graph.add_affiliate(company, affiliate);
        self
    }

    pub fn officer(&mut self, officer_id: &str, companies: &[&str]) -> &mut Self {
        self.graph.add_officer(Officer::new(officer_id, officer_id));
        for company in companies {
            self.graph
                .add_position(OfficerPosition::current(officer_id, *company, "사외이사"));
        }
        self
    }

    pub fn career(&mut self, officer_id: &str, text: &str) -> &mut Self {
        self.graph.add_career_entry(officer_id, text);
        self
    }

    pub fn bond(&mut self, id: &str, company: &str, issue_date: NaiveDate, amount: i64) -> &mut Self {
        self.graph.add_bond(Bond {
            id: id.to_string(),
            company_id: company.to_string(),
            issue_date,
            total_amount: won(amount),
            bond_type: "CB".to_string(),
        });
        self
    }

    pub fn subscriber(&mut self, bond_id: &str, name: &str, amount: i64) -> &mut Self {
        self.graph.add_subscriber(Subscriber {
            bond_id: bond_id.to_string(),
            name: name.to_string(),
            subscriber_type: Some("fund".to_string()),
            subscription_amount: won(amount),
            is_related_party: false,
        });
        self
    }

    pub fn health_score(&mut self, company: &str, score: f64) -> &mut Self {
        self.health.add_snapshot(HealthSnapshot::new(company, score));
        self
    }

    pub fn financials(&mut self, company: &str, debt_to_equity: f64, net_income: i64) -> &mut Self {
        self.health.add_financials(FinancialMetrics {
            company_id: company.to_string(),
            debt_to_equity: Some(debt_to_equity),
            operating_income: Some(won(net_income)),
            net_income: Some(won(net_income)),
        });
        self
    }

    pub fn high_risk(&mut self, names: &[&str]) -> &mut Self {
        self.high_risk_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn engine(&self) -> RiskAnalysisEngine {
        self.engine_with(EngineConfig::default())
    }

    pub fn engine_with(&self, config: EngineConfig) -> RiskAnalysisEngine {
        RiskAnalysisEngine::new(Arc::new(self.graph.clone()), Arc::new(self.health.clone()))
            .with_config(config)
            .with_high_risk_names(Arc::new(StaticHighRiskNames::new(
                self.high_risk_names.clone(),
            )))
    }
}

/// Company X with a 3-node investment cycle, four recent bonds held by a
/// single fund and a weak health score.
pub fn troubled_company() -> CorporateGraph {
    let mut g = CorporateGraph::new();
    g.listed(
        Company::new("X", "엑스전자")
            .with_market("KOSDAQ")
            .with_sector("전자부품"),
    )
    .company("Y", "와이홀딩스")
        .company("Z", "제트투자")
        .investment("X", "Y", 400_000_000)
        .investment("Y", "Z", 400_000_000)
        .investment("Z", "X", 400_000_000)
        .health_score("X", 40.0);

    for (i, issued) in [date(2024, 1, 15), date(2024, 3, 1), date(2024, 4, 20), date(2024, 6, 1)]
        .into_iter()
        .enumerate()
    {
        let bond_id = format!("X-CB{}", i + 1);
        g.bond(&bond_id, "X", issued, 500_000_000)
            .subscriber(&bond_id, "원펀드", 500_000_000);
    }
    g
}
