// In-memory store backends, used as fixtures and for offline analysis
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use num_traits::Zero;

use crate::models::{
    concentration_ratio, AffiliateEdge, Bond, CareerEntry, Company, Cycle, FinancialMetrics,
    HealthSnapshot, InvestmentEdge, Officer, OfficerPosition, RelatedInvestments, Subscriber,
    SubscriberConcentration,
};
use crate::risk::RiskError;
use crate::store::{GraphStore, HealthMetricsProvider, InvestmentGraph};

/// Fault injection shared by the in-memory backends.
#[derive(Debug, Clone, Default)]
struct FaultPlan {
    failing: BTreeSet<&'static str>,
    delays: BTreeMap<&'static str, Duration>,
}

impl FaultPlan {
    async fn guard(&self, store: &str, operation: &'static str) -> Result<(), RiskError> {
        if let Some(delay) = self.delays.get(operation) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(operation) {
            return Err(RiskError::store(
                store,
                format!("{} unavailable (injected)", operation),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryGraphStore {
    companies: BTreeMap<String, Company>,
    officers: BTreeMap<String, Officer>,
    positions: Vec<OfficerPosition>,
    careers: Vec<CareerEntry>,
    bonds: Vec<Bond>,
    subscribers: Vec<Subscriber>,
    investments: Vec<InvestmentEdge>,
    affiliates: Vec<AffiliateEdge>,
    faults: FaultPlan,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_company(&mut self, company: Company) -> &mut Self {
        self.companies.insert(company.id.clone(), company);
        self
    }

    pub fn add_officer(&mut self, officer: Officer) -> &mut Self {
        self.officers.insert(officer.id.clone(), officer);
        self
    }

    pub fn add_position(&mut self, position: OfficerPosition) -> &mut Self {
        self.positions.push(position);
        self
    }

    pub fn add_career_entry(&mut self, officer_id: &str, text: &str) -> &mut Self {
        self.careers.push(CareerEntry {
            officer_id: officer_id.to_string(),
            text: text.to_string(),
        });
        self
    }

    pub fn add_bond(&mut self, bond: Bond) -> &mut Self {
        self.bonds.push(bond);
        self
    }

    pub fn add_subscriber(&mut self, subscriber: Subscriber) -> &mut Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Adds a synthesised investment edge, `source` funding bonds of `target`.
    pub fn add_investment(
        &mut self,
        source_id: &str,
        target_id: &str,
        investment_count: i64,
        total_amount: BigDecimal,
    ) -> &mut Self {
        let name_of = |id: &str| {
            self.companies
                .get(id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| id.to_string())
        };
        let edge = InvestmentEdge {
            source_id: source_id.to_string(),
            source_name: name_of(source_id),
            target_id: target_id.to_string(),
            target_name: name_of(target_id),
            investment_count,
            total_amount,
        };
        self.investments.push(edge);
        self
    }

    pub fn add_affiliate(&mut self, company_id: &str, affiliate_id: &str) -> &mut Self {
        self.affiliates.push(AffiliateEdge {
            company_id: company_id.to_string(),
            affiliate_id: affiliate_id.to_string(),
            relationship: "affiliate".to_string(),
        });
        self
    }

    /// Makes `operation` fail with `StoreUnavailable`.
    pub fn fail_operation(&mut self, operation: &'static str) -> &mut Self {
        self.faults.failing.insert(operation);
        self
    }

    /// Makes `operation` sleep before answering.
    pub fn delay_operation(&mut self, operation: &'static str, delay: Duration) -> &mut Self {
        self.faults.delays.insert(operation, delay);
        self
    }

    fn current_company_ids(&self, officer_id: &str) -> BTreeSet<&str> {
        self.positions
            .iter()
            .filter(|p| p.is_current && p.officer_id == officer_id)
            .map(|p| p.company_id.as_str())
            .collect()
    }

    fn current_officer_ids(&self, company_id: &str) -> BTreeSet<&str> {
        self.positions
            .iter()
            .filter(|p| p.is_current && p.company_id == company_id)
            .map(|p| p.officer_id.as_str())
            .collect()
    }

    fn affiliate_ids(&self, company_id: &str) -> BTreeSet<String> {
        self.affiliates
            .iter()
            .filter_map(|edge| edge.other_side(company_id))
            .filter(|id| *id != company_id)
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_company(&self, company_id: &str) -> Result<Option<Company>, RiskError> {
        self.faults.guard(self.backend_name(), "get_company").await?;
        Ok(self.companies.get(company_id).cloned())
    }

    async fn find_investment_cycles(
        &self,
        company_id: &str,
        max_depth: usize,
    ) -> Result<Vec<Cycle>, RiskError> {
        self.faults
            .guard(self.backend_name(), "find_investment_cycles")
            .await?;
        let graph = InvestmentGraph::from_edges(self.investments.iter().cloned());
        Ok(graph.cycles_through(company_id, max_depth))
    }

    async fn list_bonds_issued_since(
        &self,
        company_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<Bond>, RiskError> {
        self.faults
            .guard(self.backend_name(), "list_bonds_issued_since")
            .await?;
        let mut bonds: Vec<Bond> = self
            .bonds
            .iter()
            .filter(|b| b.company_id == company_id && b.issue_date >= since)
            .cloned()
            .collect();
        bonds.sort_by(|a, b| a.issue_date.cmp(&b.issue_date).then_with(|| a.id.cmp(&b.id)));
        Ok(bonds)
    }

    async fn list_current_officers(&self, company_id: &str) -> Result<Vec<Officer>, RiskError> {
        self.faults
            .guard(self.backend_name(), "list_current_officers")
            .await?;
        Ok(self
            .current_officer_ids(company_id)
            .into_iter()
            .filter_map(|id| self.officers.get(id).cloned())
            .collect())
    }

    async fn count_other_current_companies(
        &self,
        company_id: &str,
        officer_ids: &[String],
    ) -> Result<BTreeMap<String, usize>, RiskError> {
        self.faults
            .guard(self.backend_name(), "count_other_current_companies")
            .await?;
        Ok(officer_ids
            .iter()
            .map(|officer_id| {
                let others = self
                    .current_company_ids(officer_id)
                    .into_iter()
                    .filter(|id| *id != company_id)
                    .count();
                (officer_id.clone(), others)
            })
            .collect())
    }

    async fn list_affiliate_company_ids(&self, company_id: &str) -> Result<Vec<String>, RiskError> {
        self.faults
            .guard(self.backend_name(), "list_affiliate_company_ids")
            .await?;
        Ok(self.affiliate_ids(company_id).into_iter().collect())
    }

    async fn find_related_investments(
        &self,
        company_id: &str,
    ) -> Result<RelatedInvestments, RiskError> {
        self.faults
            .guard(self.backend_name(), "find_related_investments")
            .await?;

        let affiliates = self.affiliate_ids(company_id);
        let officer_linked: BTreeSet<&str> = self
            .current_officer_ids(company_id)
            .into_iter()
            .flat_map(|officer_id| self.current_company_ids(officer_id))
            .filter(|id| *id != company_id)
            .collect();

        let inbound = || {
            self.investments
                .iter()
                .filter(move |edge| edge.target_id == company_id && edge.source_id != company_id)
        };

        Ok(RelatedInvestments {
            affiliate_investments: inbound()
                .filter(|edge| affiliates.contains(&edge.source_id))
                .filter(|edge| !edge.total_amount.is_zero())
                .cloned()
                .collect(),
            officer_linked_investments: inbound()
                .filter(|edge| officer_linked.contains(edge.source_id.as_str()))
                .cloned()
                .collect(),
        })
    }

    async fn list_officer_career_history(
        &self,
        officer_id: &str,
    ) -> Result<Vec<CareerEntry>, RiskError> {
        self.faults
            .guard(self.backend_name(), "list_officer_career_history")
            .await?;
        Ok(self
            .careers
            .iter()
            .filter(|entry| entry.officer_id == officer_id)
            .cloned()
            .collect())
    }

    async fn list_subscriber_concentration(
        &self,
        company_id: &str,
    ) -> Result<Vec<SubscriberConcentration>, RiskError> {
        self.faults
            .guard(self.backend_name(), "list_subscriber_concentration")
            .await?;

        let company_bonds: BTreeSet<&str> = self
            .bonds
            .iter()
            .filter(|b| b.company_id == company_id)
            .map(|b| b.id.as_str())
            .collect();
        let total_bonds = company_bonds.len() as i64;

        let mut by_name: BTreeMap<&str, (BTreeSet<&str>, BigDecimal, bool, Option<String>)> =
            BTreeMap::new();
        for subscriber in self
            .subscribers
            .iter()
            .filter(|s| company_bonds.contains(s.bond_id.as_str()))
        {
            let entry = by_name.entry(subscriber.name.as_str()).or_insert_with(|| {
                (
                    BTreeSet::new(),
                    BigDecimal::zero(),
                    false,
                    subscriber.subscriber_type.clone(),
                )
            });
            entry.0.insert(subscriber.bond_id.as_str());
            entry.1 += &subscriber.subscription_amount;
            entry.2 |= subscriber.is_related_party;
        }

        Ok(by_name
            .into_iter()
            .map(|(name, (bonds, total_amount, is_related_party, subscriber_type))| {
                let investment_count = bonds.len() as i64;
                SubscriberConcentration {
                    subscriber_name: name.to_string(),
                    subscriber_type,
                    is_related_party,
                    investment_count,
                    total_amount,
                    concentration_ratio: concentration_ratio(investment_count, total_bonds),
                }
            })
            .collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryHealthProvider {
    snapshots: BTreeMap<String, HealthSnapshot>,
    financials: BTreeMap<String, FinancialMetrics>,
    faults: FaultPlan,
}

impl InMemoryHealthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_snapshot(&mut self, snapshot: HealthSnapshot) -> &mut Self {
        self.snapshots.insert(snapshot.company_id.clone(), snapshot);
        self
    }

    pub fn add_financials(&mut self, metrics: FinancialMetrics) -> &mut Self {
        self.financials.insert(metrics.company_id.clone(), metrics);
        self
    }

    pub fn fail_operation(&mut self, operation: &'static str) -> &mut Self {
        self.faults.failing.insert(operation);
        self
    }

    pub fn delay_operation(&mut self, operation: &'static str, delay: Duration) -> &mut Self {
        self.faults.delays.insert(operation, delay);
        self
    }
}

#[async_trait]
impl HealthMetricsProvider for InMemoryHealthProvider {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_health_snapshot(
        &self,
        company_id: &str,
    ) -> Result<Option<HealthSnapshot>, RiskError> {
        self.faults
            .guard(self.backend_name(), "get_health_snapshot")
            .await?;
        Ok(self.snapshots.get(company_id).cloned())
    }

    async fn get_financial_metrics(
        &self,
        company_id: &str,
    ) -> Result<Option<FinancialMetrics>, RiskError> {
        self.faults
            .guard(self.backend_name(), "get_financial_metrics")
            .await?;
        Ok(self.financials.get(company_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bond(id: &str, company_id: &str) -> Bond {
        Bond {
            id: id.to_string(),
            company_id: company_id.to_string(),
            issue_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            total_amount: BigDecimal::from(100),
            bond_type: "CB".to_string(),
        }
    }

    fn subscriber(bond_id: &str, name: &str, amount: i64) -> Subscriber {
        Subscriber {
            bond_id: bond_id.to_string(),
            name: name.to_string(),
            subscriber_type: Some("fund".to_string()),
            subscription_amount: BigDecimal::from(amount),
            is_related_party: false,
        }
    }

    #[tokio::test]
    async fn test_counts_other_current_companies() {
        let mut store = InMemoryGraphStore::new();
        store
            .add_officer(Officer::new("o1", "Kim"))
            .add_position(OfficerPosition::current("o1", "A", "director"))
            .add_position(OfficerPosition::current("o1", "B", "director"))
            .add_position(OfficerPosition::current("o1", "C", "auditor"))
            .add_position(OfficerPosition {
                is_current: false,
                ..OfficerPosition::current("o1", "D", "director")
            });

        let counts = store
            .count_other_current_companies("A", &["o1".to_string()])
            .await
            .unwrap();
        assert_eq!(counts.get("o1"), Some(&2));
    }

    #[tokio::test]
    async fn test_subscriber_concentration_uses_distinct_bonds() {
        let mut store = InMemoryGraphStore::new();
        store
            .add_bond(bond("b1", "A"))
            .add_bond(bond("b2", "A"))
            .add_bond(bond("b3", "A"))
            .add_bond(bond("b4", "A"))
            .add_subscriber(subscriber("b1", "Fund X", 10))
            .add_subscriber(subscriber("b1", "Fund X", 5))
            .add_subscriber(subscriber("b2", "Fund X", 10))
            .add_subscriber(subscriber("b3", "Fund Y", 7));

        let rows = store.list_subscriber_concentration("A").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].subscriber_name, "Fund X");
        assert_eq!(rows[0].investment_count, 2);
        assert_eq!(rows[0].total_amount, BigDecimal::from(25));
        assert_eq!(rows[0].concentration_ratio, 0.5);
        assert_eq!(rows[1].concentration_ratio, 0.25);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let mut store = InMemoryGraphStore::new();
        store.fail_operation("list_current_officers");

        let err = store.list_current_officers("A").await.unwrap_err();
        assert!(matches!(err, RiskError::StoreUnavailable { .. }));
        assert!(store.list_affiliate_company_ids("A").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_affiliates_are_symmetric() {
        let mut store = InMemoryGraphStore::new();
        store.add_affiliate("A", "B").add_affiliate("C", "A");

        let ids = store.list_affiliate_company_ids("A").await.unwrap();
        assert_eq!(ids, vec!["B".to_string(), "C".to_string()]);
    }
}
