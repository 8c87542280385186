use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Synthesised edge: subscribers tied to `source` funded bonds issued by `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct InvestmentEdge {
    pub source_id: String,
    pub source_name: String,
    pub target_id: String,
    pub target_name: String,
    pub investment_count: i64,
    pub total_amount: BigDecimal,
}

/// A directed investment path that leaves a company and comes back to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    /// Starts and ends with the origin company.
    pub company_ids: Vec<String>,
    pub company_names: Vec<String>,
    pub total_amount: BigDecimal,
    /// Number of edges in the cycle.
    pub length: usize,
}

/// Investors into a company that are tied to it by affiliation or shared officers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelatedInvestments {
    pub affiliate_investments: Vec<InvestmentEdge>,
    pub officer_linked_investments: Vec<InvestmentEdge>,
}
