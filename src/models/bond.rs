use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Convertible-bond-like issuance owned by exactly one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Bond {
    pub id: String,
    pub company_id: String,
    pub issue_date: NaiveDate,
    pub total_amount: BigDecimal,
    pub bond_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Subscriber {
    pub bond_id: String,
    pub name: String,
    pub subscriber_type: Option<String>,
    pub subscription_amount: BigDecimal,
    pub is_related_party: bool,
}

/// How much of a company's bond issuance a single investor took part in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriberConcentration {
    pub subscriber_name: String,
    pub subscriber_type: Option<String>,
    pub is_related_party: bool,
    /// Distinct bonds of the company this investor subscribed to.
    pub investment_count: i64,
    pub total_amount: BigDecimal,
    pub concentration_ratio: f64,
}

/// Fraction of a company's distinct bonds funded by one investor.
pub fn concentration_ratio(investment_count: i64, total_bond_count: i64) -> f64 {
    if total_bond_count <= 0 {
        return 0.0;
    }
    investment_count as f64 / total_bond_count as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concentration_ratio() {
        assert_eq!(concentration_ratio(2, 4), 0.5);
        assert_eq!(concentration_ratio(3, 0), 0.0);
        assert_eq!(concentration_ratio(0, 5), 0.0);
    }
}
