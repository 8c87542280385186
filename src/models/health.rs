use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Financial-health score (0-100) and tags supplied by the external grading engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct HealthSnapshot {
    pub company_id: String,
    pub score: f64,
    pub warnings: Vec<String>,
    pub strengths: Vec<String>,
}

impl HealthSnapshot {
    pub fn new(company_id: impl Into<String>, score: f64) -> Self {
        Self {
            company_id: company_id.into(),
            score: score.clamp(0.0, 100.0),
            warnings: Vec::new(),
            strengths: Vec::new(),
        }
    }
}

/// Latest-period financial statement figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FinancialMetrics {
    pub company_id: String,
    pub debt_to_equity: Option<f64>,
    pub operating_income: Option<BigDecimal>,
    pub net_income: Option<BigDecimal>,
}
