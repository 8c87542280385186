use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Officer {
    pub id: String,
    pub name: String,
    /// Birth year/month as disclosed (e.g. "1965.03"); disambiguates same-named officers.
    pub birth_period: Option<String>,
    pub influence_score: f64,
}

impl Officer {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            birth_period: None,
            influence_score: 0.0,
        }
    }

    pub fn with_influence(mut self, influence_score: f64) -> Self {
        self.influence_score = influence_score;
        self
    }
}

/// Officer -> Company edge. Officers commonly hold several at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OfficerPosition {
    pub officer_id: String,
    pub company_id: String,
    pub position: String,
    pub is_current: bool,
    pub term_start: Option<NaiveDate>,
    pub term_end: Option<NaiveDate>,
}

impl OfficerPosition {
    pub fn current(
        officer_id: impl Into<String>,
        company_id: impl Into<String>,
        position: impl Into<String>,
    ) -> Self {
        Self {
            officer_id: officer_id.into(),
            company_id: company_id.into(),
            position: position.into(),
            is_current: true,
            term_start: None,
            term_end: None,
        }
    }
}

/// One free-text career fragment as disclosed, e.g. "(전) 한빛전자 대표이사".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CareerEntry {
    pub officer_id: String,
    pub text: String,
}
