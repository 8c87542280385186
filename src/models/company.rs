use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A listed or unlisted corporate entity in the relationship graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub sector: Option<String>,
    pub market: Option<String>,
    pub listing_status: Option<String>,
    pub trading_status: Option<String>,
}

impl Company {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sector: None,
            market: None,
            listing_status: None,
            trading_status: None,
        }
    }

    pub fn with_market(mut self, market: impl Into<String>) -> Self {
        self.market = Some(market.into());
        self
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }
}

/// Parent/affiliate relationship. Stored once, read symmetrically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AffiliateEdge {
    pub company_id: String,
    pub affiliate_id: String,
    pub relationship: String,
}

impl AffiliateEdge {
    /// The company on the other side of the edge, if `company_id` is one end of it.
    pub fn other_side(&self, company_id: &str) -> Option<&str> {
        if self.company_id == company_id {
            Some(&self.affiliate_id)
        } else if self.affiliate_id == company_id {
            Some(&self.company_id)
        } else {
            None
        }
    }
}
