// Findings produced by the pattern detectors and their shared vocabulary
use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::models::SubscriberConcentration;
use crate::risk::RiskError;

/// Ordinal risk level attached to every finding.
///
/// Variant order gives the severity ordering; `Unknown` sorts lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Severity weight used by the composite score.
    ///
    /// `Critical` shares the weight of `High`; the two differ only in the
    /// displayed label.
    pub fn weight(self) -> u32 {
        match self {
            RiskLevel::Unknown => 0,
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High | RiskLevel::Critical => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Unknown => "unknown",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unknown" => Ok(RiskLevel::Unknown),
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(RiskError::InvalidInput {
                message: format!("unknown risk level '{}'", other),
            }),
        }
    }
}

/// The eight detectable risk patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    CircularInvestment,
    ExcessiveIssuance,
    OfficerConcentration,
    FinancialDistressWithCb,
    RelatedPartyTransactions,
    OfficerMovement,
    CbInvestorConcentration,
    AffiliateChainRisk,
}

impl PatternType {
    pub const ALL: [PatternType; 8] = [
        PatternType::CircularInvestment,
        PatternType::ExcessiveIssuance,
        PatternType::OfficerConcentration,
        PatternType::FinancialDistressWithCb,
        PatternType::RelatedPartyTransactions,
        PatternType::OfficerMovement,
        PatternType::CbInvestorConcentration,
        PatternType::AffiliateChainRisk,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PatternType::CircularInvestment => "circular_investment",
            PatternType::ExcessiveIssuance => "excessive_issuance",
            PatternType::OfficerConcentration => "officer_concentration",
            PatternType::FinancialDistressWithCb => "financial_distress_with_cb",
            PatternType::RelatedPartyTransactions => "related_party_transactions",
            PatternType::OfficerMovement => "officer_movement",
            PatternType::CbInvestorConcentration => "cb_investor_concentration",
            PatternType::AffiliateChainRisk => "affiliate_chain_risk",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            PatternType::CircularInvestment => "Circular investment",
            PatternType::ExcessiveIssuance => "Excessive CB issuance",
            PatternType::OfficerConcentration => "Officer concentration",
            PatternType::FinancialDistressWithCb => "Financial distress with CB issuance",
            PatternType::RelatedPartyTransactions => "Related-party transactions",
            PatternType::OfficerMovement => "Officer movement from high-risk companies",
            PatternType::CbInvestorConcentration => "CB investor concentration",
            PatternType::AffiliateChainRisk => "Affiliate chain risk",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            PatternType::CircularInvestment => {
                "Directed investment cycles that route capital back to the company"
            }
            PatternType::ExcessiveIssuance => {
                "Frequent or large convertible bond issuance in the trailing window"
            }
            PatternType::OfficerConcentration => {
                "Current officers who concurrently serve at many other companies"
            }
            PatternType::FinancialDistressWithCb => {
                "Weak financial health combined with recent convertible bond issuance"
            }
            PatternType::RelatedPartyTransactions => {
                "Affiliates or officer-linked companies investing in the company's bonds"
            }
            PatternType::OfficerMovement => {
                "Officers whose careers include companies flagged as high risk"
            }
            PatternType::CbInvestorConcentration => {
                "Single investors funding a large share of the company's bonds"
            }
            PatternType::AffiliateChainRisk => {
                "Share of affiliates showing signs of financial distress"
            }
        }
    }

    /// Static catalog of every supported pattern.
    pub fn catalog() -> Vec<PatternInfo> {
        Self::ALL.iter().map(|p| PatternInfo::from(*p)).collect()
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatternType {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| RiskError::InvalidPatternName {
                name: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternInfo {
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    pub name: String,
    pub description: String,
}

impl From<PatternType> for PatternInfo {
    fn from(pattern: PatternType) -> Self {
        Self {
            pattern_type: pattern,
            name: pattern.display_name().to_string(),
            description: pattern.description().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleFinding {
    pub company_ids: Vec<String>,
    pub company_names: Vec<String>,
    pub total_amount: BigDecimal,
    pub length: usize,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircularInvestmentDetail {
    pub max_depth: usize,
    pub cycles: Vec<CycleFinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuanceDetail {
    pub window_months: u32,
    pub bond_count: usize,
    pub total_amount: BigDecimal,
    /// `window_months * 30 / bond_count`, absent when nothing was issued.
    pub average_interval_days: Option<f64>,
    pub bond_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentratedOfficer {
    pub officer_id: String,
    pub name: String,
    pub influence_score: f64,
    pub other_company_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficerConcentrationDetail {
    pub current_officer_count: usize,
    pub officers: Vec<ConcentratedOfficer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistressDetail {
    pub health_score: Option<f64>,
    pub health_warnings: Vec<String>,
    pub window_months: u32,
    pub recent_bond_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedInvestor {
    pub company_id: String,
    pub company_name: String,
    pub investment_count: i64,
    pub total_amount: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedPartyDetail {
    pub affiliate_investors: Vec<RelatedInvestor>,
    pub officer_linked_investors: Vec<RelatedInvestor>,
    /// Distinct companies across both lists.
    pub total_related_count: usize,
    /// Affiliates the company has on record.
    #[serde(default)]
    pub affiliate_count: usize,
    /// Current officers whose other posts could link an investor.
    #[serde(default)]
    pub current_officer_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchConfidence {
    Exact,
    Partial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerMatch {
    pub career_text: String,
    pub extracted_name: String,
    pub matched_company: String,
    pub confidence: MatchConfidence,
    /// Always true: matches come from free-text parsing.
    pub heuristic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficerCareerRisk {
    pub officer_id: String,
    pub name: String,
    pub career_entry_count: usize,
    pub matches: Vec<CareerMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficerMovementDetail {
    pub current_officer_count: usize,
    /// Officers with enough career history to be evaluated.
    pub officers: Vec<OfficerCareerRisk>,
    pub total_high_risk_careers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestorConcentrationDetail {
    pub subscriber_count: usize,
    pub investors: Vec<SubscriberConcentration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistressedAffiliate {
    pub company_id: String,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateChainDetail {
    pub total_affiliates: usize,
    pub distressed: Vec<DistressedAffiliate>,
    /// Affiliates without usable financial metrics; counted as not distressed.
    pub unassessed: Vec<String>,
    pub distress_ratio: f64,
}

/// Pattern-specific evidence behind a finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingDetail {
    CircularInvestment(CircularInvestmentDetail),
    ExcessiveIssuance(IssuanceDetail),
    OfficerConcentration(OfficerConcentrationDetail),
    FinancialDistressWithCb(DistressDetail),
    RelatedPartyTransactions(RelatedPartyDetail),
    OfficerMovement(OfficerMovementDetail),
    CbInvestorConcentration(InvestorConcentrationDetail),
    AffiliateChainRisk(AffiliateChainDetail),
    /// The detector did not produce a result.
    Unavailable,
}

impl FindingDetail {
    /// True when the detector had nothing to evaluate.
    ///
    /// Keyed on the inputs, not the outcome: a low result computed from real
    /// data is not empty. Empty findings are excluded from the composite
    /// score denominator.
    pub fn is_empty(&self) -> bool {
        match self {
            FindingDetail::CircularInvestment(d) => d.cycles.is_empty(),
            FindingDetail::ExcessiveIssuance(d) => d.bond_count == 0,
            FindingDetail::OfficerConcentration(d) => d.current_officer_count == 0,
            FindingDetail::FinancialDistressWithCb(d) => {
                d.recent_bond_count == 0 && d.health_score.is_none()
            }
            FindingDetail::RelatedPartyTransactions(d) => {
                d.total_related_count == 0 && d.affiliate_count == 0 && d.current_officer_count == 0
            }
            FindingDetail::OfficerMovement(d) => d.current_officer_count == 0,
            FindingDetail::CbInvestorConcentration(d) => d.subscriber_count == 0,
            FindingDetail::AffiliateChainRisk(d) => d.total_affiliates == 0,
            FindingDetail::Unavailable => true,
        }
    }

    /// List-shaped findings carry no single level of their own; any entry
    /// counts as high when scoring.
    pub fn is_list_shaped(&self) -> bool {
        matches!(self, FindingDetail::CircularInvestment(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub pattern: PatternType,
    pub risk_level: RiskLevel,
    pub detail: FindingDetail,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Finding {
    pub fn new(pattern: PatternType, risk_level: RiskLevel, detail: FindingDetail) -> Self {
        Self {
            pattern,
            risk_level,
            detail,
            notes: Vec::new(),
            error: None,
        }
    }

    /// Placeholder for a detector that failed, timed out or was cancelled.
    pub fn unavailable(pattern: PatternType, error: &RiskError) -> Self {
        Self {
            pattern,
            risk_level: RiskLevel::Unknown,
            detail: FindingDetail::Unavailable,
            notes: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn with_notes(mut self, notes: Vec<String>) -> Self {
        self.notes.extend(notes);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.detail.is_empty()
    }

    /// One-line description of the evidence, for risk factor listings.
    pub fn summary(&self) -> String {
        match &self.detail {
            FindingDetail::CircularInvestment(d) => match d.cycles.first() {
                Some(top) => format!(
                    "{} investment cycle(s); largest routes {} through {} companies",
                    d.cycles.len(),
                    top.total_amount,
                    top.length
                ),
                None => "no investment cycles".to_string(),
            },
            FindingDetail::ExcessiveIssuance(d) => format!(
                "{} bond(s) totalling {} in the last {} months",
                d.bond_count, d.total_amount, d.window_months
            ),
            FindingDetail::OfficerConcentration(d) => format!(
                "{} officer(s) serving at 3 or more other companies",
                d.officers.len()
            ),
            FindingDetail::FinancialDistressWithCb(d) => match d.health_score {
                Some(score) => format!(
                    "health score {:.1} with {} bond(s) in the last {} months",
                    score, d.recent_bond_count, d.window_months
                ),
                None => format!(
                    "no health score, {} bond(s) in the last {} months",
                    d.recent_bond_count, d.window_months
                ),
            },
            FindingDetail::RelatedPartyTransactions(d) => format!(
                "{} related companies invested in issued bonds",
                d.total_related_count
            ),
            FindingDetail::OfficerMovement(d) => format!(
                "{} career link(s) to high-risk companies",
                d.total_high_risk_careers
            ),
            FindingDetail::CbInvestorConcentration(d) => match d.investors.first() {
                Some(top) => format!(
                    "{} concentrated investor(s); top ratio {:.2} ({})",
                    d.investors.len(),
                    top.concentration_ratio,
                    top.subscriber_name
                ),
                None => "no concentrated investors".to_string(),
            },
            FindingDetail::AffiliateChainRisk(d) => format!(
                "{} of {} affiliates distressed (ratio {:.2})",
                d.distressed.len(),
                d.total_affiliates,
                d.distress_ratio
            ),
            FindingDetail::Unavailable => match &self.error {
                Some(error) => format!("not evaluated: {}", error),
                None => "not evaluated".to_string(),
            },
        }
    }
}
