// Risk detection error types
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    #[error("Company not found: {company_id}")]
    CompanyNotFound { company_id: String },

    #[error("Store unavailable: {store} - {message}")]
    StoreUnavailable { store: String, message: String },

    #[error("Detector timed out: {pattern} after {timeout_ms}ms")]
    DetectorTimeout { pattern: String, timeout_ms: u64 },

    #[error("Insufficient data for {pattern}: {reason}")]
    DataInsufficient { pattern: String, reason: String },

    #[error("Unknown risk pattern: {name}")]
    InvalidPatternName { name: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Analysis cancelled before {pattern} completed")]
    Cancelled { pattern: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RiskError {
    pub fn store(store: &str, message: impl Into<String>) -> Self {
        RiskError::StoreUnavailable {
            store: store.to_string(),
            message: message.into(),
        }
    }

    /// Errors that abort a whole call instead of degrading one finding.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RiskError::CompanyNotFound { .. }
                | RiskError::InvalidPatternName { .. }
                | RiskError::InvalidInput { .. }
        )
    }

    /// Short machine-readable kind, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            RiskError::CompanyNotFound { .. } => "company_not_found",
            RiskError::StoreUnavailable { .. } => "store_unavailable",
            RiskError::DetectorTimeout { .. } => "detector_timeout",
            RiskError::DataInsufficient { .. } => "data_insufficient",
            RiskError::InvalidPatternName { .. } => "invalid_pattern_name",
            RiskError::InvalidInput { .. } => "invalid_input",
            RiskError::Cancelled { .. } => "cancelled",
            RiskError::Serialization(_) => "serialization",
        }
    }
}

impl From<sqlx::Error> for RiskError {
    fn from(err: sqlx::Error) -> Self {
        RiskError::store("postgres", err.to_string())
    }
}

impl From<serde_json::Error> for RiskError {
    fn from(err: serde_json::Error) -> Self {
        RiskError::Serialization(err.to_string())
    }
}
