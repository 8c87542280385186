pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod risk;
pub mod store;
pub mod utils;

pub use error::AppError;
pub use risk::{
    AnalysisOptions, CompanyRiskReport, ComparisonReport, EngineConfig, Finding, PatternType,
    RiskAnalysisEngine, RiskError, RiskLevel,
};
