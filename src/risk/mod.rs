// Risk pattern detection
// Detectors, the composite aggregator and the analysis engine

pub mod aggregator;
pub mod comparison;
pub mod detectors;
pub mod errors;
pub mod finding;
pub mod orchestrator;
pub mod traits;

// Re-export main types
pub use aggregator::{aggregate, composite_score, overall_level, CompanyRiskReport};
pub use comparison::*;
pub use detectors::{default_detectors, detector_catalog};
pub use errors::*;
pub use finding::*;
pub use orchestrator::*;
pub use traits::*;

// Module version
pub const VERSION: &str = "1.0.0";
