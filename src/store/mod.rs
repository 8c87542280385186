pub mod cycles;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use cycles::InvestmentGraph;
pub use memory::{InMemoryGraphStore, InMemoryHealthProvider};
pub use postgres::{PgGraphStore, PgHealthMetricsProvider, PgHighRiskNameSupplier};
pub use traits::*;
