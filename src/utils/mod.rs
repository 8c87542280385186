pub mod fault_tolerance;
pub mod logging;

pub use fault_tolerance::*;
pub use logging::*;
