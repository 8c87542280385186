pub mod bond;
pub mod company;
pub mod health;
pub mod investment;
pub mod officer;

pub use bond::*;
pub use company::*;
pub use health::*;
pub use investment::*;
pub use officer::*;
