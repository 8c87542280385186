pub mod connection;
pub mod migrations;

pub use connection::*;
pub use migrations::run_migrations;
