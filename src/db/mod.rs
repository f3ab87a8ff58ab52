pub mod connection;
pub mod cycles;
pub mod entries;
pub mod recipients;

pub use connection::{init_db, Database};
