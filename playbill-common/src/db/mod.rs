//! Database models and initialization

pub mod init;
pub mod models;

pub use init::{init_database, init_memory_database};
pub use models::*;
