//! # Playbill Common Library
//!
//! Shared code for the playbill scraping pipeline including:
//! - Canonical work catalog (closed enumeration of known plays)
//! - Persisted models (companies, sources, productions, group actions)
//! - Database initialization and schema
//! - Configuration loading and root folder resolution
//! - Common error type

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;

pub use catalog::{CanonicalWork, WorkCategory};
pub use error::{Error, Result};
