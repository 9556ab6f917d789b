//! # Playbill Scrape Library (playbill-scrape)
//!
//! Collects theater productions from company websites and calendar feeds,
//! resolves them against the canonical work catalog and keeps one record per
//! (company, work, run).
//!
//! **Pipeline:** fetch (polite, robots-aware) → extract (JSON-LD, iCalendar, markup)
//! → normalize (title, dates, price) → ingest (gate, deduplicate) → review → catalog

pub mod collectors;
pub mod db;
pub mod error;
pub mod extractors;
pub mod fetch;
pub mod normalize;
pub mod services;

pub use error::{ScrapeError, ScrapeResult};
