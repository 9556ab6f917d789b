//! Pipeline services
//!
//! - `ingestion`: gate and deduplicate normalized events
//! - `runner`: scrape pass over all sources
//! - `review`: operator group and single-row actions with an undo ledger
//! - `aggregator`: review queue and public catalog views
//! - `maintenance`: re-normalization, purge and audit report
//! - `seed`: default companies and sources

pub mod aggregator;
pub mod ingestion;
pub mod maintenance;
pub mod review;
pub mod runner;
pub mod seed;

pub use aggregator::{pick_better, Aggregator, CatalogFilter, CatalogRow, ReviewGroup};
pub use ingestion::{IngestOutcome, Ingestor, RejectReason};
pub use maintenance::{CompanyReport, Maintenance, RenormalizeReport};
pub use review::{GroupActionReport, ReviewService};
pub use runner::{RunSummary, ScrapeRunner, SourceReport};
pub use seed::{seed_default_companies, SeedReport};
