//! SQLite persistence for the scrape pipeline
//!
//! Free functions over a [`SqlitePool`](sqlx::SqlitePool), one module per table.
//! Schema creation lives in `playbill_common::db::init`.

pub mod companies;
pub mod group_actions;
pub mod productions;
pub mod retry;
pub mod sources;

use chrono::{DateTime, SecondsFormat, Utc};
use playbill_common::{Error, Result};
use uuid::Uuid;

pub use retry::retry_on_lock;

/// Stored timestamp form: RFC 3339, UTC, microseconds (sorts lexically)
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub(crate) fn parse_guid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid stored guid '{}': {}", value, e)))
}
