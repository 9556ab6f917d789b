//! Persisted models
//!
//! Dates are stored as `YYYY-MM-DD` text and timestamps as RFC 3339 text.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{CanonicalWork, Error};

/// Storage format for calendar dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Lifecycle status of a production record
///
/// ```text
/// REVIEW --approve--> PUBLISHED --archive--> ARCHIVED
/// REVIEW --reject---> ARCHIVED
/// PUBLISHED | ARCHIVED --revert--> REVIEW
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProductionStatus {
    Review,
    Published,
    Archived,
}

impl ProductionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionStatus::Review => "REVIEW",
            ProductionStatus::Published => "PUBLISHED",
            ProductionStatus::Archived => "ARCHIVED",
        }
    }
}

impl fmt::Display for ProductionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "REVIEW" => Ok(ProductionStatus::Review),
            "PUBLISHED" => Ok(ProductionStatus::Published),
            "ARCHIVED" => Ok(ProductionStatus::Archived),
            other => Err(Error::InvalidInput(format!("Unknown production status: {}", other))),
        }
    }
}

/// Format a source publishes its listings in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(rename = "ICS")]
    Ics,
    #[serde(rename = "JSONLD")]
    JsonLd,
    #[serde(rename = "HTML")]
    Html,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Ics => "ICS",
            SourceKind::JsonLd => "JSONLD",
            SourceKind::Html => "HTML",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ICS" => Ok(SourceKind::Ics),
            "JSONLD" | "JSON-LD" => Ok(SourceKind::JsonLd),
            "HTML" => Ok(SourceKind::Html),
            other => Err(Error::InvalidInput(format!("Unknown source kind: {}", other))),
        }
    }
}

/// Operator group action recorded in the action ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupActionKind {
    Approve,
    Reject,
    Revert,
}

impl GroupActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupActionKind::Approve => "APPROVE",
            GroupActionKind::Reject => "REJECT",
            GroupActionKind::Revert => "REVERT",
        }
    }
}

impl FromStr for GroupActionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APPROVE" => Ok(GroupActionKind::Approve),
            "REJECT" => Ok(GroupActionKind::Reject),
            "REVERT" => Ok(GroupActionKind::Revert),
            other => Err(Error::InvalidInput(format!("Unknown group action: {}", other))),
        }
    }
}

/// Theater company
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub guid: Uuid,
    pub name: String,
    pub slug: String,
    pub website: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a company
#[derive(Debug, Clone, Default)]
pub struct NewCompany {
    pub name: String,
    pub website: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
}

/// Scrape source belonging to a company
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub guid: Uuid,
    pub company_id: Uuid,
    pub url: String,
    pub kind: SourceKind,
    /// Collector identity, normally the site's host name
    pub parser_name: Option<String>,
    pub enabled: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_status: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Persisted production of one canonical work by one company over one date range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Production {
    pub guid: Uuid,
    pub company_id: Uuid,
    pub work: CanonicalWork,
    pub title_raw: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub perf_dates: Option<Vec<NaiveDate>>,
    pub event_url: Option<String>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub notes: Option<String>,
    pub status: ProductionStatus,
    pub confidence: f64,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ledger entry for an operator group action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupAction {
    pub guid: Uuid,
    pub company_id: Uuid,
    pub work: CanonicalWork,
    pub action: GroupActionKind,
    pub from_status: ProductionStatus,
    pub to_status: ProductionStatus,
    pub production_ids: Vec<Uuid>,
    pub committed_at: DateTime<Utc>,
    pub undone_at: Option<DateTime<Utc>>,
}

/// URL-safe company slug: lowercase, `&` spelled out, other punctuation collapsed to `-`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.replace('&', " and ").chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Parse a stored `YYYY-MM-DD` date
pub fn parse_stored_date(value: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| Error::Internal(format!("Failed to parse stored date '{}': {}", value, e)))
}

/// Parse a stored RFC 3339 timestamp
pub fn parse_stored_timestamp(value: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse stored timestamp '{}': {}", value, e)))
}
