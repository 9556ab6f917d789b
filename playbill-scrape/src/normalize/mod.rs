//! Normalizer
//!
//! Shared by every format extractor:
//! - free-text title → ([`CanonicalWork`], confidence)
//! - free-text dates → ordered [`DateRange`]
//! - free-text price → [`PriceRange`]
//!
//! [`NormalizedEvent`] is the pipeline output consumed by the ingestion gate.

pub mod aliases;
pub mod dates;
pub mod price;
pub mod title;

use chrono::{Datelike, Local, NaiveDate};
use playbill_common::CanonicalWork;
use serde::Serialize;

pub use aliases::{default_aliases, Alias};
pub use dates::{roll_over_year, DateError, DateRange};
pub use price::{resolve_price, PriceRange};
pub use title::TitleMatch;

/// Title, date and price resolution with a configurable alias table
#[derive(Debug, Clone)]
pub struct Normalizer {
    aliases: Vec<Alias>,
    current_year: i32,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Built-in alias table, current local year for year-less dates
    pub fn new() -> Self {
        Self {
            aliases: default_aliases(),
            current_year: Local::now().year(),
        }
    }

    /// Replace the alias table (order is match order)
    pub fn with_aliases(mut self, aliases: Vec<Alias>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Year appended to year-less dates
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }

    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    pub fn resolve_price(&self, text: &str) -> PriceRange {
        resolve_price(text)
    }
}

/// One event after title, date and price resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedEvent {
    pub title_raw: String,
    pub work: CanonicalWork,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub perf_dates: Option<Vec<NaiveDate>>,
    pub event_url: Option<String>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub notes: Option<String>,
    /// min(title confidence, format trust ceiling)
    pub confidence: f64,
}

impl NormalizedEvent {
    pub fn new(title_raw: impl Into<String>, title: TitleMatch, dates: DateRange, trust_ceiling: f64) -> Self {
        Self {
            title_raw: title_raw.into(),
            work: title.work,
            start_date: dates.start(),
            end_date: dates.end(),
            perf_dates: None,
            event_url: None,
            price_min: None,
            price_max: None,
            notes: None,
            confidence: title.confidence.min(trust_ceiling).clamp(0.0, 1.0),
        }
    }

    pub fn dates(&self) -> DateRange {
        // Constructed from a DateRange, so the order always holds
        DateRange::new(self.start_date, self.end_date).unwrap_or(DateRange::single(self.start_date))
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.event_url = url.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn with_price(mut self, price: PriceRange) -> Self {
        self.price_min = price.min;
        self.price_max = price.max;
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes.filter(|n| !n.trim().is_empty());
        self
    }

    pub fn with_perf_dates(mut self, dates: Vec<NaiveDate>) -> Self {
        self.perf_dates = if dates.is_empty() { None } else { Some(dates) };
        self
    }

    /// Override confidence (markup single-word title boost)
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Extend the span to cover another range
    pub fn extend_to(&mut self, range: DateRange) {
        self.start_date = self.start_date.min(range.start());
        self.end_date = self.end_date.max(range.end());
    }
}
