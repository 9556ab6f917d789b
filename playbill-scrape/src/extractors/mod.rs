//! Format Extractors
//!
//! Three independent extractors turn raw source text into [`ExtractedEvent`]s:
//! - [`JsonLdExtractor`]: embedded structured data (trust 0.9)
//! - [`IcsExtractor`]: iCalendar feeds (trust 0.95)
//! - [`HtmlExtractor`]: line-oriented markup heuristics (trust 0.6)
//!
//! Each pairs `extract` with `normalize`, which resolves titles, dates and prices
//! through the shared [`Normalizer`] and caps confidence at the trust ceiling.
//! Events whose dates cannot be resolved are dropped, never defaulted.

pub mod entities;
pub mod html;
pub mod ics;
pub mod jsonld;

use chrono::NaiveDate;
use tracing::warn;

use crate::normalize::{roll_over_year, DateError, NormalizedEvent, Normalizer, PriceRange};

pub use html::HtmlExtractor;
pub use ics::IcsExtractor;
pub use jsonld::JsonLdExtractor;

/// Date information as found in the source
#[derive(Debug, Clone, PartialEq)]
pub enum EventDates {
    /// Free text still to be resolved
    Text { start: String, end: Option<String> },
    /// Already typed (calendar feeds)
    Typed { start: NaiveDate, end: Option<NaiveDate> },
}

/// Price information as found in the source
#[derive(Debug, Clone, PartialEq)]
pub enum PriceInfo {
    Text(String),
    /// Pool of offer amounts; resolves to [min, max]
    Amounts(Vec<f64>),
}

/// Per-format raw event, never persisted
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedEvent {
    pub title: String,
    pub dates: EventDates,
    pub url: Option<String>,
    pub price: Option<PriceInfo>,
    pub description: Option<String>,
    pub location: Option<String>,
}

impl ExtractedEvent {
    pub fn new(title: impl Into<String>, dates: EventDates) -> Self {
        Self {
            title: title.into(),
            dates,
            url: None,
            price: None,
            description: None,
            location: None,
        }
    }

    /// Description and venue folded into one notes string
    pub fn notes(&self) -> Option<String> {
        let description = self.description.as_deref().map(str::trim).filter(|d| !d.is_empty());
        let venue = self
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| format!("Venue: {}", l));

        match (description, venue) {
            (Some(d), Some(v)) => Some(format!("{} | {}", d, v)),
            (Some(d), None) => Some(d.to_string()),
            (None, Some(v)) => Some(v),
            (None, None) => None,
        }
    }
}

/// Common extractor contract
pub trait FormatExtractor: Send + Sync {
    /// Extractor name for logging
    fn name(&self) -> &'static str;

    /// Default trust ceiling for this format
    fn base_confidence(&self) -> f64;

    fn normalizer(&self) -> &Normalizer;

    /// Raw events found in the content; malformed parts are skipped
    fn extract(&self, content: &str) -> Vec<ExtractedEvent>;

    /// Resolve extracted events, dropping those without usable dates
    fn normalize(&self, events: &[ExtractedEvent], trust_ceiling: f64) -> Vec<NormalizedEvent> {
        events
            .iter()
            .filter_map(|event| match normalize_extracted(self.normalizer(), event, trust_ceiling) {
                Ok(normalized) => Some(normalized),
                Err(e) => {
                    warn!(extractor = self.name(), title = %event.title, error = %e, "Dropping event with unusable dates");
                    None
                }
            })
            .collect()
    }

    /// `extract` then `normalize` at the default trust ceiling
    fn extract_normalized(&self, content: &str) -> Vec<NormalizedEvent> {
        let extracted = self.extract(content);
        self.normalize(&extracted, self.base_confidence())
    }
}

/// Shared resolution of one extracted event
pub fn normalize_extracted(
    normalizer: &Normalizer,
    event: &ExtractedEvent,
    trust_ceiling: f64,
) -> Result<NormalizedEvent, DateError> {
    let title = normalizer.resolve_title(&event.title);

    let dates = match &event.dates {
        EventDates::Text { start, end } => normalizer.resolve_dates(start, end.as_deref())?,
        EventDates::Typed { start, end } => roll_over_year(*start, end.unwrap_or(*start))?,
    };

    let price = match &event.price {
        Some(PriceInfo::Text(text)) => normalizer.resolve_price(text),
        Some(PriceInfo::Amounts(amounts)) => PriceRange::from_amounts(amounts),
        None => PriceRange::default(),
    };

    Ok(NormalizedEvent::new(event.title.trim(), title, dates, trust_ceiling)
        .with_url(event.url.clone())
        .with_price(price)
        .with_notes(event.notes()))
}
