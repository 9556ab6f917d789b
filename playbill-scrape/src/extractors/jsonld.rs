//! Structured-data (JSON-LD) extractor
//!
//! Scans `<script type="application/ld+json">` blocks. Each block is parsed on its
//! own; a malformed block is skipped without affecting its siblings. Arrays and
//! `@graph` wrappers are flattened, and only event-typed items are kept.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::entities::decode_entities;
use super::{EventDates, ExtractedEvent, FormatExtractor, PriceInfo};
use crate::normalize::price::strip_currency;
use crate::normalize::Normalizer;

/// Default trust ceiling for structured data
pub const JSONLD_TRUST: f64 = 0.9;

static SCRIPT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<script[^>]*type=["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("JSON-LD script regex must be valid")
});

const EVENT_TYPES: [&str; 3] = ["Event", "TheaterEvent", "PerformingArtsEvent"];
const PRICE_FIELDS: [&str; 3] = ["price", "lowPrice", "highPrice"];

/// JSON-LD event extractor
#[derive(Debug, Clone)]
pub struct JsonLdExtractor {
    normalizer: Arc<Normalizer>,
}

impl JsonLdExtractor {
    pub fn new(normalizer: Arc<Normalizer>) -> Self {
        Self { normalizer }
    }
}

impl FormatExtractor for JsonLdExtractor {
    fn name(&self) -> &'static str {
        "jsonld"
    }

    fn base_confidence(&self) -> f64 {
        JSONLD_TRUST
    }

    fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    fn extract(&self, content: &str) -> Vec<ExtractedEvent> {
        let mut events = Vec::new();

        for (index, caps) in SCRIPT_BLOCK.captures_iter(content).enumerate() {
            let body = caps[1].trim();
            let document: Value = match serde_json::from_str(body) {
                Ok(document) => document,
                Err(e) => {
                    warn!(block = index, error = %e, "Skipping malformed JSON-LD block");
                    continue;
                }
            };

            let mut items = Vec::new();
            flatten_items(&document, &mut items);
            events.extend(items.into_iter().filter(|item| is_event(item)).filter_map(to_extracted));
        }

        debug!(count = events.len(), "JSON-LD events extracted");
        events
    }
}

/// Top-level objects, arrays and `@graph` wrappers, in document order
fn flatten_items<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| flatten_items(item, out)),
        Value::Object(map) => match map.get("@graph") {
            Some(graph) => flatten_items(graph, out),
            None => out.push(value),
        },
        _ => {}
    }
}

fn is_event(item: &Value) -> bool {
    let types: Vec<&str> = match item.get("@type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(list)) => list.iter().filter_map(Value::as_str).collect(),
        _ => return false,
    };

    types
        .iter()
        .any(|t| EVENT_TYPES.contains(t) || t.to_lowercase().contains("event"))
}

fn to_extracted(item: &Value) -> Option<ExtractedEvent> {
    let title = text_field(item, "name").map(|t| decode_entities(&t))?;
    let Some(start) = text_field(item, "startDate") else {
        debug!(title = %title, "JSON-LD event without startDate");
        return None;
    };

    let mut event = ExtractedEvent::new(
        title,
        EventDates::Text {
            start,
            end: text_field(item, "endDate"),
        },
    );
    event.url = text_field(item, "url");
    event.description = text_field(item, "description").map(|d| decode_entities(&d));
    event.location = location_name(item.get("location"));

    let amounts = offer_amounts(item.get("offers"));
    if !amounts.is_empty() {
        event.price = Some(PriceInfo::Amounts(amounts));
    }

    Some(event)
}

fn text_field(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn location_name(location: Option<&Value>) -> Option<String> {
    match location? {
        Value::String(name) => Some(name.trim().to_string()).filter(|n| !n.is_empty()),
        Value::Object(_) => text_field(location?, "name"),
        Value::Array(list) => list.iter().find_map(|l| location_name(Some(l))),
        _ => None,
    }
}

/// Every price / lowPrice / highPrice across one or many offers
fn offer_amounts(offers: Option<&Value>) -> Vec<f64> {
    let offers: Vec<&Value> = match offers {
        Some(Value::Array(list)) => list.iter().collect(),
        Some(offer @ Value::Object(_)) => vec![offer],
        _ => return Vec::new(),
    };

    offers
        .iter()
        .flat_map(|offer| PRICE_FIELDS.iter().filter_map(move |field| offer.get(*field)))
        .filter_map(amount_value)
        .collect()
}

fn amount_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => strip_currency(s).trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|a| a.is_finite() && *a >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use playbill_common::CanonicalWork;

    fn extractor() -> JsonLdExtractor {
        JsonLdExtractor::new(Arc::new(Normalizer::new().with_current_year(2024)))
    }

    fn page(blocks: &[&str]) -> String {
        let scripts: Vec<String> = blocks
            .iter()
            .map(|b| format!(r#"<script type="application/ld+json">{}</script>"#, b))
            .collect();
        format!("<html><head>{}</head><body></body></html>", scripts.join("\n"))
    }

    #[test]
    fn test_single_event_with_offer_range() {
        let html = page(&[r#"{
            "@context": "https://schema.org",
            "@type": "TheaterEvent",
            "name": "Hamlet",
            "startDate": "2024-06-01",
            "endDate": "2024-06-30",
            "url": "https://example.org/hamlet",
            "location": {"@type": "Place", "name": "Main Stage"},
            "offers": {"@type": "AggregateOffer", "lowPrice": 25, "highPrice": 75}
        }"#]);

        let events = extractor().extract_normalized(&html);
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.work, CanonicalWork::Hamlet);
        assert_eq!(event.price_min, Some(25));
        assert_eq!(event.price_max, Some(75));
        assert!(event.confidence <= 0.9);
        assert_eq!(event.notes.as_deref(), Some("Venue: Main Stage"));
        assert_eq!(event.event_url.as_deref(), Some("https://example.org/hamlet"));
    }

    #[test]
    fn test_graph_and_arrays_are_flattened() {
        let html = page(&[
            r#"{"@graph": [
                {"@type": "Organization", "name": "Festival"},
                {"@type": ["Event", "Thing"], "name": "Macbeth", "startDate": "2024-07-01"}
            ]}"#,
            r#"[{"@type": "MusicEvent", "name": "Othello in Concert", "startDate": "2024-08-01"}]"#,
        ]);

        let events = extractor().extract(&html);
        let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Macbeth", "Othello in Concert"]);
    }

    #[test]
    fn test_malformed_block_does_not_hide_siblings() {
        let html = page(&[
            r#"{"@type": "Event", "name": broken"#,
            r#"{"@type": "Event", "name": "The Tempest", "startDate": "2024-09-01"}"#,
        ]);
        let events = extractor().extract(&html);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "The Tempest");
    }

    #[test]
    fn test_offer_pool_across_multiple_offers() {
        let html = page(&[r#"{
            "@type": "Event",
            "name": "Twelfth Night",
            "startDate": "2024-05-01",
            "offers": [{"price": "$40.00"}, {"price": 15}, {"lowPrice": "30", "highPrice": "90"}]
        }"#]);

        let events = extractor().extract_normalized(&html);
        assert_eq!(events[0].price_min, Some(15));
        assert_eq!(events[0].price_max, Some(90));
    }

    #[test]
    fn test_event_without_start_date_is_skipped() {
        let html = page(&[r#"{"@type": "Event", "name": "Hamlet"}"#]);
        assert!(extractor().extract(&html).is_empty());
    }

    #[test]
    fn test_unparseable_dates_are_dropped_in_normalize() {
        let html = page(&[r#"{"@type": "Event", "name": "Hamlet", "startDate": "TBA"}"#]);
        let ex = extractor();
        assert_eq!(ex.extract(&html).len(), 1);
        assert!(ex.extract_normalized(&html).is_empty());
    }

    #[test]
    fn test_non_event_types_ignored() {
        let html = page(&[r#"{"@type": "WebPage", "name": "Hamlet", "startDate": "2024-01-01"}"#]);
        assert!(extractor().extract(&html).is_empty());
    }
}
