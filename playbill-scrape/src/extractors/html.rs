//! Heuristic markup extractor
//!
//! Line-oriented scan for pages without structured data. A line mentioning a
//! known work (or "shakespeare") yields a title candidate; nearby lines supply the
//! date text and a ticket/event link. Low trust: results usually land in review.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use super::entities::decode_entities;
use super::{normalize_extracted, EventDates, ExtractedEvent, FormatExtractor};
use crate::normalize::{NormalizedEvent, Normalizer};

/// Default trust ceiling for markup heuristics
pub const HTML_TRUST: f64 = 0.6;

/// Confidence given to a bare famous single-word title
const SINGLE_WORD_BOOST: f64 = 0.9;

const WORK_KEYWORDS: [&str; 40] = [
    "hamlet",
    "macbeth",
    "othello",
    "romeo",
    "juliet",
    "lear",
    "caesar",
    "tempest",
    "midsummer",
    "much ado",
    "merchant",
    "venice",
    "taming",
    "shrew",
    "twelfth night",
    "as you like it",
    "winter's tale",
    "merry wives",
    "windsor",
    "all's well",
    "measure for measure",
    "richard ii",
    "richard iii",
    "henry iv",
    "henry v",
    "henry vi",
    "henry viii",
    "coriolanus",
    "cymbeline",
    "titus",
    "timon",
    "pericles",
    "two gentlemen",
    "two noble kinsmen",
    "love's labour",
    "loves labour",
    "comedy of errors",
    "troilus",
    "cressida",
    "shakespeare",
];

const LINK_HINTS: [&str; 5] = ["ticket", "event", "show", "performance", "calendar"];
const RANGE_SEPARATORS: [&str; 5] = ["–", "—", "-", " to ", " through "];

static TEXT_FRAGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r">([^<]+)<").expect("fragment regex must be valid"));

static HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href=["']([^"']+)["']"#).expect("href regex must be valid"));

static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // January 15, 2024
        r"\b\w+\s+\d{1,2},?\s+\d{4}\b",
        // Jan 15–Feb 20
        r"\b\w+\s+\d{1,2}[-–—]\w+\s+\d{1,2}\b",
        r"\b\d{1,2}/\d{1,2}/\d{4}\b",
        r"\b\d{4}-\d{2}-\d{2}\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("date pattern must be valid"))
    .collect()
});

static BOOSTABLE_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(hamlet|macbeth|othello|lear|coriolanus|cymbeline)$")
        .expect("boost regex must be valid")
});

/// Markup heuristics extractor
#[derive(Debug, Clone)]
pub struct HtmlExtractor {
    normalizer: Arc<Normalizer>,
}

impl HtmlExtractor {
    pub fn new(normalizer: Arc<Normalizer>) -> Self {
        Self { normalizer }
    }

    /// Extract with relative links resolved against the page URL
    pub fn extract_with_base(&self, content: &str, base_url: Option<&str>) -> Vec<ExtractedEvent> {
        let base = base_url.and_then(|b| Url::parse(b).ok());
        let lines: Vec<&str> = content.lines().collect();

        let mut events = Vec::new();
        let mut title: Option<String> = None;
        let mut date_text: Option<String> = None;
        let mut url: Option<String> = None;

        for (i, line) in lines.iter().enumerate() {
            let lower = line.to_lowercase();
            let Some(first_hit) = first_keyword_hit(&lower) else {
                continue;
            };
            let Some(candidate) = title_from_line(line, first_hit) else {
                continue;
            };
            title = Some(candidate);

            let window = |before: usize, after: usize| {
                lines[i.saturating_sub(before)..(i + after + 1).min(lines.len())].iter()
            };

            if let Some(found) = window(3, 3).find_map(|l| find_date(l)) {
                date_text = Some(found);
            }
            if let Some(href) = window(2, 2).find_map(|l| find_link(l)) {
                url = Some(resolve_link(&href, base.as_ref()));
            }

            if let (Some(t), Some(d)) = (&title, &date_text) {
                let mut event = ExtractedEvent::new(t.clone(), EventDates::Text { start: d.clone(), end: None });
                event.url = url.take();
                events.push(event);
                title = None;
                date_text = None;
            }
        }

        debug!(count = events.len(), "Markup events extracted");
        events
    }
}

impl FormatExtractor for HtmlExtractor {
    fn name(&self) -> &'static str {
        "html"
    }

    fn base_confidence(&self) -> f64 {
        HTML_TRUST
    }

    fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    fn extract(&self, content: &str) -> Vec<ExtractedEvent> {
        self.extract_with_base(content, None)
    }

    fn normalize(&self, events: &[ExtractedEvent], trust_ceiling: f64) -> Vec<NormalizedEvent> {
        events
            .iter()
            .filter_map(|event| {
                let split = split_range(event);
                match normalize_extracted(&self.normalizer, &split, trust_ceiling) {
                    Ok(normalized) => Some(boost_single_word(&event.title, normalized)),
                    Err(e) => {
                        warn!(extractor = "html", title = %event.title, error = %e, "Dropping event with unusable dates");
                        None
                    }
                }
            })
            .collect()
    }
}

fn first_keyword_hit(lower_line: &str) -> Option<usize> {
    WORK_KEYWORDS.iter().filter_map(|k| lower_line.find(k)).min()
}

fn contains_keyword(text: &str) -> bool {
    let lower = text.to_lowercase();
    WORK_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Last text fragment naming a work, else the last fragment before the first hit
fn title_from_line(line: &str, first_hit: usize) -> Option<String> {
    let fragments: Vec<(usize, &str)> = TEXT_FRAGMENT
        .captures_iter(line)
        .filter_map(|c| c.get(1))
        .map(|m| (m.start(), m.as_str()))
        .filter(|(_, text)| !text.trim().is_empty())
        .collect();

    let chosen = fragments
        .iter()
        .rev()
        .find(|(_, text)| contains_keyword(text))
        .or_else(|| fragments.iter().rev().find(|(start, _)| *start < first_hit))?;

    let title = decode_entities(chosen.1.trim()).trim().to_string();
    (title.chars().count() >= 4).then_some(title)
}

fn find_date(line: &str) -> Option<String> {
    DATE_PATTERNS
        .iter()
        .find_map(|p| p.find(line))
        .map(|m| m.as_str().trim().to_string())
}

fn find_link(line: &str) -> Option<String> {
    HREF.captures_iter(line)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .find(|href| {
            let lower = href.to_lowercase();
            LINK_HINTS.iter().any(|hint| lower.contains(hint))
        })
        .map(str::to_string)
}

fn resolve_link(href: &str, base: Option<&Url>) -> String {
    if href.starts_with("http") {
        return href.to_string();
    }
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}

/// Split "A – B" style date text into start and end when exactly two parts result
fn split_range(event: &ExtractedEvent) -> ExtractedEvent {
    let EventDates::Text { start, end: None } = &event.dates else {
        return event.clone();
    };

    let parts = RANGE_SEPARATORS.iter().find_map(|sep| {
        let parts: Vec<&str> = start.split(sep).collect();
        (parts.len() == 2).then(|| (parts[0].trim().to_string(), parts[1].trim().to_string()))
    });

    let mut split = event.clone();
    if let Some((from, to)) = parts {
        split.dates = EventDates::Text { start: from, end: Some(to) };
    }
    split
}

fn boost_single_word(raw_title: &str, event: NormalizedEvent) -> NormalizedEvent {
    if BOOSTABLE_TITLE.is_match(raw_title.trim()) && event.confidence < 0.85 {
        return event.with_confidence(SINGLE_WORD_BOOST);
    }
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use playbill_common::CanonicalWork;

    fn extractor() -> HtmlExtractor {
        HtmlExtractor::new(Arc::new(Normalizer::new().with_current_year(2024)))
    }

    const PAGE: &str = r#"<div class="season">
<div class="card">
  <h3 class="title">Twelfth Night</h3>
  <p class="dates">June 5, 2024</p>
  <a href="/tickets/twelfth-night">Buy tickets</a>
</div>
<div class="card">
  <h3><span>Now Playing</span> <em>Hamlet</em></h3>
  <p>Jul 10–Aug 2</p>
  <a href="https://tickets.example.org/event/hamlet">Tickets</a>
</div>
</div>"#;

    #[test]
    fn test_titles_dates_and_links() {
        let events = extractor().extract_with_base(PAGE, Some("https://festival.example.org/season/"));
        assert_eq!(events.len(), 2);

        assert_eq!(events[0].title, "Twelfth Night");
        assert_eq!(events[0].dates, EventDates::Text { start: "June 5, 2024".into(), end: None });
        assert_eq!(events[0].url.as_deref(), Some("https://festival.example.org/tickets/twelfth-night"));

        assert_eq!(events[1].title, "Hamlet");
        assert_eq!(events[1].url.as_deref(), Some("https://tickets.example.org/event/hamlet"));
    }

    #[test]
    fn test_range_split_and_single_word_boost() {
        let normalized = extractor().extract_normalized(PAGE);
        let hamlet = normalized.iter().find(|e| e.work == CanonicalWork::Hamlet).unwrap();
        assert_eq!(hamlet.start_date, NaiveDate::from_ymd_opt(2024, 7, 10).unwrap());
        assert_eq!(hamlet.end_date, NaiveDate::from_ymd_opt(2024, 8, 2).unwrap());
        assert_eq!(hamlet.confidence, SINGLE_WORD_BOOST);

        let twelfth = normalized.iter().find(|e| e.work == CanonicalWork::TwelfthNight).unwrap();
        assert_eq!(twelfth.confidence, HTML_TRUST);
    }

    #[test]
    fn test_title_without_date_is_not_emitted() {
        let page = "<h2>Macbeth</h2>\n<p>Coming soon</p>\n";
        assert!(extractor().extract(page).is_empty());
    }

    #[test]
    fn test_short_fragments_rejected() {
        let page = "<li>Lear</li><li>x</li>\n<p>2024-05-01</p>\n";
        let events = extractor().extract(page);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Lear");

        let page = "<b>R</b> lear\n<p>2024-05-01</p>\n";
        assert!(extractor().extract(page).is_empty());
    }

    #[test]
    fn test_iso_date_is_not_split() {
        let page = "<h2>Othello</h2>\n<p>2024-09-12</p>\n";
        let normalized = extractor().extract_normalized(page);
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].start_date, NaiveDate::from_ymd_opt(2024, 9, 12).unwrap());
        assert_eq!(normalized[0].end_date, normalized[0].start_date);
    }

    #[test]
    fn test_cressida_fragment_is_a_title() {
        let page = "<span>Season</span> <h2>Cressida</h2>\n<p>2024-10-04</p>\n";
        let events = extractor().extract(page);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Cressida");
    }

    #[test]
    fn test_entities_decoded_in_title() {
        let page = "<h2>Romeo &amp; Juliet</h2>\n<p>March 3, 2025</p>\n";
        let events = extractor().extract(page);
        assert_eq!(events[0].title, "Romeo & Juliet");
    }
}
