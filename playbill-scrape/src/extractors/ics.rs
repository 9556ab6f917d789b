//! iCalendar (RFC 5545) extractor
//!
//! Content lines are unfolded, then each `VEVENT` inside a `VCALENDAR` envelope is
//! read for SUMMARY, DTSTART, DTEND, DESCRIPTION, URL and LOCATION. Property
//! parameters (`DTSTART;TZID=...`) are ignored; the written calendar date is kept.

use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{EventDates, ExtractedEvent, FormatExtractor};
use crate::normalize::dates::parse_basic_date;
use crate::normalize::Normalizer;

/// Default trust ceiling for calendar feeds
pub const ICS_TRUST: f64 = 0.95;

/// Calendar feed extractor
#[derive(Debug, Clone)]
pub struct IcsExtractor {
    normalizer: Arc<Normalizer>,
}

impl IcsExtractor {
    pub fn new(normalizer: Arc<Normalizer>) -> Self {
        Self { normalizer }
    }
}

impl FormatExtractor for IcsExtractor {
    fn name(&self) -> &'static str {
        "ics"
    }

    fn base_confidence(&self) -> f64 {
        ICS_TRUST
    }

    fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    fn extract(&self, content: &str) -> Vec<ExtractedEvent> {
        let lines = unfold(content);

        let has_envelope = lines
            .iter()
            .any(|l| l.eq_ignore_ascii_case("BEGIN:VCALENDAR"));
        if !has_envelope {
            warn!("Calendar content has no VCALENDAR envelope");
            return Vec::new();
        }

        let mut events = Vec::new();
        let mut current: Option<RawEvent> = None;

        for line in &lines {
            if line.eq_ignore_ascii_case("BEGIN:VEVENT") {
                current = Some(RawEvent::default());
                continue;
            }
            if line.eq_ignore_ascii_case("END:VEVENT") {
                if let Some(raw) = current.take() {
                    match raw.into_event() {
                        Some(event) => events.push(event),
                        None => debug!("Skipping VEVENT without SUMMARY or usable DTSTART"),
                    }
                }
                continue;
            }

            let Some(raw) = current.as_mut() else {
                continue;
            };
            let Some((name, value)) = split_property(line) else {
                continue;
            };

            match name.as_str() {
                "SUMMARY" => raw.summary = Some(unescape_text(value)),
                "DTSTART" => raw.dtstart = Some(value.trim().to_string()),
                "DTEND" => raw.dtend = Some(value.trim().to_string()),
                "DESCRIPTION" => raw.description = Some(unescape_text(value)),
                "URL" => raw.url = Some(value.trim().to_string()),
                "LOCATION" => raw.location = Some(unescape_text(value)),
                _ => {}
            }
        }

        debug!(count = events.len(), "Calendar events extracted");
        events
    }
}

#[derive(Debug, Default)]
struct RawEvent {
    summary: Option<String>,
    dtstart: Option<String>,
    dtend: Option<String>,
    description: Option<String>,
    url: Option<String>,
    location: Option<String>,
}

impl RawEvent {
    fn into_event(self) -> Option<ExtractedEvent> {
        let summary = self.summary.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())?;
        let (start, all_day) = parse_ics_date(self.dtstart.as_deref()?)?;

        let end = self
            .dtend
            .as_deref()
            .and_then(parse_ics_date)
            .map(|(end, _)| {
                // All-day DTEND is exclusive
                if all_day && end > start {
                    end - Duration::days(1)
                } else {
                    end
                }
            });

        let mut event = ExtractedEvent::new(summary, EventDates::Typed { start, end });
        event.url = self.url.filter(|u| !u.is_empty());
        event.description = self.description.filter(|d| !d.trim().is_empty());
        event.location = self.location.filter(|l| !l.trim().is_empty());
        Some(event)
    }
}

/// Join folded continuation lines (leading space or tab)
fn unfold(content: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in content.split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        match (line.chars().next(), lines.last_mut()) {
            (Some(' ') | Some('\t'), Some(previous)) => previous.push_str(&line[1..]),
            _ => {
                if !line.trim().is_empty() {
                    lines.push(line.to_string());
                }
            }
        }
    }
    lines
}

/// `NAME;PARAM=x:value` → (`NAME`, `value`)
fn split_property(line: &str) -> Option<(String, &str)> {
    let colon = line.find(':')?;
    let (head, value) = (&line[..colon], &line[colon + 1..]);
    let name = head.split(';').next()?.trim().to_ascii_uppercase();
    Some((name, value))
}

fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out.trim().to_string()
}

/// `YYYYMMDD` (all-day) or `YYYYMMDDTHHMMSS[Z]`; returns the date and the all-day flag
fn parse_ics_date(value: &str) -> Option<(NaiveDate, bool)> {
    let value = value.trim();
    match value.split_once(['T', 't']) {
        None => parse_basic_date(value).map(|d| (d, true)),
        Some((date, time)) => {
            let time = time.trim_end_matches(['Z', 'z']);
            if time.len() < 4 || !time.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            parse_basic_date(date).map(|d| (d, false))
        }
    }
}
