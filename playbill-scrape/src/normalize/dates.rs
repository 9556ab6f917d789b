//! Date resolution
//!
//! Free-text date strings become a typed, ordered [`DateRange`]. Unparseable text
//! is an explicit [`DateError`]; nothing is ever defaulted to "today".

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::Normalizer;

/// Date resolution failure for a single event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("Unable to parse date: {0}")]
    Unparseable(String),

    #[error("End date {end} precedes start date {start}")]
    Inverted { start: NaiveDate, end: NaiveDate },
}

/// Inclusive calendar date range with `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateError> {
        if end < start {
            return Err(DateError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Overlap rule used for duplicate detection: either endpoint of `other` falls
    /// inside `self`, or `other` spans all of `self`
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.contains(other.start)
            || self.contains(other.end)
            || (other.start <= self.start && other.end >= self.end)
    }
}

/// Strict ISO forms, tried before any textual pattern
const ISO_DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Textual patterns that carry a year
const DATED_FORMATS: [&str; 7] = [
    "%b %d, %Y",
    "%b %d %Y",
    "%B %d, %Y",
    "%m/%d/%Y",
    "%Y-%m-%d",
    "%A, %B %d, %Y",
    "%d %B %Y",
];

/// Year-less patterns; the current year is appended before parsing
const YEARLESS_FORMATS: [&str; 3] = ["%b %d", "%B %d", "%m/%d"];

static FOUR_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}").expect("four digit regex must be valid"));
static INTEGERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("integer regex must be valid"));

/// Month names scraped without their leading letter
const TRUNCATED_MONTHS: [(&str, char); 5] = [
    ("anuary", 'J'),
    ("ebruary", 'F'),
    ("arch", 'M'),
    ("uly", 'J'),
    ("une", 'J'),
];

impl Normalizer {
    /// Resolve start and optional end text into an ordered range
    ///
    /// A missing end means a single day. An end before the start is read as a
    /// year-boundary artifact and moved one year later; if that is still before the
    /// start, the range is rejected.
    pub fn resolve_dates(&self, start_text: &str, end_text: Option<&str>) -> Result<DateRange, DateError> {
        let start = self.resolve_date(start_text)?;
        let end = match end_text.map(str::trim).filter(|t| !t.is_empty()) {
            Some(text) => self.resolve_date(text)?,
            None => start,
        };

        roll_over_year(start, end)
    }

    /// Resolve one date string
    pub fn resolve_date(&self, text: &str) -> Result<NaiveDate, DateError> {
        let trimmed = text.trim();
        if let Some(date) = parse_iso(trimmed) {
            return Ok(date);
        }
        parse_common_formats(trimmed, self.current_year)
            .ok_or_else(|| DateError::Unparseable(text.to_string()))
    }
}

/// Order a typed start/end pair, applying the year-boundary repair
pub fn roll_over_year(start: NaiveDate, end: NaiveDate) -> Result<DateRange, DateError> {
    if end >= start {
        return DateRange::new(start, end);
    }

    let bumped = add_one_year(end);
    DateRange::new(start, bumped).map_err(|_| DateError::Inverted { start, end })
}

fn add_one_year(date: NaiveDate) -> NaiveDate {
    date.with_year(date.year() + 1)
        // Feb 29 has no counterpart next year
        .or_else(|| NaiveDate::from_ymd_opt(date.year() + 1, date.month(), 28))
        .unwrap_or(date)
}

fn parse_iso(text: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local().date());
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt.naive_local().date());
    }
    for format in ISO_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.date());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    parse_basic_date(text)
}

/// Basic ISO form `YYYYMMDD`
pub(crate) fn parse_basic_date(text: &str) -> Option<NaiveDate> {
    if text.len() != 8 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = text[0..4].parse().ok()?;
    let month = text[4..6].parse().ok()?;
    let day = text[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn repair_truncated_month(text: &str) -> String {
    let lower = text.to_lowercase();
    for (fragment, letter) in TRUNCATED_MONTHS {
        if lower.starts_with(fragment) {
            return format!("{}{}", letter, text);
        }
    }
    text.to_string()
}

fn parse_common_formats(text: &str, current_year: i32) -> Option<NaiveDate> {
    let cleaned = repair_truncated_month(text);

    for format in DATED_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            return Some(date);
        }
    }

    if !FOUR_DIGITS.is_match(&cleaned) {
        let with_year = format!("{} {}", cleaned, current_year);
        for format in YEARLESS_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(&with_year, &format!("{} %Y", format)) {
                return Some(date);
            }
        }
    }

    parse_leading_integers(&cleaned, current_year)
}

/// Last resort: first integers read positionally as month/day[/year]
fn parse_leading_integers(text: &str, current_year: i32) -> Option<NaiveDate> {
    let numbers: Vec<i64> = INTEGERS
        .find_iter(text)
        .take(3)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();

    if numbers.len() < 2 {
        return None;
    }

    let (month, day) = (numbers[0], numbers[1]);
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }

    let year = match numbers.get(2) {
        Some(&y) if y < 100 => 2000 + y,
        Some(&y) => y,
        None => current_year as i64,
    };

    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month as u32, day as u32)
}
