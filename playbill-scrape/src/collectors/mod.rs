//! Site Collectors
//!
//! A collector knows where a company publishes its season and which extraction
//! strategy fits. Per-site collectors live in [`sites`]; [`generic`] covers sources
//! of known kind on sites without a dedicated collector.
//!
//! Shared strategies:
//! - structured-first page: JSON-LD when present, markup heuristics otherwise
//! - calendar links: `.ics` / `webcal://` links discovered on a page
//! - day crawl: a per-day calendar page for the next N days
//! - performance merge: per-performance events folded into runs

pub mod generic;
pub mod sites;

use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDate};
use once_cell::sync::Lazy;
use playbill_common::db::{Source, SourceKind};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ScrapeError;
use crate::extractors::html::HTML_TRUST;
use crate::extractors::ics::ICS_TRUST;
use crate::extractors::jsonld::JSONLD_TRUST;
use crate::extractors::{FormatExtractor, HtmlExtractor, IcsExtractor, JsonLdExtractor};
use crate::fetch::{FetchResult, PoliteFetcher};
use crate::normalize::{NormalizedEvent, Normalizer};

pub use generic::{FeedCollector, PageCollector};
pub use sites::{default_site_collectors, SiteProfile, SiteProfileCollector};

/// Performances closer than this to a run join it
pub const MERGE_GAP_DAYS: i64 = 14;

static CALENDAR_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)href=["']([^"']*\.ics[^"']*)["']|webcal://([^\s"'<>]+)"#)
        .expect("calendar link regex must be valid")
});

/// The three format extractors sharing one normalizer
#[derive(Debug, Clone)]
pub struct Extractors {
    pub jsonld: JsonLdExtractor,
    pub ics: IcsExtractor,
    pub html: HtmlExtractor,
}

impl Extractors {
    pub fn new(normalizer: Arc<Normalizer>) -> Self {
        Self {
            jsonld: JsonLdExtractor::new(Arc::clone(&normalizer)),
            ics: IcsExtractor::new(Arc::clone(&normalizer)),
            html: HtmlExtractor::new(normalizer),
        }
    }
}

/// Source being collected, with validators from its previous run
#[derive(Debug, Clone, Default)]
pub struct CollectTarget {
    pub url: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl From<&Source> for CollectTarget {
    fn from(source: &Source) -> Self {
        Self {
            url: source.url.clone(),
            etag: source.etag.clone(),
            last_modified: source.last_modified.clone(),
        }
    }
}

/// Everything a collector needs for one run
#[derive(Debug, Clone)]
pub struct CollectContext {
    pub fetcher: PoliteFetcher,
    pub extractors: Arc<Extractors>,
    pub target: CollectTarget,
    /// Days covered by a calendar day crawl
    pub calendar_days: u32,
    /// First day of a calendar day crawl
    pub today: NaiveDate,
}

impl CollectContext {
    pub fn new(fetcher: PoliteFetcher, extractors: Arc<Extractors>, target: CollectTarget) -> Self {
        Self {
            fetcher,
            extractors,
            target,
            calendar_days: 21,
            today: Local::now().date_naive(),
        }
    }

    pub fn with_calendar_days(mut self, days: u32) -> Self {
        self.calendar_days = days;
        self
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Scheme and host of the target URL (`https://example.org`)
    pub fn origin(&self) -> Result<String, ScrapeError> {
        let url = Url::parse(&self.target.url)
            .map_err(|e| ScrapeError::InvalidSourceUrl(format!("{}: {}", self.target.url, e)))?;
        Ok(url.origin().ascii_serialization())
    }
}

/// Events from one collector run plus feed validators
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub events: Vec<NormalizedEvent>,
    /// Feed answered 304; events is empty and that is not a regression
    pub not_modified: bool,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl Collection {
    pub fn from_events(events: Vec<NormalizedEvent>) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }
}

/// Common collector contract
#[async_trait]
pub trait SiteCollector: Send + Sync {
    /// Collector name; a source's parser name may refer to it
    fn name(&self) -> &'static str;

    /// Registrable domain the collector serves (no `www.`)
    fn domain(&self) -> &'static str;

    async fn collect(&self, ctx: &CollectContext) -> Result<Collection, ScrapeError>;
}

/// Collector lookup by parser name, then host, then source kind
pub struct CollectorRegistry {
    sites: Vec<Arc<dyn SiteCollector>>,
    feed: Arc<dyn SiteCollector>,
    page: Arc<dyn SiteCollector>,
}

impl Default for CollectorRegistry {
    fn default() -> Self {
        Self::new(default_site_collectors())
    }
}

impl CollectorRegistry {
    pub fn new(sites: Vec<Arc<dyn SiteCollector>>) -> Self {
        Self {
            sites,
            feed: Arc::new(FeedCollector),
            page: Arc::new(PageCollector),
        }
    }

    /// Collector for a source
    ///
    /// A parser name that matches no site collector and is not the source's own
    /// host resolves to nothing.
    pub fn resolve(&self, source: &Source) -> Option<Arc<dyn SiteCollector>> {
        let host = Url::parse(&source.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_ascii_lowercase()));

        if let Some(parser) = source.parser_name.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            let parser = parser.trim_start_matches("www.").to_ascii_lowercase();
            if let Some(found) = self.sites.iter().find(|c| c.name() == parser || c.domain() == parser) {
                return Some(Arc::clone(found));
            }
            if host.as_deref() != Some(parser.as_str()) {
                return None;
            }
        }

        let host = host?;
        if let Some(found) = self
            .sites
            .iter()
            .find(|c| host == c.domain() || host.ends_with(&format!(".{}", c.domain())))
        {
            return Some(Arc::clone(found));
        }

        match source.kind {
            SourceKind::Ics => Some(Arc::clone(&self.feed)),
            SourceKind::JsonLd | SourceKind::Html => Some(Arc::clone(&self.page)),
        }
    }

    pub fn site_collectors(&self) -> &[Arc<dyn SiteCollector>] {
        &self.sites
    }
}

/// Error for a fetch that did not answer 200
pub(crate) fn fetch_error(url: &str, result: &FetchResult) -> ScrapeError {
    ScrapeError::Fetch {
        url: url.to_string(),
        status: result.status,
        message: result
            .error
            .clone()
            .unwrap_or_else(|| format!("HTTP {}", result.status)),
    }
}

/// Fetch a page; JSON-LD events when present, else markup heuristics
///
/// A non-200 answer yields no events from that URL.
pub async fn structured_first(ctx: &CollectContext, url: &str) -> Vec<NormalizedEvent> {
    let result = ctx.fetcher.fetch(url).await;
    if !result.is_ok() {
        debug!(url = %url, status = result.status, error = ?result.error, "Page unavailable");
        return Vec::new();
    }
    page_events(ctx, url, &result.content)
}

/// Structured-first extraction of already fetched content
pub fn page_events(ctx: &CollectContext, url: &str, content: &str) -> Vec<NormalizedEvent> {
    let extractors = &ctx.extractors;

    let structured = extractors.jsonld.extract(content);
    if !structured.is_empty() {
        info!(url = %url, count = structured.len(), "Structured events found");
        return extractors.jsonld.normalize(&structured, JSONLD_TRUST);
    }

    let markup = extractors.html.extract_with_base(content, Some(url));
    if !markup.is_empty() {
        info!(url = %url, count = markup.len(), "Markup events found");
    }
    extractors.html.normalize(&markup, HTML_TRUST)
}

/// `.ics` hrefs and `webcal://` links, resolved and de-duplicated in page order
pub fn calendar_links(content: &str, base_url: &str) -> Vec<String> {
    let base = Url::parse(base_url).ok();
    let mut links: Vec<String> = Vec::new();

    for caps in CALENDAR_LINK.captures_iter(content) {
        let raw = match (caps.get(1), caps.get(2)) {
            (Some(href), _) => href.as_str().to_string(),
            (None, Some(webcal)) => format!("https://{}", webcal.as_str()),
            (None, None) => continue,
        };
        let raw = match raw.strip_prefix("webcal://") {
            Some(rest) => format!("https://{}", rest),
            None => raw,
        };

        let resolved = match &base {
            Some(base) => base.join(&raw).map(|u| u.to_string()),
            None => Url::parse(&raw).map(|u| u.to_string()),
        };
        match resolved {
            Ok(link) if !links.contains(&link) => links.push(link),
            Ok(_) => {}
            Err(e) => debug!(link = %raw, error = %e, "Skipping unusable calendar link"),
        }
    }

    links
}

/// Fetch and parse every calendar link
pub async fn collect_calendar_links(ctx: &CollectContext, links: &[String]) -> Vec<NormalizedEvent> {
    let mut events = Vec::new();
    for link in links {
        let result = ctx.fetcher.fetch(link).await;
        if !result.is_ok() {
            warn!(url = %link, status = result.status, "Calendar link unavailable");
            continue;
        }
        let found = ctx.extractors.ics.extract(&result.content);
        info!(url = %link, count = found.len(), "Calendar events found");
        events.extend(ctx.extractors.ics.normalize(&found, ICS_TRUST));
    }
    events
}

/// Fetch a per-day calendar page for each of the next `calendar_days` days
///
/// `template` carries a `{date}` placeholder filled with `YYYY-MM-DD`. The
/// per-day performances are merged into runs.
pub async fn day_crawl(ctx: &CollectContext, template: &str) -> Vec<NormalizedEvent> {
    let mut performances = Vec::new();
    for offset in 0..ctx.calendar_days {
        let day = ctx.today + Duration::days(i64::from(offset));
        let url = template.replace("{date}", &day.format("%Y-%m-%d").to_string());
        performances.extend(structured_first(ctx, &url).await);
    }
    debug!(days = ctx.calendar_days, performances = performances.len(), "Day crawl finished");
    merge_performances(performances)
}

/// Fold performances of the same show into runs
///
/// Events share a run when work and lowercase title match and the event starts
/// within [`MERGE_GAP_DAYS`] of the run's current span. A run keeps the minimum
/// start, maximum end, every performance date and the lowest confidence.
pub fn merge_performances(mut events: Vec<NormalizedEvent>) -> Vec<NormalizedEvent> {
    events.sort_by_key(|e| e.start_date);

    let gap = Duration::days(MERGE_GAP_DAYS);
    let mut runs: Vec<NormalizedEvent> = Vec::new();
    let mut open: HashMap<(String, String), usize> = HashMap::new();

    for event in events {
        let key = (event.work.code().to_string(), event.title_raw.trim().to_lowercase());
        let dates = performance_dates(&event);

        if let Some(&index) = open.get(&key) {
            let run = &mut runs[index];
            if event.start_date <= run.end_date + gap {
                run.extend_to(event.dates());
                run.confidence = run.confidence.min(event.confidence);
                run.price_min = min_option(run.price_min, event.price_min);
                run.price_max = max_option(run.price_max, event.price_max);
                if run.event_url.is_none() {
                    run.event_url = event.event_url;
                }
                let merged = run.perf_dates.get_or_insert_with(Vec::new);
                merged.extend(dates);
                merged.sort();
                merged.dedup();
                continue;
            }
        }

        open.insert(key, runs.len());
        runs.push(event.with_perf_dates(dates));
    }

    runs
}

fn performance_dates(event: &NormalizedEvent) -> Vec<NaiveDate> {
    match &event.perf_dates {
        Some(dates) if !dates.is_empty() => dates.clone(),
        _ => vec![event.start_date],
    }
}

fn min_option(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_option(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{DateRange, TitleMatch};
    use playbill_common::CanonicalWork;
    use uuid::Uuid;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn perf(title: &str, work: CanonicalWork, on: NaiveDate, confidence: f64) -> NormalizedEvent {
        NormalizedEvent::new(title, TitleMatch::new(work, confidence), DateRange::single(on), 1.0)
    }

    fn source(url: &str, kind: SourceKind, parser: Option<&str>) -> Source {
        Source {
            guid: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            url: url.to_string(),
            kind,
            parser_name: parser.map(str::to_string),
            enabled: true,
            last_run_at: None,
            last_status: None,
            etag: None,
            last_modified: None,
        }
    }

    #[test]
    fn test_merge_collapses_close_performances() {
        let events = vec![
            perf("Hamlet", CanonicalWork::Hamlet, day(3, 10), 0.9),
            perf("Hamlet", CanonicalWork::Hamlet, day(3, 1), 0.95),
            perf("HAMLET", CanonicalWork::Hamlet, day(3, 20), 0.92),
            perf("Hamlet", CanonicalWork::Hamlet, day(6, 1), 0.95),
            perf("Macbeth", CanonicalWork::Macbeth, day(3, 5), 0.95),
        ];

        let runs = merge_performances(events);
        assert_eq!(runs.len(), 3);

        let spring = &runs[0];
        assert_eq!(spring.work, CanonicalWork::Hamlet);
        assert_eq!((spring.start_date, spring.end_date), (day(3, 1), day(3, 20)));
        assert_eq!(spring.perf_dates.as_ref().unwrap(), &vec![day(3, 1), day(3, 10), day(3, 20)]);
        assert_eq!(spring.confidence, 0.9);

        let summer = runs.iter().find(|r| r.start_date == day(6, 1)).unwrap();
        assert_eq!(summer.perf_dates.as_ref().unwrap(), &vec![day(6, 1)]);
    }

    #[test]
    fn test_calendar_links_resolved_and_deduplicated() {
        let page = r#"<a href="/season.ics">Add</a>
<a href='https://cdn.example.org/feed.ics?v=2'>Feed</a>
<a href="/season.ics">Again</a>
<a href="webcal://calendar.example.org/plays">Subscribe</a>"#;

        let links = calendar_links(page, "https://festival.example.org/events");
        assert_eq!(
            links,
            vec![
                "https://festival.example.org/season.ics".to_string(),
                "https://cdn.example.org/feed.ics?v=2".to_string(),
                "https://calendar.example.org/plays".to_string(),
            ]
        );
    }

    #[test]
    fn test_registry_resolution_order() {
        let registry = CollectorRegistry::default();

        let by_parser = registry.resolve(&source("https://mirror.example.org/", SourceKind::Html, Some("asf"))).unwrap();
        assert_eq!(by_parser.name(), "asf");

        let by_host = registry.resolve(&source("https://www.bard.org/", SourceKind::Html, None)).unwrap();
        assert_eq!(by_host.domain(), "bard.org");

        let feed = registry.resolve(&source("https://other.example.org/a.ics", SourceKind::Ics, None)).unwrap();
        assert_eq!(feed.name(), "feed");

        let page = registry.resolve(&source("https://other.example.org/", SourceKind::JsonLd, None)).unwrap();
        assert_eq!(page.name(), "page");

        let own_host = registry
            .resolve(&source("https://www.other.example.org/", SourceKind::Html, Some("other.example.org")))
            .unwrap();
        assert_eq!(own_host.name(), "page");

        assert!(registry
            .resolve(&source("https://americanshakespearecenter.com/", SourceKind::Html, Some("unknown-parser")))
            .is_none());
    }
}
