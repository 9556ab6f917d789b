//! Per-site collectors
//!
//! Every supported company follows the same shape: optionally the home page
//! (structured data and calendar links), then a list of likely season pages, then
//! optionally a day-by-day performance calendar. A [`SiteProfile`] describes which
//! steps apply; [`SiteProfileCollector`] runs them against the source's origin.

use async_trait::async_trait;
use chrono::Datelike;
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    calendar_links, collect_calendar_links, day_crawl, fetch_error, structured_first, CollectContext, Collection,
    SiteCollector,
};
use crate::error::ScrapeError;
use crate::extractors::jsonld::JSONLD_TRUST;
use crate::extractors::FormatExtractor;

/// Where a company publishes its season
#[derive(Debug, Clone, Copy)]
pub struct SiteProfile {
    pub name: &'static str,
    pub domain: &'static str,
    pub label: &'static str,
    /// Home page first; a failing home page fails the run
    pub home_page: bool,
    /// Follow `.ics` / `webcal://` links found on the home page
    pub calendar_links: bool,
    /// Paths tried structured-first; `{season}` expands to e.g. `2025-2026`
    pub pages: &'static [&'static str],
    /// Per-day calendar path with a `{date}` placeholder
    pub day_calendar: Option<&'static str>,
}

pub const ALABAMA_SHAKESPEARE_FESTIVAL: SiteProfile = SiteProfile {
    name: "asf",
    domain: "asf.net",
    label: "Alabama Shakespeare Festival",
    home_page: true,
    calendar_links: true,
    pages: &["/events", "/calendar", "/shows", "/season", "/whats-on"],
    day_calendar: None,
};

pub const UTAH_SHAKESPEARE_FESTIVAL: SiteProfile = SiteProfile {
    name: "usf",
    domain: "bard.org",
    label: "Utah Shakespeare Festival",
    home_page: true,
    calendar_links: false,
    pages: &[
        "/tickets",
        "/calendar",
        "/shows",
        "/season",
        "/whats-on",
        "/events",
        "/plays",
        "/current-season",
    ],
    day_calendar: None,
};

pub const OREGON_SHAKESPEARE_FESTIVAL: SiteProfile = SiteProfile {
    name: "osf",
    domain: "osfashland.org",
    label: "Oregon Shakespeare Festival",
    home_page: true,
    calendar_links: false,
    pages: &["/plays-events", "/calendar", "/shows", "/season", "/whats-on", "/events", "/tickets"],
    day_calendar: None,
};

pub const SHAKESPEARE_THEATRE_COMPANY: SiteProfile = SiteProfile {
    name: "stc",
    domain: "shakespearetheatre.org",
    label: "Shakespeare Theatre Company",
    home_page: true,
    calendar_links: false,
    pages: &[
        "/shows-tickets",
        "/calendar",
        "/shows",
        "/season",
        "/whats-on",
        "/events",
        "/tickets",
        "/current-season",
    ],
    day_calendar: None,
};

pub const GUTHRIE_THEATER: SiteProfile = SiteProfile {
    name: "guthrie",
    domain: "guthrietheater.org",
    label: "Guthrie Theater",
    home_page: false,
    calendar_links: false,
    pages: &[
        "/shows-and-tickets/performance-calendar/",
        "/shows-and-tickets/{season}-season/",
        "/shows-and-tickets/",
        "/events",
        "/calendar",
    ],
    day_calendar: Some("/shows-and-tickets/performance-calendar/?date={date}"),
};

pub const SITE_PROFILES: [SiteProfile; 5] = [
    ALABAMA_SHAKESPEARE_FESTIVAL,
    UTAH_SHAKESPEARE_FESTIVAL,
    OREGON_SHAKESPEARE_FESTIVAL,
    SHAKESPEARE_THEATRE_COMPANY,
    GUTHRIE_THEATER,
];

/// One collector per built-in profile
pub fn default_site_collectors() -> Vec<Arc<dyn SiteCollector>> {
    SITE_PROFILES
        .iter()
        .map(|profile| Arc::new(SiteProfileCollector::new(*profile)) as Arc<dyn SiteCollector>)
        .collect()
}

/// Runs a [`SiteProfile`]
#[derive(Debug, Clone)]
pub struct SiteProfileCollector {
    profile: SiteProfile,
}

impl SiteProfileCollector {
    pub fn new(profile: SiteProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }
}

#[async_trait]
impl SiteCollector for SiteProfileCollector {
    fn name(&self) -> &'static str {
        self.profile.name
    }

    fn domain(&self) -> &'static str {
        self.profile.domain
    }

    async fn collect(&self, ctx: &CollectContext) -> Result<Collection, ScrapeError> {
        let profile = &self.profile;
        let origin = ctx.origin()?;
        let mut events = Vec::new();

        info!(collector = profile.name, site = profile.label, origin = %origin, "Collecting");

        if profile.home_page {
            let home = ctx.fetcher.fetch(&origin).await;
            if !home.is_ok() {
                warn!(
                    collector = profile.name,
                    status = home.status,
                    error = ?home.error,
                    "Home page unavailable"
                );
                return Err(fetch_error(&origin, &home));
            }

            // Home page: structured data only
            let structured = ctx.extractors.jsonld.extract(&home.content);
            events.extend(ctx.extractors.jsonld.normalize(&structured, JSONLD_TRUST));

            if profile.calendar_links {
                let links = calendar_links(&home.content, &origin);
                events.extend(collect_calendar_links(ctx, &links).await);
            }
        }

        let season = season_label(ctx.today);
        for path in profile.pages {
            let url = format!("{}{}", origin, path.replace("{season}", &season));
            events.extend(structured_first(ctx, &url).await);
        }

        if let Some(template) = profile.day_calendar {
            events.extend(day_crawl(ctx, &format!("{}{}", origin, template)).await);
        }

        info!(collector = profile.name, count = events.len(), "Collection finished");
        Ok(Collection::from_events(events))
    }
}

/// Season spanning the given day: seasons turn over in July
fn season_label(today: chrono::NaiveDate) -> String {
    let first_year = if today.month() >= 7 { today.year() } else { today.year() - 1 };
    format!("{}-{}", first_year, first_year + 1)
}
