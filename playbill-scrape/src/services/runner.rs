//! Scrape Runner
//!
//! Drives one scrape pass: every enabled source is resolved to a collector,
//! collected, ingested and stamped with a status line.
//!
//! **Concurrency:** companies run concurrently (bounded by
//! `max_concurrent_companies`); the sources of one company run sequentially, which
//! keeps duplicate detection for that company race-free. A failing source becomes an
//! `ERROR:` status and never aborts other sources or companies.
//!
//! **Status lines:**
//! - `SUCCESS: N new, M updated (pub X→Y)`
//! - `REGRESSION: 0 vs N` when nothing was collected for a company that had published rows
//! - `ERROR: <message>`

use chrono::{Local, NaiveDate};
use futures::stream::{self, StreamExt};
use playbill_common::config::ScraperConfig;
use playbill_common::db::{ProductionStatus, Source};
use playbill_common::Result;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::collectors::{CollectContext, CollectTarget, CollectorRegistry, Extractors};
use crate::db::{productions, sources};
use crate::error::{ScrapeError, ScrapeResult};
use crate::fetch::PoliteFetcher;
use crate::normalize::Normalizer;
use crate::services::ingestion::{IngestOutcome, Ingestor};

/// Outcome of one source run
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    pub source_id: Uuid,
    pub company_id: Uuid,
    pub url: String,
    pub status: String,
    pub new: usize,
    pub updated: usize,
    pub rejected: usize,
    pub failed: bool,
}

/// Totals over one pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Sources processed (disabled sources excluded)
    pub sources: usize,
    pub new: usize,
    pub updated: usize,
    pub rejected: usize,
    pub failed: usize,
    pub regressions: usize,
}

impl RunSummary {
    fn add(&mut self, report: &SourceReport) {
        self.sources += 1;
        self.new += report.new;
        self.updated += report.updated;
        self.rejected += report.rejected;
        if report.failed {
            self.failed += 1;
        }
        if report.status.starts_with("REGRESSION") {
            self.regressions += 1;
        }
    }
}

/// Counts gathered while ingesting one collection
#[derive(Debug, Default)]
struct SourceRun {
    new: usize,
    updated: usize,
    rejected: usize,
    published_before: i64,
    published_after: i64,
    regression: bool,
    etag: Option<String>,
    last_modified: Option<String>,
}

impl SourceRun {
    fn status_line(&self) -> String {
        if self.regression {
            format!("REGRESSION: 0 vs {}", self.published_before)
        } else {
            format!(
                "SUCCESS: {} new, {} updated (pub {}→{})",
                self.new, self.updated, self.published_before, self.published_after
            )
        }
    }
}

/// Scrape pass over the sources stored in one database
pub struct ScrapeRunner {
    db: SqlitePool,
    fetcher: PoliteFetcher,
    extractors: Arc<Extractors>,
    registry: Arc<CollectorRegistry>,
    ingestor: Ingestor,
    max_concurrent_companies: usize,
    calendar_days: u32,
    today: Option<NaiveDate>,
}

impl ScrapeRunner {
    /// Runner with the default collectors and normalizer
    pub fn new(db: SqlitePool, config: &ScraperConfig) -> Result<Self> {
        let fetcher = PoliteFetcher::from_config(config)?;
        let extractors = Arc::new(Extractors::new(Arc::new(Normalizer::new())));

        Ok(Self {
            ingestor: Ingestor::new(db.clone()),
            db,
            fetcher,
            extractors,
            registry: Arc::new(CollectorRegistry::default()),
            max_concurrent_companies: config.max_concurrent_companies.max(1),
            calendar_days: config.calendar_days,
            today: None,
        })
    }

    pub fn with_registry(mut self, registry: CollectorRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_fetcher(mut self, fetcher: PoliteFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Fix the day used as "today" by calendar crawls
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Scrape every stored source
    pub async fn run_all(&self) -> Result<RunSummary> {
        let all = sources::list_sources(&self.db).await?;
        Ok(self.run_sources(all).await)
    }

    /// Scrape the given sources, grouped by company
    pub async fn run_sources(&self, sources: Vec<Source>) -> RunSummary {
        let mut by_company: BTreeMap<Uuid, Vec<Source>> = BTreeMap::new();
        for source in sources {
            by_company.entry(source.company_id).or_default().push(source);
        }

        info!(
            companies = by_company.len(),
            max_concurrent = self.max_concurrent_companies,
            "Starting scrape pass"
        );

        let reports: Vec<Vec<SourceReport>> = stream::iter(by_company)
            .map(|(company_id, sources)| self.run_company(company_id, sources))
            .buffer_unordered(self.max_concurrent_companies)
            .collect()
            .await;

        let mut summary = RunSummary::default();
        for report in reports.iter().flatten() {
            summary.add(report);
        }

        info!(
            sources = summary.sources,
            new = summary.new,
            updated = summary.updated,
            rejected = summary.rejected,
            failed = summary.failed,
            regressions = summary.regressions,
            "Scrape pass complete"
        );
        summary
    }

    async fn run_company(&self, company_id: Uuid, sources: Vec<Source>) -> Vec<SourceReport> {
        let mut reports = Vec::with_capacity(sources.len());
        for source in &sources {
            if !source.enabled {
                info!(company_id = %company_id, url = %source.url, "Skipping disabled source");
                continue;
            }
            reports.push(self.run_source(source).await);
        }
        reports
    }

    /// Scrape one source and record its status line
    pub async fn run_source(&self, source: &Source) -> SourceReport {
        let mut report = SourceReport {
            source_id: source.guid,
            company_id: source.company_id,
            url: source.url.clone(),
            status: String::new(),
            new: 0,
            updated: 0,
            rejected: 0,
            failed: false,
        };

        let (etag, last_modified) = match self.scrape_source(source).await {
            Ok(run) => {
                report.status = run.status_line();
                report.new = run.new;
                report.updated = run.updated;
                report.rejected = run.rejected;
                if run.regression {
                    warn!(url = %source.url, prior = run.published_before, "Source returned no events");
                } else {
                    info!(url = %source.url, status = %report.status, rejected = run.rejected, "Source scraped");
                }
                (run.etag, run.last_modified)
            }
            Err(e) => {
                report.status = format!("ERROR: {}", e);
                report.failed = true;
                warn!(url = %source.url, error = %e, "Source failed");
                (None, None)
            }
        };

        if let Err(e) =
            sources::record_source_run(&self.db, source.guid, &report.status, etag.as_deref(), last_modified.as_deref())
                .await
        {
            error!(source_id = %source.guid, error = %e, "Failed to record source run");
        }

        report
    }

    async fn scrape_source(&self, source: &Source) -> ScrapeResult<SourceRun> {
        let collector = self
            .registry
            .resolve(source)
            .ok_or_else(|| ScrapeError::NoCollector(source.url.clone()))?;

        let published_before =
            productions::count_productions(&self.db, source.company_id, ProductionStatus::Published).await?;

        let ctx = CollectContext::new(self.fetcher.clone(), Arc::clone(&self.extractors), CollectTarget::from(source))
            .with_calendar_days(self.calendar_days)
            .with_today(self.today.unwrap_or_else(|| Local::now().date_naive()));

        let collection = collector.collect(&ctx).await?;
        info!(
            url = %source.url,
            collector = collector.name(),
            events = collection.events.len(),
            not_modified = collection.not_modified,
            "Collection finished"
        );

        let mut run = SourceRun {
            published_before,
            regression: collection.events.is_empty() && !collection.not_modified && published_before >= 1,
            etag: collection.etag,
            last_modified: collection.last_modified,
            ..Default::default()
        };

        for event in &collection.events {
            match self.ingestor.ingest(event, source.company_id).await? {
                IngestOutcome::Stored { is_new: true, .. } => run.new += 1,
                IngestOutcome::Stored { is_new: false, .. } => run.updated += 1,
                IngestOutcome::Rejected(_) => run.rejected += 1,
            }
        }

        run.published_after =
            productions::count_productions(&self.db, source.company_id, ProductionStatus::Published).await?;
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines() {
        let run = SourceRun {
            new: 2,
            updated: 3,
            published_before: 4,
            published_after: 6,
            ..Default::default()
        };
        assert_eq!(run.status_line(), "SUCCESS: 2 new, 3 updated (pub 4→6)");

        let run = SourceRun {
            published_before: 5,
            published_after: 5,
            regression: true,
            ..Default::default()
        };
        assert_eq!(run.status_line(), "REGRESSION: 0 vs 5");
    }

    #[test]
    fn test_summary_counts_failures_and_regressions() {
        let base = SourceReport {
            source_id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            url: "https://example.org".to_string(),
            status: "SUCCESS: 1 new, 0 updated (pub 0→1)".to_string(),
            new: 1,
            updated: 0,
            rejected: 2,
            failed: false,
        };
        let failed = SourceReport {
            status: "ERROR: No scraper available".to_string(),
            new: 0,
            rejected: 0,
            failed: true,
            ..base.clone()
        };
        let regressed = SourceReport {
            status: "REGRESSION: 0 vs 3".to_string(),
            new: 0,
            rejected: 0,
            ..base.clone()
        };

        let mut summary = RunSummary::default();
        for report in [&base, &failed, &regressed] {
            summary.add(report);
        }
        assert_eq!(summary.sources, 3);
        assert_eq!(summary.new, 1);
        assert_eq!(summary.rejected, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.regressions, 1);
    }
}
