//! Generic collectors, chosen by source kind when no site collector applies

use async_trait::async_trait;
use tracing::info;

use super::{fetch_error, merge_performances, page_events, CollectContext, Collection, SiteCollector};
use crate::error::ScrapeError;
use crate::extractors::ics::ICS_TRUST;
use crate::extractors::FormatExtractor;

/// Calendar feed at the source URL
///
/// Fetched conditionally with the validators from the previous run. Feeds list
/// single performances, so events are merged into runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedCollector;

#[async_trait]
impl SiteCollector for FeedCollector {
    fn name(&self) -> &'static str {
        "feed"
    }

    fn domain(&self) -> &'static str {
        ""
    }

    async fn collect(&self, ctx: &CollectContext) -> Result<Collection, ScrapeError> {
        let target = &ctx.target;
        let result = ctx
            .fetcher
            .fetch_conditional(&target.url, target.etag.as_deref(), target.last_modified.as_deref())
            .await;

        if result.is_not_modified() {
            info!(url = %target.url, "Feed not modified");
            return Ok(Collection {
                events: Vec::new(),
                not_modified: true,
                etag: result.etag,
                last_modified: result.last_modified,
            });
        }
        if !result.is_ok() {
            return Err(fetch_error(&target.url, &result));
        }

        let extracted = ctx.extractors.ics.extract(&result.content);
        let events = merge_performances(ctx.extractors.ics.normalize(&extracted, ICS_TRUST));
        info!(url = %target.url, performances = extracted.len(), runs = events.len(), "Feed collected");

        Ok(Collection {
            events,
            not_modified: false,
            etag: result.etag,
            last_modified: result.last_modified,
        })
    }
}

/// Single page at the source URL, structured-first
#[derive(Debug, Clone, Copy, Default)]
pub struct PageCollector;

#[async_trait]
impl SiteCollector for PageCollector {
    fn name(&self) -> &'static str {
        "page"
    }

    fn domain(&self) -> &'static str {
        ""
    }

    async fn collect(&self, ctx: &CollectContext) -> Result<Collection, ScrapeError> {
        let url = &ctx.target.url;
        let result = ctx.fetcher.fetch(url).await;
        if !result.is_ok() {
            return Err(fetch_error(url, &result));
        }

        let events = page_events(ctx, url, &result.content);
        info!(url = %url, count = events.len(), "Page collected");
        Ok(Collection::from_events(events))
    }
}
