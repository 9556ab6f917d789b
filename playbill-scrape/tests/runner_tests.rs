//! Scrape runner tests: collectors, ingestion and status lines end to end

mod helpers;

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use helpers::{create_company, create_source, date, event, memory_pool, spawn_server};
use playbill_common::config::ScraperConfig;
use playbill_common::db::{ProductionStatus, SourceKind};
use playbill_common::CanonicalWork;
use playbill_scrape::db::{productions, sources};
use playbill_scrape::services::ingestion::Ingestor;
use playbill_scrape::services::ScrapeRunner;
use sqlx::SqlitePool;

const FEED_ETAG: &str = "\"spring-2030\"";

const FEED: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
SUMMARY:Romeo and Juliet\r\n\
DTSTART;VALUE=DATE:20300301\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
SUMMARY:Romeo and Juliet\r\n\
DTSTART;VALUE=DATE:20300305\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
SUMMARY:Hamlet\r\n\
DTSTART:20300310T193000\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

async fn feed(headers: HeaderMap) -> impl IntoResponse {
    let cached = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == FEED_ETAG);

    if cached {
        (StatusCode::NOT_MODIFIED, [(header::ETAG, FEED_ETAG)], String::new())
    } else {
        (StatusCode::OK, [(header::ETAG, FEED_ETAG)], FEED.to_string())
    }
}

fn router() -> Router {
    Router::new()
        .route("/season.ics", get(feed))
        .route("/empty", get(|| async { "<html><body><p>Season announcement soon</p></body></html>" }))
}

fn runner(pool: &SqlitePool) -> ScrapeRunner {
    let config = ScraperConfig {
        min_interval_ms: 0,
        timeout_ms: 2_000,
        robots_timeout_ms: 1_000,
        ..Default::default()
    };
    ScrapeRunner::new(pool.clone(), &config).unwrap()
}

#[tokio::test]
async fn test_feed_source_end_to_end_then_not_modified() {
    let base = spawn_server(router()).await;
    let pool = memory_pool().await;
    let company = create_company(&pool, "Greenway Shakespeare").await;
    let source = create_source(&pool, &company, &format!("{}/season.ics", base), SourceKind::Ics).await;
    let runner = runner(&pool);

    let first = runner.run_all().await.unwrap();
    assert_eq!(first.sources, 1);
    assert_eq!(first.new, 2);
    assert_eq!(first.failed, 0);

    let stored = sources::get_source(&pool, source.guid).await.unwrap();
    assert_eq!(stored.last_status.as_deref(), Some("SUCCESS: 2 new, 0 updated (pub 0→2)"));
    assert_eq!(stored.etag.as_deref(), Some(FEED_ETAG));
    assert!(stored.last_run_at.is_some());

    // Two performances merged into one run
    let published = productions::list_productions_by_status(&pool, ProductionStatus::Published).await.unwrap();
    assert_eq!(published.len(), 2);
    let romeo = published
        .iter()
        .find(|p| p.work == CanonicalWork::RomeoAndJuliet)
        .unwrap();
    assert_eq!(romeo.start_date, date(2030, 3, 1));
    assert_eq!(romeo.end_date, date(2030, 3, 5));
    assert!(published.iter().any(|p| p.work == CanonicalWork::Hamlet));
    assert_eq!(productions::count_productions(&pool, company.guid, ProductionStatus::Review).await.unwrap(), 0);

    let second = runner.run_all().await.unwrap();
    assert_eq!(second.new, 0);
    assert_eq!(second.regressions, 0);
    let stored = sources::get_source(&pool, source.guid).await.unwrap();
    assert_eq!(stored.last_status.as_deref(), Some("SUCCESS: 0 new, 0 updated (pub 2→2)"));
}

#[tokio::test]
async fn test_empty_page_after_published_rows_is_regression() {
    let base = spawn_server(router()).await;
    let pool = memory_pool().await;
    let company = create_company(&pool, "Greenway Shakespeare").await;
    let source = create_source(&pool, &company, &format!("{}/empty", base), SourceKind::Html).await;

    Ingestor::new(pool.clone())
        .ingest(
            &event("Othello", CanonicalWork::Othello, 0.9, date(2030, 5, 1), date(2030, 5, 9)),
            company.guid,
        )
        .await
        .unwrap();

    let summary = runner(&pool).run_all().await.unwrap();
    assert_eq!(summary.regressions, 1);

    let stored = sources::get_source(&pool, source.guid).await.unwrap();
    assert_eq!(stored.last_status.as_deref(), Some("REGRESSION: 0 vs 1"));
}

#[tokio::test]
async fn test_failures_are_recorded_per_source() {
    let base = spawn_server(router()).await;
    let pool = memory_pool().await;
    let unknown = create_company(&pool, "Unknown Parser Co").await;
    let missing = create_company(&pool, "Missing Feed Co").await;
    let healthy = create_company(&pool, "Healthy Co").await;

    let unresolved = sources::create_source(
        &pool,
        unknown.guid,
        &format!("{}/empty", base),
        SourceKind::Html,
        Some("no-such-collector"),
    )
    .await
    .unwrap();
    let broken = create_source(&pool, &missing, &format!("{}/missing.ics", base), SourceKind::Ics).await;
    let working = create_source(&pool, &healthy, &format!("{}/season.ics", base), SourceKind::Ics).await;

    let summary = runner(&pool).run_all().await.unwrap();
    assert_eq!(summary.sources, 3);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.new, 2);

    let status = |guid| {
        let pool = pool.clone();
        async move { sources::get_source(&pool, guid).await.unwrap().last_status.unwrap_or_default() }
    };
    assert_eq!(status(unresolved.guid).await, "ERROR: No scraper available");
    assert!(status(broken.guid).await.starts_with("ERROR: Fetch failed"));
    assert!(status(working.guid).await.starts_with("SUCCESS: 2 new"));
}

#[tokio::test]
async fn test_disabled_sources_are_skipped() {
    let base = spawn_server(router()).await;
    let pool = memory_pool().await;
    let company = create_company(&pool, "Greenway Shakespeare").await;
    let source = create_source(&pool, &company, &format!("{}/season.ics", base), SourceKind::Ics).await;
    sources::set_source_enabled(&pool, source.guid, false).await.unwrap();

    let summary = runner(&pool).run_all().await.unwrap();
    assert_eq!(summary.sources, 0);

    let stored = sources::get_source(&pool, source.guid).await.unwrap();
    assert!(stored.last_run_at.is_none());
    assert!(stored.last_status.is_none());
}
