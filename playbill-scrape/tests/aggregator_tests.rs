//! Review grouping and public catalog tests

mod helpers;

use helpers::{create_company, create_source, date, event, memory_pool};
use playbill_common::db::SourceKind;
use playbill_common::CanonicalWork;
use playbill_scrape::db::sources;
use playbill_scrape::normalize::NormalizedEvent;
use playbill_scrape::services::ingestion::Ingestor;
use playbill_scrape::services::{Aggregator, CatalogFilter};
use sqlx::SqlitePool;
use uuid::Uuid;

async fn ingest_all(pool: &SqlitePool, company_id: Uuid, events: &[NormalizedEvent]) {
    let ingestor = Ingestor::new(pool.clone());
    for e in events {
        ingestor.ingest(e, company_id).await.unwrap();
    }
}

#[tokio::test]
async fn test_review_groups_summarize_each_company_and_work() {
    let pool = memory_pool().await;
    let zeta = create_company(&pool, "Zeta Players").await;
    let alpha = create_company(&pool, "Alpha Theatre").await;

    ingest_all(
        &pool,
        zeta.guid,
        &[
            event("Hamlet (matinee)", CanonicalWork::Hamlet, 0.75, date(2030, 3, 1), date(2030, 3, 5)),
            event("Hamlet (evening)", CanonicalWork::Hamlet, 0.8, date(2030, 4, 1), date(2030, 4, 9)),
        ],
    )
    .await;
    ingest_all(
        &pool,
        alpha.guid,
        &[
            event("Macbeth", CanonicalWork::Macbeth, 0.8, date(2030, 5, 1), date(2030, 5, 3)),
            event("Hamlet", CanonicalWork::Hamlet, 0.72, date(2030, 6, 1), date(2030, 6, 3)),
            // Published outright, so not part of any review group
            event("Othello", CanonicalWork::Othello, 0.9, date(2030, 6, 1), date(2030, 6, 3)),
        ],
    )
    .await;

    let groups = Aggregator::new(pool.clone()).review_groups().await.unwrap();
    let keys: Vec<(&str, CanonicalWork)> = groups.iter().map(|g| (g.company_name.as_str(), g.work)).collect();
    assert_eq!(
        keys,
        vec![
            ("Alpha Theatre", CanonicalWork::Hamlet),
            ("Alpha Theatre", CanonicalWork::Macbeth),
            ("Zeta Players", CanonicalWork::Hamlet),
        ]
    );

    let zeta_hamlet = &groups[2];
    assert_eq!(zeta_hamlet.count, 2);
    assert_eq!(zeta_hamlet.start_date, date(2030, 3, 1));
    assert_eq!(zeta_hamlet.end_date, date(2030, 4, 9));
    assert_eq!(zeta_hamlet.sample_titles.len(), 2);
    assert_eq!(zeta_hamlet.confidence_min, 0.75);
    assert_eq!(zeta_hamlet.confidence_max, 0.8);
}

#[tokio::test]
async fn test_catalog_picks_clean_short_title_and_drops_unclean_groups() {
    let pool = memory_pool().await;
    let company = create_company(&pool, "Harbor Shakespeare").await;

    ingest_all(
        &pool,
        company.guid,
        &[
            event("Hamlet, Prince of Denmark", CanonicalWork::Hamlet, 0.9, date(2030, 2, 1), date(2030, 2, 10)),
            event("Hamlet", CanonicalWork::Hamlet, 0.9, date(2030, 3, 1), date(2030, 3, 10)),
            event("Macbeth Auditions", CanonicalWork::Macbeth, 0.9, date(2030, 2, 1), date(2030, 2, 2)),
            // Ended before "today"
            event("Othello", CanonicalWork::Othello, 0.9, date(2029, 6, 1), date(2029, 6, 5)),
        ],
    )
    .await;

    let rows = Aggregator::new(pool.clone())
        .public_catalog(date(2030, 1, 1), &CatalogFilter::default())
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    let hamlet = &rows[0];
    assert_eq!(hamlet.work, CanonicalWork::Hamlet);
    assert_eq!(hamlet.title, "Hamlet");
    assert_eq!(hamlet.start_date, date(2030, 2, 1));
    assert_eq!(hamlet.end_date, date(2030, 3, 10));
    assert_eq!(hamlet.count, 2);
    assert_eq!(hamlet.city.as_deref(), Some("Springfield"));
}

#[tokio::test]
async fn test_catalog_filters() {
    let pool = memory_pool().await;
    let harbor = create_company(&pool, "Harbor Shakespeare").await;
    let valley = create_company(&pool, "Valley Rep").await;

    ingest_all(
        &pool,
        harbor.guid,
        &[
            event("Hamlet", CanonicalWork::Hamlet, 0.9, date(2030, 2, 1), date(2030, 2, 10)),
            event("Othello", CanonicalWork::Othello, 0.9, date(2030, 8, 1), date(2030, 8, 10)),
        ],
    )
    .await;
    ingest_all(
        &pool,
        valley.guid,
        &[event("Hamlet", CanonicalWork::Hamlet, 0.9, date(2030, 5, 1), date(2030, 5, 10))],
    )
    .await;

    let aggregator = Aggregator::new(pool.clone());
    let today = date(2030, 1, 1);

    let by_work = CatalogFilter {
        work: Some(CanonicalWork::Hamlet),
        ..Default::default()
    };
    assert_eq!(aggregator.public_catalog(today, &by_work).await.unwrap().len(), 2);

    let by_company = CatalogFilter {
        company_id: Some(valley.guid),
        ..Default::default()
    };
    let rows = aggregator.public_catalog(today, &by_company).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].company_name, "Valley Rep");

    let by_query = CatalogFilter {
        query: Some("harbor".to_string()),
        ..Default::default()
    };
    assert_eq!(aggregator.public_catalog(today, &by_query).await.unwrap().len(), 2);

    let window = CatalogFilter {
        from: Some(date(2030, 4, 1)),
        until: Some(date(2030, 6, 30)),
        ..Default::default()
    };
    let rows = aggregator.public_catalog(today, &window).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].start_date, date(2030, 5, 1));
}

#[tokio::test]
async fn test_catalog_staleness_hides_companies_without_recent_runs() {
    let pool = memory_pool().await;
    let scraped = create_company(&pool, "Fresh Company").await;
    let idle = create_company(&pool, "Idle Company").await;
    let source = create_source(&pool, &scraped, "https://fresh.example.org", SourceKind::Html).await;
    let failing = create_source(&pool, &idle, "https://idle.example.org", SourceKind::Html).await;

    for company in [&scraped, &idle] {
        ingest_all(
            &pool,
            company.guid,
            &[event("Hamlet", CanonicalWork::Hamlet, 0.9, date(2030, 2, 1), date(2030, 2, 10))],
        )
        .await;
    }
    sources::record_source_run(&pool, source.guid, "SUCCESS: 1 new, 0 updated (pub 0→1)", None, None)
        .await
        .unwrap();
    // A failed run does not make a company fresh
    sources::record_source_run(&pool, failing.guid, "ERROR: No scraper available", None, None)
        .await
        .unwrap();

    let aggregator = Aggregator::new(pool.clone());
    let today = date(2030, 1, 1);

    let all = aggregator.public_catalog(today, &CatalogFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);

    let fresh_only = CatalogFilter {
        stale_days: Some(14),
        ..Default::default()
    };
    let rows = aggregator.public_catalog(today, &fresh_only).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].company_name, "Fresh Company");
}
