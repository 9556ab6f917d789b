//! Shared fixtures for playbill-scrape integration tests

#![allow(dead_code)]

use axum::Router;
use chrono::NaiveDate;
use playbill_common::db::{init_memory_database, Company, NewCompany, Source, SourceKind};
use playbill_scrape::db::{companies, sources};
use playbill_scrape::fetch::{FetchSettings, PoliteFetcher};
use playbill_scrape::normalize::{DateRange, NormalizedEvent, TitleMatch};
use playbill_common::CanonicalWork;
use sqlx::SqlitePool;
use std::time::Duration;

pub async fn memory_pool() -> SqlitePool {
    init_memory_database().await.unwrap()
}

pub async fn create_company(pool: &SqlitePool, name: &str) -> Company {
    companies::create_company(
        pool,
        &NewCompany {
            name: name.to_string(),
            city: Some("Springfield".to_string()),
            region: Some("IL".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap()
}

pub async fn create_source(pool: &SqlitePool, company: &Company, url: &str, kind: SourceKind) -> Source {
    sources::create_source(pool, company.guid, url, kind, None).await.unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Normalized event with a fixed work and confidence
pub fn event(title: &str, work: CanonicalWork, confidence: f64, start: NaiveDate, end: NaiveDate) -> NormalizedEvent {
    NormalizedEvent::new(
        title,
        TitleMatch::new(work, confidence),
        DateRange::new(start, end).unwrap(),
        1.0,
    )
}

/// Fetch settings without spacing, for local servers
pub fn fast_settings() -> FetchSettings {
    FetchSettings {
        user_agent: "PlaybillTest/1.0".to_string(),
        min_interval: Duration::ZERO,
        timeout: Duration::from_secs(2),
        robots_timeout: Duration::from_secs(1),
        respect_robots: true,
    }
}

pub fn fast_fetcher() -> PoliteFetcher {
    PoliteFetcher::new(fast_settings()).unwrap()
}

/// Serve a router on an ephemeral local port; returns its base URL
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
