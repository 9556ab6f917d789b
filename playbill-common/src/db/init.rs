//! Database initialization
//!
//! Creates the database on first run and brings the schema up idempotently
//! (`CREATE TABLE IF NOT EXISTS`), so opening an existing file is always safe.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (or create) the database file and ensure the schema exists
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL lets catalog reads proceed while a scrape run writes
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// In-memory database with the full schema
///
/// Limited to one connection that never expires, since every SQLite memory
/// connection is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table and index
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_companies_table(pool).await?;
    create_sources_table(pool).await?;
    create_productions_table(pool).await?;
    create_group_actions_table(pool).await?;
    Ok(())
}

pub async fn create_companies_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS companies (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            website TEXT,
            city TEXT,
            region TEXT,
            country TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_sources_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            guid TEXT PRIMARY KEY,
            company_id TEXT NOT NULL REFERENCES companies(guid) ON DELETE CASCADE,
            url TEXT NOT NULL,
            kind TEXT NOT NULL,
            parser_name TEXT,
            enabled INTEGER NOT NULL DEFAULT 1,
            last_run_at TEXT,
            last_status TEXT,
            etag TEXT,
            last_modified TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (company_id, url),
            CHECK (kind IN ('ICS', 'JSONLD', 'HTML'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sources_company ON sources(company_id)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_productions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS productions (
            guid TEXT PRIMARY KEY,
            company_id TEXT NOT NULL REFERENCES companies(guid) ON DELETE CASCADE,
            canonical_work TEXT NOT NULL,
            title_raw TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            perf_dates TEXT,
            event_url TEXT,
            price_min INTEGER,
            price_max INTEGER,
            notes TEXT,
            status TEXT NOT NULL DEFAULT 'REVIEW',
            confidence REAL NOT NULL,
            last_seen_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (status IN ('REVIEW', 'PUBLISHED', 'ARCHIVED')),
            CHECK (confidence >= 0.0 AND confidence <= 1.0),
            CHECK (start_date <= end_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_productions_group ON productions(company_id, canonical_work, status)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_productions_status_end ON productions(status, end_date)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_group_actions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS group_actions (
            guid TEXT PRIMARY KEY,
            company_id TEXT NOT NULL REFERENCES companies(guid) ON DELETE CASCADE,
            canonical_work TEXT NOT NULL,
            action TEXT NOT NULL,
            from_status TEXT NOT NULL,
            to_status TEXT NOT NULL,
            production_ids TEXT NOT NULL,
            committed_at TEXT NOT NULL,
            undone_at TEXT,
            CHECK (action IN ('APPROVE', 'REJECT', 'REVERT'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_group_actions_group ON group_actions(company_id, canonical_work, committed_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
