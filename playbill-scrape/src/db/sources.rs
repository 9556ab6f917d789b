//! Source persistence

use chrono::{DateTime, Utc};
use playbill_common::db::{parse_stored_timestamp, Source, SourceKind};
use playbill_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

use super::{now_timestamp, parse_guid};

const SOURCE_COLUMNS: &str =
    "guid, company_id, url, kind, parser_name, enabled, last_run_at, last_status, etag, last_modified";

/// Insert an enabled source for a company; (company, url) must be unique
pub async fn create_source(
    pool: &SqlitePool,
    company_id: Uuid,
    url: &str,
    kind: SourceKind,
    parser_name: Option<&str>,
) -> Result<Source> {
    if find_source(pool, company_id, url).await?.is_some() {
        return Err(Error::Conflict(format!("Source {} already exists for company {}", url, company_id)));
    }

    let guid = Uuid::new_v4();
    let now = now_timestamp();
    sqlx::query(
        r#"
        INSERT INTO sources (guid, company_id, url, kind, parser_name, enabled, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(guid.to_string())
    .bind(company_id.to_string())
    .bind(url)
    .bind(kind.as_str())
    .bind(parser_name)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    get_source(pool, guid).await
}

pub async fn find_source(pool: &SqlitePool, company_id: Uuid, url: &str) -> Result<Option<Source>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM sources WHERE company_id = ? AND url = ?",
        SOURCE_COLUMNS
    ))
    .bind(company_id.to_string())
    .bind(url)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(source_from_row).transpose()
}

pub async fn get_source(pool: &SqlitePool, guid: Uuid) -> Result<Source> {
    let row = sqlx::query(&format!("SELECT {} FROM sources WHERE guid = ?", SOURCE_COLUMNS))
        .bind(guid.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => source_from_row(&row),
        None => Err(Error::NotFound(format!("Source {}", guid))),
    }
}

/// Every source, grouped by company
pub async fn list_sources(pool: &SqlitePool) -> Result<Vec<Source>> {
    let rows = sqlx::query(&format!("SELECT {} FROM sources ORDER BY company_id, created_at", SOURCE_COLUMNS))
        .fetch_all(pool)
        .await?;

    rows.iter().map(source_from_row).collect()
}

pub async fn list_sources_for_company(pool: &SqlitePool, company_id: Uuid) -> Result<Vec<Source>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM sources WHERE company_id = ? ORDER BY created_at",
        SOURCE_COLUMNS
    ))
    .bind(company_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(source_from_row).collect()
}

/// Record a run: status line, run time and (when given) new validators
pub async fn record_source_run(
    pool: &SqlitePool,
    guid: Uuid,
    status: &str,
    etag: Option<&str>,
    last_modified: Option<&str>,
) -> Result<()> {
    let now = now_timestamp();
    let result = sqlx::query(
        r#"
        UPDATE sources
        SET last_run_at = ?,
            last_status = ?,
            etag = COALESCE(?, etag),
            last_modified = COALESCE(?, last_modified),
            updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(&now)
    .bind(status)
    .bind(etag)
    .bind(last_modified)
    .bind(&now)
    .bind(guid.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Source {}", guid)));
    }
    Ok(())
}

pub async fn set_source_enabled(pool: &SqlitePool, guid: Uuid, enabled: bool) -> Result<()> {
    let result = sqlx::query("UPDATE sources SET enabled = ?, updated_at = ? WHERE guid = ?")
        .bind(enabled)
        .bind(now_timestamp())
        .bind(guid.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Source {}", guid)));
    }
    Ok(())
}

/// Most recent successful run per company; companies without one map to `None`
///
/// Runs that ended in `ERROR:` or `REGRESSION:` do not count.
pub async fn latest_runs_by_company(pool: &SqlitePool) -> Result<HashMap<Uuid, Option<DateTime<Utc>>>> {
    let rows = sqlx::query(
        r#"
        SELECT company_id,
               MAX(CASE WHEN last_status LIKE 'SUCCESS%' THEN last_run_at END) AS latest
        FROM sources
        GROUP BY company_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut latest = HashMap::with_capacity(rows.len());
    for row in rows {
        let company_id: String = row.get("company_id");
        let run: Option<String> = row.get("latest");
        latest.insert(
            parse_guid(&company_id)?,
            run.as_deref().map(parse_stored_timestamp).transpose()?,
        );
    }
    Ok(latest)
}

fn source_from_row(row: &SqliteRow) -> Result<Source> {
    let guid: String = row.get("guid");
    let company_id: String = row.get("company_id");
    let kind: String = row.get("kind");
    let last_run_at: Option<String> = row.get("last_run_at");

    Ok(Source {
        guid: parse_guid(&guid)?,
        company_id: parse_guid(&company_id)?,
        url: row.get("url"),
        kind: kind.parse::<SourceKind>()?,
        parser_name: row.get("parser_name"),
        enabled: row.get("enabled"),
        last_run_at: last_run_at.as_deref().map(parse_stored_timestamp).transpose()?,
        last_status: row.get("last_status"),
        etag: row.get("etag"),
        last_modified: row.get("last_modified"),
    })
}
