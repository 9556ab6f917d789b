//! Production persistence
//!
//! Rows are keyed by guid and grouped by (company, canonical work). Dates are
//! `YYYY-MM-DD` text, so range comparisons work directly in SQL.

use chrono::NaiveDate;
use playbill_common::db::{parse_stored_date, parse_stored_timestamp, Production, ProductionStatus, DATE_FORMAT};
use playbill_common::{CanonicalWork, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{now_timestamp, parse_guid};
use crate::normalize::NormalizedEvent;

const PRODUCTION_COLUMNS: &str = "p.guid, p.company_id, p.canonical_work, p.title_raw, p.start_date, p.end_date, \
     p.perf_dates, p.event_url, p.price_min, p.price_max, p.notes, p.status, p.confidence, \
     p.last_seen_at, p.created_at, p.updated_at";

/// Default page size for [`search_productions`]
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Production about to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduction {
    pub company_id: Uuid,
    pub work: CanonicalWork,
    pub title_raw: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub perf_dates: Option<Vec<NaiveDate>>,
    pub event_url: Option<String>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub notes: Option<String>,
    pub status: ProductionStatus,
    pub confidence: f64,
}

impl NewProduction {
    pub fn from_event(company_id: Uuid, event: &NormalizedEvent, status: ProductionStatus) -> Self {
        Self {
            company_id,
            work: event.work,
            title_raw: event.title_raw.clone(),
            start_date: event.start_date,
            end_date: event.end_date,
            perf_dates: event.perf_dates.clone(),
            event_url: event.event_url.clone(),
            price_min: event.price_min,
            price_max: event.price_max,
            notes: event.notes.clone(),
            status,
            confidence: event.confidence,
        }
    }
}

pub async fn create_production(pool: &SqlitePool, production: &NewProduction) -> Result<Production> {
    if production.end_date < production.start_date {
        return Err(Error::InvalidInput(format!(
            "End date {} precedes start date {}",
            production.end_date, production.start_date
        )));
    }

    let perf_dates = production
        .perf_dates
        .as_ref()
        .map(|dates| {
            let formatted: Vec<String> = dates.iter().map(|d| d.format(DATE_FORMAT).to_string()).collect();
            serde_json::to_string(&formatted)
        })
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to encode performance dates: {}", e)))?;

    let guid = Uuid::new_v4();
    let now = now_timestamp();
    sqlx::query(
        r#"
        INSERT INTO productions (
            guid, company_id, canonical_work, title_raw, start_date, end_date, perf_dates,
            event_url, price_min, price_max, notes, status, confidence,
            last_seen_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(guid.to_string())
    .bind(production.company_id.to_string())
    .bind(production.work.code())
    .bind(&production.title_raw)
    .bind(production.start_date.format(DATE_FORMAT).to_string())
    .bind(production.end_date.format(DATE_FORMAT).to_string())
    .bind(perf_dates)
    .bind(&production.event_url)
    .bind(production.price_min)
    .bind(production.price_max)
    .bind(&production.notes)
    .bind(production.status.as_str())
    .bind(production.confidence.clamp(0.0, 1.0))
    .bind(&now)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    get_production(pool, guid).await
}

pub async fn get_production(pool: &SqlitePool, guid: Uuid) -> Result<Production> {
    let row = sqlx::query(&format!("SELECT {} FROM productions p WHERE p.guid = ?", PRODUCTION_COLUMNS))
        .bind(guid.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => production_from_row(&row),
        None => Err(Error::NotFound(format!("Production {}", guid))),
    }
}

/// Stored production of the same company and work whose dates overlap the range
///
/// Overlap: incoming start or end inside the stored range, or the incoming range
/// containing the stored one. Any status counts.
pub async fn find_duplicate_production(
    pool: &SqlitePool,
    company_id: Uuid,
    work: CanonicalWork,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Option<Production>> {
    let start = start.format(DATE_FORMAT).to_string();
    let end = end.format(DATE_FORMAT).to_string();

    let row = sqlx::query(&format!(
        r#"
        SELECT {}
        FROM productions p
        WHERE p.company_id = ? AND p.canonical_work = ?
          AND (
                (p.start_date <= ? AND p.end_date >= ?)
             OR (p.start_date <= ? AND p.end_date >= ?)
             OR (p.start_date >= ? AND p.end_date <= ?)
          )
        ORDER BY p.created_at
        LIMIT 1
        "#,
        PRODUCTION_COLUMNS
    ))
    .bind(company_id.to_string())
    .bind(work.code())
    .bind(&start)
    .bind(&start)
    .bind(&end)
    .bind(&end)
    .bind(&start)
    .bind(&end)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(production_from_row).transpose()
}

/// Mark a production as seen in the current run
pub async fn touch_production(pool: &SqlitePool, guid: Uuid) -> Result<Production> {
    let now = now_timestamp();
    let result = sqlx::query("UPDATE productions SET last_seen_at = ?, updated_at = ? WHERE guid = ?")
        .bind(&now)
        .bind(&now)
        .bind(guid.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Production {}", guid)));
    }
    get_production(pool, guid).await
}

/// Move one production from `from` to `to`; `false` when it was not in `from`
pub async fn transition_production(
    pool: &SqlitePool,
    guid: Uuid,
    from: ProductionStatus,
    to: ProductionStatus,
) -> Result<bool> {
    let result = sqlx::query("UPDATE productions SET status = ?, updated_at = ? WHERE guid = ? AND status = ?")
        .bind(to.as_str())
        .bind(now_timestamp())
        .bind(guid.to_string())
        .bind(from.as_str())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Re-target a production to another work with a new confidence
pub async fn update_production_work(pool: &SqlitePool, guid: Uuid, work: CanonicalWork, confidence: f64) -> Result<()> {
    sqlx::query("UPDATE productions SET canonical_work = ?, confidence = ?, updated_at = ? WHERE guid = ?")
        .bind(work.code())
        .bind(confidence.clamp(0.0, 1.0))
        .bind(now_timestamp())
        .bind(guid.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// Move every (company, work) row in `from` to `to`; returns the affected ids
pub async fn bulk_update_status(
    pool: &SqlitePool,
    company_id: Uuid,
    work: CanonicalWork,
    from: ProductionStatus,
    to: ProductionStatus,
) -> Result<Vec<Uuid>> {
    let mut tx = pool.begin().await?;

    let rows = sqlx::query(
        "SELECT guid FROM productions WHERE company_id = ? AND canonical_work = ? AND status = ? ORDER BY start_date",
    )
    .bind(company_id.to_string())
    .bind(work.code())
    .bind(from.as_str())
    .fetch_all(&mut *tx)
    .await?;

    let ids = rows
        .iter()
        .map(|row| parse_guid(&row.get::<String, _>("guid")))
        .collect::<Result<Vec<_>>>()?;

    sqlx::query(
        "UPDATE productions SET status = ?, updated_at = ? WHERE company_id = ? AND canonical_work = ? AND status = ?",
    )
    .bind(to.as_str())
    .bind(now_timestamp())
    .bind(company_id.to_string())
    .bind(work.code())
    .bind(from.as_str())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(ids)
}

/// Move the listed ids that are still in `from` to `to`; returns those moved
pub async fn update_status_for_ids(
    pool: &SqlitePool,
    ids: &[Uuid],
    from: ProductionStatus,
    to: ProductionStatus,
) -> Result<Vec<Uuid>> {
    let mut tx = pool.begin().await?;
    let now = now_timestamp();
    let mut moved = Vec::new();

    for id in ids {
        let result = sqlx::query("UPDATE productions SET status = ?, updated_at = ? WHERE guid = ? AND status = ?")
            .bind(to.as_str())
            .bind(&now)
            .bind(id.to_string())
            .bind(from.as_str())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() > 0 {
            moved.push(*id);
        }
    }

    tx.commit().await?;
    Ok(moved)
}

/// Set dates on every (company, work) row in `status`; returns the row count
pub async fn update_group_dates(
    pool: &SqlitePool,
    company_id: Uuid,
    work: CanonicalWork,
    status: ProductionStatus,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<u64> {
    if end < start {
        return Err(Error::InvalidInput(format!("End date {} precedes start date {}", end, start)));
    }

    let result = sqlx::query(
        r#"
        UPDATE productions
        SET start_date = ?, end_date = ?, updated_at = ?
        WHERE company_id = ? AND canonical_work = ? AND status = ?
        "#,
    )
    .bind(start.format(DATE_FORMAT).to_string())
    .bind(end.format(DATE_FORMAT).to_string())
    .bind(now_timestamp())
    .bind(company_id.to_string())
    .bind(work.code())
    .bind(status.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn count_productions(pool: &SqlitePool, company_id: Uuid, status: ProductionStatus) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM productions WHERE company_id = ? AND status = ?")
        .bind(company_id.to_string())
        .bind(status.as_str())
        .fetch_one(pool)
        .await?;

    Ok(row.get("n"))
}

/// Every production in a status, ordered by company then start date
pub async fn list_productions_by_status(pool: &SqlitePool, status: ProductionStatus) -> Result<Vec<Production>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM productions p WHERE p.status = ? ORDER BY p.company_id, p.start_date, p.guid",
        PRODUCTION_COLUMNS
    ))
    .bind(status.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter().map(production_from_row).collect()
}

/// Delete every production stored under a work; returns the row count
pub async fn delete_productions_by_work(pool: &SqlitePool, work: CanonicalWork) -> Result<u64> {
    let result = sqlx::query("DELETE FROM productions WHERE canonical_work = ?")
        .bind(work.code())
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Published counts per work for one company, most frequent first
pub async fn count_by_work(
    pool: &SqlitePool,
    company_id: Uuid,
    status: ProductionStatus,
) -> Result<Vec<(CanonicalWork, i64)>> {
    let rows = sqlx::query(
        r#"
        SELECT canonical_work, COUNT(*) AS n
        FROM productions
        WHERE company_id = ? AND status = ?
        GROUP BY canonical_work
        ORDER BY n DESC, canonical_work
        "#,
    )
    .bind(company_id.to_string())
    .bind(status.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let code: String = row.get("canonical_work");
            Ok((code.parse::<CanonicalWork>()?, row.get::<i64, _>("n")))
        })
        .collect()
}

/// Published productions ending on or after `today`, counted per work
pub async fn upcoming_counts_by_work(pool: &SqlitePool, today: NaiveDate) -> Result<Vec<(CanonicalWork, i64)>> {
    let rows = sqlx::query(
        r#"
        SELECT canonical_work, COUNT(*) AS n
        FROM productions
        WHERE status = 'PUBLISHED' AND end_date >= ? AND canonical_work != 'OTHER'
        GROUP BY canonical_work
        "#,
    )
    .bind(today.format(DATE_FORMAT).to_string())
    .fetch_all(pool)
    .await?;

    let mut counts = rows
        .iter()
        .map(|row| {
            let code: String = row.get("canonical_work");
            Ok((code.parse::<CanonicalWork>()?, row.get::<i64, _>("n")))
        })
        .collect::<Result<Vec<_>>>()?;
    counts.sort_by_key(|(work, _)| work.ordinal());
    Ok(counts)
}

/// Search filters; status defaults to PUBLISHED
#[derive(Debug, Clone, Default)]
pub struct ProductionFilter {
    pub work: Option<CanonicalWork>,
    pub company_id: Option<Uuid>,
    /// Case-insensitive match on title, company name or city
    pub query: Option<String>,
    /// Productions still running on or after this day
    pub from: Option<NaiveDate>,
    /// Productions starting on or before this day
    pub until: Option<NaiveDate>,
    pub status: Option<ProductionStatus>,
}

/// One page of search results
#[derive(Debug, Clone)]
pub struct ProductionPage {
    pub productions: Vec<Production>,
    /// Opaque keyset cursor for the next page
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Keyset-paginated search ordered by start date then guid
pub async fn search_productions(
    pool: &SqlitePool,
    filter: &ProductionFilter,
    limit: Option<u32>,
    cursor: Option<&str>,
) -> Result<ProductionPage> {
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).max(1);
    let after = cursor.map(decode_cursor).transpose()?;

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM productions p JOIN companies c ON c.guid = p.company_id WHERE p.status = ",
        PRODUCTION_COLUMNS
    ));
    query.push_bind(filter.status.unwrap_or(ProductionStatus::Published).as_str());

    if let Some(work) = filter.work {
        query.push(" AND p.canonical_work = ").push_bind(work.code());
    }
    if let Some(company_id) = filter.company_id {
        query.push(" AND p.company_id = ").push_bind(company_id.to_string());
    }
    if let Some(text) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{}%", escape_like(&text.to_lowercase()));
        query
            .push(" AND (LOWER(p.title_raw) LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR LOWER(c.name) LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR LOWER(COALESCE(c.city, '')) LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(from) = filter.from {
        query.push(" AND p.end_date >= ").push_bind(from.format(DATE_FORMAT).to_string());
    }
    if let Some(until) = filter.until {
        query.push(" AND p.start_date <= ").push_bind(until.format(DATE_FORMAT).to_string());
    }
    if let Some((start, guid)) = &after {
        query
            .push(" AND (p.start_date > ")
            .push_bind(start.clone())
            .push(" OR (p.start_date = ")
            .push_bind(start.clone())
            .push(" AND p.guid > ")
            .push_bind(guid.clone())
            .push("))");
    }

    query.push(" ORDER BY p.start_date, p.guid LIMIT ").push_bind(i64::from(limit) + 1);

    let rows = query.build().fetch_all(pool).await?;
    let mut productions = rows.iter().map(production_from_row).collect::<Result<Vec<_>>>()?;

    let has_more = productions.len() > limit as usize;
    productions.truncate(limit as usize);
    let next_cursor = if has_more { productions.last().map(encode_cursor) } else { None };

    Ok(ProductionPage {
        productions,
        next_cursor,
        has_more,
    })
}

/// Escape LIKE wildcards so user text matches literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn encode_cursor(production: &Production) -> String {
    format!("{}|{}", production.start_date.format(DATE_FORMAT), production.guid)
}

fn decode_cursor(cursor: &str) -> Result<(String, String)> {
    let invalid = || Error::InvalidInput(format!("Invalid cursor: {}", cursor));
    let (start, guid) = cursor.split_once('|').ok_or_else(invalid)?;
    parse_stored_date(start).map_err(|_| invalid())?;
    Uuid::parse_str(guid).map_err(|_| invalid())?;
    Ok((start.to_string(), guid.to_string()))
}

pub(crate) fn production_from_row(row: &SqliteRow) -> Result<Production> {
    let guid: String = row.get("guid");
    let company_id: String = row.get("company_id");
    let work: String = row.get("canonical_work");
    let start_date: String = row.get("start_date");
    let end_date: String = row.get("end_date");
    let perf_dates: Option<String> = row.get("perf_dates");
    let status: String = row.get("status");
    let last_seen_at: String = row.get("last_seen_at");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    let perf_dates = match perf_dates {
        Some(json) => {
            let raw: Vec<String> = serde_json::from_str(&json)
                .map_err(|e| Error::Internal(format!("Invalid stored performance dates: {}", e)))?;
            Some(raw.iter().map(|d| parse_stored_date(d)).collect::<Result<Vec<_>>>()?)
        }
        None => None,
    };

    Ok(Production {
        guid: parse_guid(&guid)?,
        company_id: parse_guid(&company_id)?,
        work: work.parse::<CanonicalWork>()?,
        title_raw: row.get("title_raw"),
        start_date: parse_stored_date(&start_date)?,
        end_date: parse_stored_date(&end_date)?,
        perf_dates,
        event_url: row.get("event_url"),
        price_min: row.get("price_min"),
        price_max: row.get("price_max"),
        notes: row.get("notes"),
        status: status.parse::<ProductionStatus>()?,
        confidence: row.get("confidence"),
        last_seen_at: parse_stored_timestamp(&last_seen_at)?,
        created_at: parse_stored_timestamp(&created_at)?,
        updated_at: parse_stored_timestamp(&updated_at)?,
    })
}
