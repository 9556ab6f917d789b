//! Company persistence

use playbill_common::db::{parse_stored_timestamp, slugify, Company, NewCompany};
use playbill_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{now_timestamp, parse_guid};

const COMPANY_COLUMNS: &str = "guid, name, slug, website, city, region, country, created_at";

/// Insert a company; the slug is derived from the name and must be unique
pub async fn create_company(pool: &SqlitePool, company: &NewCompany) -> Result<Company> {
    let name = company.name.trim();
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(Error::InvalidInput(format!("Company name '{}' has no usable slug", company.name)));
    }
    if find_company_by_slug(pool, &slug).await?.is_some() {
        return Err(Error::Conflict(format!("Company with slug '{}' already exists", slug)));
    }

    let guid = Uuid::new_v4();
    let now = now_timestamp();
    sqlx::query(
        r#"
        INSERT INTO companies (guid, name, slug, website, city, region, country, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(guid.to_string())
    .bind(name)
    .bind(&slug)
    .bind(&company.website)
    .bind(&company.city)
    .bind(&company.region)
    .bind(&company.country)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    get_company(pool, guid).await
}

/// Existing company with the same slug, or a newly created one; `true` when created
pub async fn ensure_company(pool: &SqlitePool, company: &NewCompany) -> Result<(Company, bool)> {
    match find_company_by_slug(pool, &slugify(company.name.trim())).await? {
        Some(existing) => Ok((existing, false)),
        None => Ok((create_company(pool, company).await?, true)),
    }
}

pub async fn find_company_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Company>> {
    let row = sqlx::query(&format!("SELECT {} FROM companies WHERE slug = ?", COMPANY_COLUMNS))
        .bind(slug)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(company_from_row).transpose()
}

pub async fn get_company(pool: &SqlitePool, guid: Uuid) -> Result<Company> {
    let row = sqlx::query(&format!("SELECT {} FROM companies WHERE guid = ?", COMPANY_COLUMNS))
        .bind(guid.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => company_from_row(&row),
        None => Err(Error::NotFound(format!("Company {}", guid))),
    }
}

/// All companies ordered by name
pub async fn list_companies(pool: &SqlitePool) -> Result<Vec<Company>> {
    let rows = sqlx::query(&format!("SELECT {} FROM companies ORDER BY name COLLATE NOCASE", COMPANY_COLUMNS))
        .fetch_all(pool)
        .await?;

    rows.iter().map(company_from_row).collect()
}

fn company_from_row(row: &SqliteRow) -> Result<Company> {
    let guid: String = row.get("guid");
    let created_at: String = row.get("created_at");

    Ok(Company {
        guid: parse_guid(&guid)?,
        name: row.get("name"),
        slug: row.get("slug"),
        website: row.get("website"),
        city: row.get("city"),
        region: row.get("region"),
        country: row.get("country"),
        created_at: parse_stored_timestamp(&created_at)?,
    })
}
