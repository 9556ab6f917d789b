//! Aggregator
//!
//! Read-only views that fold production rows into one row per (company, work):
//! - review groups: the operator's REVIEW queue
//! - public catalog: current PUBLISHED runs with a representative title
//!
//! Both are computed per call and never stored.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use once_cell::sync::Lazy;
use playbill_common::db::{Company, Production, ProductionStatus};
use playbill_common::{CanonicalWork, Result};
use regex::Regex;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::db::{companies, productions, sources};
use crate::extractors::entities::decode_entities;

/// Sample titles shown per review group
pub const REVIEW_SAMPLE_TITLES: usize = 3;
/// Sample title length in characters
pub const REVIEW_SAMPLE_CHARS: usize = 60;
/// Default staleness threshold in days
pub const DEFAULT_STALE_DAYS: i64 = 14;

const MAX_TITLE_CHARS: usize = 70;
const MAX_TITLE_WORDS: usize = 10;
const MIN_ALNUM_SHARE: f64 = 0.4;

static NON_PRODUCTION_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(auditions?|workshops?|class(es)?|camps?|registration|register|enroll(ment)?|enrollments)\b",
    )
    .expect("keyword regex must be valid")
});

static PROSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+\S").expect("prose regex must be valid"));

/// One (company, work) group of REVIEW rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewGroup {
    pub company_id: Uuid,
    pub company_name: String,
    pub work: CanonicalWork,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub count: usize,
    pub sample_titles: Vec<String>,
    pub confidence_min: f64,
    pub confidence_max: f64,
}

/// One public catalog row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogRow {
    pub company_id: Uuid,
    pub company_name: String,
    pub company_slug: String,
    pub city: Option<String>,
    pub region: Option<String>,
    pub work: CanonicalWork,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Underlying production rows merged into this row
    pub count: usize,
}

/// Public catalog filters
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub work: Option<CanonicalWork>,
    pub company_id: Option<Uuid>,
    /// Case-insensitive match on title or company name
    pub query: Option<String>,
    /// Runs still playing on or after this day
    pub from: Option<NaiveDate>,
    /// Runs starting on or before this day
    pub until: Option<NaiveDate>,
    /// Hide companies without a successful source run in this many days
    pub stale_days: Option<i64>,
}

/// Title suitable for public display, entity-decoded; `None` when rejected
pub fn clean_title(raw: &str) -> Option<String> {
    let title = decode_entities(raw);
    if title.contains('\n') || title.contains('\r') {
        return None;
    }

    let title = title.trim();
    let chars = title.chars().count();
    if chars == 0 || chars > MAX_TITLE_CHARS {
        return None;
    }
    if title.split_whitespace().count() > MAX_TITLE_WORDS {
        return None;
    }
    if NON_PRODUCTION_KEYWORDS.is_match(title) || PROSE.is_match(title) {
        return None;
    }

    let alnum = title.chars().filter(|c| c.is_alphanumeric()).count();
    if (alnum as f64) < MIN_ALNUM_SHARE * chars as f64 {
        return None;
    }

    Some(title.to_string())
}

/// Better of the current representative and a candidate title
///
/// Rejected candidates never replace the current title; between two clean
/// titles the shorter wins and ties keep the current one.
pub fn pick_better(current: Option<String>, candidate: &str) -> Option<String> {
    let Some(candidate) = clean_title(candidate) else {
        return current;
    };

    match current {
        Some(current) if current.chars().count() <= candidate.chars().count() => Some(current),
        _ => Some(candidate),
    }
}

/// Aggregated views over one database
#[derive(Debug, Clone)]
pub struct Aggregator {
    db: SqlitePool,
}

impl Aggregator {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// REVIEW rows grouped by (company, work), ordered by company name then work
    pub async fn review_groups(&self) -> Result<Vec<ReviewGroup>> {
        let rows = productions::list_productions_by_status(&self.db, ProductionStatus::Review).await?;
        let companies = company_index(&self.db).await?;

        let mut groups: HashMap<(Uuid, CanonicalWork), ReviewGroup> = HashMap::new();
        for row in &rows {
            let company_name = companies
                .get(&row.company_id)
                .map(|c| c.name.clone())
                .unwrap_or_default();

            let group = groups.entry((row.company_id, row.work)).or_insert_with(|| ReviewGroup {
                company_id: row.company_id,
                company_name,
                work: row.work,
                start_date: row.start_date,
                end_date: row.end_date,
                count: 0,
                sample_titles: Vec::new(),
                confidence_min: row.confidence,
                confidence_max: row.confidence,
            });

            group.start_date = group.start_date.min(row.start_date);
            group.end_date = group.end_date.max(row.end_date);
            group.count += 1;
            group.confidence_min = group.confidence_min.min(row.confidence);
            group.confidence_max = group.confidence_max.max(row.confidence);

            let sample: String = row.title_raw.trim().chars().take(REVIEW_SAMPLE_CHARS).collect();
            if group.sample_titles.len() < REVIEW_SAMPLE_TITLES && !group.sample_titles.contains(&sample) {
                group.sample_titles.push(sample);
            }
        }

        let mut groups: Vec<ReviewGroup> = groups.into_values().collect();
        groups.sort_by(|a, b| {
            a.company_name
                .to_lowercase()
                .cmp(&b.company_name.to_lowercase())
                .then(a.work.ordinal().cmp(&b.work.ordinal()))
        });
        Ok(groups)
    }

    /// Current PUBLISHED runs, one row per (company, work)
    ///
    /// Groups without a single clean title are dropped.
    pub async fn public_catalog(&self, today: NaiveDate, filter: &CatalogFilter) -> Result<Vec<CatalogRow>> {
        let rows = productions::list_productions_by_status(&self.db, ProductionStatus::Published).await?;
        let companies = company_index(&self.db).await?;

        let fresh = match filter.stale_days {
            Some(days) => Some(fresh_companies(&self.db, Utc::now(), days).await?),
            None => None,
        };

        let query = filter
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        let mut groups: HashMap<(Uuid, CanonicalWork), (Vec<&Production>, &Company)> = HashMap::new();
        for row in &rows {
            let Some(company) = companies.get(&row.company_id) else {
                continue;
            };
            if row.end_date < today || row.work.is_other() {
                continue;
            }
            if filter.work.is_some_and(|w| w != row.work) || filter.company_id.is_some_and(|c| c != row.company_id) {
                continue;
            }
            if filter.from.is_some_and(|from| row.end_date < from) || filter.until.is_some_and(|until| row.start_date > until) {
                continue;
            }
            if let Some(q) = &query {
                if !row.title_raw.to_lowercase().contains(q) && !company.name.to_lowercase().contains(q) {
                    continue;
                }
            }
            if let Some(fresh) = &fresh {
                if !fresh.contains(&row.company_id) {
                    continue;
                }
            }

            groups.entry((row.company_id, row.work)).or_insert_with(|| (Vec::new(), company)).0.push(row);
        }

        let mut catalog: Vec<CatalogRow> = groups
            .into_values()
            .filter_map(|(members, company)| {
                let title = members.iter().fold(None, |best, p| pick_better(best, &p.title_raw));
                let Some(title) = title else {
                    debug!(company = %company.name, work = %members[0].work, "Dropping group without a clean title");
                    return None;
                };

                Some(CatalogRow {
                    company_id: company.guid,
                    company_name: company.name.clone(),
                    company_slug: company.slug.clone(),
                    city: company.city.clone(),
                    region: company.region.clone(),
                    work: members[0].work,
                    title,
                    start_date: members.iter().map(|p| p.start_date).min()?,
                    end_date: members.iter().map(|p| p.end_date).max()?,
                    count: members.len(),
                })
            })
            .collect();

        catalog.sort_by(|a, b| {
            a.start_date
                .cmp(&b.start_date)
                .then_with(|| a.company_name.to_lowercase().cmp(&b.company_name.to_lowercase()))
                .then(a.work.ordinal().cmp(&b.work.ordinal()))
        });
        Ok(catalog)
    }
}

async fn company_index(pool: &SqlitePool) -> Result<HashMap<Uuid, Company>> {
    Ok(companies::list_companies(pool)
        .await?
        .into_iter()
        .map(|c| (c.guid, c))
        .collect())
}

/// Companies with a successful source run within `stale_days` of `now`
async fn fresh_companies(pool: &SqlitePool, now: DateTime<Utc>, stale_days: i64) -> Result<Vec<Uuid>> {
    let cutoff = now - Duration::days(stale_days);
    Ok(sources::latest_runs_by_company(pool)
        .await?
        .into_iter()
        .filter_map(|(company, latest)| latest.filter(|at| *at >= cutoff).map(|_| company))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_title_rejections() {
        assert_eq!(clean_title("Hamlet").as_deref(), Some("Hamlet"));
        assert_eq!(clean_title("Romeo &amp; Juliet").as_deref(), Some("Romeo & Juliet"));

        assert!(clean_title("Hamlet Auditions").is_none());
        assert!(clean_title("Summer Shakespeare Camp").is_none());
        assert!(clean_title("Macbeth Workshop for Teens").is_none());
        assert!(clean_title("Acting class: Twelfth Night").is_none());
        assert!(clean_title("Registration opens for Othello").is_none());
        assert!(clean_title("Join us for Hamlet. Tickets on sale now").is_none());
        assert!(clean_title("Hamlet\nMain Stage").is_none());
        assert!(clean_title("*** ~~ ## !! Lear").is_none());
        assert!(clean_title(&"Much Ado ".repeat(9)).is_none());
        assert!(clean_title("one two three four five six seven eight nine ten eleven").is_none());
    }

    #[test]
    fn test_keywords_are_word_bounded() {
        assert_eq!(clean_title("The Classic Hamlet").as_deref(), Some("The Classic Hamlet"));
        assert_eq!(clean_title("Campbell's Macbeth").as_deref(), Some("Campbell's Macbeth"));
    }

    #[test]
    fn test_pick_better_prefers_shorter_clean_title() {
        let best = pick_better(None, "Twelfth Night, or What You Will");
        let best = pick_better(best, "Twelfth Night");
        assert_eq!(best.as_deref(), Some("Twelfth Night"));

        let best = pick_better(best, "Twelfth Night Auditions");
        assert_eq!(best.as_deref(), Some("Twelfth Night"));

        // Equal length keeps the current title
        let best = pick_better(Some("Hamlet".to_string()), "HAMLET");
        assert_eq!(best.as_deref(), Some("Hamlet"));
    }

    #[test]
    fn test_pick_better_all_rejected_stays_empty() {
        let best = ["Audition Notice", "Camp Week 1"]
            .iter()
            .fold(None, |best, t| pick_better(best, t));
        assert!(best.is_none());
    }
}
