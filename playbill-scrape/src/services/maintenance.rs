//! Maintenance passes over stored productions
//!
//! Alias and catalog changes are applied to existing rows by re-resolving their
//! raw titles. The audit report summarizes each company's state for operators.

use chrono::{DateTime, Utc};
use playbill_common::db::{Company, ProductionStatus};
use playbill_common::{CanonicalWork, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::{companies, productions, sources};
use crate::normalize::Normalizer;
use crate::services::ingestion::{AUTO_PUBLISH_CONFIDENCE, MIN_STORE_CONFIDENCE};

/// Rows touched by a re-normalization pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenormalizeReport {
    pub checked: usize,
    pub archived: usize,
    pub retargeted: usize,
}

/// Audit of one company
#[derive(Debug, Clone, Serialize)]
pub struct CompanyReport {
    pub company: Company,
    pub published: i64,
    pub review: i64,
    pub sources: usize,
    pub latest_run_at: Option<DateTime<Utc>>,
    pub latest_status: Option<String>,
    /// Published rows per work, most frequent first
    pub published_by_work: Vec<(CanonicalWork, i64)>,
}

#[derive(Debug, Clone)]
pub struct Maintenance {
    db: SqlitePool,
    normalizer: Arc<Normalizer>,
}

impl Maintenance {
    pub fn new(db: SqlitePool) -> Self {
        Self::with_normalizer(db, Arc::new(Normalizer::new()))
    }

    pub fn with_normalizer(db: SqlitePool, normalizer: Arc<Normalizer>) -> Self {
        Self { db, normalizer }
    }

    /// Re-resolve every PUBLISHED title
    ///
    /// Rows that now resolve to `Other` or below the storage threshold are
    /// archived. Rows resolving to a different work with auto-publish confidence
    /// are moved to that work; anything in between is left alone.
    pub async fn renormalize_published(&self) -> Result<RenormalizeReport> {
        let rows = productions::list_productions_by_status(&self.db, ProductionStatus::Published).await?;
        let mut report = RenormalizeReport::default();

        for row in &rows {
            report.checked += 1;
            let resolved = self.normalizer.resolve_title(&row.title_raw);

            if resolved.work.is_other() || resolved.confidence < MIN_STORE_CONFIDENCE {
                if productions::transition_production(
                    &self.db,
                    row.guid,
                    ProductionStatus::Published,
                    ProductionStatus::Archived,
                )
                .await?
                {
                    debug!(production_id = %row.guid, title = %row.title_raw, "Archived after re-normalization");
                    report.archived += 1;
                }
            } else if resolved.work != row.work && resolved.confidence >= AUTO_PUBLISH_CONFIDENCE {
                productions::update_production_work(&self.db, row.guid, resolved.work, resolved.confidence).await?;
                debug!(
                    production_id = %row.guid,
                    from = %row.work,
                    to = %resolved.work,
                    "Retargeted after re-normalization"
                );
                report.retargeted += 1;
            }
        }

        info!(
            checked = report.checked,
            archived = report.archived,
            retargeted = report.retargeted,
            "Re-normalization complete"
        );
        Ok(report)
    }

    /// Delete rows stored under `Other`; returns the row count
    pub async fn purge_other(&self) -> Result<u64> {
        let deleted = productions::delete_productions_by_work(&self.db, CanonicalWork::Other).await?;
        info!(deleted, "Purged productions without a known work");
        Ok(deleted)
    }

    /// Per-company audit, ordered by company name
    pub async fn company_report(&self) -> Result<Vec<CompanyReport>> {
        let mut reports = Vec::new();
        for company in companies::list_companies(&self.db).await? {
            let company_sources = sources::list_sources_for_company(&self.db, company.guid).await?;
            let latest = company_sources
                .iter()
                .filter(|s| s.last_run_at.is_some())
                .max_by_key(|s| s.last_run_at);

            reports.push(CompanyReport {
                published: productions::count_productions(&self.db, company.guid, ProductionStatus::Published).await?,
                review: productions::count_productions(&self.db, company.guid, ProductionStatus::Review).await?,
                sources: company_sources.len(),
                latest_run_at: latest.and_then(|s| s.last_run_at),
                latest_status: latest.and_then(|s| s.last_status.clone()),
                published_by_work: productions::count_by_work(&self.db, company.guid, ProductionStatus::Published)
                    .await?,
                company,
            });
        }
        Ok(reports)
    }
}
