//! Ingestion gate and deduplicator
//!
//! Every normalized event passes two hard gates before it can be stored: it must
//! name a known work, and its confidence must reach [`MIN_STORE_CONFIDENCE`]. A
//! stored production of the same (company, work) with overlapping dates makes the
//! event a sighting of that production; otherwise a new row is created, published
//! outright at [`AUTO_PUBLISH_CONFIDENCE`] and above.

use playbill_common::db::{Production, ProductionStatus};
use playbill_common::Result;
use sqlx::SqlitePool;
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::productions::{self, NewProduction};
use crate::db::retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use crate::normalize::NormalizedEvent;

/// Events below this confidence are never stored
pub const MIN_STORE_CONFIDENCE: f64 = 0.7;

/// New productions at or above this confidence skip review
pub const AUTO_PUBLISH_CONFIDENCE: f64 = 0.85;

/// Why an event was not stored
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Title did not resolve to a known work
    UnknownWork,
    LowConfidence(f64),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::UnknownWork => write!(f, "title does not name a known work"),
            RejectReason::LowConfidence(c) => {
                write!(f, "confidence {:.2} below {:.2}", c, MIN_STORE_CONFIDENCE)
            }
        }
    }
}

/// Result of ingesting one event
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Stored { production: Production, is_new: bool },
    Rejected(RejectReason),
}

impl IngestOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, IngestOutcome::Stored { is_new: true, .. })
    }
}

/// Initial status for a new production
pub fn initial_status(confidence: f64) -> ProductionStatus {
    if confidence >= AUTO_PUBLISH_CONFIDENCE {
        ProductionStatus::Published
    } else {
        ProductionStatus::Review
    }
}

/// Gate check without touching the database
pub fn gate(event: &NormalizedEvent) -> Option<RejectReason> {
    if event.work.is_other() {
        Some(RejectReason::UnknownWork)
    } else if event.confidence < MIN_STORE_CONFIDENCE {
        Some(RejectReason::LowConfidence(event.confidence))
    } else {
        None
    }
}

/// Stores normalized events for one company at a time
#[derive(Debug, Clone)]
pub struct Ingestor {
    db: SqlitePool,
    max_lock_wait_ms: u64,
}

impl Ingestor {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }

    pub fn with_max_lock_wait_ms(mut self, max_lock_wait_ms: u64) -> Self {
        self.max_lock_wait_ms = max_lock_wait_ms;
        self
    }

    /// Gate, then deduplicate or create
    ///
    /// Callers ingest one company's events sequentially; the duplicate lookup and
    /// insert are not atomic across concurrent callers for the same company.
    pub async fn ingest(&self, event: &NormalizedEvent, company_id: Uuid) -> Result<IngestOutcome> {
        if let Some(reason) = gate(event) {
            debug!(title = %event.title_raw, work = %event.work, reason = %reason, "Event rejected");
            return Ok(IngestOutcome::Rejected(reason));
        }

        let pool = &self.db;
        let existing = retry_on_lock("find duplicate production", self.max_lock_wait_ms, || async {
            productions::find_duplicate_production(pool, company_id, event.work, event.start_date, event.end_date)
                .await
        })
        .await?;

        if let Some(existing) = existing {
            let production = retry_on_lock("touch production", self.max_lock_wait_ms, || async {
                productions::touch_production(pool, existing.guid).await
            })
            .await?;
            debug!(production_id = %production.guid, work = %production.work, "Duplicate sighting");
            return Ok(IngestOutcome::Stored {
                production,
                is_new: false,
            });
        }

        let status = initial_status(event.confidence);
        let new = NewProduction::from_event(company_id, event, status);
        let production = retry_on_lock("create production", self.max_lock_wait_ms, || async {
            productions::create_production(pool, &new).await
        })
        .await?;

        info!(
            production_id = %production.guid,
            work = %production.work,
            status = %production.status,
            confidence = production.confidence,
            "New production stored"
        );
        Ok(IngestOutcome::Stored {
            production,
            is_new: true,
        })
    }
}
