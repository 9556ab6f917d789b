//! Operator review actions
//!
//! Group actions address every production of one (company, work) pair. Approve,
//! reject and revert write a ledger entry listing the exact rows they moved;
//! [`ReviewService::undo_last_group_action`] restores only those rows.

use chrono::{Duration, NaiveDate, Utc};
use playbill_common::db::{GroupAction, GroupActionKind, Production, ProductionStatus};
use playbill_common::{CanonicalWork, Error, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{group_actions, productions};

/// Default window in which a group action can be undone
pub const DEFAULT_UNDO_WINDOW_MINUTES: i64 = 15;

/// Rows moved by one group action
#[derive(Debug, Clone, PartialEq)]
pub struct GroupActionReport {
    /// Ledger entry; `None` when nothing matched
    pub action_id: Option<Uuid>,
    pub production_ids: Vec<Uuid>,
}

impl GroupActionReport {
    pub fn affected(&self) -> usize {
        self.production_ids.len()
    }
}

/// Review actions over one database
#[derive(Debug, Clone)]
pub struct ReviewService {
    db: SqlitePool,
}

impl ReviewService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// REVIEW → PUBLISHED for the whole group
    pub async fn approve_group(&self, company_id: Uuid, work: CanonicalWork) -> Result<GroupActionReport> {
        self.move_group(
            company_id,
            work,
            GroupActionKind::Approve,
            ProductionStatus::Review,
            ProductionStatus::Published,
        )
        .await
    }

    /// REVIEW → ARCHIVED for the whole group
    pub async fn reject_group(&self, company_id: Uuid, work: CanonicalWork) -> Result<GroupActionReport> {
        self.move_group(
            company_id,
            work,
            GroupActionKind::Reject,
            ProductionStatus::Review,
            ProductionStatus::Archived,
        )
        .await
    }

    /// `from_status` → REVIEW for the whole group
    ///
    /// Moves every row in `from_status`, including rows the last action never
    /// touched. A warning is logged when the ledger disagrees with the caller.
    pub async fn revert_group(
        &self,
        company_id: Uuid,
        work: CanonicalWork,
        from_status: ProductionStatus,
    ) -> Result<GroupActionReport> {
        if from_status == ProductionStatus::Review {
            return Err(Error::InvalidInput("Revert needs PUBLISHED or ARCHIVED as the status to undo".to_string()));
        }

        match group_actions::latest_group_action(&self.db, company_id, work).await? {
            Some(last) if last.undone_at.is_none() && last.to_status != from_status => warn!(
                company_id = %company_id,
                work = %work,
                last_action = last.action.as_str(),
                last_to_status = %last.to_status,
                requested = %from_status,
                "Revert does not match the last recorded action"
            ),
            None => warn!(company_id = %company_id, work = %work, "Revert without a recorded action"),
            _ => {}
        }

        self.move_group(company_id, work, GroupActionKind::Revert, from_status, ProductionStatus::Review)
            .await
    }

    /// Replace dates on the group's REVIEW rows; returns the row count
    pub async fn update_group_dates(
        &self,
        company_id: Uuid,
        work: CanonicalWork,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<u64> {
        let updated =
            productions::update_group_dates(&self.db, company_id, work, ProductionStatus::Review, start, end).await?;
        info!(company_id = %company_id, work = %work, %start, %end, updated, "Group dates updated");
        Ok(updated)
    }

    /// REVIEW → PUBLISHED for one production
    pub async fn approve_production(&self, id: Uuid) -> Result<Production> {
        if !productions::transition_production(&self.db, id, ProductionStatus::Review, ProductionStatus::Published)
            .await?
        {
            let current = productions::get_production(&self.db, id).await?;
            return Err(Error::Conflict(format!("Production {} is {}, not REVIEW", id, current.status)));
        }
        info!(production_id = %id, "Production approved");
        productions::get_production(&self.db, id).await
    }

    /// PUBLISHED (or REVIEW) → ARCHIVED for one production
    pub async fn archive_production(&self, id: Uuid) -> Result<Production> {
        let current = productions::get_production(&self.db, id).await?;
        if current.status == ProductionStatus::Archived {
            return Err(Error::Conflict(format!("Production {} is already ARCHIVED", id)));
        }
        if !productions::transition_production(&self.db, id, current.status, ProductionStatus::Archived).await? {
            return Err(Error::Conflict(format!("Production {} changed status concurrently", id)));
        }
        info!(production_id = %id, from = %current.status, "Production archived");
        productions::get_production(&self.db, id).await
    }

    /// Undo the group's latest action if it is recent and not yet undone
    ///
    /// Only rows recorded in the action and still in its target status move back.
    pub async fn undo_last_group_action(
        &self,
        company_id: Uuid,
        work: CanonicalWork,
        window: Duration,
    ) -> Result<GroupActionReport> {
        let last = group_actions::latest_group_action(&self.db, company_id, work)
            .await?
            .ok_or_else(|| Error::Conflict(format!("No recorded action for {} at company {}", work, company_id)))?;

        if last.undone_at.is_some() {
            return Err(Error::Conflict(format!("Last action {} was already undone", last.guid)));
        }
        let now = Utc::now();
        if now - last.committed_at > window {
            return Err(Error::Conflict(format!(
                "Last action {} was committed at {}, outside the {} minute undo window",
                last.guid,
                last.committed_at.to_rfc3339(),
                window.num_minutes()
            )));
        }

        let restored =
            productions::update_status_for_ids(&self.db, &last.production_ids, last.to_status, last.from_status)
                .await?;
        group_actions::mark_group_action_undone(&self.db, last.guid, now).await?;

        if restored.len() < last.production_ids.len() {
            warn!(
                action_id = %last.guid,
                recorded = last.production_ids.len(),
                restored = restored.len(),
                "Some rows changed since the action and were left alone"
            );
        }
        info!(action_id = %last.guid, action = last.action.as_str(), restored = restored.len(), "Group action undone");

        Ok(GroupActionReport {
            action_id: Some(last.guid),
            production_ids: restored,
        })
    }

    async fn move_group(
        &self,
        company_id: Uuid,
        work: CanonicalWork,
        kind: GroupActionKind,
        from: ProductionStatus,
        to: ProductionStatus,
    ) -> Result<GroupActionReport> {
        let ids = productions::bulk_update_status(&self.db, company_id, work, from, to).await?;
        if ids.is_empty() {
            info!(company_id = %company_id, work = %work, action = kind.as_str(), "No rows matched");
            return Ok(GroupActionReport {
                action_id: None,
                production_ids: ids,
            });
        }

        let action = GroupAction {
            guid: Uuid::new_v4(),
            company_id,
            work,
            action: kind,
            from_status: from,
            to_status: to,
            production_ids: ids.clone(),
            committed_at: Utc::now(),
            undone_at: None,
        };
        group_actions::record_group_action(&self.db, &action).await?;

        info!(
            company_id = %company_id,
            work = %work,
            action = kind.as_str(),
            affected = ids.len(),
            "Group action committed"
        );
        Ok(GroupActionReport {
            action_id: Some(action.guid),
            production_ids: ids,
        })
    }
}
