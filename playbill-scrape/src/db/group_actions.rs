//! Operator action ledger
//!
//! Each group approve / reject / revert records the exact production ids it
//! moved, so an undo touches only those rows.

use chrono::{DateTime, Utc};
use playbill_common::db::{parse_stored_timestamp, GroupAction, GroupActionKind, ProductionStatus};
use playbill_common::{CanonicalWork, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{format_timestamp, parse_guid};

const ACTION_COLUMNS: &str =
    "guid, company_id, canonical_work, action, from_status, to_status, production_ids, committed_at, undone_at";

pub async fn record_group_action(pool: &SqlitePool, action: &GroupAction) -> Result<()> {
    let ids: Vec<String> = action.production_ids.iter().map(Uuid::to_string).collect();
    let ids = serde_json::to_string(&ids)
        .map_err(|e| Error::Internal(format!("Failed to encode production ids: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO group_actions (
            guid, company_id, canonical_work, action, from_status, to_status,
            production_ids, committed_at, undone_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(action.guid.to_string())
    .bind(action.company_id.to_string())
    .bind(action.work.code())
    .bind(action.action.as_str())
    .bind(action.from_status.as_str())
    .bind(action.to_status.as_str())
    .bind(ids)
    .bind(format_timestamp(action.committed_at))
    .bind(action.undone_at.map(format_timestamp))
    .execute(pool)
    .await?;

    Ok(())
}

/// Most recent action on a (company, work) group, undone or not
pub async fn latest_group_action(
    pool: &SqlitePool,
    company_id: Uuid,
    work: CanonicalWork,
) -> Result<Option<GroupAction>> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {}
        FROM group_actions
        WHERE company_id = ? AND canonical_work = ?
        ORDER BY committed_at DESC, rowid DESC
        LIMIT 1
        "#,
        ACTION_COLUMNS
    ))
    .bind(company_id.to_string())
    .bind(work.code())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(action_from_row).transpose()
}

/// Stamp an action as undone; `false` when it already was
pub async fn mark_group_action_undone(pool: &SqlitePool, guid: Uuid, at: DateTime<Utc>) -> Result<bool> {
    let result = sqlx::query("UPDATE group_actions SET undone_at = ? WHERE guid = ? AND undone_at IS NULL")
        .bind(format_timestamp(at))
        .bind(guid.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn action_from_row(row: &SqliteRow) -> Result<GroupAction> {
    let guid: String = row.get("guid");
    let company_id: String = row.get("company_id");
    let work: String = row.get("canonical_work");
    let action: String = row.get("action");
    let from_status: String = row.get("from_status");
    let to_status: String = row.get("to_status");
    let ids: String = row.get("production_ids");
    let committed_at: String = row.get("committed_at");
    let undone_at: Option<String> = row.get("undone_at");

    let ids: Vec<String> =
        serde_json::from_str(&ids).map_err(|e| Error::Internal(format!("Invalid stored production ids: {}", e)))?;

    Ok(GroupAction {
        guid: parse_guid(&guid)?,
        company_id: parse_guid(&company_id)?,
        work: work.parse::<CanonicalWork>()?,
        action: action.parse::<GroupActionKind>()?,
        from_status: from_status.parse::<ProductionStatus>()?,
        to_status: to_status.parse::<ProductionStatus>()?,
        production_ids: ids.iter().map(|id| parse_guid(id)).collect::<Result<Vec<_>>>()?,
        committed_at: parse_stored_timestamp(&committed_at)?,
        undone_at: undone_at.as_deref().map(parse_stored_timestamp).transpose()?,
    })
}
