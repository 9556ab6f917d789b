//! Review action and undo ledger tests

mod helpers;

use chrono::{Duration, Utc};
use helpers::{create_company, date, event, memory_pool};
use playbill_common::db::{GroupAction, GroupActionKind, ProductionStatus};
use playbill_common::{CanonicalWork, Error};
use playbill_scrape::db::{group_actions, productions};
use playbill_scrape::services::ingestion::{IngestOutcome, Ingestor};
use playbill_scrape::services::ReviewService;
use sqlx::SqlitePool;
use uuid::Uuid;

async fn store(pool: &SqlitePool, company_id: Uuid, confidence: f64, start: u32, end: u32) -> Uuid {
    let outcome = Ingestor::new(pool.clone())
        .ingest(
            &event("Hamlet", CanonicalWork::Hamlet, confidence, date(2030, 1, start), date(2030, 1, end)),
            company_id,
        )
        .await
        .unwrap();
    match outcome {
        IngestOutcome::Stored { production, .. } => production.guid,
        IngestOutcome::Rejected(reason) => panic!("unexpected rejection: {}", reason),
    }
}

async fn status_of(pool: &SqlitePool, id: Uuid) -> ProductionStatus {
    productions::get_production(pool, id).await.unwrap().status
}

#[tokio::test]
async fn test_approve_then_undo_restores_only_recorded_rows() {
    let pool = memory_pool().await;
    let company = create_company(&pool, "Riverside Rep").await;
    let a = store(&pool, company.guid, 0.75, 1, 5).await;
    let b = store(&pool, company.guid, 0.75, 20, 25).await;

    let review = ReviewService::new(pool.clone());
    let approved = review.approve_group(company.guid, CanonicalWork::Hamlet).await.unwrap();
    assert_eq!(approved.affected(), 2);
    assert!(approved.action_id.is_some());

    // Published outright, never part of the approval
    let c = store(&pool, company.guid, 0.9, 10, 12).await;
    assert_eq!(status_of(&pool, c).await, ProductionStatus::Published);

    let undone = review
        .undo_last_group_action(company.guid, CanonicalWork::Hamlet, Duration::minutes(15))
        .await
        .unwrap();
    assert_eq!(undone.affected(), 2);
    assert_eq!(status_of(&pool, a).await, ProductionStatus::Review);
    assert_eq!(status_of(&pool, b).await, ProductionStatus::Review);
    assert_eq!(status_of(&pool, c).await, ProductionStatus::Published);

    let again = review
        .undo_last_group_action(company.guid, CanonicalWork::Hamlet, Duration::minutes(15))
        .await;
    assert!(matches!(again, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn test_revert_moves_every_row_in_status() {
    let pool = memory_pool().await;
    let company = create_company(&pool, "Riverside Rep").await;
    store(&pool, company.guid, 0.75, 1, 5).await;

    let review = ReviewService::new(pool.clone());
    review.approve_group(company.guid, CanonicalWork::Hamlet).await.unwrap();
    store(&pool, company.guid, 0.9, 20, 25).await;

    let reverted = review
        .revert_group(company.guid, CanonicalWork::Hamlet, ProductionStatus::Published)
        .await
        .unwrap();
    assert_eq!(reverted.affected(), 2);
    assert_eq!(
        productions::count_productions(&pool, company.guid, ProductionStatus::Review).await.unwrap(),
        2
    );

    let invalid = review
        .revert_group(company.guid, CanonicalWork::Hamlet, ProductionStatus::Review)
        .await;
    assert!(matches!(invalid, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_undo_outside_window_is_refused() {
    let pool = memory_pool().await;
    let company = create_company(&pool, "Riverside Rep").await;
    let id = store(&pool, company.guid, 0.75, 1, 5).await;
    productions::transition_production(&pool, id, ProductionStatus::Review, ProductionStatus::Archived)
        .await
        .unwrap();

    group_actions::record_group_action(
        &pool,
        &GroupAction {
            guid: Uuid::new_v4(),
            company_id: company.guid,
            work: CanonicalWork::Hamlet,
            action: GroupActionKind::Reject,
            from_status: ProductionStatus::Review,
            to_status: ProductionStatus::Archived,
            production_ids: vec![id],
            committed_at: Utc::now() - Duration::hours(2),
            undone_at: None,
        },
    )
    .await
    .unwrap();

    let result = ReviewService::new(pool.clone())
        .undo_last_group_action(company.guid, CanonicalWork::Hamlet, Duration::minutes(15))
        .await;
    assert!(matches!(result, Err(Error::Conflict(_))));
    assert_eq!(status_of(&pool, id).await, ProductionStatus::Archived);
}

#[tokio::test]
async fn test_empty_group_action_records_nothing() {
    let pool = memory_pool().await;
    let company = create_company(&pool, "Riverside Rep").await;

    let report = ReviewService::new(pool.clone())
        .reject_group(company.guid, CanonicalWork::Macbeth)
        .await
        .unwrap();
    assert_eq!(report.affected(), 0);
    assert!(report.action_id.is_none());
    assert!(group_actions::latest_group_action(&pool, company.guid, CanonicalWork::Macbeth)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_single_production_transitions() {
    let pool = memory_pool().await;
    let company = create_company(&pool, "Riverside Rep").await;
    let id = store(&pool, company.guid, 0.75, 1, 5).await;
    let review = ReviewService::new(pool.clone());

    let approved = review.approve_production(id).await.unwrap();
    assert_eq!(approved.status, ProductionStatus::Published);
    assert!(matches!(review.approve_production(id).await, Err(Error::Conflict(_))));

    let archived = review.archive_production(id).await.unwrap();
    assert_eq!(archived.status, ProductionStatus::Archived);
    assert!(matches!(review.archive_production(id).await, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn test_update_group_dates_rejects_inverted_range() {
    let pool = memory_pool().await;
    let company = create_company(&pool, "Riverside Rep").await;
    let id = store(&pool, company.guid, 0.75, 1, 5).await;
    let review = ReviewService::new(pool.clone());

    let updated = review
        .update_group_dates(company.guid, CanonicalWork::Hamlet, date(2030, 2, 1), date(2030, 2, 28))
        .await
        .unwrap();
    assert_eq!(updated, 1);
    let production = productions::get_production(&pool, id).await.unwrap();
    assert_eq!(production.start_date, date(2030, 2, 1));
    assert_eq!(production.end_date, date(2030, 2, 28));

    let inverted = review
        .update_group_dates(company.guid, CanonicalWork::Hamlet, date(2030, 3, 1), date(2030, 2, 1))
        .await;
    assert!(matches!(inverted, Err(Error::InvalidInput(_))));
}
