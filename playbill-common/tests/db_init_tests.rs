//! Database initialization tests

use playbill_common::db::{init_database, init_memory_database};
use sqlx::Row;
use tempfile::TempDir;

async fn table_names(pool: &sqlx::SqlitePool) -> Vec<String> {
    sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .fetch_all(pool)
        .await
        .unwrap()
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect()
}

#[tokio::test]
async fn test_creates_database_file_and_parent_dirs() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("playbill.db");

    let pool = init_database(&db_path).await.unwrap();

    assert!(db_path.exists());
    let tables = table_names(&pool).await;
    for expected in ["companies", "group_actions", "productions", "sources"] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_reopen_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("playbill.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query(
        "INSERT INTO companies (guid, name, slug, created_at, updated_at) VALUES ('c1', 'Test', 'test', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
    )
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM companies")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_productions_reject_inverted_range() {
    let pool = init_memory_database().await.unwrap();
    sqlx::query(
        "INSERT INTO companies (guid, name, slug, created_at, updated_at) VALUES ('c1', 'Test', 'test', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let result = sqlx::query(
        r#"
        INSERT INTO productions (guid, company_id, canonical_work, title_raw, start_date, end_date,
            status, confidence, last_seen_at, created_at, updated_at)
        VALUES ('p1', 'c1', 'HAMLET', 'Hamlet', '2024-03-10', '2024-03-01',
            'REVIEW', 0.8, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')
        "#,
    )
    .execute(&pool)
    .await;

    assert!(result.is_err());
}
