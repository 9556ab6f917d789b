//! Retry on SQLite lock contention
//!
//! Concurrent company runs share one database file. Writes that hit
//! "database is locked" are retried with exponential backoff (10 ms doubling up
//! to 1000 ms) until `max_wait_ms` has elapsed; any other error returns at once.

use playbill_common::{Error, Result};
use std::future::Future;
use std::time::{Duration, Instant};

/// Default retry budget for ingestion writes
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

/// Run a database operation, retrying while the database is locked
pub async fn retry_on_lock<F, Fut, T>(operation_name: &str, max_wait_ms: u64, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = 10u64;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    let elapsed_ms = start_time.elapsed().as_millis() as u64;
                    if elapsed_ms > 2000 {
                        tracing::warn!(operation = operation_name, attempt, elapsed_ms, "Succeeded after long lock wait");
                    } else {
                        tracing::debug!(operation = operation_name, attempt, elapsed_ms, "Succeeded after retry");
                    }
                }
                return Ok(result);
            }
            Err(err) if !is_lock_error(&err) => return Err(err),
            Err(_) => {
                let elapsed = start_time.elapsed();
                if elapsed >= max_duration {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        max_wait_ms,
                        "Database still locked, giving up"
                    );
                    return Err(Error::Internal(format!(
                        "{}: database locked after {} attempts ({} ms elapsed, max {} ms)",
                        operation_name,
                        attempt,
                        elapsed.as_millis(),
                        max_wait_ms
                    )));
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms,
                    "Database locked, retrying after backoff"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(1000);
            }
        }
    }
}

fn is_lock_error(err: &Error) -> bool {
    match err {
        Error::Database(db_err) => db_err.to_string().contains("database is locked"),
        _ => false,
    }
}
