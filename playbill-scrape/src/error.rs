//! Error types for playbill-scrape

use thiserror::Error;

/// Failure of one source run
///
/// The runner turns these into `ERROR: <message>` status lines; they never abort
/// other sources or companies.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// No collector resolves for the source
    #[error("No scraper available")]
    NoCollector(String),

    /// Source URL cannot be parsed
    #[error("Invalid source URL: {0}")]
    InvalidSourceUrl(String),

    /// Source URL answered with something other than content
    #[error("Fetch failed for {url} (status {status}): {message}")]
    Fetch { url: String, status: u16, message: String },

    /// playbill-common error (database, not found, ...)
    #[error(transparent)]
    Common(#[from] playbill_common::Error),
}

impl From<sqlx::Error> for ScrapeError {
    fn from(err: sqlx::Error) -> Self {
        ScrapeError::Common(playbill_common::Error::Database(err))
    }
}

/// Result alias for runner-level operations
pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;
