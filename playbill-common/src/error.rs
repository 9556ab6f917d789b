//! Errors shared by the playbill crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Storage, configuration and operator-input failures
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Creating the database folder
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable or malformed TOML configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// No company, source or production with the given id or slug
    #[error("{0} not found")]
    NotFound(String),

    /// Operator input rejected before touching storage (inverted dates, bad cursor, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stored rows moved since the action was recorded, or a duplicate slug
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unparseable stored value, JSON column encoding, HTTP client setup or an exhausted lock retry
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_names_the_missing_row() {
        let err = Error::NotFound("Company 42".to_string());
        assert_eq!(err.to_string(), "Company 42 not found");
    }
}
