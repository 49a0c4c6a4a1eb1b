//! Typed errors for the scraping library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can match on
//! failure classes; the binaries wrap these in `anyhow` at the edge.

use thiserror::Error;

/// Errors that can occur while fetching, parsing, merging, or persisting data.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Transport failure or non-retryable HTTP status.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// HTTP 403 persisted through every retry. The site is blocking us.
    #[error(
        "access forbidden (403) for {url} after {attempts} attempts; \
         raise SCRAPER_RATE_LIMIT, run from a different network, or route \
         through a residential proxy"
    )]
    Forbidden { url: String, attempts: usize },

    /// A page was fetched but its payload could not be decoded.
    #[error("parse failure in {context}: {reason}")]
    Parse { context: String, reason: String },

    /// Invalid or incomplete configuration, caught before any I/O.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A file or database write failed.
    #[error("persistence failure for {target}: {reason}")]
    Persistence { target: String, reason: String },
}

impl ScrapeError {
    /// Shorthand for wrapping an arbitrary persistence failure.
    pub fn persistence(target: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ScrapeError::Persistence {
            target: target.into(),
            reason: err.to_string(),
        }
    }
}

/// Result type alias for scraping operations.
pub type Result<T> = std::result::Result<T, ScrapeError>;
