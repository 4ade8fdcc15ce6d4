//! Spreadsheet-backed code lookup.
//!
//! - [`TabularSource`]: fetches the whole table, header row first
//! - [`LookupIndex`]: TTL-cached fuzzy lookup over that table
//! - [`GoogleSheets`]: HTTP implementation of [`TabularSource`]

pub mod index;
pub mod sheets;

use std::future::Future;

use protocol::{BotError, Upstream};
use thiserror::Error;

pub use index::{lookup_reply, LookupIndex};
pub use sheets::GoogleSheets;

/// Errors raised by a tabular source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("invalid source URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL carries the API key.
        let err = err.without_url();
        if err.is_decode() {
            SourceError::Malformed(err.to_string())
        } else {
            SourceError::Http(err.to_string())
        }
    }
}

impl From<SourceError> for BotError {
    fn from(err: SourceError) -> Self {
        BotError::upstream(Upstream::Lookup, err.to_string())
    }
}

/// A table of string cells.
pub trait TabularSource: Send + Sync {
    /// Fetch every row of the configured range.
    fn fetch_rows(&self) -> impl Future<Output = Result<Vec<Vec<String>>, SourceError>> + Send;
}
