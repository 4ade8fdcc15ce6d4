//! Remote storage access.
//!
//! This module provides the seam to the hierarchical file-storage service:
//! - [`RemoteStorage`]: the raw service contract (list, download URL, bounded fetch)
//! - [`DirectoryClient`]: sorted `(dirs, files)` listings and lenient text reads
//! - [`SubtreeFilter`]: bounded-concurrency probe hiding empty folders
//! - [`YandexDisk`]: HTTP implementation of [`RemoteStorage`]

pub mod client;
pub mod subtree;
pub mod yandex;

use std::future::Future;

use protocol::{BotError, RemoteEntry, Upstream};
use thiserror::Error;

pub use client::{DirectoryClient, Listing};
pub use subtree::SubtreeFilter;
pub use yandex::YandexDisk;

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The request could not be sent or the connection failed.
    #[error("request failed: {0}")]
    Http(String),

    /// The service answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Service-provided description.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        // Download hrefs are signed.
        let err = err.without_url();
        if err.is_decode() {
            StorageError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            StorageError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            StorageError::Http(err.to_string())
        }
    }
}

impl From<StorageError> for BotError {
    fn from(err: StorageError) -> Self {
        BotError::upstream(Upstream::Storage, err.to_string())
    }
}

/// Contract of the remote storage service.
///
/// Implementations must be cheap to share between concurrent interactions.
pub trait RemoteStorage: Send + Sync {
    /// List the direct children of `path`, in service order.
    fn list(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Vec<RemoteEntry>, StorageError>> + Send;

    /// Resolve a short-lived direct download URL for a file.
    fn download_url(&self, path: &str)
        -> impl Future<Output = Result<String, StorageError>> + Send;

    /// Fetch at most `max_bytes` from a download URL.
    fn fetch_prefix(
        &self,
        url: &str,
        max_bytes: usize,
    ) -> impl Future<Output = Result<Vec<u8>, StorageError>> + Send;
}
