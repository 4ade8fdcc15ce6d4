//! Sorted directory listings over a [`RemoteStorage`] backend.

use protocol::RemoteEntry;

use super::{RemoteStorage, StorageError};

/// Children of one folder, split by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Sub-folders, sorted case-insensitively by name.
    pub dirs: Vec<RemoteEntry>,
    /// Files, sorted case-insensitively by name.
    pub files: Vec<RemoteEntry>,
}

impl Listing {
    /// Split raw entries by kind and sort each side by lowercase name.
    pub fn from_entries(entries: Vec<RemoteEntry>) -> Self {
        let (mut dirs, mut files): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(RemoteEntry::is_dir);
        sort_by_name(&mut dirs);
        sort_by_name(&mut files);
        Self { dirs, files }
    }

    /// Whether the folder has no children at all.
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty() && self.files.is_empty()
    }
}

fn sort_by_name(entries: &mut [RemoteEntry]) {
    entries.sort_by_cached_key(|entry| entry.name.to_lowercase());
}

/// Thin adapter turning raw storage calls into the shapes navigation needs.
pub struct DirectoryClient<S> {
    storage: S,
}

impl<S: RemoteStorage> DirectoryClient<S> {
    /// Wrap a storage backend.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// The wrapped backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// List a folder as sorted `(dirs, files)`.
    ///
    /// One remote call, no retry.
    pub async fn list(&self, path: &str) -> Result<Listing, StorageError> {
        let entries = self.storage.list(path).await?;
        let listing = Listing::from_entries(entries);
        tracing::debug!(
            path,
            dirs = listing.dirs.len(),
            files = listing.files.len(),
            "Listed folder"
        );
        Ok(listing)
    }

    /// Resolve a direct download URL for a file.
    pub async fn download_url(&self, path: &str) -> Result<String, StorageError> {
        self.storage.download_url(path).await
    }

    /// Read at most `max_bytes` of a small text file.
    ///
    /// Invalid UTF-8, including a sequence cut by the byte limit, is dropped.
    pub async fn read_text(&self, path: &str, max_bytes: usize) -> Result<String, StorageError> {
        let url = self.storage.download_url(path).await?;
        let bytes = self.storage.fetch_prefix(&url, max_bytes).await?;
        Ok(decode_lenient(&bytes))
    }
}

/// Decode bytes as UTF-8, dropping invalid sequences.
pub fn decode_lenient(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory storage backend for unit tests.
    #[derive(Default)]
    pub(crate) struct MockStorage {
        pub folders: HashMap<String, Vec<RemoteEntry>>,
        pub contents: HashMap<String, Vec<u8>>,
        pub failing: Vec<String>,
        pub list_calls: AtomicUsize,
        pub listed: Mutex<Vec<String>>,
    }

    impl MockStorage {
        pub fn folder(mut self, path: &str, entries: Vec<RemoteEntry>) -> Self {
            self.folders.insert(path.to_string(), entries);
            self
        }

        pub fn content(mut self, path: &str, body: &[u8]) -> Self {
            self.contents.insert(path.to_string(), body.to_vec());
            self
        }

        pub fn failing(mut self, path: &str) -> Self {
            self.failing.push(path.to_string());
            self
        }
    }

    impl RemoteStorage for MockStorage {
        async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, StorageError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.listed.lock().unwrap().push(path.to_string());
            if self.failing.iter().any(|p| p == path) {
                return Err(StorageError::Status {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            self.folders.get(path).cloned().ok_or(StorageError::Status {
                status: 404,
                message: format!("{path} not found"),
            })
        }

        async fn download_url(&self, path: &str) -> Result<String, StorageError> {
            if self.failing.iter().any(|p| p == path) {
                return Err(StorageError::Http("connection reset".to_string()));
            }
            Ok(format!("https://download.test{path}"))
        }

        async fn fetch_prefix(&self, url: &str, max_bytes: usize) -> Result<Vec<u8>, StorageError> {
            let path = url.trim_start_matches("https://download.test");
            let body = self
                .contents
                .get(path)
                .ok_or_else(|| StorageError::Status {
                    status: 404,
                    message: "no content".to_string(),
                })?;
            Ok(body.iter().copied().take(max_bytes).collect())
        }
    }

    #[test]
    fn test_listing_partitions_and_sorts() {
        let listing = Listing::from_entries(vec![
            RemoteEntry::file("b.pdf", "/m/b.pdf"),
            RemoteEntry::dir("zeta", "/m/zeta"),
            RemoteEntry::file("A.pdf", "/m/A.pdf"),
            RemoteEntry::dir("Alpha", "/m/Alpha"),
            RemoteEntry::dir("beta", "/m/beta"),
        ]);

        let dirs: Vec<&str> = listing.dirs.iter().map(|d| d.name.as_str()).collect();
        let files: Vec<&str> = listing.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(dirs, vec!["Alpha", "beta", "zeta"]);
        assert_eq!(files, vec!["A.pdf", "b.pdf"]);
        assert!(!listing.is_empty());
        assert!(Listing::default().is_empty());
    }

    #[tokio::test]
    async fn test_list_propagates_failure() {
        let client = DirectoryClient::new(MockStorage::default().failing("/m"));
        let err = client.list("/m").await.unwrap_err();
        assert!(matches!(err, StorageError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_read_text_truncates() {
        let storage = MockStorage::default().content("/m/link_a.txt", b"URL=https://x.test/a");
        let client = DirectoryClient::new(storage);
        let text = client.read_text("/m/link_a.txt", 8).await.unwrap();
        assert_eq!(text, "URL=http");
    }

    #[test]
    fn test_decode_lenient_drops_invalid_bytes() {
        assert_eq!(decode_lenient(b"ok\xffok"), "okok");
        // "Н" is two bytes; cutting after the first leaves an incomplete sequence.
        let bytes = "14Н".as_bytes();
        assert_eq!(decode_lenient(&bytes[..3]), "14");
        assert_eq!(decode_lenient(bytes), "14Н");
    }
}
