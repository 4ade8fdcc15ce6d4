//! Hiding empty folders from navigation menus.
//!
//! Each candidate folder is probed with one listing call. Probes run
//! concurrently up to a fixed cap and are all joined before the filtered
//! list is returned. A failed probe counts as inconclusive and hides the
//! folder; probe errors never reach the user.

use futures_util::stream::{self, StreamExt};
use protocol::RemoteEntry;

use super::{DirectoryClient, RemoteStorage};
use crate::outcome::ProbeOutcome;

/// Default number of simultaneous probes.
pub const DEFAULT_PROBE_CONCURRENCY: usize = 10;

/// Bounded fan-out filter keeping only non-empty folders.
#[derive(Debug, Clone, Copy)]
pub struct SubtreeFilter {
    concurrency: usize,
}

impl Default for SubtreeFilter {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_CONCURRENCY)
    }
}

impl SubtreeFilter {
    /// Create a filter running at most `concurrency` probes at once.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    /// The probe concurrency cap.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Probe one folder.
    pub async fn probe<S: RemoteStorage>(
        client: &DirectoryClient<S>,
        dir: &RemoteEntry,
    ) -> ProbeOutcome {
        match client.list(&dir.path).await {
            Ok(listing) => ProbeOutcome::from_bool(!listing.is_empty()),
            Err(e) => {
                tracing::warn!(path = %dir.path, error = %e, "Subtree probe failed, hiding folder");
                ProbeOutcome::Inconclusive
            }
        }
    }

    /// Keep the folders that have at least one child, preserving order.
    pub async fn filter_nonempty<S: RemoteStorage>(
        &self,
        client: &DirectoryClient<S>,
        dirs: Vec<RemoteEntry>,
    ) -> Vec<RemoteEntry> {
        if dirs.is_empty() {
            return dirs;
        }

        let candidates = dirs.len();
        let probed: Vec<(RemoteEntry, ProbeOutcome)> = stream::iter(dirs)
            .map(|dir| async move {
                let outcome = Self::probe(client, &dir).await;
                (dir, outcome)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let kept: Vec<RemoteEntry> = probed
            .into_iter()
            .filter(|(_, outcome)| outcome.is_positive())
            .map(|(dir, _)| dir)
            .collect();

        tracing::debug!(candidates, kept = kept.len(), "Filtered empty folders");
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::client::tests::MockStorage;
    use crate::storage::StorageError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_filter_keeps_only_nonempty() {
        let storage = MockStorage::default()
            .folder("/m/A", vec![])
            .folder("/m/B", vec![RemoteEntry::file("x.pdf", "/m/B/x.pdf")])
            .failing("/m/C");
        let client = DirectoryClient::new(storage);

        let dirs = vec![
            RemoteEntry::dir("A", "/m/A"),
            RemoteEntry::dir("B", "/m/B"),
            RemoteEntry::dir("C", "/m/C"),
        ];
        let kept = SubtreeFilter::default().filter_nonempty(&client, dirs).await;

        assert_eq!(kept, vec![RemoteEntry::dir("B", "/m/B")]);
        assert_eq!(client.storage().list_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_folder_with_only_subfolders_is_kept() {
        let storage = MockStorage::default().folder("/m/A", vec![RemoteEntry::dir("inner", "/m/A/inner")]);
        let client = DirectoryClient::new(storage);

        let kept = SubtreeFilter::default()
            .filter_nonempty(&client, vec![RemoteEntry::dir("A", "/m/A")])
            .await;
        assert_eq!(kept.len(), 1);
    }

    #[tokio::test]
    async fn test_filter_preserves_order() {
        let mut storage = MockStorage::default();
        let mut dirs = Vec::new();
        for i in 0..25 {
            let path = format!("/m/{i:02}");
            storage = storage.folder(&path, vec![RemoteEntry::file("f", format!("{path}/f"))]);
            dirs.push(RemoteEntry::dir(format!("{i:02}"), path));
        }
        let client = DirectoryClient::new(storage);

        let kept = SubtreeFilter::new(4).filter_nonempty(&client, dirs.clone()).await;
        assert_eq!(kept, dirs);
    }

    #[tokio::test]
    async fn test_empty_input_issues_no_probes() {
        let client = DirectoryClient::new(MockStorage::default());
        let kept = SubtreeFilter::default().filter_nonempty(&client, vec![]).await;
        assert!(kept.is_empty());
        assert_eq!(client.storage().list_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        assert_eq!(SubtreeFilter::new(0).concurrency(), 1);
    }

    /// Storage that records the peak number of in-flight listings.
    #[derive(Default)]
    struct SlowStorage {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl RemoteStorage for SlowStorage {
        async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, StorageError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![RemoteEntry::file("f", format!("{path}/f"))])
        }

        async fn download_url(&self, path: &str) -> Result<String, StorageError> {
            Ok(path.to_string())
        }

        async fn fetch_prefix(&self, _url: &str, _max: usize) -> Result<Vec<u8>, StorageError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_cap_is_respected() {
        let client = DirectoryClient::new(SlowStorage::default());
        let dirs: Vec<RemoteEntry> = (0..30)
            .map(|i| RemoteEntry::dir(format!("d{i}"), format!("/m/d{i}")))
            .collect();

        let kept = SubtreeFilter::new(3).filter_nonempty(&client, dirs).await;

        assert_eq!(kept.len(), 30);
        let peak = client.storage().peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {peak} exceeded cap");
        assert!(peak >= 2, "probes did not overlap");
    }
}
