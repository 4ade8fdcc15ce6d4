//! Time-bounded cache slots with single-flight refresh.
//!
//! A [`TtlCell`] holds at most one `{value, expires_at}` record. Expiry is
//! evaluated lazily on access. When the record is missing or stale, the first
//! caller runs the refresh while holding the slot lock; concurrent callers
//! wait on the same lock and then observe the fresh record instead of issuing
//! a duplicate refresh.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// A cached value together with its expiry instant.
#[derive(Debug, Clone)]
struct Cached<T> {
    value: T,
    expires_at: Instant,
}

/// A single lazily-expiring cache slot.
#[derive(Debug)]
pub struct TtlCell<T> {
    ttl: Duration,
    slot: Mutex<Option<Cached<T>>>,
}

impl<T: Clone> TtlCell<T> {
    /// Create an empty slot whose records live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Return the cached value if present and not yet expired.
    #[cfg(test)]
    pub async fn peek(&self) -> Option<T> {
        let slot = self.slot.lock().await;
        slot.as_ref()
            .filter(|cached| cached.expires_at > Instant::now())
            .map(|cached| cached.value.clone())
    }

    /// Return the cached value, or run `refresh` and cache its result.
    ///
    /// A failed refresh leaves the previous (stale) record untouched and is
    /// returned to the caller; nothing is cached for it.
    pub async fn get_or_refresh<F, Fut, E>(&self, refresh: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.value.clone());
            }
        }

        let value = refresh().await?;
        *slot = Some(Cached {
            value: value.clone(),
            expires_at: Instant::now() + self.ttl,
        });
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_refresh_once_within_ttl() {
        let cell = TtlCell::new(Duration::from_secs(60));
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        for _ in 0..3 {
            let value: Result<u32, ()> = cell
                .get_or_refresh(|| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await;
            assert_eq!(value, Ok(7));
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_after_expiry() {
        let cell = TtlCell::new(Duration::from_secs(60));

        let first: Result<u32, ()> = cell.get_or_refresh(|| async { Ok(1) }).await;
        assert_eq!(first, Ok(1));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cell.peek().await, Some(1));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cell.peek().await, None);

        let second: Result<u32, ()> = cell.get_or_refresh(|| async { Ok(2) }).await;
        assert_eq!(second, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_is_not_cached() {
        let cell: TtlCell<u32> = TtlCell::new(Duration::from_secs(60));

        let failed: Result<u32, &str> = cell.get_or_refresh(|| async { Err("boom") }).await;
        assert_eq!(failed, Err("boom"));
        assert_eq!(cell.peek().await, None);

        let ok: Result<u32, &str> = cell.get_or_refresh(|| async { Ok(3) }).await;
        assert_eq!(ok, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refresh_is_single_flight() {
        let cell = Arc::new(TtlCell::new(Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cell = Arc::clone(&cell);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cell.get_or_refresh(|| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, ()>(42u32)
                })
                .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
