//! In-flight fetch coalescing.
//!
//! Concurrent enrichment of a batch may ask for the same link from several
//! tasks. [`FlightMap`] keys a shared `OnceCell` by URL so the underlying fetch
//! happens at most once; late callers wait on the in-flight fetch instead of
//! re-fetching. A failed initialization leaves the cell empty, so the next
//! access retries.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use atlasbot_shared::Result;

/// URL-keyed coalescing map for a batch of fetches.
pub struct FlightMap<T> {
    inner: Mutex<HashMap<String, Arc<OnceCell<T>>>>,
}

impl<T> Default for FlightMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FlightMap<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> FlightMap<T> {
    /// Return the cached value for `url`, or run `fetch` to produce it.
    ///
    /// Callers racing on the same URL share a single `fetch` invocation; the
    /// losers await its outcome.
    pub async fn get_or_fetch<F, Fut>(&self, url: &str, fetch: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let cell = {
            let mut map = self.inner.lock().await;
            map.entry(url.to_string()).or_default().clone()
        };

        cell.get_or_try_init(fetch).await.cloned()
    }
}
