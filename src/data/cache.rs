//! In-process TTL cache with single-flight request coalescing.
//!
//! Each component-owned cache is a `(key → value + stored-at)` map behind one
//! async mutex. A lookup returns the stored value only while it is younger
//! than the TTL; otherwise the caller's fetch future runs. Concurrent callers
//! for the same key share a single in-flight fetch instead of issuing
//! duplicate upstream requests. Failed fetches are never stored, so a bad
//! response cannot poison the cache.

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::error::ProviderError;

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, ProviderError>>>;

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    inflight: HashMap<K, SharedFetch<V>>,
}

pub struct TtlCache<K, V> {
    ttl: Duration,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Clone + Eq + Hash + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                inflight: HashMap::new(),
            }),
        }
    }

    /// Return the cached value for `key` if it is still fresh, otherwise run
    /// `fetch` (sharing the in-flight future with concurrent callers) and
    /// store the result on success.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Result<V, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ProviderError>> + Send + 'static,
    {
        let (shared, owner) = {
            let mut inner = self.inner.lock().await;
            if let Some(entry) = inner.entries.get(&key) {
                if entry.stored_at.elapsed() < self.ttl {
                    return Ok(entry.value.clone());
                }
            }
            if let Some(existing) = inner.inflight.get(&key) {
                (existing.clone(), false)
            } else {
                let fut = fetch().boxed().shared();
                inner.inflight.insert(key.clone(), fut.clone());
                (fut, true)
            }
        };

        let result = shared.await;

        if owner {
            let mut inner = self.inner.lock().await;
            inner.inflight.remove(&key);
            if let Ok(value) = &result {
                inner.entries.insert(
                    key,
                    Entry {
                        value: value.clone(),
                        stored_at: Instant::now(),
                    },
                );
            }
        }

        result
    }

    /// Number of stored entries, fresh or not. Introspection helper.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
