use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;

/// A bounded, process-global LRU cache shared behind a mutex. Read-mostly
/// with single-writer insert, per SPEC_FULL.md §5 "Shared resources" — the
/// Resolver's filename/search/detail caches are all instances of this.
pub struct Cache<K, V> {
    inner: Mutex<LruCache<K, V>>,
}

impl<K: Eq + Hash, V: Clone> Cache<K, V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity.max(1) is nonzero");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().await.get(key).cloned()
    }

    /// Only successful resolutions are cached (SPEC_FULL.md §4.3).
    pub async fn put(&self, key: K, value: V) {
        self.inner.lock().await.put(key, value);
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
