//! Reference-counted file-content cache.
//!
//! Readers take a [`ContentLease`]; the lease holds one reference and gives it
//! back when dropped, so every acquire is paired with a release on every exit
//! path. An entry whose count reaches zero is evicted immediately unless the
//! cache was built with retention, in which case it stays until
//! [`ContentCache::relieve_memory`] runs.
use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Deref;
use std::rc::Rc;

use tracing::debug;

#[derive(Debug)]
struct CacheEntry {
    content: Rc<str>,
    refs: usize,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    retain_released: bool,
    current_bytes: usize,
    peak_bytes: usize,
    loads: usize,
    hits: usize,
}

impl CacheInner {
    fn release(&mut self, key: &str) {
        let evict = match self.entries.get_mut(key) {
            Some(entry) => {
                entry.refs = entry.refs.saturating_sub(1);
                entry.refs == 0 && !self.retain_released
            }
            None => false,
        };
        if evict {
            self.evict(key);
        }
    }

    fn evict(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            self.current_bytes = self.current_bytes.saturating_sub(entry.content.len());
        }
    }
}

/// Single-threaded shared cache; clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct ContentCache {
    inner: Rc<RefCell<CacheInner>>,
}

/// A counted reference to cached content. Dereferences to the file text.
#[derive(Debug)]
pub struct ContentLease {
    cache: Rc<RefCell<CacheInner>>,
    key: String,
    content: Rc<str>,
}

impl Deref for ContentLease {
    type Target = str;

    fn deref(&self) -> &str {
        &self.content
    }
}

impl Drop for ContentLease {
    fn drop(&mut self) {
        self.cache.borrow_mut().release(&self.key);
    }
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache that keeps released entries until memory relief is requested.
    pub fn with_retention() -> Self {
        let cache = Self::default();
        cache.inner.borrow_mut().retain_released = true;
        cache
    }

    /// Returns a lease on `key`, running `loader` only on a miss.
    pub fn acquire<F, E>(&self, key: &str, loader: F) -> Result<ContentLease, E>
    where
        F: FnOnce() -> Result<String, E>,
    {
        {
            let mut inner = self.inner.borrow_mut();
            if let Some(entry) = inner.entries.get_mut(key) {
                entry.refs += 1;
                let content = Rc::clone(&entry.content);
                inner.hits += 1;
                return Ok(self.lease(key, content));
            }
        }

        let loaded: Rc<str> = Rc::from(loader()?);
        let mut inner = self.inner.borrow_mut();
        inner.loads += 1;
        inner.current_bytes += loaded.len();
        inner.peak_bytes = inner.peak_bytes.max(inner.current_bytes);
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                content: Rc::clone(&loaded),
                refs: 1,
            },
        );
        drop(inner);
        Ok(self.lease(key, loaded))
    }

    fn lease(&self, key: &str, content: Rc<str>) -> ContentLease {
        ContentLease {
            cache: Rc::clone(&self.inner),
            key: key.to_string(),
            content,
        }
    }

    pub fn ref_count(&self, key: &str) -> usize {
        self.inner.borrow().entries.get(key).map_or(0, |e| e.refs)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.borrow().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    pub fn current_bytes(&self) -> usize {
        self.inner.borrow().current_bytes
    }

    /// High-water mark of cached bytes over the cache's lifetime.
    pub fn peak_bytes(&self) -> usize {
        self.inner.borrow().peak_bytes
    }

    /// (loads, hits) counters.
    pub fn access_counts(&self) -> (usize, usize) {
        let inner = self.inner.borrow();
        (inner.loads, inner.hits)
    }

    /// Purges every zero-referenced entry and returns spare capacity to the
    /// allocator. Returns the number of entries purged.
    pub fn relieve_memory(&self) -> usize {
        let mut inner = self.inner.borrow_mut();
        let idle: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.refs == 0)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &idle {
            inner.evict(key);
        }
        inner.entries.shrink_to_fit();
        if !idle.is_empty() {
            debug!(
                "Memory relief purged {} cached files ({} bytes still held)",
                idle.len(),
                inner.current_bytes
            );
        }
        idle.len()
    }
}
