//! Request-scoped key/value cache with scoped overrides
//!
//! One [`RequestCache`] exists per inbound unit of work and must never be
//! shared across concurrent units. Entries are arbitrary typed payloads;
//! [`RequestCache::set`] records the prior state and returns an undo guard
//! so a value can be overridden for the duration of a nested call tree and
//! restored on the way out.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use parking_lot::RwLock;

type Entry = Arc<dyn Any + Send + Sync>;

/// Cache key built by joining the display form of each part with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(root: impl Display) -> Self {
        Self(root.to_string())
    }

    /// Append one more part to the key.
    pub fn push(mut self, part: impl Display) -> Self {
        self.0.push('/');
        self.0.push_str(&part.to_string());
        self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Per-request cache guarded by a single reader/writer lock.
///
/// Reads proceed in parallel; the lock is never held across I/O (the API
/// is fully synchronous).
#[derive(Default)]
pub struct RequestCache {
    items: RwLock<HashMap<String, Entry>>,
}

impl RequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed read. An entry of a different type reads as absent.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &CacheKey) -> Option<T> {
        let items = self.items.read();
        items
            .get(key.as_str())
            .and_then(|entry| entry.downcast_ref::<T>())
            .cloned()
    }

    /// Typed read with a fallback; the flag reports whether the entry was
    /// found.
    pub fn get_or<T: Clone + Send + Sync + 'static>(&self, key: &CacheKey, fallback: T) -> (T, bool) {
        match self.get(key) {
            Some(value) => (value, true),
            None => (fallback, false),
        }
    }

    /// Store a value permanently (for the lifetime of the request).
    pub fn put<T: Send + Sync + 'static>(&self, key: &CacheKey, value: T) {
        let mut items = self.items.write();
        items.insert(key.as_str().to_string(), Arc::new(value));
    }

    /// Store a value, returning a guard that restores the prior value (or
    /// removes the key if none existed) when dropped.
    #[must_use = "dropping the guard immediately undoes the write; use put() for a permanent entry"]
    pub fn set<T: Send + Sync + 'static>(&self, key: &CacheKey, value: T) -> CacheUndo<'_> {
        let mut items = self.items.write();
        let previous = items.insert(key.as_str().to_string(), Arc::new(value));
        CacheUndo {
            cache: self,
            key: key.as_str().to_string(),
            previous: Some(previous),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

/// Undo guard returned by [`RequestCache::set`].
///
/// Restores the prior state on drop. `forget` keeps the written value.
pub struct CacheUndo<'a> {
    cache: &'a RequestCache,
    key: String,
    // None once undone or forgotten; Some(None) means the key was absent.
    previous: Option<Option<Entry>>,
}

impl CacheUndo<'_> {
    /// Keep the written value; the guard will not restore on drop.
    pub fn forget(mut self) {
        self.previous = None;
    }

    /// Restore the prior value now.
    pub fn undo(self) {
        drop(self);
    }

    fn restore(&mut self) {
        if let Some(previous) = self.previous.take() {
            let mut items = self.cache.items.write();
            match previous {
                Some(entry) => {
                    items.insert(self.key.clone(), entry);
                }
                None => {
                    items.remove(&self.key);
                }
            }
        }
    }
}

impl Drop for CacheUndo<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}
