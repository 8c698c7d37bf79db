//! Shared key-value cache used for rate profiles and read memoisation.
//!
//! The trait is async so a distributed backend can stand behind it; [`InMemoryCache`] is the
//! process-local implementation.

use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

/// Process-wide (or cross-process) cache.
#[async_trait]
pub trait SharedCache<K, V>: Send + Sync + std::fmt::Debug
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Result<Option<V>, StoreError>;

    async fn put(&self, key: K, value: V) -> Result<(), StoreError>;

    async fn invalidate(&self, key: &K) -> Result<(), StoreError>;
}

/// Named in-memory cache backed by an `RwLock`. Clones share entries.
#[derive(Debug, Clone)]
pub struct InMemoryCache<K, V> {
    name: Arc<str>,
    entries: Arc<RwLock<HashMap<K, V>>>,
}

impl<K, V> InMemoryCache<K, V> {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into(), entries: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<K, V> SharedCache<K, V> for InMemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + std::fmt::Debug + 'static,
{
    async fn get(&self, key: &K) -> Result<Option<V>, StoreError> {
        let guard = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard.get(key).cloned())
    }

    async fn put(&self, key: K, value: V) -> Result<(), StoreError> {
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(key, value);
        Ok(())
    }

    async fn invalidate(&self, key: &K) -> Result<(), StoreError> {
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if guard.remove(key).is_some() {
            tracing::debug!(cache = %self.name, ?key, "cache entry invalidated");
        }
        Ok(())
    }
}

/// Cache whose every call fails, for exercising the bypass paths.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FailingCache;

#[cfg(test)]
#[async_trait]
impl<K, V> SharedCache<K, V> for FailingCache
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    async fn get(&self, _: &K) -> Result<Option<V>, StoreError> {
        Err(StoreError::Unavailable("cache down".into()))
    }

    async fn put(&self, _: K, _: V) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("cache down".into()))
    }

    async fn invalidate(&self, _: &K) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("cache down".into()))
    }
}
