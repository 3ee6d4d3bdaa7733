//! Scoped ownership of the cache during a run
//!
//! [`CacheGuard`] holds the cache while friends are fetched. `finish` saves
//! it; if the guard is dropped first (the run future was cancelled or a panic
//! unwound through it) `Drop` saves it instead. Either way the save happens
//! once.

use crate::model::MutualFriendSet;
use crate::persistence::{CacheResult, CacheStore, MutualFriendCache};
use tracing::{error, warn};

pub struct CacheGuard {
    store: CacheStore,
    /// `None` once saved
    cache: Option<MutualFriendCache>,
}

impl CacheGuard {
    pub fn new(store: CacheStore, cache: MutualFriendCache) -> Self {
        Self {
            store,
            cache: Some(cache),
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn has(&self, friend_id: &str) -> bool {
        self.cache.as_ref().is_some_and(|c| c.has(friend_id))
    }

    pub fn insert(&mut self, friend_id: impl Into<String>, mutuals: MutualFriendSet) {
        if let Some(cache) = self.cache.as_mut() {
            cache.insert(friend_id, mutuals);
        }
    }

    pub fn len(&self) -> usize {
        self.cache.as_ref().map_or(0, MutualFriendCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Save the cache and hand it back
    pub fn finish(mut self) -> CacheResult<MutualFriendCache> {
        let cache = self
            .cache
            .take()
            .unwrap_or_else(|| MutualFriendCache::new(self.store.owner().clone()));
        self.store.save(&cache)?;
        Ok(cache)
    }
}

impl Drop for CacheGuard {
    fn drop(&mut self) {
        let Some(cache) = self.cache.take() else {
            return;
        };
        match self.store.save(&cache) {
            Ok(path) => warn!(
                "Run interrupted, saved {} mutual-friend entries to {:?}",
                cache.len(),
                path
            ),
            Err(e) => error!("Run interrupted and the cache could not be saved: {}", e),
        }
    }
}
