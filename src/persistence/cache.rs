//! Mutual-friend cache and its on-disk store

use super::{CACHE_FILE_SUFFIX, CORRUPT_FILE_SUFFIX};
use crate::model::{MutualFriendSet, User};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The cache file exists but cannot be used
    #[error("Corrupt cache file {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Friend id -> mutual-friend set for one owner.
///
/// Entries keep insertion order, which is also the order edges are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutualFriendCache {
    owner: User,
    #[serde(default)]
    entries: IndexMap<String, MutualFriendSet>,
}

impl MutualFriendCache {
    /// Create an empty cache
    pub fn new(owner: User) -> Self {
        Self {
            owner,
            entries: IndexMap::new(),
        }
    }

    pub fn owner(&self) -> &User {
        &self.owner
    }

    pub fn has(&self, friend_id: &str) -> bool {
        self.entries.contains_key(friend_id)
    }

    pub fn get(&self, friend_id: &str) -> Option<&MutualFriendSet> {
        self.entries.get(friend_id)
    }

    /// Insert or overwrite a friend's entry. An overwritten entry keeps its position.
    pub fn insert(&mut self, friend_id: impl Into<String>, mutuals: MutualFriendSet) -> Option<MutualFriendSet> {
        self.entries.insert(friend_id.into(), mutuals)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, MutualFriendSet> {
        self.entries.iter()
    }

    /// Drop every entry whose friend is not in `friends`.
    ///
    /// Afterwards the key set is exactly the intersection of the previous keys
    /// with the friend ids. Surviving entries are untouched. Returns the number
    /// of entries removed.
    pub fn reconcile(&mut self, friends: &[User]) -> usize {
        let current: HashSet<&str> = friends.iter().map(|f| f.id.as_str()).collect();
        let before = self.entries.len();
        self.entries.retain(|id, _| current.contains(id.as_str()));

        let removed = before - self.entries.len();
        if removed > 0 {
            info!("Removed {} former friends from the mutual-friend cache", removed);
        }
        removed
    }
}

impl<'a> IntoIterator for &'a MutualFriendCache {
    type Item = (&'a String, &'a MutualFriendSet);
    type IntoIter = indexmap::map::Iter<'a, String, MutualFriendSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Location of one owner's cache file
#[derive(Debug, Clone)]
pub struct CacheStore {
    directory: PathBuf,
    owner: User,
}

impl CacheStore {
    pub fn new(directory: impl Into<PathBuf>, owner: User) -> Self {
        Self {
            directory: directory.into(),
            owner,
        }
    }

    pub fn owner(&self) -> &User {
        &self.owner
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// `<normalizedName>(<ownerId>).mutualfriends.json`
    pub fn file_name(owner: &User) -> String {
        format!("{}({}){}", owner.normalized_name(), owner.id, CACHE_FILE_SUFFIX)
    }

    pub fn path(&self) -> PathBuf {
        self.directory.join(Self::file_name(&self.owner))
    }

    /// Load the cache, or an empty one if no file exists yet
    pub fn load(&self) -> CacheResult<MutualFriendCache> {
        let path = self.path();

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No cache at {:?}, starting empty", path);
                return Ok(MutualFriendCache::new(self.owner.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut cache: MutualFriendCache =
            serde_json::from_slice(&bytes).map_err(|e| CacheError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        if cache.owner.id != self.owner.id {
            return Err(CacheError::Corrupt {
                path,
                reason: format!("file belongs to owner {}", cache.owner.id),
            });
        }
        cache.owner = self.owner.clone();

        info!("Loaded {} cached mutual-friend entries from {:?}", cache.len(), path);
        Ok(cache)
    }

    /// Write the cache, replacing any previous version.
    ///
    /// The file is written to a temporary sibling first and renamed into place.
    pub fn save(&self, cache: &MutualFriendCache) -> CacheResult<PathBuf> {
        fs::create_dir_all(&self.directory)?;

        let path = self.path();
        let tmp_path = self.directory.join(format!("{}.tmp", Self::file_name(&self.owner)));

        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        serde_json::to_writer_pretty(&mut writer, cache)?;
        writer.write_all(b"\n")?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &path)?;

        debug!("Saved {} mutual-friend entries to {:?}", cache.len(), path);
        Ok(path)
    }

    /// Move an unreadable cache file aside so the next save does not destroy it.
    ///
    /// The first copy is `<file>.corrupt`; later ones get `.1`, `.2`, ...
    /// appended so earlier copies are kept.
    pub fn quarantine(&self) -> CacheResult<Option<PathBuf>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }

        let base = format!("{}{}", Self::file_name(&self.owner), CORRUPT_FILE_SUFFIX);
        let mut target = self.directory.join(&base);
        let mut counter = 0u32;
        while target.exists() {
            counter += 1;
            target = self.directory.join(format!("{}.{}", base, counter));
        }
        fs::rename(&path, &target)?;

        warn!("Moved unreadable cache {:?} to {:?}", path, target);
        Ok(Some(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn owner() -> User {
        User::new("1", "Ann Lee")
    }

    fn set(ids: &[&str]) -> MutualFriendSet {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn friends(ids: &[&str]) -> Vec<User> {
        ids.iter().map(|id| User::new(*id, format!("User {}", id))).collect()
    }

    #[test]
    fn test_file_name() {
        assert_eq!(CacheStore::file_name(&owner()), "annlee(1).mutualfriends.json");
    }

    #[test]
    fn test_load_missing_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path(), owner());

        let cache = store.load().unwrap();
        assert!(cache.is_empty());
        assert_eq!(cache.owner(), &owner());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path().join("nested").join("dir"), owner());

        let mut cache = MutualFriendCache::new(owner());
        cache.insert("3", set(&["4", "2"]));
        cache.insert("2", set(&[]));

        let path = store.save(&cache).unwrap();
        assert!(path.exists());
        assert!(!store.directory().join("annlee(1).mutualfriends.json.tmp").exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded, cache);
        let order: Vec<&String> = loaded.iter().map(|(k, _)| k).collect();
        assert_eq!(order, vec!["3", "2"]);
    }

    #[test]
    fn test_save_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path(), owner());

        let mut cache = MutualFriendCache::new(owner());
        cache.insert("2", set(&["3"]));
        store.save(&cache).unwrap();

        cache.reconcile(&friends(&["3"]));
        store.save(&cache).unwrap();

        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path(), owner());
        fs::write(store.path(), b"\x80not json").unwrap();

        match store.load() {
            Err(CacheError::Corrupt { path, .. }) => assert_eq!(path, store.path()),
            other => panic!("expected corrupt cache, got {:?}", other),
        }
    }

    #[test]
    fn test_foreign_owner_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let other = CacheStore::new(temp_dir.path(), User::new("9", "Ann Lee"));
        let cache = MutualFriendCache::new(User::new("9", "Ann Lee"));
        other.save(&cache).unwrap();

        // Same normalized name, different id in the file body
        let store = CacheStore::new(temp_dir.path(), owner());
        fs::copy(other.path(), store.path()).unwrap();

        assert!(matches!(store.load(), Err(CacheError::Corrupt { .. })));
    }

    #[test]
    fn test_quarantine() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path(), owner());
        assert_eq!(store.quarantine().unwrap(), None);

        fs::write(store.path(), b"garbage").unwrap();
        let moved = store.quarantine().unwrap().unwrap();

        assert!(!store.path().exists());
        assert_eq!(fs::read(moved).unwrap(), b"garbage");
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_quarantine_keeps_earlier_copies() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path(), owner());

        fs::write(store.path(), b"first").unwrap();
        let first = store.quarantine().unwrap().unwrap();
        fs::write(store.path(), b"second").unwrap();
        let second = store.quarantine().unwrap().unwrap();
        fs::write(store.path(), b"third").unwrap();
        let third = store.quarantine().unwrap().unwrap();

        assert_eq!(first, temp_dir.path().join("annlee(1).mutualfriends.json.corrupt"));
        assert_eq!(second, temp_dir.path().join("annlee(1).mutualfriends.json.corrupt.1"));
        assert_eq!(third, temp_dir.path().join("annlee(1).mutualfriends.json.corrupt.2"));
        assert_eq!(fs::read(first).unwrap(), b"first");
        assert_eq!(fs::read(second).unwrap(), b"second");
        assert_eq!(fs::read(third).unwrap(), b"third");
    }

    #[test]
    fn test_reconcile_is_intersection() {
        let mut cache = MutualFriendCache::new(owner());
        cache.insert("2", set(&["3"]));
        cache.insert("3", set(&["2"]));
        cache.insert("4", set(&[]));

        // List grew overall but still dropped "4"
        let removed = cache.reconcile(&friends(&["2", "3", "5", "6"]));

        assert_eq!(removed, 1);
        assert!(cache.has("2"));
        assert!(cache.has("3"));
        assert!(!cache.has("4"));
        assert_eq!(cache.get("2"), Some(&set(&["3"])));
    }

    #[test]
    fn test_reconcile_noop() {
        let mut cache = MutualFriendCache::new(owner());
        cache.insert("2", set(&["3"]));
        let before = cache.clone();

        assert_eq!(cache.reconcile(&friends(&["2", "3"])), 0);
        assert_eq!(cache, before);
    }

    #[test]
    fn test_insert_overwrites_in_place() {
        let mut cache = MutualFriendCache::new(owner());
        cache.insert("2", set(&[]));
        cache.insert("3", set(&[]));

        let previous = cache.insert("2", set(&["3"]));

        assert_eq!(previous, Some(set(&[])));
        assert_eq!(cache.len(), 2);
        let (first, mutuals) = cache.iter().next().unwrap();
        assert_eq!(first, "2");
        assert_eq!(mutuals, &set(&["3"]));
    }
}
