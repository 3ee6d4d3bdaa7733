//! Persistence layer for the mutual-friend cache
//!
//! One JSON file per owner holds every friend's mutual-friend set fetched so
//! far. Runs load it, drop entries for people who are no longer friends, add
//! what they fetch, and write it back before exiting.

pub mod cache;

pub use cache::{CacheError, CacheResult, CacheStore, MutualFriendCache};

/// Suffix of cache file names, after `<normalizedName>(<ownerId>)`
pub const CACHE_FILE_SUFFIX: &str = ".mutualfriends.json";

/// Suffix appended to a cache file that could not be deserialized
pub const CORRUPT_FILE_SUFFIX: &str = ".corrupt";
