//! Graph assembly
//!
//! [`GraphBuilder`] runs one build for the owner behind a [`FriendSource`]:
//! 1. fetch the owner and the friend list (fatal on failure)
//! 2. load the cache and drop friends who are gone
//! 3. fetch mutual friends for everyone not cached yet, one at a time
//! 4. save the cache and write a fresh GraphML document, on every exit path
//!
//! A failed fetch for one friend is logged and skipped; that friend stays
//! uncached and is fetched again on the next run.

pub mod guard;
pub mod progress;

pub use guard::CacheGuard;
pub use progress::{ConsoleProgress, ProgressSink, SilentProgress};

use crate::graphml::{GraphMlError, GraphMlSummary, GraphMlWriter};
use crate::model::User;
use crate::persistence::{CacheError, CacheStore, MutualFriendCache};
use crate::source::{FriendSource, MutualFetchError, SourceError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Build errors. All of them end the run.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The access token was rejected
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Owner profile or friend list unavailable
    #[error("Could not retrieve profile or friend list: {0}")]
    ProfileFetch(#[source] SourceError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache error
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// GraphML error
    #[error("GraphML error: {0}")]
    GraphMl(#[from] GraphMlError),
}

impl BuildError {
    fn from_profile(error: SourceError) -> Self {
        match error {
            SourceError::Authentication(message) => BuildError::Authentication(message),
            other => BuildError::ProfileFetch(other),
        }
    }
}

pub type BuildResult<T> = Result<T, BuildError>;

/// Outcome of a completed build
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub owner: User,
    /// Friends in the current list
    pub total_friends: usize,
    /// Current friends with cached mutual-friend data
    pub with_mutual_data: usize,
    /// Friends fetched during this run
    pub fetched: usize,
    /// Friends skipped because they were already cached
    pub already_cached: usize,
    /// Ids whose fetch failed this run
    pub failed: Vec<String>,
    /// Cache entries dropped because the person is no longer a friend
    pub stale_removed: usize,
    pub cache_path: PathBuf,
    pub graph_path: PathBuf,
    pub graph: GraphMlSummary,
}

impl BuildReport {
    pub fn summary_line(&self) -> String {
        format!(
            "Have mutual friends for {} out of {} friends",
            self.with_mutual_data, self.total_friends
        )
    }

    /// Every current friend has mutual-friend data
    pub fn is_complete(&self) -> bool {
        self.with_mutual_data == self.total_friends
    }
}

#[derive(Debug, Default)]
struct FetchStats {
    fetched: usize,
    already_cached: usize,
    failed: Vec<String>,
    /// Error that ended the loop before every friend was visited
    stopped: Option<BuildError>,
}

/// Builds the mutual-friend graph of one owner
pub struct GraphBuilder<S> {
    source: S,
    data_dir: PathBuf,
}

impl<S: FriendSource> GraphBuilder<S> {
    pub fn new(source: S, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            data_dir: data_dir.into(),
        }
    }

    /// `<data_dir>/<ownerName>/`
    pub fn owner_directory(&self, owner: &User) -> PathBuf {
        self.data_dir.join(owner.path_component())
    }

    /// `<directory>/<ownerName>(<ownerId>).graphml`
    pub fn graph_path(directory: &Path, owner: &User) -> PathBuf {
        directory.join(format!("{}({}).graphml", owner.path_component(), owner.id))
    }

    pub async fn run(&self) -> BuildResult<BuildReport> {
        self.run_with_progress(&mut SilentProgress).await
    }

    pub async fn run_with_progress<P: ProgressSink>(&self, progress: &mut P) -> BuildResult<BuildReport> {
        let owner = self
            .source
            .owner_profile()
            .await
            .map_err(BuildError::from_profile)?;
        info!("Retrieving friends of {}", owner);
        let friends = self
            .source
            .friends(&owner.id)
            .await
            .map_err(BuildError::from_profile)?;
        progress.started(&owner, friends.len());

        let directory = self.owner_directory(&owner);
        fs::create_dir_all(&directory)?;

        let store = CacheStore::new(&directory, owner.clone());
        let mut cache = Self::load_cache(&store)?;
        let stale_removed = cache.reconcile(&friends);

        let mut guard = CacheGuard::new(store, cache);
        let stats = self.fetch_missing(&owner, &friends, &mut guard, progress).await;

        // Persist and write whether or not the loop finished
        let cache_path = guard.store().path();
        let cache = guard.finish()?;
        let graph_path = Self::graph_path(&directory, &owner);
        let graph = write_graph(&graph_path, &owner, &friends, &cache)?;
        info!("Wrote {} nodes and {} edges to {:?}", graph.nodes, graph.edges, graph_path);

        let report = BuildReport {
            with_mutual_data: friends.iter().filter(|f| cache.has(&f.id)).count(),
            total_friends: friends.len(),
            owner,
            fetched: stats.fetched,
            already_cached: stats.already_cached,
            failed: stats.failed,
            stale_removed,
            cache_path,
            graph_path,
            graph,
        };
        info!("{}", report.summary_line());

        if let Some(e) = stats.stopped {
            warn!(
                "Stopped early with {} of {} friends cached; progress saved to {:?}",
                report.with_mutual_data, report.total_friends, report.cache_path
            );
            progress.stopped(&report, &e);
            return Err(e);
        }

        progress.finished(&report);
        Ok(report)
    }

    /// An unreadable cache is set aside and replaced by an empty one
    fn load_cache(store: &CacheStore) -> BuildResult<MutualFriendCache> {
        match store.load() {
            Ok(cache) => Ok(cache),
            Err(CacheError::Corrupt { path, reason }) => {
                warn!("Ignoring unreadable cache {:?}: {}", path, reason);
                store.quarantine()?;
                Ok(MutualFriendCache::new(store.owner().clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch_missing<P: ProgressSink>(
        &self,
        owner: &User,
        friends: &[User],
        guard: &mut CacheGuard,
        progress: &mut P,
    ) -> FetchStats {
        let total = friends.len();
        let mut stats = FetchStats::default();

        for (index, friend) in friends.iter().enumerate() {
            let position = index + 1;

            if guard.has(&friend.id) {
                debug!("{}/{}: {} already loaded", position, total, friend);
                progress.already_loaded(position, total, friend);
                stats.already_cached += 1;
                continue;
            }

            progress.fetching(position, total, friend);
            match self.source.mutual_friends(&owner.id, &friend.id).await {
                Ok(mutuals) => {
                    debug!("{}/{}: {} shares {} friends", position, total, friend, mutuals.len());
                    guard.insert(friend.id.clone(), mutuals);
                    stats.fetched += 1;
                }
                // No later request can succeed with this token
                Err(SourceError::Authentication(message)) => {
                    stats.stopped = Some(BuildError::Authentication(message));
                    break;
                }
                Err(source) => {
                    let error = MutualFetchError {
                        friend_id: friend.id.clone(),
                        source,
                    };
                    warn!("{}", error);
                    progress.fetch_failed(position, total, friend, &error);
                    stats.failed.push(error.friend_id);
                }
            }
        }

        stats
    }
}

/// Write a complete document: owner, friends, then cached edges
fn write_graph(
    path: &Path,
    owner: &User,
    friends: &[User],
    cache: &MutualFriendCache,
) -> BuildResult<GraphMlSummary> {
    let mut writer = GraphMlWriter::create(path, owner)?;
    writer.add_nodes(friends)?;
    writer.add_edges(cache)?;
    Ok(writer.close()?)
}
