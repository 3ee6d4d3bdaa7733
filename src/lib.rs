//! friendgraph
//!
//! Builds the mutual-friend graph of a social-network user and writes it as
//! GraphML. Mutual-friend lookups are cached per owner, so an interrupted or
//! partially failed run resumes where it stopped instead of starting over.
//!
//! # Layout
//!
//! - [`model`]: users, friend lists, mutual-friend sets
//! - [`graphml`]: streaming GraphML writer
//! - [`persistence`]: the per-owner mutual-friend cache
//! - [`builder`]: the build loop, with guaranteed cache persistence
//! - [`source`]: the friend-data seam (Graph API client, in-memory source)
//! - [`auth`]: single-shot OAuth callback listener
//! - [`config`]: runtime configuration
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use friendgraph::{GraphBuilder, InMemorySource};
//!
//! # async fn demo() -> Result<(), friendgraph::BuildError> {
//! let builder = GraphBuilder::new(InMemorySource::sample(), "FacebookData");
//! let report = builder.run().await?;
//! println!("{}", report.summary_line());
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod builder;
pub mod config;
pub mod graphml;
pub mod model;
pub mod persistence;
pub mod source;

// Re-export main types for convenience
pub use model::{FriendList, MutualFriendSet, User};

pub use graphml::{GraphMlError, GraphMlResult, GraphMlSummary, GraphMlWriter};

pub use persistence::{CacheError, CacheResult, CacheStore, MutualFriendCache};

pub use builder::{
    BuildError, BuildReport, BuildResult, CacheGuard, ConsoleProgress, GraphBuilder,
    ProgressSink, SilentProgress,
};

pub use source::{
    FriendSource, GraphApiClient, InMemorySource, MutualFetchError, SourceError, SourceResult,
};

pub use auth::{login_url, AuthError, AuthOutcome, AuthResult, CallbackListener};

pub use config::{ConfigError, ConfigResult, FriendGraphConfig};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
