//! Remote friend-data sources
//!
//! [`FriendSource`] is the seam between the graph builder and whatever
//! supplies profiles and friend lists:
//! - `GraphApiClient` talks to the social network's Graph API over HTTP
//! - `InMemorySource` serves a fixed neighborhood (tests, demos)

pub mod graph_api;
pub mod memory;

pub use graph_api::GraphApiClient;
pub use memory::InMemorySource;

use crate::model::{MutualFriendSet, User};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by a friend-data source
#[derive(Error, Debug)]
pub enum SourceError {
    /// Credential rejected or expired
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with an error payload
    #[error("Graph API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// A request URL could not be built
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Unknown user
    #[error("Not found: {0}")]
    NotFound(String),
}

impl SourceError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, SourceError::Authentication(_))
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Failure to fetch one friend's mutual friends.
///
/// Recoverable: the friend stays uncached and is retried on the next run.
#[derive(Error, Debug)]
#[error("Failed to fetch mutual friends of {friend_id}: {source}")]
pub struct MutualFetchError {
    pub friend_id: String,
    pub source: SourceError,
}

/// Supplier of the owner's profile, friends, and mutual friends.
///
/// The access credential belongs to the implementation.
#[async_trait]
pub trait FriendSource: Send + Sync {
    /// Profile of the authenticated owner
    async fn owner_profile(&self) -> SourceResult<User>;

    /// Current friend list of `owner_id`
    async fn friends(&self, owner_id: &str) -> SourceResult<Vec<User>>;

    /// Ids of people who are friends with both `owner_id` and `friend_id`
    async fn mutual_friends(&self, owner_id: &str, friend_id: &str) -> SourceResult<MutualFriendSet>;
}

#[async_trait]
impl<T: FriendSource + ?Sized> FriendSource for Arc<T> {
    async fn owner_profile(&self) -> SourceResult<User> {
        (**self).owner_profile().await
    }

    async fn friends(&self, owner_id: &str) -> SourceResult<Vec<User>> {
        (**self).friends(owner_id).await
    }

    async fn mutual_friends(&self, owner_id: &str, friend_id: &str) -> SourceResult<MutualFriendSet> {
        (**self).mutual_friends(owner_id, friend_id).await
    }
}
