//! In-memory friend source
//!
//! Serves a fixed neighborhood without network access. Failures can be
//! injected per friend to exercise partial-failure recovery.

use super::{FriendSource, SourceError, SourceResult};
use crate::model::{MutualFriendSet, User};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    /// Fail the next request, then succeed
    Once,
    /// Fail every request
    Always,
    /// Reject the credential
    ExpiredToken,
}

/// Friend source backed by in-process maps
#[derive(Debug)]
pub struct InMemorySource {
    owner: User,
    friends: Vec<User>,
    mutuals: HashMap<String, MutualFriendSet>,
    failures: Mutex<HashMap<String, Failure>>,
    profile_error: Option<String>,
    /// Friend ids passed to `mutual_friends`, in call order
    calls: Mutex<Vec<String>>,
}

impl InMemorySource {
    pub fn new(owner: User) -> Self {
        Self {
            owner,
            friends: Vec::new(),
            mutuals: HashMap::new(),
            failures: Mutex::new(HashMap::new()),
            profile_error: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Owner Ann(1) with friends Bob(2) and Cy(3). Bob's mutual set is `{3}`,
    /// Cy's is empty.
    pub fn sample() -> Self {
        Self::new(User::new("1", "Ann"))
            .with_friend(User::new("2", "Bob"), &["3"])
            .with_friend(User::new("3", "Cy"), &[])
    }

    /// Add a friend and the ids it shares with the owner
    pub fn with_friend(mut self, friend: User, mutuals: &[&str]) -> Self {
        self.mutuals
            .insert(friend.id.clone(), mutuals.iter().map(|id| id.to_string()).collect());
        self.friends.push(friend);
        self
    }

    /// Fail the next mutual-friend request for `friend_id`
    pub fn fail_once(self, friend_id: &str) -> Self {
        self.set_failure(friend_id, Failure::Once);
        self
    }

    /// Fail every mutual-friend request for `friend_id`
    pub fn fail_always(self, friend_id: &str) -> Self {
        self.set_failure(friend_id, Failure::Always);
        self
    }

    /// Reject the credential once the request for `friend_id` is reached
    pub fn expire_token_at(self, friend_id: &str) -> Self {
        self.set_failure(friend_id, Failure::ExpiredToken);
        self
    }

    /// Make the profile request fail
    pub fn fail_profile(mut self, message: &str) -> Self {
        self.profile_error = Some(message.to_string());
        self
    }

    /// Friend ids requested so far, in call order
    pub fn mutual_calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    fn set_failure(&self, friend_id: &str, failure: Failure) {
        lock(&self.failures).insert(friend_id.to_string(), failure);
    }

    fn take_failure(&self, friend_id: &str) -> Option<Failure> {
        let mut failures = lock(&self.failures);
        match failures.get(friend_id).copied() {
            Some(Failure::Once) => failures.remove(friend_id),
            other => other,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl FriendSource for InMemorySource {
    async fn owner_profile(&self) -> SourceResult<User> {
        match &self.profile_error {
            Some(message) => Err(SourceError::Api {
                status: 500,
                message: message.clone(),
            }),
            None => Ok(self.owner.clone()),
        }
    }

    async fn friends(&self, owner_id: &str) -> SourceResult<Vec<User>> {
        if owner_id != self.owner.id {
            return Err(SourceError::NotFound(owner_id.to_string()));
        }
        Ok(self.friends.clone())
    }

    async fn mutual_friends(&self, owner_id: &str, friend_id: &str) -> SourceResult<MutualFriendSet> {
        lock(&self.calls).push(friend_id.to_string());

        if owner_id != self.owner.id {
            return Err(SourceError::NotFound(owner_id.to_string()));
        }

        match self.take_failure(friend_id) {
            Some(Failure::ExpiredToken) => {
                return Err(SourceError::Authentication("access token has expired".to_string()))
            }
            Some(Failure::Once) | Some(Failure::Always) => {
                return Err(SourceError::Api {
                    status: 503,
                    message: format!("temporarily unavailable: {}", friend_id),
                })
            }
            None => {}
        }

        self.mutuals
            .get(friend_id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(friend_id.to_string()))
    }
}
