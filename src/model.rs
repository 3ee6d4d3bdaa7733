//! Social graph data model
//!
//! A [`User`] is either the graph owner or one of the owner's friends.
//! Identity is by `id`; `name` is only a display attribute.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A person in the owner's one-hop neighborhood
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// Remote identifier
    pub id: String,
    /// Display name
    pub name: String,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Name lowercased with every whitespace character removed.
    ///
    /// Used to derive the cache file name, so it must stay stable across runs.
    pub fn normalized_name(&self) -> String {
        self.name
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect()
    }

    /// Name with path separators replaced, safe to use as a single path component.
    ///
    /// Names that would resolve to the current or parent directory (empty,
    /// `.`, `..`, ...) have every dot replaced as well.
    pub fn path_component(&self) -> String {
        let component: String = self
            .name
            .chars()
            .map(|c| if std::path::is_separator(c) { '_' } else { c })
            .collect();

        if component.chars().all(|c| c == '.') {
            return "_".repeat(component.len().max(1));
        }
        component
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.id)
    }
}

/// Friends of the owner, in the order the remote source reported them
pub type FriendList = Vec<User>;

/// Ids of people who are friends with both the owner and one friend
pub type MutualFriendSet = IndexSet<String>;
