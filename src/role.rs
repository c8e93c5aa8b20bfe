//! Role tags attached to normalized nodes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::node::Node;

/// A semantic tag such as `Identifier` or `Expression`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Role(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        Role::new(s)
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Role(s)
    }
}

impl From<&Role> for Node {
    fn from(role: &Role) -> Self {
        Node::from(role.as_str())
    }
}

/// Shorthand for building role lists in rule tables.
pub fn role_list<I, S>(names: I) -> Vec<Role>
where
    I: IntoIterator<Item = S>,
    S: Into<Role>,
{
    names.into_iter().map(Into::into).collect()
}
