use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// An unordered set of role claims
///
/// Ordering is kept deterministic so that denial messages and logs are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    /// Create an empty role set
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Check if the set contains a specific role
    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role)
    }

    /// Check if the set contains any of the provided roles
    pub fn has_any<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|role| self.contains(role.as_ref()))
    }

    /// Check if the set contains all of the provided roles
    pub fn has_all<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().all(|role| self.contains(role.as_ref()))
    }

    /// True iff every role in `self` is also in `granted`
    pub fn is_subset_of(&self, granted: &RoleSet) -> bool {
        self.0.is_subset(&granted.0)
    }

    /// Roles of `self` that `granted` lacks
    pub fn missing_from(&self, granted: &RoleSet) -> RoleSet {
        Self(self.0.difference(&granted.0).cloned().collect())
    }

    pub fn insert(&mut self, role: impl Into<String>) -> bool {
        self.0.insert(role.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roles: Vec<&str> = self.iter().collect();
        write!(f, "{}", roles.join(", "))
    }
}

impl<S: Into<String>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for RoleSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

impl From<Vec<String>> for RoleSet {
    fn from(roles: Vec<String>) -> Self {
        roles.into_iter().collect()
    }
}

impl<const N: usize> From<[&str; N]> for RoleSet {
    fn from(roles: [&str; N]) -> Self {
        roles.into_iter().collect()
    }
}
