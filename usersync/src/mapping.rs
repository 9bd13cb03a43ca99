use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// User to group mapping read from a user/group source.
///
/// Users are kept sorted; each user's groups keep their source order with
/// duplicates and empty names removed. A mapping is built once per read
/// and then replaced wholesale, never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UserGroupMapping {
    users: BTreeMap<String, Vec<String>>,
}

impl UserGroupMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the groups of `user`, replacing any earlier entry for that user
    pub fn insert<I, S>(&mut self, user: impl Into<String>, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for group in groups {
            let group = group.into();
            if !group.is_empty() && !unique.contains(&group) {
                unique.push(group);
            }
        }
        self.users.insert(user.into(), unique);
    }

    pub fn groups(&self, user: &str) -> Option<&[String]> {
        self.users.get(user).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.users
            .iter()
            .map(|(user, groups)| (user.as_str(), groups.as_slice()))
    }

    /// Dump every user and group at debug level
    pub fn log_debug(&self) {
        for (user, groups) in self.iter() {
            debug!("USER: {}", user);
            for group in groups {
                debug!("\tGROUP: {}", group);
            }
        }
    }
}

impl<U, G> FromIterator<(U, G)> for UserGroupMapping
where
    U: Into<String>,
    G: IntoIterator,
    G::Item: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (U, G)>>(iter: T) -> Self {
        let mut mapping = Self::new();
        for (user, groups) in iter {
            mapping.insert(user, groups);
        }
        mapping
    }
}

// Goes through `insert` so deserialized groups are cleaned up the same way
impl<'de> Deserialize<'de> for UserGroupMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let users = BTreeMap::<String, Vec<String>>::deserialize(deserializer)?;
        Ok(users.into_iter().collect())
    }
}
