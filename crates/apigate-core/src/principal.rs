use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// An already-authenticated caller: username plus group memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user: String,
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl Principal {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            groups: BTreeSet::new(),
        }
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}
