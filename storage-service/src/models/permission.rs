//! Permission grants: (resource, group, action-set) records.

use crate::authz::AuthzError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

/// Content-level actions a grant can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Read,
    Write,
}

pub type ActionSet = BTreeSet<ActionType>;

impl ActionType {
    pub const ALL: [ActionType; 2] = [ActionType::Read, ActionType::Write];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Read => "read",
            ActionType::Write => "write",
        }
    }

    /// Parse a list of action names, rejecting unknown names and empty lists.
    pub fn parse_set<S: AsRef<str>>(names: &[S]) -> Result<ActionSet, AuthzError> {
        if names.is_empty() {
            return Err(AuthzError::InvalidAction(
                "at least one action is required".to_string(),
            ));
        }
        names.iter().map(|n| n.as_ref().parse()).collect()
    }
}

impl FromStr for ActionType {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "read" => Ok(ActionType::Read),
            "write" => Ok(ActionType::Write),
            other => Err(AuthzError::InvalidAction(other.to_string())),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A grant record. At most one exists per (resource_id, group_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionGrant {
    #[serde(rename = "_id")]
    pub id: String,
    pub resource_id: String,
    pub group_id: String,
    pub actions: ActionSet,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl PermissionGrant {
    pub fn new(resource_id: &str, group_id: &str, actions: ActionSet) -> Self {
        let now = Utc::now();
        Self {
            id: Self::key(resource_id, group_id),
            resource_id: resource_id.to_string(),
            group_id: group_id.to_string(),
            actions,
            created_at: now,
            updated_at: now,
        }
    }

    /// Storage key of the grant for `(resource_id, group_id)`.
    pub fn key(resource_id: &str, group_id: &str) -> String {
        format!("{}:{}", resource_id, group_id)
    }

    /// True when this grant lets a member of any of `group_ids` perform `action`.
    pub fn allows(&self, group_ids: &HashSet<String>, action: ActionType) -> bool {
        group_ids.contains(&self.group_id) && self.actions.contains(&action)
    }
}
