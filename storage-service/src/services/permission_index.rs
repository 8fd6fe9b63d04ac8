//! Permission Index: grants attached directly to each resource.
//!
//! Inherited access is never materialized here; the engine computes it by
//! walking ancestors. Every mutation is a single atomic read-modify-write on
//! the `(resource_id, group_id)` record.

use crate::authz::AuthzError;
use crate::models::{ActionSet, PermissionGrant};
use crate::services::MongoDb;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use futures::TryStreamExt;
use mongodb::bson::{doc, DateTime as BsonDateTime, Document};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use std::collections::{BTreeMap, BTreeSet};

#[async_trait]
pub trait PermissionIndex: Send + Sync {
    /// Grants recorded on exactly this resource. Empty, never an error, when none exist.
    async fn get_grants(&self, resource_id: &str) -> Result<Vec<PermissionGrant>, AuthzError>;

    /// Merge `actions` into the grant for `(resource_id, group_id)`, creating it if needed.
    async fn add_grant(
        &self,
        resource_id: &str,
        group_id: &str,
        actions: &ActionSet,
    ) -> Result<PermissionGrant, AuthzError>;

    /// Remove `actions` from the grant. Returns the remaining grant, or `None`
    /// when the record is gone (emptied or never existed).
    async fn remove_grant(
        &self,
        resource_id: &str,
        group_id: &str,
        actions: &ActionSet,
    ) -> Result<Option<PermissionGrant>, AuthzError>;

    /// Drop every grant on a resource. Returns the number of records removed.
    async fn remove_all_grants(&self, resource_id: &str) -> Result<u64, AuthzError>;

    /// Groups holding a non-empty direct grant on this resource.
    async fn list_groups_with_access(
        &self,
        resource_id: &str,
    ) -> Result<BTreeSet<String>, AuthzError> {
        Ok(self
            .get_grants(resource_id)
            .await?
            .into_iter()
            .filter(|g| !g.actions.is_empty())
            .map(|g| g.group_id)
            .collect())
    }
}

fn action_names(actions: &ActionSet) -> Vec<&'static str> {
    actions.iter().map(|a| a.as_str()).collect()
}

/// Matches the grant only when it already carries every one of `actions`.
fn holds_all_filter(key: &str, actions: &ActionSet) -> Document {
    doc! { "_id": key, "actions": { "$all": action_names(actions) } }
}

/// Matches the grant only when it carries at least one of `actions`.
fn holds_any_filter(key: &str, actions: &ActionSet) -> Document {
    doc! { "_id": key, "actions": { "$in": action_names(actions) } }
}

#[derive(Clone)]
pub struct MongoPermissionIndex {
    db: MongoDb,
}

impl MongoPermissionIndex {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PermissionIndex for MongoPermissionIndex {
    async fn get_grants(&self, resource_id: &str) -> Result<Vec<PermissionGrant>, AuthzError> {
        let cursor = self
            .db
            .grants()
            .find(doc! { "resource_id": resource_id }, None)
            .await?;
        let grants: Vec<PermissionGrant> = cursor.try_collect().await?;
        Ok(grants)
    }

    async fn add_grant(
        &self,
        resource_id: &str,
        group_id: &str,
        actions: &ActionSet,
    ) -> Result<PermissionGrant, AuthzError> {
        let key = PermissionGrant::key(resource_id, group_id);

        // Re-granting held actions leaves the record untouched
        if let Some(existing) = self
            .db
            .grants()
            .find_one(holds_all_filter(&key, actions), None)
            .await?
        {
            return Ok(existing);
        }

        let now = BsonDateTime::from_chrono(Utc::now());
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        self.db
            .grants()
            .find_one_and_update(
                doc! { "_id": &key },
                doc! {
                    "$addToSet": { "actions": { "$each": action_names(actions) } },
                    "$set": { "updated_at": now },
                    "$setOnInsert": {
                        "resource_id": resource_id,
                        "group_id": group_id,
                        "created_at": now,
                    },
                },
                options,
            )
            .await
            .map_err(|e| {
                tracing::error!(grant = %key, "Failed to upsert permission grant: {}", e);
                AuthzError::from(e)
            })?
            .ok_or_else(|| {
                AuthzError::StoreUnavailable(anyhow::anyhow!(
                    "Upsert of grant {} returned no document",
                    key
                ))
            })
    }

    async fn remove_grant(
        &self,
        resource_id: &str,
        group_id: &str,
        actions: &ActionSet,
    ) -> Result<Option<PermissionGrant>, AuthzError> {
        let key = PermissionGrant::key(resource_id, group_id);
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let remaining = self
            .db
            .grants()
            .find_one_and_update(
                holds_any_filter(&key, actions),
                doc! {
                    "$pullAll": { "actions": action_names(actions) },
                    "$set": { "updated_at": BsonDateTime::from_chrono(Utc::now()) },
                },
                options,
            )
            .await?;

        // Nothing to pull: report the record as it stands
        let Some(remaining) = remaining else {
            return Ok(self.db.grants().find_one(doc! { "_id": &key }, None).await?);
        };

        if !remaining.actions.is_empty() {
            return Ok(Some(remaining));
        }
        // Conditional so a concurrent add that landed in between survives
        self.db
            .grants()
            .delete_one(doc! { "_id": &key, "actions": { "$size": 0 } }, None)
            .await?;
        Ok(None)
    }

    async fn remove_all_grants(&self, resource_id: &str) -> Result<u64, AuthzError> {
        let result = self
            .db
            .grants()
            .delete_many(doc! { "resource_id": resource_id }, None)
            .await?;
        Ok(result.deleted_count)
    }
}

/// Process-local index. The DashMap shard lock held by `entry`/`get_mut`
/// serializes mutations on the same resource.
#[derive(Default)]
pub struct InMemoryPermissionIndex {
    grants: DashMap<String, BTreeMap<String, PermissionGrant>>,
}

impl InMemoryPermissionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resources with at least one grant.
    pub fn resource_count(&self) -> usize {
        self.grants.len()
    }
}

#[async_trait]
impl PermissionIndex for InMemoryPermissionIndex {
    async fn get_grants(&self, resource_id: &str) -> Result<Vec<PermissionGrant>, AuthzError> {
        Ok(self
            .grants
            .get(resource_id)
            .map(|groups| groups.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_grant(
        &self,
        resource_id: &str,
        group_id: &str,
        actions: &ActionSet,
    ) -> Result<PermissionGrant, AuthzError> {
        let mut groups = self.grants.entry(resource_id.to_string()).or_default();
        let grant = groups
            .entry(group_id.to_string())
            .or_insert_with(|| PermissionGrant::new(resource_id, group_id, ActionSet::new()));

        let before = grant.actions.len();
        grant.actions.extend(actions.iter().copied());
        if grant.actions.len() != before {
            grant.updated_at = Utc::now();
        }

        Ok(grant.clone())
    }

    async fn remove_grant(
        &self,
        resource_id: &str,
        group_id: &str,
        actions: &ActionSet,
    ) -> Result<Option<PermissionGrant>, AuthzError> {
        let remaining = match self.grants.get_mut(resource_id) {
            None => return Ok(None),
            Some(mut groups) => {
                let emptied = match groups.get_mut(group_id) {
                    None => return Ok(None),
                    Some(grant) => {
                        let before = grant.actions.len();
                        grant.actions.retain(|a| !actions.contains(a));
                        if grant.actions.len() != before {
                            grant.updated_at = Utc::now();
                        }
                        grant.actions.is_empty()
                    }
                };

                if emptied {
                    groups.remove(group_id);
                    None
                } else {
                    groups.get(group_id).cloned()
                }
            }
        };

        self.grants.remove_if(resource_id, |_, groups| groups.is_empty());
        Ok(remaining)
    }

    async fn remove_all_grants(&self, resource_id: &str) -> Result<u64, AuthzError> {
        Ok(self
            .grants
            .remove(resource_id)
            .map(|(_, groups)| groups.len() as u64)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActionType;
    use std::sync::Arc;

    fn set(actions: &[ActionType]) -> ActionSet {
        actions.iter().copied().collect()
    }

    #[tokio::test]
    async fn get_grants_is_empty_for_unknown_resource() {
        let index = InMemoryPermissionIndex::new();
        assert!(index.get_grants("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_grant_merges_into_existing_record() {
        let index = InMemoryPermissionIndex::new();
        index
            .add_grant("r1", "team", &set(&[ActionType::Read]))
            .await
            .unwrap();
        let merged = index
            .add_grant("r1", "team", &set(&[ActionType::Write]))
            .await
            .unwrap();

        assert_eq!(merged.actions, set(&[ActionType::Read, ActionType::Write]));
        assert_eq!(index.get_grants("r1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn repeated_add_is_idempotent() {
        let index = InMemoryPermissionIndex::new();
        let first = index
            .add_grant("r1", "team", &set(&[ActionType::Read]))
            .await
            .unwrap();
        let second = index
            .add_grant("r1", "team", &set(&[ActionType::Read]))
            .await
            .unwrap();

        assert_eq!(first.actions, second.actions);
        assert_eq!(first.updated_at, second.updated_at);
        assert_eq!(index.get_grants("r1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn removing_last_action_deletes_record() {
        let index = InMemoryPermissionIndex::new();
        index
            .add_grant("r1", "team", &set(&[ActionType::Read, ActionType::Write]))
            .await
            .unwrap();

        let remaining = index
            .remove_grant("r1", "team", &set(&[ActionType::Write]))
            .await
            .unwrap();
        assert_eq!(remaining.unwrap().actions, set(&[ActionType::Read]));

        let remaining = index
            .remove_grant("r1", "team", &set(&[ActionType::Read]))
            .await
            .unwrap();
        assert!(remaining.is_none());
        assert!(index.get_grants("r1").await.unwrap().is_empty());
        assert_eq!(index.resource_count(), 0);
    }

    #[tokio::test]
    async fn removing_absent_action_is_noop() {
        let index = InMemoryPermissionIndex::new();
        index
            .add_grant("r1", "team", &set(&[ActionType::Read]))
            .await
            .unwrap();

        let remaining = index
            .remove_grant("r1", "team", &set(&[ActionType::Write]))
            .await
            .unwrap();
        assert_eq!(remaining.unwrap().actions, set(&[ActionType::Read]));

        assert!(index
            .remove_grant("r1", "ghosts", &set(&[ActionType::Read]))
            .await
            .unwrap()
            .is_none());
        assert!(index
            .remove_grant("unknown", "team", &set(&[ActionType::Read]))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn remove_all_grants_purges_resource() {
        let index = InMemoryPermissionIndex::new();
        index
            .add_grant("r1", "a", &set(&[ActionType::Read]))
            .await
            .unwrap();
        index
            .add_grant("r1", "b", &set(&[ActionType::Write]))
            .await
            .unwrap();
        index
            .add_grant("r2", "a", &set(&[ActionType::Read]))
            .await
            .unwrap();

        assert_eq!(index.remove_all_grants("r1").await.unwrap(), 2);
        assert!(index.get_grants("r1").await.unwrap().is_empty());
        assert_eq!(index.get_grants("r2").await.unwrap().len(), 1);
        assert_eq!(index.remove_all_grants("r1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn lists_only_direct_groups() {
        let index = InMemoryPermissionIndex::new();
        index
            .add_grant("parent", "outer", &set(&[ActionType::Read]))
            .await
            .unwrap();
        index
            .add_grant("child", "inner", &set(&[ActionType::Read]))
            .await
            .unwrap();

        let groups = index.list_groups_with_access("child").await.unwrap();
        assert_eq!(groups, BTreeSet::from(["inner".to_string()]));
    }

    #[test]
    fn noop_filters_match_only_when_record_would_change() {
        let actions = set(&[ActionType::Read, ActionType::Write]);

        let all = holds_all_filter("r1:team", &actions);
        assert_eq!(all.get_str("_id").unwrap(), "r1:team");
        let names = all.get_document("actions").unwrap().get_array("$all").unwrap();
        assert_eq!(names.len(), 2);

        let any = holds_any_filter("r1:team", &set(&[ActionType::Read]));
        let names = any.get_document("actions").unwrap().get_array("$in").unwrap();
        assert_eq!(names[0].as_str(), Some("read"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn interleaved_add_and_remove_keep_unrelated_actions() {
        let index = Arc::new(InMemoryPermissionIndex::new());
        index
            .add_grant("res", "g", &set(&[ActionType::Write]))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..2000 {
            let index = index.clone();
            handles.push(tokio::spawn(async move {
                let read = set(&[ActionType::Read]);
                if i % 2 == 0 {
                    index.add_grant("res", "g", &read).await.map(|_| ())
                } else {
                    index.remove_grant("res", "g", &read).await.map(|_| ())
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let grants = index.get_grants("res").await.unwrap();
        assert_eq!(grants.len(), 1);
        assert!(grants[0].actions.contains(&ActionType::Write));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_grants_on_one_resource_are_not_lost() {
        let index = Arc::new(InMemoryPermissionIndex::new());
        let mut handles = Vec::new();

        for i in 0..32 {
            let index = index.clone();
            handles.push(tokio::spawn(async move {
                let action = if i % 2 == 0 {
                    ActionType::Read
                } else {
                    ActionType::Write
                };
                index
                    .add_grant("shared", &format!("g{}", i % 8), &set(&[action]))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let grants = index.get_grants("shared").await.unwrap();
        assert_eq!(grants.len(), 8);
        for grant in grants {
            // g0, g2, .. only ever receive READ; odd groups only WRITE
            assert_eq!(grant.actions.len(), 1);
        }
    }
}
