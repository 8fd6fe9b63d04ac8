//! Authorization engine.
//!
//! Decides whether a caller may READ or WRITE a resource by walking from the
//! resource up to its root and looking for a matching group grant. Creators
//! always pass. Only a resource's creator may change its grants.

use crate::authz::AuthzError;
use crate::models::{ActionSet, ActionType, PermissionGrant, Resource};
use crate::services::{PermissionIndex, ResourceStore};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Outcome of one ascent: the decision and how many levels were inspected.
struct Resolution {
    allowed: bool,
    depth: usize,
}

#[derive(Clone)]
pub struct AuthzEngine {
    resources: Arc<dyn ResourceStore>,
    grants: Arc<dyn PermissionIndex>,
    max_depth: usize,
}

impl AuthzEngine {
    pub fn new(
        resources: Arc<dyn ResourceStore>,
        grants: Arc<dyn PermissionIndex>,
        max_depth: usize,
    ) -> Self {
        Self {
            resources,
            grants,
            max_depth,
        }
    }

    /// Can `user_id`, a member of `group_ids`, perform `action` on `resource_id`?
    ///
    /// `Ok(false)` is only returned once the whole ascent has been inspected;
    /// any lookup failure along the way is an error, never a decision.
    #[tracing::instrument(skip(self, group_ids))]
    pub async fn has_permission(
        &self,
        user_id: &str,
        resource_id: &str,
        group_ids: &HashSet<String>,
        action: ActionType,
    ) -> Result<bool, AuthzError> {
        let result = self.resolve(user_id, resource_id, group_ids, action).await;

        let outcome = match &result {
            Ok(r) if r.allowed => "allow",
            Ok(_) => "deny",
            Err(_) => "error",
        };
        metrics::counter!(
            "authz_decisions_total",
            "action" => action.as_str(),
            "outcome" => outcome
        )
        .increment(1);

        match result {
            Ok(resolution) => {
                metrics::histogram!("authz_ascent_depth").record(resolution.depth as f64);
                if resolution.allowed {
                    tracing::debug!(depth = resolution.depth, "Access allowed");
                } else {
                    tracing::info!(depth = resolution.depth, "Access denied");
                }
                Ok(resolution.allowed)
            }
            Err(e @ AuthzError::CorruptTree { .. }) => {
                tracing::error!("Resource tree corruption detected: {}", e);
                Err(e)
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!("Authorization lookup failed, safe to retry: {}", e);
                }
                Err(e)
            }
        }
    }

    async fn resolve(
        &self,
        user_id: &str,
        resource_id: &str,
        group_ids: &HashSet<String>,
        action: ActionType,
    ) -> Result<Resolution, AuthzError> {
        let target = self.resources.get_meta(resource_id).await?;
        if target.is_owned_by(user_id) {
            return Ok(Resolution {
                allowed: true,
                depth: 0,
            });
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut current = target;

        loop {
            if !visited.insert(current.id.clone()) {
                return Err(AuthzError::CorruptTree {
                    resource_id: current.id,
                    reason: "parent chain contains a cycle".to_string(),
                });
            }

            let grants = self.grants.get_grants(&current.id).await?;
            if grants.iter().any(|g| g.allows(group_ids, action)) {
                return Ok(Resolution {
                    allowed: true,
                    depth: visited.len(),
                });
            }

            let Some(parent_id) = current.parent_id.clone() else {
                return Ok(Resolution {
                    allowed: false,
                    depth: visited.len(),
                });
            };

            if visited.len() > self.max_depth {
                return Err(AuthzError::CorruptTree {
                    resource_id: resource_id.to_string(),
                    reason: format!("ascent exceeded {} levels", self.max_depth),
                });
            }

            current = self.parent_of(&current, &parent_id).await?;
        }
    }

    async fn parent_of(&self, child: &Resource, parent_id: &str) -> Result<Resource, AuthzError> {
        match self.resources.get_meta(parent_id).await {
            Ok(parent) => Ok(parent),
            Err(AuthzError::NotFound(_)) => Err(AuthzError::CorruptTree {
                resource_id: child.id.clone(),
                reason: format!("parent {} does not exist", parent_id),
            }),
            Err(e) => Err(e),
        }
    }

    /// Add `actions` for `group_id` on exactly `resource_id`. Creator only.
    pub async fn grant(
        &self,
        caller_id: &str,
        resource_id: &str,
        group_id: &str,
        actions: &ActionSet,
    ) -> Result<PermissionGrant, AuthzError> {
        Self::require_actions(actions)?;
        self.ensure_owner(caller_id, resource_id).await?;

        let grant = self.grants.add_grant(resource_id, group_id, actions).await?;

        // Deleted between the owner check and the upsert: drop the orphan
        if let Err(err) = self.resources.get_meta(resource_id).await {
            if matches!(err, AuthzError::NotFound(_)) {
                self.grants.remove_all_grants(resource_id).await?;
                tracing::warn!(resource_id = %resource_id, "Resource deleted during grant");
            }
            return Err(err);
        }

        metrics::counter!("permission_mutations_total", "op" => "grant").increment(1);
        tracing::info!(
            resource_id = %resource_id,
            group_id = %group_id,
            actions = ?grant.actions,
            "Permission granted"
        );
        Ok(grant)
    }

    /// Remove `actions` for `group_id` from `resource_id`. Creator only.
    ///
    /// Returns what is left of the grant, `None` once it is empty.
    pub async fn revoke(
        &self,
        caller_id: &str,
        resource_id: &str,
        group_id: &str,
        actions: &ActionSet,
    ) -> Result<Option<PermissionGrant>, AuthzError> {
        Self::require_actions(actions)?;
        self.ensure_owner(caller_id, resource_id).await?;

        let remaining = self
            .grants
            .remove_grant(resource_id, group_id, actions)
            .await?;
        metrics::counter!("permission_mutations_total", "op" => "revoke").increment(1);
        tracing::info!(
            resource_id = %resource_id,
            group_id = %group_id,
            removed = ?actions,
            "Permission revoked"
        );
        Ok(remaining)
    }

    /// Groups with a direct grant on `resource_id`. Inherited access is not included.
    pub async fn list_authorized_groups(
        &self,
        resource_id: &str,
    ) -> Result<BTreeSet<String>, AuthzError> {
        self.resources.get_meta(resource_id).await?;
        self.grants.list_groups_with_access(resource_id).await
    }

    /// Purge grants of a resource that is being deleted.
    pub async fn on_resource_deleted(&self, resource_id: &str) -> Result<u64, AuthzError> {
        let purged = self.grants.remove_all_grants(resource_id).await?;
        metrics::counter!("permission_mutations_total", "op" => "purge").increment(1);
        tracing::debug!(resource_id = %resource_id, purged, "Purged grants of deleted resource");
        Ok(purged)
    }

    async fn ensure_owner(&self, caller_id: &str, resource_id: &str) -> Result<(), AuthzError> {
        let resource = self.resources.get_meta(resource_id).await?;
        if resource.is_owned_by(caller_id) {
            return Ok(());
        }
        tracing::warn!(
            resource_id = %resource_id,
            caller_id = %caller_id,
            "Rejected permission change by non-owner"
        );
        Err(AuthzError::NotOwner {
            caller_id: caller_id.to_string(),
            resource_id: resource_id.to_string(),
        })
    }

    fn require_actions(actions: &ActionSet) -> Result<(), AuthzError> {
        if actions.is_empty() {
            return Err(AuthzError::InvalidAction(
                "at least one action is required".to_string(),
            ));
        }
        Ok(())
    }
}
