use crate::models::{ActionType, PermissionGrant};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body of grant and revoke requests. Action names are parsed by the handler
/// so unknown names surface as an invalid action rather than a body error.
#[derive(Debug, Deserialize, Validate)]
pub struct PermissionRequest {
    #[validate(length(min = 1, max = 255))]
    pub group_id: String,
    pub actions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GrantResponse {
    pub resource_id: String,
    pub group_id: String,
    /// Actions the group holds after the change; empty once the grant is gone.
    pub actions: Vec<ActionType>,
}

impl GrantResponse {
    pub fn from_grant(grant: PermissionGrant) -> Self {
        Self {
            resource_id: grant.resource_id,
            group_id: grant.group_id,
            actions: grant.actions.into_iter().collect(),
        }
    }

    pub fn removed(resource_id: &str, group_id: &str) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            group_id: group_id.to_string(),
            actions: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizedGroupsResponse {
    pub resource_id: String,
    pub groups: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AccessParams {
    pub action: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessResponse {
    pub resource_id: String,
    pub action: ActionType,
    pub allowed: bool,
}
