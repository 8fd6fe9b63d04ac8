use crate::models::{Resource, ResourceType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
    PermissionGranted,
    PermissionRevoked,
}

/// Change notification published after a successful mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub event_id: String,
    pub kind: EventKind,
    pub resource_id: String,
    pub resource_type: ResourceType,
    pub actor_id: String,
    pub occurred_at: DateTime<Utc>,
}

impl ResourceEvent {
    pub fn new(kind: EventKind, resource: &Resource, actor_id: &str) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            kind,
            resource_id: resource.id.clone(),
            resource_type: resource.resource_type,
            actor_id: actor_id.to_string(),
            occurred_at: Utc::now(),
        }
    }
}
