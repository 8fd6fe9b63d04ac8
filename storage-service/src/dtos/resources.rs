use crate::models::{Resource, ResourceType};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDirectoryRequest {
    pub parent_id: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RenameRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResourceResponse {
    pub id: String,
    pub resource_type: ResourceType,
    pub parent_id: Option<String>,
    pub creator_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Resource> for ResourceResponse {
    fn from(resource: Resource) -> Self {
        let (mime_type, size) = match resource.file {
            Some(info) => (Some(info.mime_type), Some(info.size)),
            None => (None, None),
        };

        Self {
            id: resource.id,
            resource_type: resource.resource_type,
            parent_id: resource.parent_id,
            creator_id: resource.creator_id,
            name: resource.name,
            mime_type,
            size,
            created_at: resource.created_at.to_rfc3339(),
            updated_at: resource.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChildrenResponse {
    pub dir_id: String,
    pub children: Vec<ResourceResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PresignedUrlResponse {
    pub url: String,
    pub expires_in: u64,
}

/// Query of a presigned blob download.
#[derive(Debug, Deserialize)]
pub struct BlobParams {
    pub expires: i64,
    pub signature: String,
}
