//! Resource metadata: directory and file nodes of the storage tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Dir,
    File,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Dir => "dir",
            ResourceType::File => "file",
        }
    }
}

/// Blob details carried by file resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub storage_key: String,
    pub mime_type: String,
    pub size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "_id")]
    pub id: String,
    pub resource_type: ResourceType,
    pub parent_id: Option<String>,
    /// Immutable for the life of the resource.
    pub creator_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileInfo>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    pub fn new_dir(creator_id: String, parent_id: Option<String>, name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            resource_type: ResourceType::Dir,
            parent_id,
            creator_id,
            name,
            file: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn new_file(creator_id: String, parent_id: String, name: String, file: FileInfo) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            resource_type: ResourceType::File,
            parent_id: Some(parent_id),
            creator_id,
            name,
            file: Some(file),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_dir(&self) -> bool {
        self.resource_type == ResourceType::Dir
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.creator_id == user_id
    }

    /// The resource whose grants govern metadata operations on this one:
    /// the containing directory, or the resource itself when it is a root.
    pub fn governing_id(&self) -> &str {
        self.parent_id.as_deref().unwrap_or(&self.id)
    }
}
