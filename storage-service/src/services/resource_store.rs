//! Resource Store: metadata of directories and files keyed by resource id.
//!
//! The authorization engine only ever reads from it (`get_meta`); the
//! resource service owns every write.

use crate::authz::AuthzError;
use crate::models::Resource;
use crate::services::MongoDb;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use futures::TryStreamExt;
use mongodb::bson::{doc, DateTime as BsonDateTime};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch metadata, failing with `NotFound` for unknown ids.
    async fn get_meta(&self, resource_id: &str) -> Result<Resource, AuthzError>;
    async fn insert(&self, resource: &Resource) -> Result<(), AuthzError>;
    async fn rename(&self, resource_id: &str, name: &str) -> Result<Resource, AuthzError>;
    async fn delete(&self, resource_id: &str) -> Result<(), AuthzError>;
    /// Direct children of a directory, ordered by name.
    async fn children(&self, resource_id: &str) -> Result<Vec<Resource>, AuthzError>;
    async fn health_check(&self) -> Result<(), AuthzError>;
}

#[derive(Clone)]
pub struct MongoResourceStore {
    db: MongoDb,
}

impl MongoResourceStore {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ResourceStore for MongoResourceStore {
    async fn get_meta(&self, resource_id: &str) -> Result<Resource, AuthzError> {
        self.db
            .resources()
            .find_one(doc! { "_id": resource_id }, None)
            .await?
            .ok_or_else(|| AuthzError::NotFound(resource_id.to_string()))
    }

    async fn insert(&self, resource: &Resource) -> Result<(), AuthzError> {
        self.db
            .resources()
            .insert_one(resource, None)
            .await
            .map_err(|e| {
                tracing::error!(resource_id = %resource.id, "Failed to insert resource: {}", e);
                AuthzError::from(e)
            })?;
        Ok(())
    }

    async fn rename(&self, resource_id: &str, name: &str) -> Result<Resource, AuthzError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.db
            .resources()
            .find_one_and_update(
                doc! { "_id": resource_id },
                doc! { "$set": {
                    "name": name,
                    "updated_at": BsonDateTime::from_chrono(Utc::now()),
                } },
                options,
            )
            .await?
            .ok_or_else(|| AuthzError::NotFound(resource_id.to_string()))
    }

    async fn delete(&self, resource_id: &str) -> Result<(), AuthzError> {
        self.db
            .resources()
            .delete_one(doc! { "_id": resource_id }, None)
            .await?;
        Ok(())
    }

    async fn children(&self, resource_id: &str) -> Result<Vec<Resource>, AuthzError> {
        let options = FindOptions::builder().sort(doc! { "name": 1 }).build();
        let cursor = self
            .db
            .resources()
            .find(doc! { "parent_id": resource_id }, options)
            .await?;
        let children: Vec<Resource> = cursor.try_collect().await?;
        Ok(children)
    }

    async fn health_check(&self) -> Result<(), AuthzError> {
        self.db
            .health_check()
            .await
            .map_err(|e| AuthzError::StoreUnavailable(anyhow::Error::new(e)))
    }
}

/// Process-local store used for `STORE_BACKEND=memory` and tests.
#[derive(Default)]
pub struct InMemoryResourceStore {
    resources: DashMap<String, Resource>,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn get_meta(&self, resource_id: &str) -> Result<Resource, AuthzError> {
        self.resources
            .get(resource_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| AuthzError::NotFound(resource_id.to_string()))
    }

    async fn insert(&self, resource: &Resource) -> Result<(), AuthzError> {
        self.resources.insert(resource.id.clone(), resource.clone());
        Ok(())
    }

    async fn rename(&self, resource_id: &str, name: &str) -> Result<Resource, AuthzError> {
        let mut entry = self
            .resources
            .get_mut(resource_id)
            .ok_or_else(|| AuthzError::NotFound(resource_id.to_string()))?;
        entry.name = name.to_string();
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn delete(&self, resource_id: &str) -> Result<(), AuthzError> {
        self.resources.remove(resource_id);
        Ok(())
    }

    async fn children(&self, resource_id: &str) -> Result<Vec<Resource>, AuthzError> {
        let mut children: Vec<Resource> = self
            .resources
            .iter()
            .filter(|r| r.parent_id.as_deref() == Some(resource_id))
            .map(|r| r.value().clone())
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    async fn health_check(&self) -> Result<(), AuthzError> {
        Ok(())
    }
}
