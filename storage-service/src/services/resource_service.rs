//! Directory and file operations, each gated by the authorization engine.

use crate::authz::AuthzEngine;
use crate::middleware::CallerContext;
use crate::models::{
    ActionSet, ActionType, EventKind, FileInfo, PermissionGrant, Resource, ResourceEvent,
    ResourceType,
};
use crate::services::{publish_in_background, BlobStore, EventPublisher, ResourceStore};
use service_core::error::AppError;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PresignedUrl {
    pub url: String,
    pub expires_in: u64,
}

#[derive(Clone)]
pub struct ResourceService {
    resources: Arc<dyn ResourceStore>,
    authz: AuthzEngine,
    blobs: Arc<dyn BlobStore>,
    events: Arc<dyn EventPublisher>,
    presign_ttl_secs: u64,
}

impl ResourceService {
    pub fn new(
        resources: Arc<dyn ResourceStore>,
        authz: AuthzEngine,
        blobs: Arc<dyn BlobStore>,
        events: Arc<dyn EventPublisher>,
        presign_ttl_secs: u64,
    ) -> Self {
        Self {
            resources,
            authz,
            blobs,
            events,
            presign_ttl_secs,
        }
    }

    async fn authorize(
        &self,
        caller: &CallerContext,
        resource_id: &str,
        action: ActionType,
    ) -> Result<(), AppError> {
        let allowed = self
            .authz
            .has_permission(&caller.user_id, resource_id, &caller.group_ids, action)
            .await?;

        if !allowed {
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "No {} permission on resource {}",
                action.as_str().to_uppercase(),
                resource_id
            )));
        }
        Ok(())
    }

    async fn load(&self, resource_id: &str, expected: ResourceType) -> Result<Resource, AppError> {
        let resource = self.resources.get_meta(resource_id).await?;
        if resource.resource_type != expected {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Resource {} is not a {}",
                resource_id,
                expected.as_str()
            )));
        }
        Ok(resource)
    }

    fn publish(&self, kind: EventKind, resource: &Resource, actor_id: &str) {
        publish_in_background(
            self.events.clone(),
            ResourceEvent::new(kind, resource, actor_id),
        );
    }

    /// Create a directory. Without a parent it becomes a new root owned by the caller.
    pub async fn create_directory(
        &self,
        caller: &CallerContext,
        parent_id: Option<&str>,
        name: &str,
    ) -> Result<Resource, AppError> {
        if let Some(parent_id) = parent_id {
            self.authorize(caller, parent_id, ActionType::Write).await?;
            self.load(parent_id, ResourceType::Dir).await?;
        }

        let dir = Resource::new_dir(
            caller.user_id.clone(),
            parent_id.map(str::to_string),
            name.to_string(),
        );
        self.resources.insert(&dir).await?;

        tracing::info!(
            resource_id = %dir.id,
            parent_id = ?dir.parent_id,
            "Directory created"
        );
        self.publish(EventKind::Created, &dir, &caller.user_id);
        Ok(dir)
    }

    /// Upload `data` and record it as a file under `parent_id`.
    pub async fn create_file(
        &self,
        caller: &CallerContext,
        parent_id: &str,
        name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<Resource, AppError> {
        self.authorize(caller, parent_id, ActionType::Write).await?;
        self.load(parent_id, ResourceType::Dir).await?;

        let info = FileInfo {
            storage_key: format!("files/{}", Uuid::new_v4()),
            mime_type: mime_type.to_string(),
            size: data.len() as i64,
        };
        self.blobs.put(&info.storage_key, data).await?;

        let file = Resource::new_file(
            caller.user_id.clone(),
            parent_id.to_string(),
            name.to_string(),
            info,
        );
        if let Err(e) = self.resources.insert(&file).await {
            if let Some(info) = &file.file {
                if let Err(cleanup) = self.blobs.delete(&info.storage_key).await {
                    tracing::warn!(
                        storage_key = %info.storage_key,
                        "Failed to remove blob after metadata insert failed: {}",
                        cleanup
                    );
                }
            }
            return Err(e.into());
        }

        tracing::info!(resource_id = %file.id, parent_id = %parent_id, "File created");
        self.publish(EventKind::Created, &file, &caller.user_id);
        Ok(file)
    }

    /// Metadata of a resource; READ on its containing directory.
    pub async fn get_meta(
        &self,
        caller: &CallerContext,
        resource_id: &str,
        expected: ResourceType,
    ) -> Result<Resource, AppError> {
        let resource = self.load(resource_id, expected).await?;
        self.authorize(caller, resource.governing_id(), ActionType::Read)
            .await?;
        Ok(resource)
    }

    pub async fn rename(
        &self,
        caller: &CallerContext,
        resource_id: &str,
        expected: ResourceType,
        name: &str,
    ) -> Result<Resource, AppError> {
        let resource = self.load(resource_id, expected).await?;
        self.authorize(caller, resource.governing_id(), ActionType::Write)
            .await?;

        let renamed = self.resources.rename(resource_id, name).await?;
        tracing::info!(resource_id = %resource_id, "Resource renamed");
        self.publish(EventKind::Updated, &renamed, &caller.user_id);
        Ok(renamed)
    }

    /// Delete a resource and everything beneath it.
    pub async fn delete(
        &self,
        caller: &CallerContext,
        resource_id: &str,
        expected: ResourceType,
    ) -> Result<(), AppError> {
        let resource = self.load(resource_id, expected).await?;
        self.authorize(caller, resource.governing_id(), ActionType::Write)
            .await?;

        let removed = self.delete_subtree(&resource).await?;
        tracing::info!(resource_id = %resource_id, removed, "Resource deleted");
        self.publish(EventKind::Deleted, &resource, &caller.user_id);
        Ok(())
    }

    /// Removes descendants before their ancestors. Each node loses its grants
    /// before its metadata; a file's blob goes last.
    async fn delete_subtree(&self, root: &Resource) -> Result<usize, AppError> {
        let mut ordered = vec![root.clone()];
        let mut seen: HashSet<String> = HashSet::from([root.id.clone()]);
        let mut next = 0;

        while next < ordered.len() {
            if ordered[next].is_dir() {
                let children = self.resources.children(&ordered[next].id).await?;
                for child in children {
                    if seen.insert(child.id.clone()) {
                        ordered.push(child);
                    }
                }
            }
            next += 1;
        }

        for node in ordered.iter().rev() {
            self.authz.on_resource_deleted(&node.id).await?;
            self.resources.delete(&node.id).await?;
            if let Some(info) = &node.file {
                if let Err(e) = self.blobs.delete(&info.storage_key).await {
                    tracing::warn!(
                        resource_id = %node.id,
                        storage_key = %info.storage_key,
                        "Failed to delete blob of removed file: {}",
                        e
                    );
                }
            }
        }

        Ok(ordered.len())
    }

    /// Direct children of a directory; READ on the directory itself.
    pub async fn list_children(
        &self,
        caller: &CallerContext,
        dir_id: &str,
    ) -> Result<Vec<Resource>, AppError> {
        self.load(dir_id, ResourceType::Dir).await?;
        self.authorize(caller, dir_id, ActionType::Read).await?;
        Ok(self.resources.children(dir_id).await?)
    }

    pub async fn download(
        &self,
        caller: &CallerContext,
        file_id: &str,
    ) -> Result<(Resource, Vec<u8>), AppError> {
        let (file, info) = self.readable_file(caller, file_id).await?;
        let data = self.blobs.get(&info.storage_key).await?;
        Ok((file, data))
    }

    pub async fn presign_download(
        &self,
        caller: &CallerContext,
        file_id: &str,
    ) -> Result<PresignedUrl, AppError> {
        let (_, info) = self.readable_file(caller, file_id).await?;
        let url = self
            .blobs
            .presign_get(&info.storage_key, self.presign_ttl_secs)?;
        Ok(PresignedUrl {
            url,
            expires_in: self.presign_ttl_secs,
        })
    }

    async fn readable_file(
        &self,
        caller: &CallerContext,
        file_id: &str,
    ) -> Result<(Resource, FileInfo), AppError> {
        let file = self.load(file_id, ResourceType::File).await?;
        self.authorize(caller, file_id, ActionType::Read).await?;
        let info = file.file.clone().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("File {} has no blob metadata", file_id))
        })?;
        Ok((file, info))
    }

    pub async fn grant(
        &self,
        caller: &CallerContext,
        resource_id: &str,
        group_id: &str,
        actions: &ActionSet,
    ) -> Result<PermissionGrant, AppError> {
        let resource = self.resources.get_meta(resource_id).await?;
        let grant = self
            .authz
            .grant(&caller.user_id, resource_id, group_id, actions)
            .await?;
        self.publish(EventKind::PermissionGranted, &resource, &caller.user_id);
        Ok(grant)
    }

    pub async fn revoke(
        &self,
        caller: &CallerContext,
        resource_id: &str,
        group_id: &str,
        actions: &ActionSet,
    ) -> Result<Option<PermissionGrant>, AppError> {
        let resource = self.resources.get_meta(resource_id).await?;
        let remaining = self
            .authz
            .revoke(&caller.user_id, resource_id, group_id, actions)
            .await?;
        self.publish(EventKind::PermissionRevoked, &resource, &caller.user_id);
        Ok(remaining)
    }

    /// Groups with a direct grant on the resource. Visible to anyone who can read it.
    pub async fn authorized_groups(
        &self,
        caller: &CallerContext,
        resource_id: &str,
    ) -> Result<BTreeSet<String>, AppError> {
        self.authorize(caller, resource_id, ActionType::Read).await?;
        Ok(self.authz.list_authorized_groups(resource_id).await?)
    }

    pub async fn check_access(
        &self,
        caller: &CallerContext,
        resource_id: &str,
        action: ActionType,
    ) -> Result<bool, AppError> {
        Ok(self
            .authz
            .has_permission(&caller.user_id, resource_id, &caller.group_ids, action)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::DEFAULT_MAX_DEPTH;
    use crate::services::{
        InMemoryEventPublisher, InMemoryPermissionIndex, InMemoryResourceStore, LocalBlobStore,
        PermissionIndex,
    };
    use std::time::Duration;

    struct Harness {
        service: ResourceService,
        store: Arc<InMemoryResourceStore>,
        index: Arc<InMemoryPermissionIndex>,
        events: Arc<InMemoryEventPublisher>,
        _blob_dir: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let blob_dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryResourceStore::new());
        let index = Arc::new(InMemoryPermissionIndex::new());
        let events = Arc::new(InMemoryEventPublisher::new());
        let blobs = Arc::new(
            LocalBlobStore::new(blob_dir.path(), "http://localhost:8080", "secret")
                .await
                .unwrap(),
        );
        let authz = AuthzEngine::new(store.clone(), index.clone(), DEFAULT_MAX_DEPTH);
        let service = ResourceService::new(store.clone(), authz, blobs, events.clone(), 300);

        Harness {
            service,
            store,
            index,
            events,
            _blob_dir: blob_dir,
        }
    }

    fn alice() -> CallerContext {
        CallerContext::new("alice", Vec::<String>::new())
    }

    fn bob() -> CallerContext {
        CallerContext::new("bob", ["team"])
    }

    fn write() -> ActionSet {
        ActionSet::from([ActionType::Write])
    }

    #[tokio::test]
    async fn grant_on_missing_resource_changes_nothing() {
        let h = harness().await;

        let err = h
            .service
            .grant(&alice(), "missing", "team", &write())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(h.index.resource_count(), 0);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.events.events().is_empty());
    }

    #[tokio::test]
    async fn stranger_cannot_create_under_foreign_directory() {
        let h = harness().await;
        let root = h
            .service
            .create_directory(&alice(), None, "root")
            .await
            .unwrap();

        let err = h
            .service
            .create_directory(&bob(), Some(&root.id), "intruder")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test]
    async fn group_write_allows_creating_files() {
        let h = harness().await;
        let root = h
            .service
            .create_directory(&alice(), None, "root")
            .await
            .unwrap();
        h.service
            .grant(&alice(), &root.id, "team", &write())
            .await
            .unwrap();

        let file = h
            .service
            .create_file(&bob(), &root.id, "notes.txt", "text/plain", b"hi".to_vec())
            .await
            .unwrap();
        assert_eq!(file.creator_id, "bob");

        // bob owns the file, so he can read it without any READ grant
        let (_, data) = h.service.download(&bob(), &file.id).await.unwrap();
        assert_eq!(data, b"hi");

        // alice has no grant on bob's file and is not its creator
        let err = h.service.download(&alice(), &file.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn file_cannot_be_a_parent() {
        let h = harness().await;
        let root = h
            .service
            .create_directory(&alice(), None, "root")
            .await
            .unwrap();
        let file = h
            .service
            .create_file(&alice(), &root.id, "a.bin", "application/octet-stream", vec![1])
            .await
            .unwrap();

        let err = h
            .service
            .create_directory(&alice(), Some(&file.id), "nested")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn delete_removes_subtree_and_grants() {
        let h = harness().await;
        let root = h
            .service
            .create_directory(&alice(), None, "root")
            .await
            .unwrap();
        let proj = h
            .service
            .create_directory(&alice(), Some(&root.id), "proj")
            .await
            .unwrap();
        let file = h
            .service
            .create_file(&alice(), &proj.id, "doc", "text/plain", b"x".to_vec())
            .await
            .unwrap();
        h.service
            .grant(&alice(), &proj.id, "team", &write())
            .await
            .unwrap();
        h.service
            .grant(&alice(), &file.id, "team", &write())
            .await
            .unwrap();

        h.service
            .delete(&alice(), &proj.id, ResourceType::Dir)
            .await
            .unwrap();

        assert_eq!(h.store.len(), 1);
        assert!(h.index.get_grants(&proj.id).await.unwrap().is_empty());
        assert!(h.index.get_grants(&file.id).await.unwrap().is_empty());
        assert!(matches!(
            h.service.get_meta(&alice(), &file.id, ResourceType::File).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn metadata_is_governed_by_containing_directory() {
        let h = harness().await;
        let root = h
            .service
            .create_directory(&alice(), None, "root")
            .await
            .unwrap();
        let proj = h
            .service
            .create_directory(&alice(), Some(&root.id), "proj")
            .await
            .unwrap();
        h.service
            .grant(&alice(), &root.id, "team", &ActionSet::from([ActionType::Read]))
            .await
            .unwrap();

        let seen = h
            .service
            .get_meta(&bob(), &proj.id, ResourceType::Dir)
            .await
            .unwrap();
        assert_eq!(seen.name, "proj");

        let err = h
            .service
            .rename(&bob(), &proj.id, ResourceType::Dir, "mine")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn mutations_publish_events() {
        let h = harness().await;
        let root = h
            .service
            .create_directory(&alice(), None, "root")
            .await
            .unwrap();
        h.service
            .grant(&alice(), &root.id, "team", &write())
            .await
            .unwrap();

        for _ in 0..50 {
            if h.events.events().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let kinds: Vec<EventKind> = h.events.events().iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&EventKind::Created));
        assert!(kinds.contains(&EventKind::PermissionGranted));
    }
}
