pub mod database;
pub mod events;
pub mod metrics;
pub mod permission_index;
pub mod resource_service;
pub mod resource_store;
pub mod storage;

pub use database::MongoDb;
pub use events::{
    publish_in_background, Delivery, EventPublisher, InMemoryEventPublisher, RedisEventPublisher,
};
pub use permission_index::{InMemoryPermissionIndex, MongoPermissionIndex, PermissionIndex};
pub use resource_service::{PresignedUrl, ResourceService};
pub use resource_store::{InMemoryResourceStore, MongoResourceStore, ResourceStore};
pub use storage::{BlobStore, LocalBlobStore};
