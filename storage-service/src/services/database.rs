use crate::models::{PermissionGrant, Resource};
use mongodb::{
    bson::doc, options::IndexOptions, Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(uri = %uri, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB at {}: {}", uri, e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for storage-service");

        // Children listing and subtree deletion walk parent_id downward
        let parent_index = IndexModel::builder()
            .keys(doc! { "parent_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("parent_lookup".to_string())
                    .build(),
            )
            .build();

        self.resources()
            .create_index(parent_index, None)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to create parent index on resources collection: {}",
                    e
                );
                AppError::from(e)
            })?;
        tracing::info!("Created index on resources.parent_id");

        // One grant record per (resource_id, group_id)
        let grant_index = IndexModel::builder()
            .keys(doc! { "resource_id": 1, "group_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("resource_group_unique".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.grants()
            .create_index(grant_index, None)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to create resource_group index on grants collection: {}",
                    e
                );
                AppError::from(e)
            })?;
        tracing::info!("Created unique index on grants.(resource_id, group_id)");

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }

    pub fn resources(&self) -> Collection<Resource> {
        self.db.collection("resources")
    }

    pub fn grants(&self) -> Collection<PermissionGrant> {
        self.db.collection("grants")
    }
}
