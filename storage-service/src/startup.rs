use crate::authz::AuthzEngine;
use crate::build_router;
use crate::config::{StorageServiceConfig, StoreBackend};
use crate::services::{
    BlobStore, EventPublisher, InMemoryEventPublisher, InMemoryPermissionIndex,
    InMemoryResourceStore, LocalBlobStore, MongoDb, MongoPermissionIndex, MongoResourceStore,
    PermissionIndex, RedisEventPublisher, ResourceService, ResourceStore,
};
use crate::AppState;
use service_core::error::AppError;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Assemble stores, engine and service from configuration.
pub async fn build_state(config: &StorageServiceConfig) -> Result<AppState, AppError> {
    let (resources, grants): (Arc<dyn ResourceStore>, Arc<dyn PermissionIndex>) =
        match (config.store, &config.mongodb) {
            (StoreBackend::Mongodb, Some(mongo)) => {
                let db = MongoDb::connect(&mongo.uri, &mongo.database).await?;
                db.initialize_indexes().await.map_err(|e| {
                    tracing::error!("Failed to initialize database indexes: {}", e);
                    e
                })?;
                (
                    Arc::new(MongoResourceStore::new(db.clone())),
                    Arc::new(MongoPermissionIndex::new(db)),
                )
            }
            (StoreBackend::Mongodb, None) => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "MongoDB backend selected without MongoDB settings"
                )));
            }
            (StoreBackend::Memory, _) => {
                tracing::warn!("Using in-memory stores; data is lost on restart");
                (
                    Arc::new(InMemoryResourceStore::new()),
                    Arc::new(InMemoryPermissionIndex::new()),
                )
            }
        };

    let blobs: Arc<dyn BlobStore> = Arc::new(
        LocalBlobStore::new(
            &config.storage.local_path,
            &config.storage.public_base_url,
            &config.storage.signing_secret,
        )
        .await
        .map_err(|e| {
            tracing::error!(
                "Failed to initialize local storage at {}: {}",
                config.storage.local_path,
                e
            );
            e
        })?,
    );

    let events: Arc<dyn EventPublisher> = match &config.events.redis_url {
        Some(url) => Arc::new(
            RedisEventPublisher::new(url, &config.events.channel)
                .await
                .map_err(AppError::ServiceUnavailable)?,
        ),
        None => {
            tracing::info!("No REDIS_URL configured; resource events stay in process");
            Arc::new(InMemoryEventPublisher::new())
        }
    };

    let authz = AuthzEngine::new(resources.clone(), grants, config.authz.max_depth);
    let service = ResourceService::new(
        resources.clone(),
        authz,
        blobs.clone(),
        events.clone(),
        config.storage.presign_ttl_seconds,
    );

    Ok(AppState {
        service,
        resources,
        blobs,
        events,
    })
}

pub struct Application {
    port: u16,
    server: Box<dyn Future<Output = std::io::Result<()>> + Send + Unpin>,
}

impl Application {
    pub async fn build<F>(config: StorageServiceConfig, shutdown: F) -> Result<Self, AppError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let state = build_state(&config).await?;
        let app = build_router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
