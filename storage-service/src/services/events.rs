//! Resource change notifications.
//!
//! Publishing is fire-and-forget for request handlers: `publish_in_background`
//! spawns the delivery and only logs the broker's confirmation.

use crate::models::ResourceEvent;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use std::sync::{Arc, Mutex};

/// Broker confirmation for one published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub receivers: u64,
    pub acked: bool,
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &ResourceEvent) -> Result<Delivery, anyhow::Error>;
    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct RedisEventPublisher {
    _client: Client,
    manager: ConnectionManager,
    channel: String,
}

impl RedisEventPublisher {
    pub async fn new(url: &str, channel: &str) -> Result<Self, anyhow::Error> {
        tracing::info!(url = %url, channel = %channel, "Connecting event publisher to Redis");
        let client = Client::open(url)?;

        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        Ok(Self {
            _client: client,
            manager,
            channel: channel.to_string(),
        })
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    async fn publish(&self, event: &ResourceEvent) -> Result<Delivery, anyhow::Error> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.manager.clone();

        // PUBLISH replies with the number of subscribers that received the message
        let receivers: u64 = redis::cmd("PUBLISH")
            .arg(&self.channel)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to publish event: {}", e))?;

        Ok(Delivery {
            receivers,
            acked: receivers > 0,
        })
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}

/// Keeps published events in memory. Used when no broker is configured.
#[derive(Default)]
pub struct InMemoryEventPublisher {
    events: Mutex<Vec<ResourceEvent>>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ResourceEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, event: &ResourceEvent) -> Result<Delivery, anyhow::Error> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
        Ok(Delivery {
            receivers: 1,
            acked: true,
        })
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

pub fn publish_in_background(
    publisher: Arc<dyn EventPublisher>,
    event: ResourceEvent,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match publisher.publish(&event).await {
            Ok(delivery) if delivery.acked => tracing::debug!(
                event_id = %event.event_id,
                resource_id = %event.resource_id,
                receivers = delivery.receivers,
                "Event delivered"
            ),
            Ok(_) => tracing::warn!(
                event_id = %event.event_id,
                resource_id = %event.resource_id,
                "Event published but no subscriber confirmed it"
            ),
            Err(e) => tracing::error!(
                event_id = %event.event_id,
                resource_id = %event.resource_id,
                "Failed to publish event: {}",
                e
            ),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventKind, Resource};

    #[tokio::test]
    async fn background_publish_reaches_publisher() {
        let publisher = Arc::new(InMemoryEventPublisher::new());
        let dir = Resource::new_dir("alice".into(), None, "root".into());

        publish_in_background(
            publisher.clone(),
            ResourceEvent::new(EventKind::Created, &dir, "alice"),
        )
        .await
        .unwrap();

        let events = publisher.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Created);
        assert_eq!(events[0].resource_id, dir.id);
    }

    #[test]
    fn event_serializes_with_snake_case_kind() {
        let dir = Resource::new_dir("alice".into(), None, "root".into());
        let event = ResourceEvent::new(EventKind::PermissionGranted, &dir, "alice");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "permission_granted");
        assert_eq!(json["resource_type"], "dir");
    }
}
