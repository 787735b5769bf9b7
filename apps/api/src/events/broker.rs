//! Redis pub/sub event broker with in-memory fallback

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::broadcast;

use super::EventNotifier;
use crate::models::RefreshEvent;

/// Channel capacity for broadcast channels
const BROADCAST_CAPACITY: usize = 256;

/// Refresh event broker
#[derive(Clone)]
pub struct EventBroker {
    inner: Arc<BrokerInner>,
}

enum BrokerInner {
    /// Redis-backed pub/sub for multi-instance deployments
    Redis(RedisBroker),
    /// In-memory broadcast for single-instance mode
    InMemory(broadcast::Sender<RefreshEvent>),
}

async fn ping(redis_url: &str) -> redis::RedisResult<redis::Client> {
    let client = redis::Client::open(redis_url)?;
    let mut conn = client.get_multiplexed_async_connection().await?;
    redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
    Ok(client)
}

impl EventBroker {
    /// Create a broker publishing on `channel` through Redis
    pub fn new_with_redis(client: redis::Client, channel: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(BrokerInner::Redis(RedisBroker::new(client, channel.into()))),
        }
    }

    /// Create an in-memory broker (single instance mode)
    pub fn new_in_memory() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(BrokerInner::InMemory(sender)),
        }
    }

    /// Use Redis when it answers a PING, otherwise deliver in memory
    pub async fn try_with_redis(redis_url: &str, channel: &str) -> Self {
        match ping(redis_url).await {
            Ok(client) => {
                tracing::info!(channel, "Refresh events fan out through Redis");
                Self::new_with_redis(client, channel)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, refresh events stay on this instance");
                Self::new_in_memory()
            }
        }
    }

    /// Receive every event published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        match &*self.inner {
            BrokerInner::Redis(redis) => redis.local_sender.subscribe(),
            BrokerInner::InMemory(sender) => sender.subscribe(),
        }
    }

    /// Whether events reach other instances
    pub fn is_redis_backed(&self) -> bool {
        matches!(&*self.inner, BrokerInner::Redis(_))
    }

    /// Redis client the broker publishes through, if any
    pub fn redis_client(&self) -> Option<redis::Client> {
        match &*self.inner {
            BrokerInner::Redis(redis) => Some(redis.client.clone()),
            BrokerInner::InMemory(_) => None,
        }
    }
}

#[async_trait]
impl EventNotifier for EventBroker {
    async fn publish(&self, event: RefreshEvent) {
        if event.is_empty() {
            return;
        }

        tracing::debug!(resources = event.len(), "Publishing refresh event");

        match &*self.inner {
            BrokerInner::Redis(redis) => redis.publish(event).await,
            BrokerInner::InMemory(sender) => {
                // No receivers is not an error
                let _ = sender.send(event);
            }
        }
    }
}

/// Delay before the subscriber reconnects, doubled per consecutive failure
const RECONNECT_BASE: Duration = Duration::from_secs(1);
const RECONNECT_CAP: Duration = Duration::from_secs(60);
/// Consecutive failures after which the subscriber stops trying
const RECONNECT_LIMIT: u32 = 100;

/// Publishes to Redis and relays the channel to local subscribers
///
/// Every instance subscribes to the channel, so an event published by any
/// instance reaches the local receivers of all of them, this one included.
struct RedisBroker {
    client: redis::Client,
    channel: String,
    local_sender: broadcast::Sender<RefreshEvent>,
}

impl RedisBroker {
    fn new(client: redis::Client, channel: String) -> Self {
        let (local_sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        tokio::spawn(relay(client.clone(), channel.clone(), local_sender.clone()));
        Self {
            client,
            channel,
            local_sender,
        }
    }

    async fn publish(&self, event: RefreshEvent) {
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Refresh event is not serializable");
                return;
            }
        };

        if let Err(e) = self.send(&payload).await {
            // Local clients still hear about it
            tracing::error!(error = %e, channel = %self.channel, "Redis publish failed, delivering locally");
            let _ = self.local_sender.send(event);
        }
    }

    async fn send(&self, payload: &str) -> redis::RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PUBLISH")
            .arg(&self.channel)
            .arg(payload)
            .query_async(&mut conn)
            .await
    }
}

/// Forward channel messages to `sender` until Redis is given up on
async fn relay(client: redis::Client, channel: String, sender: broadcast::Sender<RefreshEvent>) {
    let mut failures = 0u32;
    loop {
        match forward_messages(&client, &channel, &sender).await {
            Ok(()) => {
                tracing::warn!(channel, "Refresh event subscription closed, resubscribing");
                failures = 0;
            }
            Err(e) => {
                failures += 1;
                if failures >= RECONNECT_LIMIT {
                    tracing::error!(channel, failures, "Giving up on refresh event subscription");
                    return;
                }
                tracing::error!(error = %e, channel, failures, "Refresh event subscription failed");
            }
        }
        tokio::time::sleep(reconnect_delay(failures)).await;
    }
}

fn reconnect_delay(failures: u32) -> Duration {
    let factor = 2u32.saturating_pow(failures.saturating_sub(1));
    RECONNECT_BASE.saturating_mul(factor).min(RECONNECT_CAP)
}

async fn forward_messages(
    client: &redis::Client,
    channel: &str,
    sender: &broadcast::Sender<RefreshEvent>,
) -> redis::RedisResult<()> {
    let mut pubsub = client.get_async_connection().await?.into_pubsub();
    pubsub.subscribe(channel).await?;

    let mut messages = pubsub.on_message();
    while let Some(message) = messages.next().await {
        match serde_json::from_slice::<RefreshEvent>(message.get_payload_bytes()) {
            Ok(event) => {
                let _ = sender.send(event);
            }
            Err(e) => tracing::warn!(error = %e, "Dropping malformed refresh event"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityKind, ResourceKind};

    #[test_log::test(tokio::test)]
    async fn test_in_memory_delivery() {
        let broker = EventBroker::new_in_memory();
        let mut rx = broker.subscribe();

        let event = RefreshEvent::new().with(EntityKind::Album, "al-1");
        broker.publish(event.clone()).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let broker = EventBroker::new_in_memory();
        let mut rx1 = broker.subscribe();
        let mut rx2 = broker.subscribe();

        broker
            .publish(RefreshEvent::new().with(ResourceKind::PlayQueue, "u1"))
            .await;

        assert!(rx1.recv().await.unwrap().contains(ResourceKind::PlayQueue, "u1"));
        assert!(rx2.recv().await.unwrap().contains(ResourceKind::PlayQueue, "u1"));
    }

    #[tokio::test]
    async fn test_empty_event_not_published() {
        let broker = EventBroker::new_in_memory();
        let mut rx = broker.subscribe();

        broker.publish(RefreshEvent::new()).await;

        assert!(rx.try_recv().is_err());
    }

    #[test_log::test(tokio::test)]
    async fn test_publish_without_subscribers() {
        let broker = EventBroker::new_in_memory();
        broker
            .publish(RefreshEvent::new().with(EntityKind::Song, "s1"))
            .await;
    }

    #[test]
    fn test_reconnect_delay_doubles_up_to_cap() {
        assert_eq!(reconnect_delay(0), Duration::from_secs(1));
        assert_eq!(reconnect_delay(1), Duration::from_secs(1));
        assert_eq!(reconnect_delay(3), Duration::from_secs(4));
        assert_eq!(reconnect_delay(40), RECONNECT_CAP);
    }

    #[test]
    fn test_is_redis_backed() {
        assert!(!EventBroker::new_in_memory().is_redis_backed());
    }
}
