//! In-process topic bus connecting the responder to local subscribers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::events::TransferEvent;

/// Receiver half of one topic subscription.
pub type EventStream = broadcast::Receiver<TransferEvent>;

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("event bus lock poisoned")]
    LockPoisoned,
}

/// Something events can be published to.
pub trait EventPublisher: Send + Sync {
    /// Publish `event` on `topic`, returning how many subscribers got it.
    fn publish(&self, topic: &str, event: TransferEvent) -> Result<usize, BusError>;
}

/// Consumes events delivered on a topic.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: TransferEvent);
}

/// Fan-out bus with one broadcast channel per topic.
///
/// Delivery is at-most-once per subscriber: a subscriber that falls more
/// than `capacity` events behind loses the overflow.
pub struct EventBus {
    topics: RwLock<HashMap<String, broadcast::Sender<TransferEvent>>>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, topic: &str) -> Result<broadcast::Sender<TransferEvent>, BusError> {
        if let Some(tx) = self.topics.read().map_err(|_| BusError::LockPoisoned)?.get(topic) {
            return Ok(tx.clone());
        }
        let mut topics = self.topics.write().map_err(|_| BusError::LockPoisoned)?;
        let tx = topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        Ok(tx.clone())
    }

    pub fn subscribe(&self, topic: &str) -> Result<EventStream, BusError> {
        Ok(self.sender(topic)?.subscribe())
    }

    /// Run `handler` for every event on `topic`, each in its own task.
    ///
    /// Must be called from within a Tokio runtime. The returned task ends
    /// when the bus is dropped.
    pub fn subscribe_handler(
        &self,
        topic: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<JoinHandle<()>, BusError> {
        let mut rx = self.subscribe(topic)?;
        let topic = topic.to_string();
        Ok(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move { handler.handle(event).await });
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(%topic, skipped, "subscriber lagged; events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!(%topic, "subscription closed");
        }))
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .ok()
            .and_then(|topics| topics.get(topic).map(broadcast::Sender::receiver_count))
            .unwrap_or(0)
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, topic: &str, event: TransferEvent) -> Result<usize, BusError> {
        match self.sender(topic)?.send(event) {
            Ok(delivered) => Ok(delivered),
            Err(_) => {
                debug!(%topic, "no subscribers; event dropped");
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use prov_types::AckId;
    use tokio::sync::mpsc;

    use super::*;
    use crate::events::AcceptAssetEvent;

    fn event(ack: &str) -> TransferEvent {
        TransferEvent::AcceptAsset(AcceptAssetEvent {
            ack_id: AckId::new(ack).unwrap(),
            accepted: true,
            message: String::new(),
            new_id: None,
            new_secret: String::new(),
            old_id: None,
            old_secret: String::new(),
        })
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe("a").unwrap();
        let mut b = bus.subscribe("b").unwrap();
        assert_eq!(bus.publish("a", event("1")).unwrap(), 1);
        assert_eq!(a.recv().await.unwrap(), event("1"));
        assert!(b.try_recv().is_err());
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_not_an_error() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish("nobody", event("1")).unwrap(), 0);
    }

    struct Forward(mpsc::UnboundedSender<TransferEvent>);

    #[async_trait]
    impl EventHandler for Forward {
        async fn handle(&self, event: TransferEvent) {
            let _ = self.0.send(event);
        }
    }

    #[tokio::test]
    async fn handlers_receive_published_events() {
        let bus = EventBus::new(8);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _task = bus.subscribe_handler("t", Arc::new(Forward(tx))).unwrap();
        assert_eq!(bus.subscriber_count("t"), 1);

        bus.publish("t", event("x")).unwrap();
        let got = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, event("x"));
    }
}
