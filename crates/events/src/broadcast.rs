use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::error::EventError;
use crate::message::Message;
use crate::traits::{EventPublisher, EventSubscriber};

const DEFAULT_CAPACITY: usize = 1024;

/// In-process publisher fanning messages out over a tokio broadcast channel.
pub struct BroadcastPublisher {
    sender: broadcast::Sender<Message>,
}

impl BroadcastPublisher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a subscriber. It receives nothing until it subscribes to a prefix.
    pub fn subscriber(&self) -> BroadcastSubscriber {
        BroadcastSubscriber {
            receiver: Mutex::new(self.sender.subscribe()),
            prefixes: Mutex::new(Vec::new()),
        }
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, message: Message) -> Result<(), EventError> {
        let topic = message.topic.clone();
        match self.sender.send(message) {
            Ok(receivers) => debug!(topic = %topic, receivers, "published message"),
            Err(_) => debug!(topic = %topic, "published message with no subscribers"),
        }
        Ok(())
    }
}

pub struct BroadcastSubscriber {
    receiver: Mutex<broadcast::Receiver<Message>>,
    prefixes: Mutex<Vec<String>>,
}

#[async_trait]
impl EventSubscriber for BroadcastSubscriber {
    async fn subscribe(&self, topic_prefix: &str) -> Result<(), EventError> {
        self.prefixes.lock().await.push(topic_prefix.to_string());
        debug!(topic_prefix = %topic_prefix, "subscribed to topic prefix");
        Ok(())
    }

    async fn recv(&self) -> Result<Message, EventError> {
        if self.prefixes.lock().await.is_empty() {
            return Err(EventError::NotSubscribed);
        }
        let mut receiver = self.receiver.lock().await;
        loop {
            let message = match receiver.recv().await {
                Ok(message) => message,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged, messages dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return Err(EventError::Closed),
            };
            let wanted = self.prefixes.lock().await.iter().any(|p| message.matches(p));
            if wanted {
                debug!(topic = %message.topic, "received message");
                return Ok(message);
            }
        }
    }
}
