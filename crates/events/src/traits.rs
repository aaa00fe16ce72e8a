use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EventError;
use crate::message::Message;

/// Publishes messages to every interested subscriber.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, message: Message) -> Result<(), EventError>;
}

/// Blanket implementation so `Arc<dyn EventPublisher>` can be used directly.
#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, message: Message) -> Result<(), EventError> {
        (**self).publish(message).await
    }
}

/// Receives messages whose topics match the subscribed prefixes.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Subscribe to topics starting with `topic_prefix`. An empty prefix subscribes to all.
    async fn subscribe(&self, topic_prefix: &str) -> Result<(), EventError>;

    /// Receive the next matching message. Waits until one is available.
    async fn recv(&self) -> Result<Message, EventError>;
}
