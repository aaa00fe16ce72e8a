pub mod broadcast;
pub mod error;
pub mod events;
pub mod message;
pub mod topics;
pub mod traits;

pub use broadcast::{BroadcastPublisher, BroadcastSubscriber};
pub use error::EventError;
pub use events::{SyncComplete, TaskFinished};
pub use message::Message;
pub use traits::{EventPublisher, EventSubscriber};
