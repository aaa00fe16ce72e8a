use thiserror::Error;

/// Errors raised while publishing or receiving events.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("event channel closed")]
    Closed,

    #[error("not subscribed to any topic")]
    NotSubscribed,
}
