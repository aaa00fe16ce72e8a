use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One published event: a routing topic and its MessagePack payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// e.g. "contentflow.task.finished"; subscribers filter on its prefix.
    pub topic: String,
    pub payload: Vec<u8>,
    pub published_at: DateTime<Utc>,
}

impl Message {
    pub fn new<T: Serialize>(topic: impl Into<String>, payload: &T) -> Result<Self, rmp_serde::encode::Error> {
        Ok(Self {
            topic: topic.into(),
            payload: rmp_serde::to_vec_named(payload)?,
            published_at: Utc::now(),
        })
    }

    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, rmp_serde::decode::Error> {
        rmp_serde::from_slice(&self.payload)
    }

    /// True when the topic starts with `prefix`. An empty prefix matches everything.
    pub fn matches(&self, prefix: &str) -> bool {
        self.topic.starts_with(prefix)
    }
}
