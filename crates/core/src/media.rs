use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::{ServiceType, Visibility};
use crate::error::CoreError;
use crate::{BackendId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaObjectType {
    Keyword,
    Face,
    Metadata,
    Object,
}

/// Whether a user has confirmed what a back-end detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfirmationStatus {
    #[default]
    Candidate,
    UserConfirmed,
    UserRejected,
    BackendRemoved,
}

/// A time range inside a video, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timecode {
    pub start: f64,
    pub end: f64,
}

impl Timecode {
    pub fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start >= 0.0 && self.start <= self.end
    }
}

/// A piece of analysis output attached to a content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaObject {
    /// Store identifier. Absent until the object has been inserted.
    #[serde(default)]
    pub media_object_id: Option<String>,
    /// The producing back-end's own identifier for the object.
    pub object_id: String,
    #[serde(default)]
    pub backend_id: Option<BackendId>,
    #[serde(default)]
    pub owner: Option<UserId>,
    pub object_type: MediaObjectType,
    #[serde(default)]
    pub confirmation: ConfirmationStatus,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub rank: Option<i32>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub service_type: Option<ServiceType>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timecodes: Vec<Timecode>,
}

impl MediaObject {
    pub fn new(object_id: impl Into<String>, object_type: MediaObjectType) -> Self {
        Self {
            media_object_id: None,
            object_id: object_id.into(),
            backend_id: None,
            owner: None,
            object_type,
            confirmation: ConfirmationStatus::Candidate,
            name: None,
            value: None,
            confidence: None,
            rank: None,
            visibility: None,
            service_type: None,
            updated: None,
            timecodes: Vec::new(),
        }
    }

    pub fn keyword(object_id: impl Into<String>, value: impl Into<String>) -> Self {
        let mut object = Self::new(object_id, MediaObjectType::Keyword);
        object.value = Some(value.into());
        object
    }

    pub fn is_new(&self) -> bool {
        self.media_object_id.is_none()
    }

    /// Check the object is complete enough to be stored.
    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |reason: &str| CoreError::InvalidMediaObject {
            object_id: self.object_id.clone(),
            reason: reason.to_string(),
        };

        if self.object_id.trim().is_empty() {
            return Err(invalid("missing object id"));
        }
        match self.object_type {
            MediaObjectType::Keyword if is_blank(&self.value) => {
                return Err(invalid("keyword without value"));
            }
            MediaObjectType::Metadata if is_blank(&self.name) || is_blank(&self.value) => {
                return Err(invalid("metadata without name and value"));
            }
            _ => {}
        }
        if let Some(confidence) = self.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(invalid("confidence outside [0, 1]"));
            }
        }
        if self.timecodes.iter().any(|t| !t.is_valid()) {
            return Err(invalid("invalid timecode"));
        }
        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Validate a whole set; the first invalid object fails the set.
pub fn validate_all<'a, I>(objects: I) -> Result<(), CoreError>
where
    I: IntoIterator<Item = &'a MediaObject>,
{
    objects.into_iter().try_for_each(MediaObject::validate)
}
