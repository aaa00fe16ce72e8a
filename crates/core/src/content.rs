use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::Capability;
use crate::error::CoreError;
use crate::media::MediaObject;
use crate::status::{combine, TaskStatus};
use crate::{BackendId, Guid, UserId};

/// The kind of content a task or search operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentKind {
    Photo,
    Video,
}

impl ContentKind {
    pub fn analysis_capability(&self) -> Capability {
        match self {
            Self::Photo => Capability::PhotoAnalysis,
            Self::Video => Capability::VideoAnalysis,
        }
    }

    pub fn search_capability(&self) -> Capability {
        match self {
            Self::Photo => Capability::PhotoSearch,
            Self::Video => Capability::VideoSearch,
        }
    }

    /// Back-end operation answering "items similar to this one".
    pub fn similar_by_id_operation(&self) -> &'static str {
        match self {
            Self::Photo => "similarPhotosById",
            Self::Video => "similarVideosById",
        }
    }
}

impl FromStr for ContentKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "photo" => Ok(Self::Photo),
            "video" => Ok(Self::Video),
            other => Err(CoreError::InvalidValue(format!("unknown content kind '{other}'"))),
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Photo => f.write_str("PHOTO"),
            Self::Video => f.write_str("VIDEO"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    Public,
    #[default]
    Private,
    Group,
}

impl Visibility {
    pub fn id(&self) -> i32 {
        match self {
            Self::Public => 0,
            Self::Private => 1,
            Self::Group => 2,
        }
    }
}

/// The external service a content item was synchronized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    Picasa,
    Fsio,
    FacebookJazz,
    FacebookPhoto,
    TwitterJazz,
    TwitterPhoto,
    UrlStorage,
}

impl ServiceType {
    /// Numeric id used on the back-end wire.
    pub fn id(&self) -> i32 {
        match self {
            Self::Picasa => 1,
            Self::Fsio => 2,
            Self::FacebookJazz => 3,
            Self::FacebookPhoto => 4,
            Self::TwitterJazz => 5,
            Self::TwitterPhoto => 6,
            Self::UrlStorage => 7,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(Self::Picasa),
            2 => Some(Self::Fsio),
            3 => Some(Self::FacebookJazz),
            4 => Some(Self::FacebookPhoto),
            5 => Some(Self::TwitterJazz),
            6 => Some(Self::TwitterPhoto),
            7 => Some(Self::UrlStorage),
            _ => None,
        }
    }
}

/// A back-end's status for one content item, reported inside a task result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStatus {
    pub backend_id: BackendId,
    pub status: TaskStatus,
    #[serde(default)]
    pub message: Option<String>,
}

/// A photo or video known to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Store-assigned identifier. Absent until first insertion.
    #[serde(default)]
    pub guid: Option<Guid>,
    pub kind: ContentKind,
    #[serde(default)]
    pub owner: Option<UserId>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub service_type: Option<ServiceType>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub media_objects: Vec<MediaObject>,
    #[serde(default)]
    pub statuses: Vec<ItemStatus>,
}

impl ContentItem {
    pub fn new(kind: ContentKind) -> Self {
        Self {
            guid: None,
            kind,
            owner: None,
            visibility: Visibility::default(),
            service_type: None,
            name: None,
            description: None,
            url: None,
            updated: None,
            media_objects: Vec::new(),
            statuses: Vec::new(),
        }
    }

    pub fn with_guid(mut self, guid: impl Into<Guid>) -> Self {
        self.guid = Some(guid.into());
        self
    }

    pub fn with_owner(mut self, owner: UserId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_media_object(mut self, object: MediaObject) -> Self {
        self.media_objects.push(object);
        self
    }

    /// Combined status of the per-item statuses reported with this item.
    pub fn reported_status(&self) -> TaskStatus {
        combine(self.statuses.iter().map(|s| s.status))
    }

    /// Whether `user` may see this item. `None` is an anonymous caller.
    pub fn is_visible_to(&self, user: Option<UserId>) -> bool {
        self.visibility == Visibility::Public || (user.is_some() && user == self.owner)
    }
}
