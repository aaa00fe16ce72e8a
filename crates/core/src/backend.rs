//! Analysis back-ends, their capabilities and per-task status rows.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::{combine, TaskStatus};
use crate::BackendId;

/// Tag declaring which task types a back-end may receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    PhotoAnalysis,
    VideoAnalysis,
    PhotoSearch,
    VideoSearch,
    UserFeedback,
    BackendFeedback,
    /// May receive tasks that carry no owning user.
    AnonymousTask,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PhotoAnalysis => "PHOTO_ANALYSIS",
            Self::VideoAnalysis => "VIDEO_ANALYSIS",
            Self::PhotoSearch => "PHOTO_SEARCH",
            Self::VideoSearch => "VIDEO_SEARCH",
            Self::UserFeedback => "USER_FEEDBACK",
            Self::BackendFeedback => "BACKEND_FEEDBACK",
            Self::AnonymousTask => "ANONYMOUS_TASK",
        };
        f.write_str(name)
    }
}

impl FromStr for Capability {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "PHOTO_ANALYSIS" => Ok(Self::PhotoAnalysis),
            "VIDEO_ANALYSIS" => Ok(Self::VideoAnalysis),
            "PHOTO_SEARCH" => Ok(Self::PhotoSearch),
            "VIDEO_SEARCH" => Ok(Self::VideoSearch),
            "USER_FEEDBACK" => Ok(Self::UserFeedback),
            "BACKEND_FEEDBACK" => Ok(Self::BackendFeedback),
            "ANONYMOUS_TASK" => Ok(Self::AnonymousTask),
            other => Err(CoreError::InvalidValue(format!("unknown capability '{other}'"))),
        }
    }
}

/// An independently operated analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisBackend {
    pub backend_id: BackendId,
    /// Base URI; operation names are appended to it.
    pub endpoint: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Data groups the back-end asks for unless the task says otherwise.
    #[serde(default)]
    pub default_data_groups: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

impl AnalysisBackend {
    pub fn new(backend_id: BackendId, endpoint: impl Into<String>) -> Self {
        Self {
            backend_id,
            endpoint: endpoint.into(),
            description: None,
            capabilities: BTreeSet::new(),
            enabled: true,
            default_data_groups: Vec::new(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(capabilities);
        self
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// True when the back-end declares every capability in `required`.
    pub fn has_capabilities(&self, required: &[Capability]) -> bool {
        required.iter().all(|c| self.capabilities.contains(c))
    }

    /// Build the absolute URL of a back-end operation.
    pub fn operation_url(&self, operation: &str) -> String {
        if self.endpoint.ends_with('/') {
            format!("{}{}", self.endpoint, operation)
        } else {
            format!("{}/{}", self.endpoint, operation)
        }
    }
}

/// The progress of one task on one back-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendStatus {
    pub backend: AnalysisBackend,
    pub status: TaskStatus,
    #[serde(default)]
    pub message: Option<String>,
}

impl BackendStatus {
    pub fn new(backend: AnalysisBackend, status: TaskStatus) -> Self {
        Self {
            backend,
            status,
            message: None,
        }
    }

    pub fn backend_id(&self) -> BackendId {
        self.backend.backend_id
    }
}

/// Status rows of a task, keyed by back-end id in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendStatusList {
    rows: IndexMap<BackendId, BackendStatus>,
}

impl BackendStatusList {
    pub fn new() -> Self {
        Self::default()
    }

    /// One `NOT_STARTED` row per back-end. Duplicate ids keep the first entry.
    pub fn not_started<I>(backends: I) -> Self
    where
        I: IntoIterator<Item = AnalysisBackend>,
    {
        let mut list = Self::new();
        for backend in backends {
            list.insert(BackendStatus::new(backend, TaskStatus::NotStarted));
        }
        list
    }

    /// Insert a row. Returns false, leaving the list unchanged, if the back-end is already present.
    pub fn insert(&mut self, status: BackendStatus) -> bool {
        let id = status.backend_id();
        if self.rows.contains_key(&id) {
            return false;
        }
        self.rows.insert(id, status);
        true
    }

    /// Replace an existing row. Returns false if the back-end has no row.
    pub fn replace(&mut self, status: BackendStatus) -> bool {
        match self.rows.get_mut(&status.backend_id()) {
            Some(row) => {
                *row = status;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, backend_id: BackendId) -> Option<&BackendStatus> {
        self.rows.get(&backend_id)
    }

    pub fn contains(&self, backend_id: BackendId) -> bool {
        self.rows.contains_key(&backend_id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BackendStatus> {
        self.rows.values()
    }

    pub fn backend_ids(&self) -> impl Iterator<Item = BackendId> + '_ {
        self.rows.keys().copied()
    }

    /// Rows whose back-end declares every required capability.
    pub fn with_capabilities(&self, required: &[Capability]) -> Self {
        self.filtered(|row| row.backend.has_capabilities(required))
    }

    /// Rows currently in `status`.
    pub fn with_status(&self, status: TaskStatus) -> Self {
        self.filtered(|row| row.status == status)
    }

    fn filtered(&self, keep: impl Fn(&BackendStatus) -> bool) -> Self {
        Self {
            rows: self
                .rows
                .iter()
                .filter(|(_, row)| keep(row))
                .map(|(id, row)| (*id, row.clone()))
                .collect(),
        }
    }

    /// Status of the task as a whole, derived from every row.
    pub fn combined_status(&self) -> TaskStatus {
        combine(self.rows.values().map(|row| row.status))
    }
}

impl FromIterator<BackendStatus> for BackendStatusList {
    fn from_iter<T: IntoIterator<Item = BackendStatus>>(iter: T) -> Self {
        let mut list = Self::new();
        for status in iter {
            list.insert(status);
        }
        list
    }
}

impl IntoIterator for BackendStatusList {
    type Item = BackendStatus;
    type IntoIter = indexmap::map::IntoValues<BackendId, BackendStatus>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_values()
    }
}
