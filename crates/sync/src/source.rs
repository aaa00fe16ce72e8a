//! Where synchronized content comes from.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use contentflow_core::{AnalysisType, ContentItem, ContentKind, ServiceType, UserId};

use crate::error::SyncError;

/// One item as the external provider currently lists it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteItem {
    /// The provider's own id.
    pub remote_id: String,
    /// Album, folder or url the provider lists the item under.
    pub locator: Option<String>,
    pub updated: Option<DateTime<Utc>>,
    pub item: ContentItem,
}

/// An external service whose content is mirrored into the store.
#[async_trait]
pub trait ContentSource: Send + Sync {
    fn service_type(&self) -> ServiceType;

    fn content_kind(&self) -> ContentKind;

    /// Analyses requested for newly discovered items.
    fn analysis_parameters(&self) -> Vec<AnalysisType> {
        Vec::new()
    }

    async fn fetch(&self, user: UserId) -> Result<Vec<RemoteItem>, SyncError>;
}
