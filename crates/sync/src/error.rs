use thiserror::Error;

use contentflow_store::StoreError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("content source failed: {0}")]
    Source(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
