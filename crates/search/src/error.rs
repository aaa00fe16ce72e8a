use thiserror::Error;

use contentflow_core::Guid;
use contentflow_store::StoreError;

#[derive(Debug, Error)]
pub enum SearchError {
    /// The seed does not exist or the caller may not see it.
    #[error("invalid seed item {0}")]
    InvalidSeed(Guid),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
