pub mod coordinator;
pub mod error;

pub use coordinator::{FederatedSearchCoordinator, SimilarityQuery};
pub use error::SearchError;
