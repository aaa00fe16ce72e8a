pub mod error;
pub mod lock;
pub mod reconcile;
pub mod source;
pub mod synchronizer;

pub use error::SyncError;
pub use lock::{UserLock, UserLockGuard};
pub use reconcile::{reconcile, MatchedItem, Reconciliation};
pub use source::{ContentSource, RemoteItem};
pub use synchronizer::{ContentSynchronizer, SyncReport};
