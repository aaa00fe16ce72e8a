pub mod backend;
pub mod config;
pub mod content;
pub mod error;
pub mod media;
pub mod search;
pub mod status;
pub mod task;

pub use backend::*;
pub use config::{Config, MaxTaskSize};
pub use content::*;
pub use error::*;
pub use media::*;
pub use search::*;
pub use status::{combine, TaskStatus};
pub use task::*;

/// Store-assigned task identifier.
pub type TaskId = i64;
/// Registry identifier of an analysis back-end.
pub type BackendId = i32;
/// Identifier of a user account.
pub type UserId = i64;
/// Stable, store-assigned content identifier.
pub type Guid = String;

/// Mint a fresh content identifier.
pub fn new_guid() -> Guid {
    uuid::Uuid::new_v4().to_string()
}
